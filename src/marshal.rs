//! Conversion between host [`Value`]s and the engine's fixed-layout buffers.
//!
//! This is the only module that reads or writes buffer bytes. Everything above it works with
//! typed values; everything below it (the [`Engine`](crate::engine::Engine) implementations)
//! only moves the bytes across the boundary.
//!
//! Layouts use native byte order:
//!
//! | tag | layout |
//! |-----|--------|
//! | `Bool` | 1 byte, 0 or 1 |
//! | integers, floats | natural width |
//! | `Decimal` | i128 mantissa + u8 scale (17 bytes) |
//! | `Money` | i64 scaled by 10^4 |
//! | `Date` | i32 Julian day number |
//! | `Time` | i32 milliseconds since midnight |
//! | `Timestamp` | `Date` followed by `Time` |
//! | `Char`, `VarChar` | UTF-8, length in `used` |
//! | `Binary` | raw bytes |
//!
//! NULL is an empty buffer with indicator [`NULL_INDICATOR`].

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;

use crate::{
    sys,
    types::{Decimal, TypeTag, Value},
};

pub const NULL_INDICATOR: i32 = sys::ADS_NULL_DATA;

/// Offset between chrono's day count (0001-01-01 is day 1) and the Julian day number.
const JULIAN_DAY_OFFSET: i32 = 1_721_425;
const MILLIS_PER_DAY: i32 = 86_400_000;
const MONEY_SCALE: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarshalError {
    #[error("{value} value cannot be marshaled as {tag}")]
    Unsupported { value: &'static str, tag: TypeTag },
    #[error("{value} is out of range for {tag}")]
    Overflow { value: String, tag: TypeTag },
    #[error("{value} cannot be represented as {tag} without losing precision")]
    PrecisionLoss { value: String, tag: TypeTag },
    #[error("{tag} buffer holds {capacity} bytes but {used} were reported")]
    LengthOverrun {
        tag: TypeTag,
        capacity: usize,
        used: usize,
    },
    #[error("{tag} field must be {expected} bytes, got {actual}")]
    WidthMismatch {
        tag: TypeTag,
        expected: usize,
        actual: usize,
    },
    #[error("invalid {tag} payload: {reason}")]
    Malformed { tag: TypeTag, reason: String },
}

/// A memory region handed to or filled by the engine.
///
/// Capacity is fixed at construction; the engine may only change `used` and `indicator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    tag: TypeTag,
    data: Box<[u8]>,
    used: usize,
    indicator: i32,
}

impl BufferDescriptor {
    fn input(tag: TypeTag, bytes: Vec<u8>) -> Self {
        let used = bytes.len();
        Self {
            tag,
            data: bytes.into_boxed_slice(),
            used,
            indicator: 0,
        }
    }

    fn null(tag: TypeTag) -> Self {
        Self {
            tag,
            data: Box::default(),
            used: 0,
            indicator: NULL_INDICATOR,
        }
    }

    /// Zeroed output buffer of `capacity` bytes for the engine to fill.
    pub fn output(tag: TypeTag, capacity: usize) -> Self {
        Self {
            tag,
            data: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
            indicator: 0,
        }
    }

    /// Output buffer as written by an engine: `bytes` is the whole region.
    pub fn filled(tag: TypeTag, bytes: Vec<u8>, used: usize, indicator: i32) -> Self {
        Self {
            tag,
            data: bytes.into_boxed_slice(),
            used,
            indicator,
        }
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn indicator(&self) -> i32 {
        self.indicator
    }

    pub fn is_null(&self) -> bool {
        self.indicator == NULL_INDICATOR
    }

    /// Bytes to send for an input buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.used.min(self.data.len())]
    }

    /// Split borrows for an engine output call.
    pub(crate) fn out_parts(&mut self) -> (&mut [u8], &mut usize, &mut i32) {
        (&mut self.data, &mut self.used, &mut self.indicator)
    }
}

fn overflow(value: &Value, tag: TypeTag) -> MarshalError {
    MarshalError::Overflow {
        value: format!("{value:?}"),
        tag,
    }
}

fn precision(value: &Value, tag: TypeTag) -> MarshalError {
    MarshalError::PrecisionLoss {
        value: format!("{value:?}"),
        tag,
    }
}

fn unsupported(value: &Value, tag: TypeTag) -> MarshalError {
    MarshalError::Unsupported {
        value: value.type_name(),
        tag,
    }
}

fn encode_from_integer(n: i128, value: &Value, tag: TypeTag) -> Result<Vec<u8>, MarshalError> {
    let err = || overflow(value, tag);
    let bytes = match tag {
        TypeTag::Int8 => i8::try_from(n).map_err(|_| err())?.to_ne_bytes().to_vec(),
        TypeTag::Int16 => i16::try_from(n).map_err(|_| err())?.to_ne_bytes().to_vec(),
        TypeTag::Int32 => i32::try_from(n).map_err(|_| err())?.to_ne_bytes().to_vec(),
        TypeTag::Int64 => i64::try_from(n).map_err(|_| err())?.to_ne_bytes().to_vec(),
        TypeTag::UInt8 => u8::try_from(n).map_err(|_| err())?.to_ne_bytes().to_vec(),
        TypeTag::UInt16 => u16::try_from(n).map_err(|_| err())?.to_ne_bytes().to_vec(),
        TypeTag::UInt32 => u32::try_from(n).map_err(|_| err())?.to_ne_bytes().to_vec(),
        TypeTag::UInt64 => u64::try_from(n).map_err(|_| err())?.to_ne_bytes().to_vec(),
        // Exact only up to the mantissa width.
        TypeTag::Float32 if n.unsigned_abs() <= 1 << 24 => (n as f32).to_ne_bytes().to_vec(),
        TypeTag::Float64 if n.unsigned_abs() <= 1 << 53 => (n as f64).to_ne_bytes().to_vec(),
        TypeTag::Float32 | TypeTag::Float64 => return Err(precision(value, tag)),
        TypeTag::Decimal => encode_decimal(Decimal::scaled(n, 0)),
        TypeTag::Money => encode_money(Decimal::scaled(n, 0), value)?,
        _ => return Err(unsupported(value, tag)),
    };
    Ok(bytes)
}

fn encode_decimal(d: Decimal) -> Vec<u8> {
    let mut out = Vec::with_capacity(17);
    out.extend_from_slice(&d.mantissa().to_ne_bytes());
    out.push(d.scale());
    out
}

fn encode_money(d: Decimal, value: &Value) -> Result<Vec<u8>, MarshalError> {
    let scaled = d
        .rescale(MONEY_SCALE)
        .ok_or_else(|| precision(value, TypeTag::Money))?;
    let cents = i64::try_from(scaled.mantissa()).map_err(|_| overflow(value, TypeTag::Money))?;
    Ok(cents.to_ne_bytes().to_vec())
}

fn julian_day(date: NaiveDate) -> i32 {
    date.num_days_from_ce() + JULIAN_DAY_OFFSET
}

fn time_millis(time: NaiveTime, value: &Value, tag: TypeTag) -> Result<i32, MarshalError> {
    // Leap-second nanos (>= 1e9) and sub-millisecond precision have no native encoding.
    let nanos = time.nanosecond();
    if nanos >= 1_000_000_000 || nanos % 1_000_000 != 0 {
        return Err(precision(value, tag));
    }
    let millis = time.num_seconds_from_midnight() * 1000 + nanos / 1_000_000;
    Ok(millis as i32)
}

/// Encode `value` for a native slot of type `tag`.
///
/// A conversion that would change the value fails instead of truncating.
pub fn to_native(value: &Value, tag: TypeTag) -> Result<BufferDescriptor, MarshalError> {
    if value.is_null() {
        return Ok(BufferDescriptor::null(tag));
    }

    if let Some(n) = value.as_i128() {
        return Ok(BufferDescriptor::input(tag, encode_from_integer(n, value, tag)?));
    }

    let bytes = match (value, tag) {
        (Value::Bool(b), TypeTag::Bool) => vec![u8::from(*b)],

        (Value::F32(f), TypeTag::Float32) => f.to_ne_bytes().to_vec(),
        (Value::F32(f), TypeTag::Float64) => f64::from(*f).to_ne_bytes().to_vec(),
        (Value::F64(f), TypeTag::Float64) => f.to_ne_bytes().to_vec(),
        (Value::F64(f), TypeTag::Float32) => {
            let narrowed = *f as f32;
            if !f.is_nan() && f64::from(narrowed) != *f {
                return Err(precision(value, tag));
            }
            narrowed.to_ne_bytes().to_vec()
        }

        (Value::Decimal(d), TypeTag::Decimal) => encode_decimal(*d),
        (Value::Decimal(d), TypeTag::Money) => encode_money(*d, value)?,

        (Value::Text(s), TypeTag::Char | TypeTag::VarChar) => s.as_bytes().to_vec(),
        (Value::Bytes(b), TypeTag::Binary) => b.clone(),

        (Value::Date(d), TypeTag::Date) => julian_day(*d).to_ne_bytes().to_vec(),
        (Value::Date(d), TypeTag::Timestamp) => {
            let mut out = julian_day(*d).to_ne_bytes().to_vec();
            out.extend_from_slice(&0i32.to_ne_bytes());
            out
        }
        (Value::Time(t), TypeTag::Time) => time_millis(*t, value, tag)?.to_ne_bytes().to_vec(),
        (Value::Timestamp(ts), TypeTag::Timestamp) => {
            let mut out = julian_day(ts.date()).to_ne_bytes().to_vec();
            out.extend_from_slice(&time_millis(ts.time(), value, tag)?.to_ne_bytes());
            out
        }

        _ => return Err(unsupported(value, tag)),
    };

    Ok(BufferDescriptor::input(tag, bytes))
}

fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

fn decode_date(jdn: i32, tag: TypeTag) -> Result<NaiveDate, MarshalError> {
    jdn.checked_sub(JULIAN_DAY_OFFSET)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| MarshalError::Malformed {
            tag,
            reason: format!("julian day {jdn} is out of range"),
        })
}

fn decode_time(millis: i32, tag: TypeTag) -> Result<NaiveTime, MarshalError> {
    if !(0..MILLIS_PER_DAY).contains(&millis) {
        return Err(MarshalError::Malformed {
            tag,
            reason: format!("{millis} ms is not a time of day"),
        });
    }
    let millis = millis as u32;
    NaiveTime::from_hms_milli_opt(
        millis / 3_600_000,
        millis / 60_000 % 60,
        millis / 1000 % 60,
        millis % 1000,
    )
    .ok_or_else(|| MarshalError::Malformed {
        tag,
        reason: format!("{millis} ms is not a time of day"),
    })
}

/// Decode a buffer filled by the engine.
///
/// The reported length is checked against the buffer's capacity, and fixed-width fields
/// against their exact width, before any byte is read.
pub fn from_native(desc: &BufferDescriptor) -> Result<Value, MarshalError> {
    let tag = desc.tag;
    if desc.is_null() || tag == TypeTag::Null {
        return Ok(Value::Null);
    }
    if desc.used > desc.capacity() {
        return Err(MarshalError::LengthOverrun {
            tag,
            capacity: desc.capacity(),
            used: desc.used,
        });
    }
    let bytes = &desc.data[..desc.used];
    if let Some(expected) = tag.fixed_width() {
        if bytes.len() != expected {
            return Err(MarshalError::WidthMismatch {
                tag,
                expected,
                actual: bytes.len(),
            });
        }
    }

    let value = match tag {
        TypeTag::Null => Value::Null,
        TypeTag::Bool => Value::Bool(bytes[0] != 0),
        TypeTag::Int8 => Value::I8(i8::from_ne_bytes(fixed(bytes))),
        TypeTag::Int16 => Value::I16(i16::from_ne_bytes(fixed(bytes))),
        TypeTag::Int32 => Value::I32(i32::from_ne_bytes(fixed(bytes))),
        TypeTag::Int64 => Value::I64(i64::from_ne_bytes(fixed(bytes))),
        TypeTag::UInt8 => Value::U8(bytes[0]),
        TypeTag::UInt16 => Value::U16(u16::from_ne_bytes(fixed(bytes))),
        TypeTag::UInt32 => Value::U32(u32::from_ne_bytes(fixed(bytes))),
        TypeTag::UInt64 => Value::U64(u64::from_ne_bytes(fixed(bytes))),
        TypeTag::Float32 => Value::F32(f32::from_ne_bytes(fixed(bytes))),
        TypeTag::Float64 => Value::F64(f64::from_ne_bytes(fixed(bytes))),
        TypeTag::Decimal => {
            let mantissa = i128::from_ne_bytes(fixed(bytes));
            let scale = bytes[16];
            let d = Decimal::new(mantissa, scale).ok_or_else(|| MarshalError::Malformed {
                tag,
                reason: format!("scale {scale} exceeds {}", Decimal::MAX_SCALE),
            })?;
            Value::Decimal(d)
        }
        TypeTag::Money => {
            let cents = i64::from_ne_bytes(fixed(bytes));
            Value::Decimal(Decimal::scaled(cents.into(), MONEY_SCALE))
        }
        TypeTag::Char | TypeTag::VarChar => {
            let s = std::str::from_utf8(bytes).map_err(|e| MarshalError::Malformed {
                tag,
                reason: e.to_string(),
            })?;
            Value::Text(s.to_string())
        }
        TypeTag::Binary => Value::Bytes(bytes.to_vec()),
        TypeTag::Date => Value::Date(decode_date(i32::from_ne_bytes(fixed(bytes)), tag)?),
        TypeTag::Time => Value::Time(decode_time(i32::from_ne_bytes(fixed(bytes)), tag)?),
        TypeTag::Timestamp => {
            let date = decode_date(i32::from_ne_bytes(fixed(&bytes[..4])), tag)?;
            let time = decode_time(i32::from_ne_bytes(fixed(&bytes[4..])), tag)?;
            Value::Timestamp(NaiveDateTime::new(date, time))
        }
    };
    Ok(value)
}
