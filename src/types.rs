//! Host values and native type tags.

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::sys;

/// Native type identifier attached to every value that crosses the engine boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TypeTag {
    Null = sys::ADS_TYPE_NULL,
    Bool = sys::ADS_TYPE_BOOL,
    Int8 = sys::ADS_TYPE_INT8,
    Int16 = sys::ADS_TYPE_INT16,
    Int32 = sys::ADS_TYPE_INT32,
    Int64 = sys::ADS_TYPE_INT64,
    UInt8 = sys::ADS_TYPE_UINT8,
    UInt16 = sys::ADS_TYPE_UINT16,
    UInt32 = sys::ADS_TYPE_UINT32,
    UInt64 = sys::ADS_TYPE_UINT64,
    Float32 = sys::ADS_TYPE_FLOAT32,
    Float64 = sys::ADS_TYPE_FLOAT64,
    Decimal = sys::ADS_TYPE_DECIMAL,
    Money = sys::ADS_TYPE_MONEY,
    Char = sys::ADS_TYPE_CHAR,
    VarChar = sys::ADS_TYPE_VARCHAR,
    Binary = sys::ADS_TYPE_BINARY,
    Date = sys::ADS_TYPE_DATE,
    Time = sys::ADS_TYPE_TIME,
    Timestamp = sys::ADS_TYPE_TIMESTAMP,
}

impl TypeTag {
    pub const ALL: [TypeTag; 20] = [
        TypeTag::Null,
        TypeTag::Bool,
        TypeTag::Int8,
        TypeTag::Int16,
        TypeTag::Int32,
        TypeTag::Int64,
        TypeTag::UInt8,
        TypeTag::UInt16,
        TypeTag::UInt32,
        TypeTag::UInt64,
        TypeTag::Float32,
        TypeTag::Float64,
        TypeTag::Decimal,
        TypeTag::Money,
        TypeTag::Char,
        TypeTag::VarChar,
        TypeTag::Binary,
        TypeTag::Date,
        TypeTag::Time,
        TypeTag::Timestamp,
    ];

    /// Map a tag reported by the engine. Unknown values yield `None`.
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.raw() == raw)
    }

    pub fn raw(self) -> u16 {
        self as u16
    }

    /// Byte width for fixed-layout tags; `None` for variable-length tags.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            TypeTag::Null => Some(0),
            TypeTag::Bool | TypeTag::Int8 | TypeTag::UInt8 => Some(1),
            TypeTag::Int16 | TypeTag::UInt16 => Some(2),
            TypeTag::Int32 | TypeTag::UInt32 | TypeTag::Float32 => Some(4),
            TypeTag::Date | TypeTag::Time => Some(4),
            TypeTag::Int64 | TypeTag::UInt64 | TypeTag::Float64 => Some(8),
            TypeTag::Money | TypeTag::Timestamp => Some(8),
            TypeTag::Decimal => Some(17),
            TypeTag::Char | TypeTag::VarChar | TypeTag::Binary => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            TypeTag::Int8
                | TypeTag::Int16
                | TypeTag::Int32
                | TypeTag::Int64
                | TypeTag::UInt8
                | TypeTag::UInt16
                | TypeTag::UInt32
                | TypeTag::UInt64
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Null => "NULL",
            TypeTag::Bool => "BOOL",
            TypeTag::Int8 => "INT8",
            TypeTag::Int16 => "INT16",
            TypeTag::Int32 => "INT32",
            TypeTag::Int64 => "INT64",
            TypeTag::UInt8 => "UINT8",
            TypeTag::UInt16 => "UINT16",
            TypeTag::UInt32 => "UINT32",
            TypeTag::UInt64 => "UINT64",
            TypeTag::Float32 => "FLOAT32",
            TypeTag::Float64 => "FLOAT64",
            TypeTag::Decimal => "DECIMAL",
            TypeTag::Money => "MONEY",
            TypeTag::Char => "CHAR",
            TypeTag::VarChar => "VARCHAR",
            TypeTag::Binary => "BINARY",
            TypeTag::Date => "DATE",
            TypeTag::Time => "TIME",
            TypeTag::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exact decimal number: `mantissa * 10^-scale`.
///
/// Equality is structural, so `1.50` and `1.5` are different values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    scale: u8,
}

impl Decimal {
    pub const MAX_SCALE: u8 = 38;

    pub fn new(mantissa: i128, scale: u8) -> Option<Self> {
        (scale <= Self::MAX_SCALE).then_some(Self { mantissa, scale })
    }

    /// Caller guarantees `scale <= MAX_SCALE`.
    pub(crate) fn scaled(mantissa: i128, scale: u8) -> Self {
        debug_assert!(scale <= Self::MAX_SCALE);
        Self { mantissa, scale }
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Re-express with `scale` digits after the point.
    ///
    /// Returns `None` on overflow or when non-zero digits would be dropped.
    pub fn rescale(&self, scale: u8) -> Option<Self> {
        if scale > Self::MAX_SCALE {
            return None;
        }
        let mantissa = if scale >= self.scale {
            let factor = 10i128.checked_pow(u32::from(scale - self.scale))?;
            self.mantissa.checked_mul(factor)?
        } else {
            let factor = 10i128.checked_pow(u32::from(self.scale - scale))?;
            if self.mantissa % factor != 0 {
                return None;
            }
            self.mantissa / factor
        };
        Some(Self { mantissa, scale })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = usize::from(self.scale);
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int}.{frac}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid decimal literal '{0}'")]
pub struct ParseDecimalError(String);

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDecimalError(s.to_string());
        let t = s.trim();
        let (negative, body) = match t.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, t.strip_prefix('+').unwrap_or(t)),
        };
        let (int, frac) = body.split_once('.').unwrap_or((body, ""));
        if int.is_empty() && frac.is_empty() {
            return Err(err());
        }
        if !int.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let scale = u8::try_from(frac.len()).map_err(|_| err())?;
        let mut mantissa: i128 = format!("{int}{frac}").parse().map_err(|_| err())?;
        if negative {
            mantissa = -mantissa;
        }
        Decimal::new(mantissa, scale).ok_or_else(err)
    }
}

/// A host value as seen by callers of the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Tag chosen when the caller does not ask for one.
    pub fn natural_tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::I8(_) => TypeTag::Int8,
            Value::I16(_) => TypeTag::Int16,
            Value::I32(_) => TypeTag::Int32,
            Value::I64(_) => TypeTag::Int64,
            Value::U8(_) => TypeTag::UInt8,
            Value::U16(_) => TypeTag::UInt16,
            Value::U32(_) => TypeTag::UInt32,
            Value::U64(_) => TypeTag::UInt64,
            Value::F32(_) => TypeTag::Float32,
            Value::F64(_) => TypeTag::Float64,
            Value::Decimal(_) => TypeTag::Decimal,
            Value::Text(_) => TypeTag::VarChar,
            Value::Bytes(_) => TypeTag::Binary,
            Value::Date(_) => TypeTag::Date,
            Value::Time(_) => TypeTag::Time,
            Value::Timestamp(_) => TypeTag::Timestamp,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer payload widened to `i128`, for any integer variant.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::I8(v) => Some(v.into()),
            Value::I16(v) => Some(v.into()),
            Value::I32(v) => Some(v.into()),
            Value::I64(v) => Some(v.into()),
            Value::U8(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::U32(v) => Some(v.into()),
            Value::U64(v) => Some(v.into()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    String => Text,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A parameter with an optional explicit target tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: Value,
    pub tag: Option<TypeTag>,
}

impl Param {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            tag: None,
        }
    }

    pub fn typed(value: impl Into<Value>, tag: TypeTag) -> Self {
        Self {
            value: value.into(),
            tag: Some(tag),
        }
    }

    pub fn target_tag(&self) -> TypeTag {
        self.tag.unwrap_or_else(|| self.value.natural_tag())
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Self { value, tag: None }
    }
}

/// One fetched row, one value per result column.
pub type Row = Vec<Value>;
