//! Result set metadata and row materialization.

use tracing::trace;

use crate::{
    engine::{ColumnInfo, Engine, RawHandle},
    error::{Diagnostic, Error, Result},
    marshal::{self, BufferDescriptor},
    status::{self, Completion},
    types::{Row, TypeTag, Value},
};

const NAME_BUFFER: usize = 128;

/// Metadata of one result column, read once per result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub tag: TypeTag,
    /// Declared size in bytes (character columns) or digits (numeric columns).
    pub size: u32,
    pub scale: i16,
    pub nullable: bool,
}

impl ColumnDescriptor {
    /// Output buffer capacity for one field of this column.
    fn capacity(&self) -> usize {
        self.tag
            .fixed_width()
            .unwrap_or_else(|| (self.size as usize).max(1))
    }
}

/// Read the column metadata of the current result set of `stmt`.
pub(crate) fn describe(engine: &dyn Engine, stmt: RawHandle) -> Result<Vec<ColumnDescriptor>> {
    let mut count = 0u16;
    let rc = engine.column_count(stmt, &mut count);
    status::check(engine, stmt, rc, "column count")?;

    (1..=count)
        .map(|column| describe_column(engine, stmt, column))
        .collect()
}

fn describe_column(engine: &dyn Engine, stmt: RawHandle, column: u16) -> Result<ColumnDescriptor> {
    let context = format!("describe column {column}");
    let mut name = vec![0u8; NAME_BUFFER];
    let mut len = 0usize;
    let mut info = ColumnInfo::default();

    let rc = engine.describe_column(stmt, column, &mut name, &mut len, &mut info);
    let mut done = status::check(engine, stmt, rc, &context)?;
    if done == Completion::Truncated || len > name.len() {
        name = vec![0u8; len];
        let rc = engine.describe_column(stmt, column, &mut name, &mut len, &mut info);
        done = status::check(engine, stmt, rc, &context)?;
    }
    if done == Completion::Truncated || len > name.len() {
        return Err(Error::Data(Diagnostic::driver(
            context,
            format!("column name of {len} bytes does not fit its buffer"),
        )));
    }

    let tag = TypeTag::from_raw(info.tag).ok_or_else(|| {
        Error::Data(Diagnostic::driver(
            &context,
            format!("engine reported unknown type tag {}", info.tag),
        ))
    })?;
    let name = String::from_utf8(name[..len].to_vec()).map_err(|_| {
        Error::Data(Diagnostic::driver(&context, "column name is not valid UTF-8"))
    })?;

    Ok(ColumnDescriptor {
        name,
        tag,
        size: info.size,
        scale: info.scale,
        nullable: info.nullable,
    })
}

/// Advance `stmt` and materialize the new current row.
///
/// `Ok(None)` once the result set is exhausted.
pub(crate) fn fetch_row(
    engine: &dyn Engine,
    stmt: RawHandle,
    columns: &[ColumnDescriptor],
    trim_char: bool,
) -> Result<Option<Row>> {
    let rc = engine.fetch(stmt);
    if status::check(engine, stmt, rc, "fetch")? == Completion::NoData {
        return Ok(None);
    }

    let mut row = Vec::with_capacity(columns.len());
    for (column, desc) in (1u16..).zip(columns) {
        let mut value = read_field(engine, stmt, column, desc)?;
        if trim_char && desc.tag == TypeTag::Char {
            if let Value::Text(s) = &mut value {
                let kept = s.trim_end_matches(' ').len();
                s.truncate(kept);
            }
        }
        row.push(value);
    }
    trace!(columns = row.len(), "fetched row");
    Ok(Some(row))
}

/// Read one field, growing the buffer once if the engine reports truncation.
///
/// A repeated read of the same column returns the whole field again.
fn read_field(
    engine: &dyn Engine,
    stmt: RawHandle,
    column: u16,
    desc: &ColumnDescriptor,
) -> Result<Value> {
    let context = format!("fetch column {column}");
    let mut buf = BufferDescriptor::output(desc.tag, desc.capacity());
    let mut done = get_data(engine, stmt, column, &mut buf, &context)?;

    if done == Completion::Truncated {
        let needed = buf.used();
        if needed <= buf.capacity() {
            return Err(Error::Data(Diagnostic::driver(
                context,
                format!("engine reported truncation at {needed} bytes without a larger length"),
            )));
        }
        trace!(column, needed, "growing output buffer");
        buf = BufferDescriptor::output(desc.tag, needed);
        done = get_data(engine, stmt, column, &mut buf, &context)?;
        if done == Completion::Truncated {
            return Err(Error::Data(Diagnostic::driver(
                context,
                format!("value still truncated after growing buffer to {needed} bytes"),
            )));
        }
    }

    marshal::from_native(&buf).map_err(|e| Error::data(context, e))
}

fn get_data(
    engine: &dyn Engine,
    stmt: RawHandle,
    column: u16,
    buf: &mut BufferDescriptor,
    context: &str,
) -> Result<Completion> {
    let tag = buf.tag();
    let (out, used, indicator) = buf.out_parts();
    let rc = engine.get_data(stmt, column, tag, out, used, indicator);
    status::check(engine, stmt, rc, context)
}
