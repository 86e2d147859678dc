//! Database driver for the Advantage client engine (ACE).
//!
//! The engine is a closed-source shared library loaded at runtime; this crate drives it through
//! its C ABI and exposes a DB-API style surface:
//!
//! ```no_run
//! use adsdb::{ConnectParams, Value};
//!
//! # fn main() -> adsdb::Result<()> {
//! let params: ConnectParams = "DataSource=/srv/data;ServerType=local".parse()?;
//! let conn = adsdb::connect(&params)?;
//! let mut cur = conn.cursor()?;
//! cur.execute("SELECT id, name FROM customers WHERE id > ?", &[Value::from(10)])?;
//! for row in cur.rows() {
//!     println!("{:?}", row?);
//! }
//! conn.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! Layers, bottom up: [`runtime`] loads the library and implements [`Engine`]; the handle
//! registry owns native handles; [`marshal`] converts [`Value`]s to and from native buffers;
//! the binder, result materializer and status translator sit on top of those; [`Connection`]
//! and [`Cursor`] orchestrate them.
#![allow(unsafe_code)]

mod api;
mod binder;
pub mod config;
mod connection;
mod cursor;
pub mod engine;
pub mod error;
pub mod marshal;
pub mod registry;
mod result;
pub mod runtime;
mod status;
mod sys;
pub mod types;

pub use config::{CommType, ConnectParams, LockMode, ServerType, TableType};
pub use connection::{Connection, TransactionMode};
pub use cursor::{Cursor, CursorState, Rows};
pub use engine::Engine;
pub use error::{Diagnostic, Error, ErrorKind, Result};
pub use result::ColumnDescriptor;
pub use types::{Decimal, Param, Row, TypeTag, Value};

/// DB-API level implemented.
pub const APILEVEL: &str = "2.0";
/// Connections may be shared between threads; calls on one connection are serialized.
pub const THREADSAFETY: u8 = 2;
/// Parameter markers are `?`.
pub const PARAMSTYLE: &str = "qmark";

/// Connect through the process-wide client engine, loading it on first use.
pub fn connect(params: &ConnectParams) -> Result<Connection> {
    params.validate()?;
    let runtime = runtime::initialize()?;
    Connection::open(runtime, params)
}
