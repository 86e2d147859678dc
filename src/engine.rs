//! The calling surface of the native client engine.
//!
//! [`Engine`] mirrors the C ABI one call per method: every method returns a [`Status`] and
//! fills its out-parameters, exactly like the native functions. Nothing here interprets a status;
//! that happens once, in [`status::check`](crate::status::check).
//!
//! [`Runtime`](crate::runtime::Runtime) implements it over the dynamically loaded library. Tests
//! implement it in memory.

use std::ffi::CStr;

use crate::{sys, types::TypeTag};

/// Opaque handle value issued by the engine.
pub type RawHandle = sys::ADSHANDLE;

/// Status code returned by a native call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const SUCCESS: Status = Status(sys::ADS_SUCCESS);
    pub const SUCCESS_WITH_INFO: Status = Status(sys::ADS_SUCCESS_WITH_INFO);
    pub const DATA_TRUNCATED: Status = Status(sys::ADS_DATA_TRUNCATED);
    pub const NO_DATA: Status = Status(sys::ADS_NO_DATA);
    pub const INVALID_HANDLE: Status = Status(sys::ADS_INVALID_HANDLE);

    /// Failure status carrying a native error number.
    pub const fn error(code: i32) -> Status {
        Status(code)
    }

    pub fn code(self) -> i32 {
        self.0
    }
}

pub const SQLSTATE_LEN: usize = sys::ADS_SQLSTATE_LEN;

/// Server type bits.
pub const LOCAL_SERVER: u16 = sys::ADS_LOCAL_SERVER;
pub const REMOTE_SERVER: u16 = sys::ADS_REMOTE_SERVER;
pub const AIS_SERVER: u16 = sys::ADS_AIS_SERVER;

/// Connection parameters in the form the engine consumes them.
#[derive(Debug, Clone, Copy)]
pub struct ConnectRequest<'a> {
    pub server: &'a CStr,
    pub user: Option<&'a CStr>,
    pub password: Option<&'a CStr>,
    pub server_types: u16,
    pub table_type: u16,
    pub comm_type: u16,
    pub options: u32,
}

/// Column metadata reported by the engine. `tag` is raw: the engine may report tags the driver
/// does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnInfo {
    pub tag: u16,
    pub size: u32,
    pub scale: i16,
    pub nullable: bool,
}

/// Native engine calling surface.
///
/// Calls on one handle (and on the children of one connection) must not overlap; the driver
/// serializes them per connection. Calls on unrelated connections may run in parallel.
pub trait Engine: Send + Sync {
    fn env_alloc(&self, out: &mut RawHandle) -> Status;
    fn env_free(&self, env: RawHandle) -> Status;

    fn conn_alloc(&self, env: RawHandle, out: &mut RawHandle) -> Status;
    fn conn_free(&self, conn: RawHandle) -> Status;
    fn connect(&self, conn: RawHandle, request: &ConnectRequest<'_>) -> Status;
    fn disconnect(&self, conn: RawHandle) -> Status;

    fn set_autocommit(&self, conn: RawHandle, enabled: bool) -> Status;
    fn commit(&self, conn: RawHandle) -> Status;
    fn rollback(&self, conn: RawHandle) -> Status;

    fn stmt_alloc(&self, conn: RawHandle, out: &mut RawHandle) -> Status;
    fn stmt_free(&self, stmt: RawHandle) -> Status;
    fn prepare(&self, stmt: RawHandle, sql: &CStr) -> Status;
    fn param_count(&self, stmt: RawHandle, out: &mut u16) -> Status;

    /// Bind `data` to the 1-based parameter `position`.
    ///
    /// # Safety
    ///
    /// The engine may keep a pointer to `data` and read it during the next
    /// [`execute`](Engine::execute) on `stmt`. The caller must keep `data` alive and unmoved
    /// until that call returns.
    unsafe fn bind_param(
        &self,
        stmt: RawHandle,
        position: u16,
        tag: TypeTag,
        data: &[u8],
        indicator: i32,
    ) -> Status;

    fn execute(&self, stmt: RawHandle, has_result: &mut bool) -> Status;
    fn row_count(&self, stmt: RawHandle, out: &mut i64) -> Status;

    fn column_count(&self, stmt: RawHandle, out: &mut u16) -> Status;
    /// Describe the 1-based `column`. `name_len` receives the full name length even when `name`
    /// is too short to hold it.
    fn describe_column(
        &self,
        stmt: RawHandle,
        column: u16,
        name: &mut [u8],
        name_len: &mut usize,
        info: &mut ColumnInfo,
    ) -> Status;

    /// Advance to the next row. [`Status::NO_DATA`] when the result set is exhausted.
    fn fetch(&self, stmt: RawHandle) -> Status;
    /// Read the 1-based `column` of the current row into `out`.
    ///
    /// Returns [`Status::DATA_TRUNCATED`] with the full length in `used` when `out` is too
    /// short. A NULL field sets `indicator` to the null indicator and `used` to 0.
    fn get_data(
        &self,
        stmt: RawHandle,
        column: u16,
        tag: TypeTag,
        out: &mut [u8],
        used: &mut usize,
        indicator: &mut i32,
    ) -> Status;
    fn close_result(&self, stmt: RawHandle) -> Status;

    /// Look up the diagnostic for a failed call on `handle`.
    ///
    /// `len` receives the full message length, which may exceed `message.len()`.
    fn error_text(
        &self,
        handle: RawHandle,
        code: i32,
        sqlstate: &mut [u8; SQLSTATE_LEN],
        message: &mut [u8],
        len: &mut usize,
    ) -> Status;
}
