//! Client engine loader and process-wide runtime.
//!
//! This module is responsible for:
//! - Locating the Advantage client engine (ACE) shared library for the current platform.
//! - Dynamically loading the library and resolving ABI symbols into an [`Api`] handle.
//! - Holding one process-wide [`Runtime`] between [`initialize`] and [`shutdown`].
//! - Implementing [`Engine`] over the resolved entry points.
//!
//! ## Environment variables
//!
//! - `ADS_ACE_PATH` *(optional)*: path of the client library to load instead of searching the
//!   platform default names.
//!
//! ## Initialization semantics
//!
//! Initialization is explicit and idempotent: [`initialize`] loads the library on first call and
//! returns the same [`Runtime`] afterwards. [`shutdown`] drops the process-wide reference only;
//! connections hold their own `Arc<Runtime>`, so the library stays mapped until the last of them
//! is closed. A failed load is not cached and may be retried.

use std::{
    env,
    ffi::CStr,
    path::{Path, PathBuf},
    ptr,
    sync::Arc,
};

use libloading::Library;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    api::Api,
    engine::{ColumnInfo, ConnectRequest, Engine, RawHandle, Status, SQLSTATE_LEN},
    error::{Error, Result},
    sys,
    types::TypeTag,
};

/// Environment variable overriding the client library path.
pub const LIBRARY_PATH_ENV: &str = "ADS_ACE_PATH";

/// Process-wide runtime slot.
static RUNTIME: Mutex<Option<Arc<Runtime>>> = parking_lot::const_mutex(None);

/// Loaded client engine and resolved ABI API.
///
/// A [`Runtime`] owns the loaded dynamic library. The [`Api`] is resolved from that library and
/// is valid as long as the runtime is alive.
pub struct Runtime {
    /// Keep the library alive as long as any connection uses it.
    _lib: Library,
    /// ABI entrypoints resolved from the loaded library.
    api: Api,
    /// Filesystem path (or bare library name) the library was loaded from.
    path: PathBuf,
}

/// Load the client library (once per process) and return the shared runtime.
///
/// # Errors
///
/// Returns an operational error if no candidate library can be loaded or a required symbol is
/// missing.
pub fn initialize() -> Result<Arc<Runtime>> {
    let mut slot = RUNTIME.lock();
    if let Some(rt) = slot.as_ref() {
        return Ok(Arc::clone(rt));
    }
    let rt = Arc::new(Runtime::init()?);
    *slot = Some(Arc::clone(&rt));
    Ok(rt)
}

/// Like [`initialize`], but loads the library at `path`.
///
/// # Errors
///
/// Fails with an interface error if a library from a different path is already loaded.
pub fn initialize_from(path: impl AsRef<Path>) -> Result<Arc<Runtime>> {
    let path = path.as_ref();
    let mut slot = RUNTIME.lock();
    if let Some(rt) = slot.as_ref() {
        if rt.path == path {
            return Ok(Arc::clone(rt));
        }
        return Err(Error::interface(
            "initialize runtime",
            format!(
                "client library already loaded from '{}', cannot load '{}'",
                rt.path.display(),
                path.display()
            ),
        ));
    }
    let rt = Arc::new(unsafe { Runtime::load_from_path(path.to_path_buf())? });
    *slot = Some(Arc::clone(&rt));
    Ok(rt)
}

/// Drop the process-wide runtime reference.
///
/// Returns `false` if no runtime was initialized. Connections that are still open keep the
/// library loaded.
pub fn shutdown() -> bool {
    let released = RUNTIME.lock().take();
    match released {
        Some(rt) => {
            info!(
                path = %rt.path.display(),
                other_refs = Arc::strong_count(&rt) - 1,
                "shutting down client engine runtime"
            );
            true
        }
        None => false,
    }
}

pub fn is_initialized() -> bool {
    RUNTIME.lock().is_some()
}

/// Platform default library names, tried in order.
fn default_library_names() -> &'static [&'static str] {
    #[cfg(all(target_os = "windows", target_pointer_width = "64"))]
    {
        &["ace64.dll"]
    }
    #[cfg(all(target_os = "windows", not(target_pointer_width = "64")))]
    {
        &["ace32.dll"]
    }
    #[cfg(target_os = "macos")]
    {
        &["libace64.dylib"]
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        &["libace64.so", "libace.so"]
    }
}

impl Runtime {
    /// Selection order:
    /// 1. `ADS_ACE_PATH` if set.
    /// 2. The platform default names, resolved by the system loader search path.
    fn init() -> Result<Self> {
        if let Ok(p) = env::var(LIBRARY_PATH_ENV) {
            return unsafe { Self::load_from_path(PathBuf::from(p)) };
        }

        let mut last_err = None;
        for name in default_library_names() {
            match unsafe { Self::load_from_path(PathBuf::from(name)) } {
                Ok(rt) => return Ok(rt),
                Err(e) => {
                    debug!(library = *name, error = %e, "client library candidate not loadable");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            Error::operational("load client library", "no candidate library for this platform")
        }))
    }

    /// Load the client library from `path` and resolve its ABI into an [`Api`].
    ///
    /// # Safety
    ///
    /// Loading runs the library's initialization routines. `path` must name an Advantage client
    /// engine exporting the entry points declared on [`Api`] with matching signatures; anything
    /// else leads to undefined behavior when a resolved symbol is called.
    unsafe fn load_from_path(path: PathBuf) -> Result<Self> {
        let lib = Library::new(&path).map_err(|e| {
            Error::operational(
                "load client library",
                format!("failed to load '{}': {e}", path.display()),
            )
        })?;

        let api = Api::load(&lib).map_err(|e| {
            Error::operational(
                "load client library",
                format!("failed to resolve ABI symbols from '{}': {e}", path.display()),
            )
        })?;

        info!(path = %path.display(), "loaded client engine");
        Ok(Self {
            _lib: lib,
            api,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn opt_ptr(s: Option<&CStr>) -> *const std::os::raw::c_char {
    s.map_or(ptr::null(), CStr::as_ptr)
}

// SAFETY (all methods): every pointer passed below comes from a live Rust reference or slice
// whose length is passed alongside it, and none outlives the call except the bound parameter
// buffer, whose lifetime is the caller's obligation under `Engine::bind_param`.
impl Engine for Runtime {
    fn env_alloc(&self, out: &mut RawHandle) -> Status {
        Status(unsafe { (self.api.ads_env_alloc)(out) })
    }

    fn env_free(&self, env: RawHandle) -> Status {
        Status(unsafe { (self.api.ads_env_free)(env) })
    }

    fn conn_alloc(&self, env: RawHandle, out: &mut RawHandle) -> Status {
        Status(unsafe { (self.api.ads_conn_alloc)(env, out) })
    }

    fn conn_free(&self, conn: RawHandle) -> Status {
        Status(unsafe { (self.api.ads_conn_free)(conn) })
    }

    fn connect(&self, conn: RawHandle, request: &ConnectRequest<'_>) -> Status {
        let params = sys::ads_connect_params {
            server: request.server.as_ptr(),
            user: opt_ptr(request.user),
            password: opt_ptr(request.password),
            server_types: request.server_types,
            table_type: request.table_type,
            comm_type: request.comm_type,
            options: request.options,
        };
        Status(unsafe { (self.api.ads_connect)(conn, &params) })
    }

    fn disconnect(&self, conn: RawHandle) -> Status {
        Status(unsafe { (self.api.ads_disconnect)(conn) })
    }

    fn set_autocommit(&self, conn: RawHandle, enabled: bool) -> Status {
        Status(unsafe { (self.api.ads_set_autocommit)(conn, u16::from(enabled)) })
    }

    fn commit(&self, conn: RawHandle) -> Status {
        Status(unsafe { (self.api.ads_commit)(conn) })
    }

    fn rollback(&self, conn: RawHandle) -> Status {
        Status(unsafe { (self.api.ads_rollback)(conn) })
    }

    fn stmt_alloc(&self, conn: RawHandle, out: &mut RawHandle) -> Status {
        Status(unsafe { (self.api.ads_stmt_alloc)(conn, out) })
    }

    fn stmt_free(&self, stmt: RawHandle) -> Status {
        Status(unsafe { (self.api.ads_stmt_free)(stmt) })
    }

    fn prepare(&self, stmt: RawHandle, sql: &CStr) -> Status {
        Status(unsafe { (self.api.ads_prepare)(stmt, sql.as_ptr()) })
    }

    fn param_count(&self, stmt: RawHandle, out: &mut u16) -> Status {
        Status(unsafe { (self.api.ads_num_params)(stmt, out) })
    }

    unsafe fn bind_param(
        &self,
        stmt: RawHandle,
        position: u16,
        tag: TypeTag,
        data: &[u8],
        indicator: i32,
    ) -> Status {
        Status((self.api.ads_bind_param)(
            stmt,
            position,
            tag.raw(),
            data.as_ptr(),
            data.len(),
            indicator,
        ))
    }

    fn execute(&self, stmt: RawHandle, has_result: &mut bool) -> Status {
        let mut flag: i32 = 0;
        let rc = unsafe { (self.api.ads_execute)(stmt, &mut flag) };
        *has_result = flag != 0;
        Status(rc)
    }

    fn row_count(&self, stmt: RawHandle, out: &mut i64) -> Status {
        Status(unsafe { (self.api.ads_row_count)(stmt, out) })
    }

    fn column_count(&self, stmt: RawHandle, out: &mut u16) -> Status {
        Status(unsafe { (self.api.ads_num_cols)(stmt, out) })
    }

    fn describe_column(
        &self,
        stmt: RawHandle,
        column: u16,
        name: &mut [u8],
        name_len: &mut usize,
        info: &mut ColumnInfo,
    ) -> Status {
        let mut raw = sys::ads_column_info::default();
        let rc = unsafe {
            (self.api.ads_describe_col)(
                stmt,
                column,
                name.as_mut_ptr(),
                name.len(),
                name_len,
                &mut raw,
            )
        };
        *info = ColumnInfo {
            tag: raw.tag,
            size: raw.size,
            scale: raw.scale,
            nullable: raw.nullable != 0,
        };
        Status(rc)
    }

    fn fetch(&self, stmt: RawHandle) -> Status {
        Status(unsafe { (self.api.ads_fetch)(stmt) })
    }

    fn get_data(
        &self,
        stmt: RawHandle,
        column: u16,
        tag: TypeTag,
        out: &mut [u8],
        used: &mut usize,
        indicator: &mut i32,
    ) -> Status {
        Status(unsafe {
            (self.api.ads_get_data)(
                stmt,
                column,
                tag.raw(),
                out.as_mut_ptr(),
                out.len(),
                used,
                indicator,
            )
        })
    }

    fn close_result(&self, stmt: RawHandle) -> Status {
        Status(unsafe { (self.api.ads_close_cursor)(stmt) })
    }

    fn error_text(
        &self,
        handle: RawHandle,
        code: i32,
        sqlstate: &mut [u8; SQLSTATE_LEN],
        message: &mut [u8],
        len: &mut usize,
    ) -> Status {
        Status(unsafe {
            (self.api.ads_error_text)(
                handle,
                code,
                sqlstate.as_mut_ptr(),
                message.as_mut_ptr(),
                message.len(),
                len,
            )
        })
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").field("path", &self.path).finish()
    }
}
