#![allow(non_snake_case)]
use libloading::{Library, Symbol};
use std::os::raw::c_char;
use crate::sys::*;

/// Entry points of the client engine, resolved from a loaded library.
pub struct Api {
    pub ads_env_alloc: unsafe extern "C" fn(*mut ADSHANDLE) -> ads_status,
    pub ads_env_free: unsafe extern "C" fn(ADSHANDLE) -> ads_status,
    pub ads_conn_alloc: unsafe extern "C" fn(ADSHANDLE, *mut ADSHANDLE) -> ads_status,
    pub ads_conn_free: unsafe extern "C" fn(ADSHANDLE) -> ads_status,
    pub ads_connect: unsafe extern "C" fn(ADSHANDLE, *const ads_connect_params) -> ads_status,
    pub ads_disconnect: unsafe extern "C" fn(ADSHANDLE) -> ads_status,
    pub ads_set_autocommit: unsafe extern "C" fn(ADSHANDLE, u16) -> ads_status,
    pub ads_commit: unsafe extern "C" fn(ADSHANDLE) -> ads_status,
    pub ads_rollback: unsafe extern "C" fn(ADSHANDLE) -> ads_status,
    pub ads_stmt_alloc: unsafe extern "C" fn(ADSHANDLE, *mut ADSHANDLE) -> ads_status,
    pub ads_stmt_free: unsafe extern "C" fn(ADSHANDLE) -> ads_status,
    pub ads_prepare: unsafe extern "C" fn(ADSHANDLE, *const c_char) -> ads_status,
    pub ads_num_params: unsafe extern "C" fn(ADSHANDLE, *mut u16) -> ads_status,
    pub ads_bind_param: unsafe extern "C" fn(
        ADSHANDLE,
        u16,
        u16,
        *const u8,
        usize,
        i32,
    ) -> ads_status,
    pub ads_execute: unsafe extern "C" fn(ADSHANDLE, *mut i32) -> ads_status,
    pub ads_row_count: unsafe extern "C" fn(ADSHANDLE, *mut i64) -> ads_status,
    pub ads_num_cols: unsafe extern "C" fn(ADSHANDLE, *mut u16) -> ads_status,
    pub ads_describe_col: unsafe extern "C" fn(
        ADSHANDLE,
        u16,
        *mut u8,
        usize,
        *mut usize,
        *mut ads_column_info,
    ) -> ads_status,
    pub ads_fetch: unsafe extern "C" fn(ADSHANDLE) -> ads_status,
    pub ads_get_data: unsafe extern "C" fn(
        ADSHANDLE,
        u16,
        u16,
        *mut u8,
        usize,
        *mut usize,
        *mut i32,
    ) -> ads_status,
    pub ads_close_cursor: unsafe extern "C" fn(ADSHANDLE) -> ads_status,
    pub ads_error_text: unsafe extern "C" fn(
        ADSHANDLE,
        i32,
        *mut u8,
        *mut u8,
        usize,
        *mut usize,
    ) -> ads_status,
}

macro_rules! symbol {
    ($lib:expr, $name:ident) => {
        get($lib, concat!(stringify!($name), "\0").as_bytes())?
    };
}

impl Api {
    /// Resolve every entry point from `lib`.
    ///
    /// # Safety
    ///
    /// The symbols must have the signatures declared on [`Api`]. The returned function pointers
    /// are only valid while `lib` stays loaded.
    pub unsafe fn load(lib: &Library) -> Result<Self, libloading::Error> {
        unsafe fn get<T: Copy>(
            lib: &Library,
            name: &'static [u8],
        ) -> Result<T, libloading::Error> {
            let sym: Symbol<T> = lib.get::<T>(name)?;
            Ok(*sym)
        }
        Ok(Self {
            ads_env_alloc: symbol!(lib, ads_env_alloc),
            ads_env_free: symbol!(lib, ads_env_free),
            ads_conn_alloc: symbol!(lib, ads_conn_alloc),
            ads_conn_free: symbol!(lib, ads_conn_free),
            ads_connect: symbol!(lib, ads_connect),
            ads_disconnect: symbol!(lib, ads_disconnect),
            ads_set_autocommit: symbol!(lib, ads_set_autocommit),
            ads_commit: symbol!(lib, ads_commit),
            ads_rollback: symbol!(lib, ads_rollback),
            ads_stmt_alloc: symbol!(lib, ads_stmt_alloc),
            ads_stmt_free: symbol!(lib, ads_stmt_free),
            ads_prepare: symbol!(lib, ads_prepare),
            ads_num_params: symbol!(lib, ads_num_params),
            ads_bind_param: symbol!(lib, ads_bind_param),
            ads_execute: symbol!(lib, ads_execute),
            ads_row_count: symbol!(lib, ads_row_count),
            ads_num_cols: symbol!(lib, ads_num_cols),
            ads_describe_col: symbol!(lib, ads_describe_col),
            ads_fetch: symbol!(lib, ads_fetch),
            ads_get_data: symbol!(lib, ads_get_data),
            ads_close_cursor: symbol!(lib, ads_close_cursor),
            ads_error_text: symbol!(lib, ads_error_text),
        })
    }
}
