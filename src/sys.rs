#![allow(non_camel_case_types)]
#![allow(dead_code)]
use std::os::raw::c_char;

/// Opaque handle issued by the client engine for an environment, a connection or a statement.
pub type ADSHANDLE = u64;

/// Status codes returned by every ABI function.
///
/// Values other than the ones below are failures, and the value is the engine's error number.
pub type ads_status = i32;

pub const ADS_SUCCESS: ads_status = 0;
pub const ADS_SUCCESS_WITH_INFO: ads_status = 1;
/// Output buffer was too small. `used` holds the full length of the value.
pub const ADS_DATA_TRUNCATED: ads_status = 2;
pub const ADS_NO_DATA: ads_status = 100;
pub const ADS_INVALID_HANDLE: ads_status = -2;

/// Indicator value for a NULL field or parameter.
pub const ADS_NULL_DATA: i32 = -1;

/// Native type tags.
///
/// Fixed-width tags use native byte order. `ADS_CHAR`/`ADS_VARCHAR` are UTF-8 and are not
/// NUL-terminated: the used length must be honored.
pub const ADS_TYPE_NULL: u16 = 0;
pub const ADS_TYPE_BOOL: u16 = 1;
pub const ADS_TYPE_INT8: u16 = 2;
pub const ADS_TYPE_INT16: u16 = 3;
pub const ADS_TYPE_INT32: u16 = 4;
pub const ADS_TYPE_INT64: u16 = 5;
pub const ADS_TYPE_UINT8: u16 = 6;
pub const ADS_TYPE_UINT16: u16 = 7;
pub const ADS_TYPE_UINT32: u16 = 8;
pub const ADS_TYPE_UINT64: u16 = 9;
pub const ADS_TYPE_FLOAT32: u16 = 10;
pub const ADS_TYPE_FLOAT64: u16 = 11;
/// 16-byte mantissa followed by a 1-byte scale.
pub const ADS_TYPE_DECIMAL: u16 = 12;
/// 8-byte integer scaled by 10^4.
pub const ADS_TYPE_MONEY: u16 = 13;
pub const ADS_TYPE_CHAR: u16 = 14;
pub const ADS_TYPE_VARCHAR: u16 = 15;
pub const ADS_TYPE_BINARY: u16 = 16;
/// Julian day number, 4 bytes.
pub const ADS_TYPE_DATE: u16 = 17;
/// Milliseconds since midnight, 4 bytes.
pub const ADS_TYPE_TIME: u16 = 18;
/// Julian day number followed by milliseconds since midnight, 8 bytes.
pub const ADS_TYPE_TIMESTAMP: u16 = 19;

/// Server type bits passed in [`ads_connect_params::server_types`].
pub const ADS_LOCAL_SERVER: u16 = 0x0001;
pub const ADS_REMOTE_SERVER: u16 = 0x0002;
pub const ADS_AIS_SERVER: u16 = 0x0004;

pub const ADS_TABLE_ADT: u16 = 3;
pub const ADS_TABLE_CDX: u16 = 2;
pub const ADS_TABLE_NTX: u16 = 1;
pub const ADS_TABLE_VFP: u16 = 4;

pub const ADS_COMM_DEFAULT: u16 = 0;
pub const ADS_COMM_UDP: u16 = 1;
pub const ADS_COMM_TCP_IP: u16 = 2;
pub const ADS_COMM_TLS: u16 = 3;

/// Option bits passed in [`ads_connect_params::options`].
pub const ADS_OPT_COMPATIBLE_LOCKING: u32 = 0x0000_0002;

/// Length of the SQLSTATE written by `ads_error_text` (not NUL-terminated).
pub const ADS_SQLSTATE_LEN: usize = 5;

/// Connection parameters for `ads_connect`.
///
/// `user` and `password` may be null. All strings are NUL-terminated and only need to live for
/// the duration of the call.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct ads_connect_params {
    pub server: *const c_char,
    pub user: *const c_char,
    pub password: *const c_char,
    pub server_types: u16,
    pub table_type: u16,
    pub comm_type: u16,
    pub options: u32,
}

/// Column metadata filled by `ads_describe_col`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct ads_column_info {
    pub tag: u16,
    pub nullable: u16,
    pub size: u32,
    pub scale: i16,
}
