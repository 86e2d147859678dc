//! Connection parameters.
//!
//! [`ConnectParams`] can be built in code, deserialized from a mapping with PascalCase keys
//! (`DataSource`, `ServerType`, `UserID`, ...) or parsed from a `Key=Value;...` connection
//! string.

use std::{ffi::CString, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    engine::{ConnectRequest, AIS_SERVER, LOCAL_SERVER, REMOTE_SERVER},
    error::{Error, Result},
    sys,
};

/// Set of server kinds the engine may connect through.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerType(u16);

impl ServerType {
    pub const LOCAL: ServerType = ServerType(LOCAL_SERVER);
    pub const REMOTE: ServerType = ServerType(REMOTE_SERVER);
    pub const AIS: ServerType = ServerType(AIS_SERVER);

    const NAMES: [(ServerType, &'static str); 3] = [
        (ServerType::LOCAL, "local"),
        (ServerType::REMOTE, "remote"),
        (ServerType::AIS, "ais"),
    ];

    const NAMED_BITS: u16 = LOCAL_SERVER | REMOTE_SERVER | AIS_SERVER;

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: ServerType) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for ServerType {
    fn default() -> Self {
        ServerType::LOCAL | ServerType::REMOTE
    }
}

impl std::ops::BitOr for ServerType {
    type Output = ServerType;

    fn bitor(self, rhs: ServerType) -> ServerType {
        ServerType(self.0 | rhs.0)
    }
}

/// Named kinds joined by `or`; a mask that is empty or has unnamed bits is written as a number.
impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 || self.0 & !ServerType::NAMED_BITS != 0 {
            return write!(f, "{}", self.0);
        }
        let mut first = true;
        for (kind, name) in ServerType::NAMES {
            if self.contains(kind) {
                if !first {
                    f.write_str(" or ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerType({self})")
    }
}

/// Parses `"local"`, `"remote or ais"`, `"LOCAL|REMOTE"`, or a raw bit mask.
impl FromStr for ServerType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(bits) = s.trim().parse::<u16>() {
            return Ok(ServerType(bits));
        }
        let mut bits = 0;
        for word in s.split(['|', ',']).flat_map(|part| part.split_whitespace()) {
            let word = word.to_ascii_lowercase();
            if word == "or" {
                continue;
            }
            let kind = ServerType::NAMES
                .iter()
                .find(|(_, name)| *name == word)
                .map(|(kind, _)| *kind)
                .ok_or_else(|| {
                    Error::interface("connection parameters", format!("unknown server type {word:?}"))
                })?;
            bits |= kind.0;
        }
        Ok(ServerType(bits))
    }
}

impl TryFrom<String> for ServerType {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ServerType> for String {
    fn from(t: ServerType) -> String {
        t.to_string()
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TableType {
    #[default]
    Adt,
    Cdx,
    Ntx,
    Vfp,
}

impl TableType {
    pub fn raw(self) -> u16 {
        match self {
            TableType::Adt => sys::ADS_TABLE_ADT,
            TableType::Cdx => sys::ADS_TABLE_CDX,
            TableType::Ntx => sys::ADS_TABLE_NTX,
            TableType::Vfp => sys::ADS_TABLE_VFP,
        }
    }
}

impl FromStr for TableType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADT" => Ok(TableType::Adt),
            "CDX" => Ok(TableType::Cdx),
            "NTX" => Ok(TableType::Ntx),
            "VFP" => Ok(TableType::Vfp),
            other => Err(Error::interface(
                "connection parameters",
                format!("unknown table type {other:?}"),
            )),
        }
    }
}

/// Record locking protocol.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    #[default]
    Proprietary,
    /// Locks compatible with non-Advantage applications sharing the tables.
    Compatible,
}

impl FromStr for LockMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proprietary" => Ok(LockMode::Proprietary),
            "compatible" => Ok(LockMode::Compatible),
            other => Err(Error::interface(
                "connection parameters",
                format!("unknown lock mode {other:?}"),
            )),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommType {
    #[serde(rename = "TCP/IP")]
    TcpIp,
    #[serde(rename = "UDP")]
    Udp,
    #[serde(rename = "TLS")]
    Tls,
}

impl CommType {
    pub fn raw(self) -> u16 {
        match self {
            CommType::TcpIp => sys::ADS_COMM_TCP_IP,
            CommType::Udp => sys::ADS_COMM_UDP,
            CommType::Tls => sys::ADS_COMM_TLS,
        }
    }
}

impl FromStr for CommType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TCP/IP" | "TCP_IP" | "TCPIP" | "TCP" => Ok(CommType::TcpIp),
            "UDP" | "UDP_IP" => Ok(CommType::Udp),
            "TLS" => Ok(CommType::Tls),
            other => Err(Error::interface(
                "connection parameters",
                format!("unknown communication type {other:?}"),
            )),
        }
    }
}

fn default_autocommit() -> bool {
    true
}

/// Parameters for opening a [`Connection`](crate::Connection).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ConnectParams {
    /// Data dictionary path, table directory, or `\\server\share\path` of a remote server.
    pub data_source: String,
    #[serde(default)]
    pub server_type: ServerType,
    #[serde(rename = "UserID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub table_type: TableType,
    #[serde(default)]
    pub lock_mode: LockMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comm_type: Option<CommType>,
    /// Strip trailing blanks from fixed-width character columns on fetch.
    #[serde(default)]
    pub trim_trailing_spaces: bool,
    /// Start the connection in autocommit mode, the engine's default.
    #[serde(default = "default_autocommit")]
    pub auto_commit: bool,
}

impl ConnectParams {
    pub fn new(data_source: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            server_type: ServerType::default(),
            user_id: None,
            password: None,
            table_type: TableType::default(),
            lock_mode: LockMode::default(),
            comm_type: None,
            trim_trailing_spaces: false,
            auto_commit: true,
        }
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user_id = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Check the parameters can be handed to the engine.
    pub fn validate(&self) -> Result<()> {
        if self.data_source.trim().is_empty() {
            return Err(Error::interface("connection parameters", "DataSource is required"));
        }
        if self.server_type.is_empty() {
            return Err(Error::interface(
                "connection parameters",
                "ServerType must name at least one server",
            ));
        }
        let fields = [
            ("DataSource", Some(&self.data_source)),
            ("UserID", self.user_id.as_ref()),
            ("Password", self.password.as_ref()),
        ];
        for (key, value) in fields {
            if value.is_some_and(|v| v.contains('\0')) {
                return Err(Error::interface(
                    "connection parameters",
                    format!("{key} contains a NUL byte"),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn to_native(&self) -> Result<NativeParams> {
        self.validate()?;
        let cstring = |key: &str, s: &str| {
            CString::new(s).map_err(|_| {
                Error::interface("connection parameters", format!("{key} contains a NUL byte"))
            })
        };
        Ok(NativeParams {
            server: cstring("DataSource", &self.data_source)?,
            user: self.user_id.as_deref().map(|u| cstring("UserID", u)).transpose()?,
            password: self.password.as_deref().map(|p| cstring("Password", p)).transpose()?,
            server_types: self.server_type.bits(),
            table_type: self.table_type.raw(),
            comm_type: self.comm_type.map_or(sys::ADS_COMM_DEFAULT, CommType::raw),
            options: match self.lock_mode {
                LockMode::Proprietary => 0,
                LockMode::Compatible => sys::ADS_OPT_COMPATIBLE_LOCKING,
            },
        })
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("data_source", &self.data_source)
            .field("server_type", &self.server_type)
            .field("user_id", &self.user_id)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("table_type", &self.table_type)
            .field("lock_mode", &self.lock_mode)
            .field("comm_type", &self.comm_type)
            .field("trim_trailing_spaces", &self.trim_trailing_spaces)
            .field("auto_commit", &self.auto_commit)
            .finish()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(Error::interface(
            "connection parameters",
            format!("{key} expects a boolean, got {other:?}"),
        )),
    }
}

/// Parses `DataSource=c:\data;ServerType=local or remote;UID=adssys;PWD=...`.
///
/// Keys are case-insensitive and may contain spaces (`Data Source`, `User ID`).
impl FromStr for ConnectParams {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut params = ConnectParams::new("");
        for pair in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::interface("connection string", format!("expected Key=Value, got {pair:?}"))
            })?;
            let value = value.trim();
            let normalized: String = key
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            match normalized.as_str() {
                "datasource" => params.data_source = value.to_string(),
                "servertype" => params.server_type = value.parse()?,
                "userid" | "uid" | "user" => params.user_id = Some(value.to_string()),
                "password" | "pwd" => params.password = Some(value.to_string()),
                "tabletype" => params.table_type = value.parse()?,
                "lockmode" => params.lock_mode = value.parse()?,
                "commtype" => params.comm_type = Some(value.parse()?),
                "trimtrailingspaces" => params.trim_trailing_spaces = parse_bool(key, value)?,
                "autocommit" => params.auto_commit = parse_bool(key, value)?,
                _ => {
                    return Err(Error::interface(
                        "connection string",
                        format!("unknown key {:?}", key.trim()),
                    ))
                }
            }
        }
        params.validate()?;
        Ok(params)
    }
}

/// Parameters converted to C strings, borrowed by a [`ConnectRequest`].
pub(crate) struct NativeParams {
    server: CString,
    user: Option<CString>,
    password: Option<CString>,
    server_types: u16,
    table_type: u16,
    comm_type: u16,
    options: u32,
}

impl NativeParams {
    pub(crate) fn request(&self) -> ConnectRequest<'_> {
        ConnectRequest {
            server: &self.server,
            user: self.user.as_deref(),
            password: self.password.as_deref(),
            server_types: self.server_types,
            table_type: self.table_type,
            comm_type: self.comm_type,
            options: self.options,
        }
    }
}
