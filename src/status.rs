//! Translation of native status codes into driver errors.
//!
//! Every native call made by the driver goes through [`check`]. No other module compares status
//! codes.

use std::fmt;

use tracing::debug;

use crate::{
    engine::{Engine, RawHandle, Status, SQLSTATE_LEN},
    error::{Diagnostic, Error, ErrorKind, Result},
};

/// Non-failure outcome of a native call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Completion {
    Success,
    SuccessWithInfo,
    NoData,
    Truncated,
}

/// Error numbers with a fixed meaning, used when the engine reports no SQLSTATE or message.
const KNOWN_CODES: &[(i32, ErrorKind, &str)] = &[
    (5010, ErrorKind::Operational, "Unable to load ACE DLL"),
    (5018, ErrorKind::Interface, "Invalid connection handle"),
    (5019, ErrorKind::Operational, "File does not exist or path not found"),
    (5025, ErrorKind::Operational, "Invalid path"),
    (5026, ErrorKind::Programming, "Invalid table name"),
    (5035, ErrorKind::Operational, "Insufficient rights or permissions"),
    (5037, ErrorKind::Operational, "Access denied"),
    (5081, ErrorKind::Interface, "Invalid server type specified"),
    (5143, ErrorKind::Programming, "Invalid SQL statement"),
    (5177, ErrorKind::Operational, "Connection failed - unable to connect to server"),
    (5179, ErrorKind::Operational, "Cannot open table"),
    (7200, ErrorKind::Programming, "SQL parse error"),
];

fn known(code: i32) -> Option<(ErrorKind, &'static str)> {
    KNOWN_CODES
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|&(_, kind, text)| (kind, text))
}

fn kind_for_sqlstate(state: &str) -> Option<ErrorKind> {
    let class = state.get(..2)?;
    match class {
        "23" => Some(ErrorKind::Integrity),
        "22" => Some(ErrorKind::Data),
        "42" | "07" | "24" | "37" | "3D" | "3F" => Some(ErrorKind::Programming),
        "08" | "40" | "HY" | "HZ" | "S1" => Some(ErrorKind::Operational),
        "IM" => Some(ErrorKind::Interface),
        _ => None,
    }
}

/// Pick the taxonomy class for a native failure: SQLSTATE class first, then the error number.
pub(crate) fn classify(code: i32, sqlstate: Option<&str>) -> ErrorKind {
    sqlstate
        .and_then(kind_for_sqlstate)
        .or_else(|| known(code).map(|(kind, _)| kind))
        .unwrap_or(if code == Status::INVALID_HANDLE.code() {
            ErrorKind::Interface
        } else {
            ErrorKind::Operational
        })
}

fn read_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\0', ' '])
        .to_string()
}

/// Ask the engine for the diagnostic of a failed call.
fn lookup(engine: &dyn Engine, handle: RawHandle, code: i32) -> (Option<String>, Option<String>) {
    let mut sqlstate = [0u8; SQLSTATE_LEN];
    let mut message = vec![0u8; 512];
    let mut len = 0usize;

    let mut rc = engine.error_text(handle, code, &mut sqlstate, &mut message, &mut len);
    if rc == Status::DATA_TRUNCATED || (rc == Status::SUCCESS && len > message.len()) {
        message = vec![0u8; len];
        rc = engine.error_text(handle, code, &mut sqlstate, &mut message, &mut len);
    }
    if rc != Status::SUCCESS && rc != Status::SUCCESS_WITH_INFO {
        return (None, None);
    }

    let state = read_text(&sqlstate);
    let text = read_text(&message[..len.min(message.len())]);
    (
        (!state.is_empty()).then_some(state),
        (!text.is_empty()).then_some(text),
    )
}

/// Diagnostic for a failed call, falling back to the known-code table.
pub(crate) fn diagnose(
    engine: &dyn Engine,
    handle: RawHandle,
    status: Status,
    context: impl fmt::Display,
) -> (ErrorKind, Diagnostic) {
    let code = status.code();
    let (sqlstate, message) = lookup(engine, handle, code);
    let kind = classify(code, sqlstate.as_deref());
    let message = message
        .or_else(|| known(code).map(|(_, text)| text.to_string()))
        .unwrap_or_else(|| format!("unknown error: {code}"));
    (
        kind,
        Diagnostic {
            context: context.to_string(),
            code: Some(code),
            sqlstate,
            message,
        },
    )
}

/// The choke point for native status codes.
///
/// Success-like codes come back as a [`Completion`]; anything else becomes an [`Error`] carrying
/// the engine's code, SQLSTATE and message plus `context`.
pub(crate) fn check(
    engine: &dyn Engine,
    handle: RawHandle,
    status: Status,
    context: impl fmt::Display,
) -> Result<Completion> {
    match status {
        Status::SUCCESS => Ok(Completion::Success),
        Status::NO_DATA => Ok(Completion::NoData),
        Status::DATA_TRUNCATED => Ok(Completion::Truncated),
        Status::SUCCESS_WITH_INFO => {
            let (_, diag) = diagnose(engine, handle, status, &context);
            debug!(context = %context, message = %diag.message, "native call succeeded with info");
            Ok(Completion::SuccessWithInfo)
        }
        _ => {
            let (kind, diag) = diagnose(engine, handle, status, context);
            Err(Error::new(kind, diag))
        }
    }
}
