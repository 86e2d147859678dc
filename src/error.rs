use std::fmt;

use thiserror::Error;

use crate::marshal::MarshalError;

pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong, where, and what the engine said about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Driver operation that failed, e.g. `execute` or `bind parameter 3`.
    pub context: String,
    /// Native error number, when the failure came from the engine.
    pub code: Option<i32>,
    pub sqlstate: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn driver(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            code: None,
            sqlstate: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.context)?;
        match (self.code, &self.sqlstate) {
            (Some(code), Some(state)) => write!(f, ": [{code}/{state}]")?,
            (Some(code), None) => write!(f, ": [{code}]")?,
            (None, Some(state)) => write!(f, ": [{state}]")?,
            (None, None) => write!(f, ":")?,
        }
        write!(f, " {}", self.message)
    }
}

/// Error taxonomy of the driver.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Misuse of the driver itself.
    #[error("interface error in {0}")]
    Interface(Diagnostic),
    /// Engine failures outside program control: lost connections, missing files, exhausted
    /// resources.
    #[error("operational error in {0}")]
    Operational(Diagnostic),
    /// Malformed SQL, bad parameter binding, invalid cursor sequencing.
    #[error("programming error in {0}")]
    Programming(Diagnostic),
    #[error("integrity error in {0}")]
    Integrity(Diagnostic),
    /// Value out of range, conversion or truncation failures.
    #[error("data error in {0}")]
    Data(Diagnostic),
    /// Native handle allocation or release failures.
    #[error("resource error in {0}")]
    Resource(Diagnostic),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Interface,
    Operational,
    Programming,
    Integrity,
    Data,
    Resource,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, diagnostic: Diagnostic) -> Self {
        match kind {
            ErrorKind::Interface => Error::Interface(diagnostic),
            ErrorKind::Operational => Error::Operational(diagnostic),
            ErrorKind::Programming => Error::Programming(diagnostic),
            ErrorKind::Integrity => Error::Integrity(diagnostic),
            ErrorKind::Data => Error::Data(diagnostic),
            ErrorKind::Resource => Error::Resource(diagnostic),
        }
    }

    pub(crate) fn interface(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Interface(Diagnostic::driver(context, message))
    }

    pub(crate) fn operational(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Operational(Diagnostic::driver(context, message))
    }

    pub(crate) fn programming(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Programming(Diagnostic::driver(context, message))
    }

    pub(crate) fn resource(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Resource(Diagnostic::driver(context, message))
    }

    pub(crate) fn data(context: impl Into<String>, err: MarshalError) -> Self {
        Error::Data(Diagnostic::driver(context, err.to_string()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Interface(_) => ErrorKind::Interface,
            Error::Operational(_) => ErrorKind::Operational,
            Error::Programming(_) => ErrorKind::Programming,
            Error::Integrity(_) => ErrorKind::Integrity,
            Error::Data(_) => ErrorKind::Data,
            Error::Resource(_) => ErrorKind::Resource,
        }
    }

    pub fn diagnostic(&self) -> &Diagnostic {
        match self {
            Error::Interface(d)
            | Error::Operational(d)
            | Error::Programming(d)
            | Error::Integrity(d)
            | Error::Data(d)
            | Error::Resource(d) => d,
        }
    }

    pub fn code(&self) -> Option<i32> {
        self.diagnostic().code
    }

    pub fn sqlstate(&self) -> Option<&str> {
        self.diagnostic().sqlstate.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.diagnostic().message
    }

    pub fn context(&self) -> &str {
        &self.diagnostic().context
    }

    /// Same diagnostic, reclassified as a handle failure.
    pub(crate) fn into_resource(self) -> Self {
        match self {
            Error::Resource(d) => Error::Resource(d),
            other => Error::Resource(other.diagnostic().clone()),
        }
    }
}
