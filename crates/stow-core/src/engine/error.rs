//! Engine diagnostic types

use std::fmt;

use thiserror::Error;

/// Result type for engine calls
pub type EngineResult<T> = Result<T, EngineError>;

/// Classification of an engine failure, named after the host's DOMException names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    NotFoundError,
    ConstraintError,
    DataError,
    InvalidStateError,
    InvalidAccessError,
    ReadOnlyError,
    VersionError,
    AbortError,
    TransactionInactiveError,
    TypeError,
    UnknownError,
}

impl EngineErrorKind {
    /// Map a DOMException name onto a kind; unrecognized names become `UnknownError`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "NotFoundError" => Self::NotFoundError,
            "ConstraintError" => Self::ConstraintError,
            "DataError" => Self::DataError,
            "InvalidStateError" => Self::InvalidStateError,
            "InvalidAccessError" => Self::InvalidAccessError,
            "ReadOnlyError" => Self::ReadOnlyError,
            "VersionError" => Self::VersionError,
            "AbortError" => Self::AbortError,
            "TransactionInactiveError" => Self::TransactionInactiveError,
            "TypeError" => Self::TypeError,
            _ => Self::UnknownError,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFoundError => "NotFoundError",
            Self::ConstraintError => "ConstraintError",
            Self::DataError => "DataError",
            Self::InvalidStateError => "InvalidStateError",
            Self::InvalidAccessError => "InvalidAccessError",
            Self::ReadOnlyError => "ReadOnlyError",
            Self::VersionError => "VersionError",
            Self::AbortError => "AbortError",
            Self::TransactionInactiveError => "TransactionInactiveError",
            Self::TypeError => "TypeError",
            Self::UnknownError => "UnknownError",
        }
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failure reported by the storage engine.
///
/// Displays as `"<Kind>: <message>"`; this is the diagnostic text the
/// connection handle wraps into its own errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::NotFoundError, message)
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::ConstraintError, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::DataError, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::InvalidStateError, message)
    }

    pub fn abort(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::AbortError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::UnknownError, message)
    }
}
