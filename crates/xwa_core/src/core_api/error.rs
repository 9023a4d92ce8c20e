use std::fmt;

use thiserror::Error;

use crate::catalog::GroupId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    FileAccess,
    UnsupportedFile,
    PartialModification,
    Decode,
    Write,
    InvalidArgument,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// One independent write performed by [`Session::save`](super::Session::save).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    Resolution(usize),
    Option(GroupId),
}

impl fmt::Display for SaveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Resolution(index) => write!(f, "resolution slot {index}"),
            Self::Option(id) => write!(f, "option {}", id.as_str()),
        }
    }
}

/// A save that stopped partway. Writes counted in `succeeded` are already on disk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("save stopped at {failed_at} after {succeeded} successful write(s)")]
pub struct SaveFailure {
    pub succeeded: usize,
    pub failed_at: SaveTarget,
    #[source]
    pub error: CoreError,
}
