use thiserror::Error;

#[derive(Error, Debug)]
pub enum TomeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Write error: {message} ({applied} document(s) applied)")]
    Write { message: String, applied: u64 },

    #[error("Index error: {0}")]
    Index(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Coarse classification of a [`TomeError`], handy for callers that branch on failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Validation,
    Write,
    Index,
    Internal,
}

impl TomeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TomeError::Connection(_) => ErrorKind::Connection,
            TomeError::Validation(_) => ErrorKind::Validation,
            TomeError::Write { .. } => ErrorKind::Write,
            TomeError::Index(_) => ErrorKind::Index,
            TomeError::Serialization(_) | TomeError::Protocol(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn write(message: impl Into<String>, applied: u64) -> Self {
        TomeError::Write {
            message: message.into(),
            applied,
        }
    }
}

pub type Result<T> = std::result::Result<T, TomeError>;
