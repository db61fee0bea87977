use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid identifier {value:?}: {reason}")]
    InvalidId { value: String, reason: String },

    #[error("unknown stage: {0}")]
    UnknownStage(String),

    #[error("stage index out of range: {0}")]
    StageIndexOutOfRange(u8),

    #[error("unknown node status: {0}")]
    UnknownStatus(String),
}
