use std::path::PathBuf;

/// Errors from canonicalization.
#[derive(Debug, thiserror::Error)]
pub enum CanonError {
    /// The value cannot be lowered to the canonical data model
    /// (for example a map keyed by a struct).
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A path component is not valid UTF-8 and has no canonical string form.
    #[error("path is not valid UTF-8: {0:?}")]
    NonUtf8Path(PathBuf),
}

/// Result alias for canonicalization.
pub type CanonResult<T> = Result<T, CanonError>;
