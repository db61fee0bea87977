use fls_canon::CanonError;
use fls_types::ArtifactId;

/// Errors from artifact repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// No artifact is stored under this id.
    #[error("artifact not found: {0}")]
    NotFound(ArtifactId),

    /// The artifact type cannot be embedded in an artifact id.
    #[error("invalid artifact type {0:?}: expected non-empty [A-Za-z0-9-]")]
    InvalidArtifactType(String),

    /// The data has no canonical form.
    #[error("canonicalization failed: {0}")]
    Canon(#[from] CanonError),

    /// Writing the bundle failed; nothing new is referenced.
    #[error("failed to write artifact {id}: {reason}")]
    StorageWrite { id: ArtifactId, reason: String },

    /// The bundle exists but cannot be read back intact.
    #[error("failed to read artifact {id}: {reason}")]
    StorageRead { id: ArtifactId, reason: String },

    /// I/O error not tied to a single artifact (e.g. listing).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepoError {
    pub(crate) fn write(id: &ArtifactId, reason: impl std::fmt::Display) -> Self {
        Self::StorageWrite {
            id: id.clone(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn read(id: &ArtifactId, reason: impl std::fmt::Display) -> Self {
        Self::StorageRead {
            id: id.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Result alias for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;
