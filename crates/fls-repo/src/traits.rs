use fls_types::ArtifactId;
use serde_json::Value;

use crate::error::RepoResult;
use crate::object::{ArtifactDraft, ArtifactMetadata};

/// Content-addressed artifact storage.
///
/// All implementations must satisfy these invariants:
/// - `put` is idempotent by content: logically equal data for the same stage
///   and artifact type always yields the same id and `storage_location`, and
///   an existing data blob is never rewritten.
/// - A failed `put` leaves no bundle that `get` could return.
/// - `get` distinguishes a missing bundle (`NotFound`) from a damaged one
///   (`StorageRead`).
/// - Concurrent reads are always safe.
pub trait ArtifactRepository: Send + Sync {
    /// Store an artifact and return its metadata.
    fn put(&self, draft: &ArtifactDraft) -> RepoResult<ArtifactMetadata>;

    /// Load an artifact's data and its stored metadata record.
    fn get(&self, id: &ArtifactId) -> RepoResult<(Value, ArtifactMetadata)>;

    /// Check whether an artifact bundle exists.
    fn exists(&self, id: &ArtifactId) -> RepoResult<bool>;

    /// Load the preview blob of an artifact, if it has one.
    fn read_preview(&self, id: &ArtifactId) -> RepoResult<Option<Vec<u8>>>;

    /// All stored artifact ids, sorted.
    fn list(&self) -> RepoResult<Vec<ArtifactId>>;
}
