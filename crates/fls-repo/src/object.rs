use serde::{Deserialize, Serialize};
use serde_json::Value;

use fls_types::{ArtifactId, ContentHash, NodeId, Stage, Timestamp};

use crate::error::{RepoError, RepoResult};

/// Everything a caller supplies to store one artifact.
#[derive(Clone, Debug, PartialEq)]
pub struct ArtifactDraft {
    /// The node that produced the artifact.
    pub node_id: NodeId,
    pub stage: Stage,
    /// Free-form type tag (`script`, `image`, `timeline`, ...).
    pub artifact_type: String,
    /// The artifact's logical content.
    pub data: Value,
    pub summary: String,
    /// Optional side-car blob (thumbnail, waveform, ...).
    pub preview: Option<Vec<u8>>,
    /// Ids of artifacts this one was derived from.
    pub dependencies: Vec<ArtifactId>,
}

impl ArtifactDraft {
    /// A draft with no summary, preview, or dependencies.
    pub fn new(node_id: NodeId, stage: Stage, artifact_type: impl Into<String>, data: Value) -> Self {
        Self {
            node_id,
            stage,
            artifact_type: artifact_type.into(),
            data,
            summary: String::new(),
            preview: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_preview(mut self, preview: Vec<u8>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<ArtifactId>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// Descriptor of one stored artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// The derived artifact id (also the bundle key).
    pub id: ArtifactId,
    /// The node this metadata was produced for.
    pub node_id: NodeId,
    pub stage: Stage,
    pub artifact_type: String,
    /// Where the canonical data blob lives.
    pub storage_location: String,
    /// Size of the canonical data blob.
    pub size_bytes: u64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub preview_location: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<ArtifactId>,
    /// Full hash of the canonical data.
    pub content_hash: ContentHash,
    pub created_at: Timestamp,
}

impl ArtifactMetadata {
    /// The metadata returned to a caller whose content was already stored:
    /// the bundle's identity and locations, the caller's own descriptive
    /// fields.
    pub fn reuse_for(&self, draft: &ArtifactDraft) -> Self {
        Self {
            node_id: draft.node_id,
            summary: draft.summary.clone(),
            dependencies: draft.dependencies.clone(),
            ..self.clone()
        }
    }
}

/// A draft lowered to its canonical bytes and derived id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedArtifact {
    pub id: ArtifactId,
    pub hash: ContentHash,
    /// Canonical bytes of the data; this is exactly what gets stored.
    pub bytes: Vec<u8>,
}

impl PreparedArtifact {
    /// Canonicalize the draft's data and derive its artifact id.
    pub fn prepare(draft: &ArtifactDraft) -> RepoResult<Self> {
        validate_artifact_type(&draft.artifact_type)?;
        let bytes = fls_canon::canonicalize_value(&draft.data)?;
        let hash = fls_canon::hash_bytes(&bytes);
        let id = ArtifactId::derive(draft.stage, &draft.artifact_type, &hash);
        Ok(Self { id, hash, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Fresh metadata for the first writer of this bundle.
    pub fn metadata(
        &self,
        draft: &ArtifactDraft,
        storage_location: String,
        preview_location: Option<String>,
    ) -> ArtifactMetadata {
        ArtifactMetadata {
            id: self.id.clone(),
            node_id: draft.node_id,
            stage: draft.stage,
            artifact_type: draft.artifact_type.clone(),
            storage_location,
            size_bytes: self.size(),
            summary: draft.summary.clone(),
            preview_location,
            dependencies: draft.dependencies.clone(),
            content_hash: self.hash,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Artifact types become part of the artifact id, so they are limited to
/// ASCII alphanumerics and `-` (`_` is the id separator).
pub fn validate_artifact_type(artifact_type: &str) -> RepoResult<()> {
    let ok = !artifact_type.is_empty()
        && artifact_type
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(RepoError::InvalidArtifactType(artifact_type.to_string()))
    }
}

/// Decode stored canonical bytes, checking them against the recorded hash.
pub(crate) fn decode_verified(
    id: &ArtifactId,
    bytes: &[u8],
    expected: &ContentHash,
) -> RepoResult<Value> {
    let computed = fls_canon::hash_bytes(bytes);
    if computed != *expected {
        return Err(RepoError::read(
            id,
            format!("hash mismatch: expected {expected}, computed {computed}"),
        ));
    }
    serde_json::from_slice(bytes).map_err(|e| RepoError::read(id, e))
}
