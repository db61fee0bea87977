//! Caller-facing request types for the facade.

use serde::Serialize;
use serde_json::Value;

use fls_types::{ArtifactId, ContentHash, Metadata, NodeId, Stage};

use crate::error::{StoreError, StoreResult};

/// Hash a stage's inputs the way artifact content is hashed, so equal
/// inputs give equal cache keys regardless of key order.
pub fn input_hash_of<T: Serialize + ?Sized>(inputs: &T) -> StoreResult<ContentHash> {
    fls_canon::hash(inputs).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Parameters of [`crate::ArtifactStore::create_node`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewNode {
    pub stage: Stage,
    /// Must equal `stage.index()`.
    pub stage_index: u8,
    /// `None` only for a project's first node.
    pub parent_id: Option<NodeId>,
    /// Empty means the configured default branch.
    pub branch_name: String,
    pub commit_message: String,
    pub input_hash: Option<ContentHash>,
    pub metadata: Metadata,
}

impl NewNode {
    /// A root node request for `stage` on the default branch.
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            stage_index: stage.index(),
            parent_id: None,
            branch_name: String::new(),
            commit_message: String::new(),
            input_hash: None,
            metadata: Metadata::new(),
        }
    }

    pub fn child_of(mut self, parent: NodeId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch_name = branch.into();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    pub fn input_hash(mut self, hash: ContentHash) -> Self {
        self.input_hash = Some(hash);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Parameters of [`crate::ArtifactStore::save_artifact`].
#[derive(Clone, Debug, PartialEq)]
pub struct SaveArtifact {
    pub stage: Stage,
    pub artifact_type: String,
    pub data: Value,
    pub summary: String,
    pub preview: Option<Vec<u8>>,
    pub dependencies: Vec<ArtifactId>,
}

impl SaveArtifact {
    pub fn new(stage: Stage, artifact_type: impl Into<String>, data: Value) -> Self {
        Self {
            stage,
            artifact_type: artifact_type.into(),
            data,
            summary: String::new(),
            preview: None,
            dependencies: Vec::new(),
        }
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn preview(mut self, preview: Vec<u8>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn depends_on(mut self, dependencies: Vec<ArtifactId>) -> Self {
        self.dependencies = dependencies;
        self
    }
}
