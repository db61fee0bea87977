//! The version node record.

use serde::{Deserialize, Serialize};

use fls_types::{ArtifactId, ContentHash, Metadata, NodeId, NodeStatus, ProjectId, Stage, Timestamp};

/// One stage run in a project's version graph.
///
/// Nodes are created once and never deleted. While a node is unsettled its
/// status and artifact reference may change; once it is `Completed` or
/// `Cached` the artifact reference is frozen and regeneration means a new
/// node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionNode {
    pub id: NodeId,
    pub project_id: ProjectId,
    /// `None` only for the project's first node.
    pub parent_id: Option<NodeId>,
    /// Branch the node was created on.
    pub branch_name: String,
    /// Display label, see [`version_label`].
    pub version: String,
    #[serde(default)]
    pub commit_message: String,
    pub stage: Stage,
    /// Explicit ordinal of `stage`, kept on the record.
    pub stage_index: u8,
    pub artifact_reference: Option<ArtifactId>,
    #[serde(default)]
    pub status: NodeStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub metadata: Metadata,
    /// Hash of the upstream inputs the stage ran on, for cache lookups.
    #[serde(default)]
    pub input_hash: Option<ContentHash>,
}

impl VersionNode {
    /// Returns `true` if the node has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns `true` once the artifact reference is frozen.
    pub fn is_settled(&self) -> bool {
        self.status.is_settled()
    }

    /// Returns `true` if the stored ordinal agrees with the stage.
    pub fn stage_index_matches(&self) -> bool {
        self.stage_index == self.stage.index()
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }

    /// One-line description for logs and listings.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} {} [{}] {} on {}",
            self.id.short_id(),
            self.version,
            self.status,
            self.stage,
            self.branch_name,
        );
        if !self.commit_message.is_empty() {
            line.push_str(": ");
            line.push_str(&self.commit_message);
        }
        line
    }
}

/// Version label of a node with `depth` ancestors: `1.<depth>.0`.
pub fn version_label(depth: usize) -> String {
    format!("1.{depth}.0")
}
