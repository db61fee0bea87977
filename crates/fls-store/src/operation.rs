//! Branch operation audit records.

use std::fmt;

use serde::{Deserialize, Serialize};

use fls_types::{NodeId, Timestamp};

/// Kind of branch operation.
///
/// Only `CreateBranch` and `SwitchBranch` are produced; delete and merge are
/// reserved so that logs written by later versions still decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    CreateBranch,
    SwitchBranch,
    DeleteBranch,
    MergeBranch,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationType::CreateBranch => "create_branch",
            OperationType::SwitchBranch => "switch_branch",
            OperationType::DeleteBranch => "delete_branch",
            OperationType::MergeBranch => "merge_branch",
        })
    }
}

/// One entry of a project's append-only branch operation log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchOperation {
    pub id: uuid::Uuid,
    pub operation_type: OperationType,
    /// Node the operation started from.
    pub source_node_id: NodeId,
    pub target_branch: String,
    #[serde(default)]
    pub message: String,
    pub created_at: Timestamp,
}

impl BranchOperation {
    pub fn new(
        operation_type: OperationType,
        source_node_id: NodeId,
        target_branch: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            operation_type,
            source_node_id,
            target_branch: target_branch.into(),
            message: message.into(),
            created_at: chrono::Utc::now(),
        }
    }
}
