use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Lifecycle status of a version node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Created, stage work not started.
    #[default]
    Pending,
    /// Stage work in progress.
    Generating,
    /// Artifact stored by this stage run.
    Completed,
    /// Stage work failed; error recorded in node metadata.
    Failed,
    /// Artifact reused from an earlier node with the same input hash.
    Cached,
}

impl NodeStatus {
    pub const ALL: [NodeStatus; 5] = [
        NodeStatus::Pending,
        NodeStatus::Generating,
        NodeStatus::Completed,
        NodeStatus::Failed,
        NodeStatus::Cached,
    ];

    /// `Completed` or `Cached`: the node's artifact reference is frozen.
    pub fn is_settled(self) -> bool {
        matches!(self, NodeStatus::Completed | NodeStatus::Cached)
    }

    pub const fn tag(self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Generating => "generating",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
            NodeStatus::Cached => "cached",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for NodeStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.tag().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypeError::UnknownStatus(s.to_string()))
    }
}
