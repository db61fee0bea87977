//! The project record: the authoritative index of a project's version graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, ProjectId};
use crate::{Metadata, Timestamp};

/// One creative work and the index over its version nodes.
///
/// `node_ids` is append-only and creation-ordered; it is the membership list
/// that every other pointer (`root_node_id`, `current_node_id`, `branches`)
/// must resolve into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// The first node ever created. `None` until then.
    pub root_node_id: Option<NodeId>,
    /// HEAD: where new work attaches next. `None` until the first node.
    pub current_node_id: Option<NodeId>,
    #[serde(default)]
    pub node_ids: Vec<NodeId>,
    /// Branch name to head node.
    #[serde(default)]
    pub branches: BTreeMap<String, NodeId>,
    #[serde(default)]
    pub settings: Metadata,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    /// A new, empty project named after the first characters of its id.
    pub fn new(id: ProjectId) -> Self {
        let now = chrono::Utc::now();
        Self {
            name: format!("Project {}", id.short_id()),
            id,
            description: String::new(),
            root_node_id: None,
            current_node_id: None,
            node_ids: Vec::new(),
            branches: BTreeMap::new(),
            settings: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if no node has been created yet.
    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    /// Returns `true` if `id` is a member of this project.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.node_ids.contains(id)
    }

    /// Creation-order position of a node.
    pub fn position(&self, id: &NodeId) -> Option<usize> {
        self.node_ids.iter().position(|n| n == id)
    }

    /// Head node of a branch.
    pub fn branch(&self, name: &str) -> Option<NodeId> {
        self.branches.get(name).copied()
    }

    /// Record a newly created node: append it, make it root if it is the
    /// first, and move HEAD and the branch pointer onto it.
    pub fn record_node(&mut self, id: NodeId, branch_name: &str) {
        self.node_ids.push(id);
        if self.root_node_id.is_none() {
            self.root_node_id = Some(id);
        }
        self.current_node_id = Some(id);
        self.branches.insert(branch_name.to_string(), id);
        self.touch();
    }

    /// Record a node that starts a new branch: append it and point the
    /// branch at it. Root and HEAD are left alone.
    pub fn record_branch_node(&mut self, id: NodeId, branch_name: &str) {
        self.node_ids.push(id);
        self.branches.insert(branch_name.to_string(), id);
        self.touch();
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }
}
