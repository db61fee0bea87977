//! In-memory index over a project's version nodes.
//!
//! [`VersionGraph`] stores nodes in a [`HashMap`], keeps the creation order,
//! and maintains a forward-edge index (`children`) for descendant queries.
//! Parent links are the only edges; every query walks them with a visited
//! set so a corrupted graph fails with [`GraphError::CycleDetected`] instead
//! of looping.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use fls_types::{ContentHash, NodeId, Stage};

use crate::error::{GraphError, GraphResult};
use crate::node::VersionNode;

/// A project's version nodes with parent and child indexes.
#[derive(Clone, Debug, Default)]
pub struct VersionGraph {
    /// All nodes, keyed by id.
    nodes: HashMap<NodeId, VersionNode>,
    /// Forward-edge index: parent -> children in insertion order.
    children: HashMap<NodeId, Vec<NodeId>>,
    /// Insertion (creation) order.
    order: Vec<NodeId>,
}

impl VersionGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from loaded records, in the given order.
    ///
    /// Parent links are not checked here: a graph loaded from disk may be
    /// damaged, and [`crate::validate`] is the place to report that.
    pub fn from_nodes(nodes: impl IntoIterator<Item = VersionNode>) -> GraphResult<Self> {
        let mut graph = Self::new();
        for node in nodes {
            graph.insert(node)?;
        }
        Ok(graph)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Add a freshly created node. Its parent, if any, must already be
    /// present.
    pub fn add_node(&mut self, node: VersionNode) -> GraphResult<()> {
        if let Some(parent) = node.parent_id {
            if !self.nodes.contains_key(&parent) {
                return Err(GraphError::DanglingParent {
                    node: node.id,
                    parent,
                });
            }
        }
        self.insert(node)
    }

    /// Replace a node record in place (status or artifact updates).
    /// The parent link cannot change.
    pub fn update_node(&mut self, node: VersionNode) -> GraphResult<()> {
        let slot = self
            .nodes
            .get_mut(&node.id)
            .ok_or(GraphError::NotFound(node.id))?;
        if slot.parent_id != node.parent_id {
            return Err(GraphError::DanglingParent {
                node: node.id,
                parent: node.parent_id.unwrap_or(node.id),
            });
        }
        *slot = node;
        Ok(())
    }

    fn insert(&mut self, node: VersionNode) -> GraphResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        if let Some(parent) = node.parent_id {
            self.children.entry(parent).or_default().push(node.id);
        }
        debug!(node = %node.id.short_id(), stage = %node.stage, "added version node");
        self.order.push(node.id);
        self.nodes.insert(node.id, node);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// Retrieve a node by id.
    pub fn get(&self, id: &NodeId) -> Option<&VersionNode> {
        self.nodes.get(id)
    }

    /// Retrieve a node by id, failing with `NotFound`.
    pub fn node(&self, id: &NodeId) -> GraphResult<&VersionNode> {
        self.nodes.get(id).ok_or(GraphError::NotFound(*id))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &VersionNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    // ---------------------------------------------------------------
    // Ancestry
    // ---------------------------------------------------------------

    /// The path from the root to `id`, root first.
    pub fn history(&self, id: &NodeId) -> GraphResult<Vec<&VersionNode>> {
        let mut chain = self.lineage(id)?;
        chain.reverse();
        Ok(chain)
    }

    /// Number of ancestors of `id`.
    pub fn depth(&self, id: &NodeId) -> GraphResult<usize> {
        Ok(self.lineage(id)?.len() - 1)
    }

    /// `id` followed by its ancestors, nearest first.
    fn lineage(&self, id: &NodeId) -> GraphResult<Vec<&VersionNode>> {
        let mut current = self.node(id)?;
        let mut visited = HashSet::new();
        visited.insert(current.id);
        let mut chain = vec![current];

        while let Some(parent) = current.parent_id {
            if !visited.insert(parent) {
                return Err(GraphError::CycleDetected(parent));
            }
            current = self.nodes.get(&parent).ok_or(GraphError::DanglingParent {
                node: current.id,
                parent,
            })?;
            chain.push(current);
        }
        Ok(chain)
    }

    /// The most recent node shared by the histories of `a` and `b`.
    pub fn fork_point(&self, a: &NodeId, b: &NodeId) -> GraphResult<Option<&VersionNode>> {
        let ancestors_a: HashSet<NodeId> = self.lineage(a)?.iter().map(|n| n.id).collect();
        Ok(self
            .lineage(b)?
            .into_iter()
            .find(|n| ancestors_a.contains(&n.id)))
    }

    /// The nearest settled node at or above `id`: where to fork from when a
    /// stage run was interrupted.
    pub fn last_settled_ancestor(&self, id: &NodeId) -> GraphResult<Option<&VersionNode>> {
        Ok(self.lineage(id)?.into_iter().find(|n| n.is_settled()))
    }

    /// The most recent settled node in `head`'s history that ran `stage` on
    /// the same inputs.
    pub fn find_cached(
        &self,
        head: &NodeId,
        stage: Stage,
        input_hash: &ContentHash,
    ) -> GraphResult<Option<&VersionNode>> {
        Ok(self.lineage(head)?.into_iter().find(|n| {
            n.is_settled()
                && n.stage == stage
                && n.artifact_reference.is_some()
                && n.input_hash.as_ref() == Some(input_hash)
        }))
    }

    // ---------------------------------------------------------------
    // Descendants
    // ---------------------------------------------------------------

    /// Direct children of `id`, in creation order.
    pub fn children(&self, id: &NodeId) -> Vec<&VersionNode> {
        self.children
            .get(id)
            .map(|ids| ids.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    /// All descendants of `id` (BFS, nearest first). The node itself is not
    /// included.
    pub fn descendants(&self, id: &NodeId) -> Vec<&VersionNode> {
        let mut visited = HashSet::new();
        visited.insert(*id);
        let mut result = Vec::new();
        let mut queue: VecDeque<&NodeId> = VecDeque::new();
        if let Some(child_ids) = self.children.get(id) {
            queue.extend(child_ids);
        }

        while let Some(current) = queue.pop_front() {
            if !visited.insert(*current) {
                continue;
            }
            if let Some(node) = self.nodes.get(current) {
                result.push(node);
                if let Some(child_ids) = self.children.get(current) {
                    queue.extend(child_ids);
                }
            }
        }
        result
    }
}
