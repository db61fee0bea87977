use fls_types::NodeId;

/// Errors that can occur during graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A referenced node is not in the graph.
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// A node's parent does not resolve.
    #[error("dangling parent reference: node {node} references missing parent {parent}")]
    DanglingParent { node: NodeId, parent: NodeId },

    /// Attempted to add a node whose id is already present.
    #[error("duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// Following parent links revisited a node.
    #[error("cycle detected at node {0}")]
    CycleDetected(NodeId),
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
