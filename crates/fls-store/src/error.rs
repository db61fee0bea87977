use std::path::PathBuf;

use fls_graph::GraphError;
use fls_repo::RepoError;
use fls_types::{NodeId, NodeStatus, Stage, TypeError};

/// Errors from the artifact store facade and its persistence backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A node, branch, or project does not resolve.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// The parent given to `create_node` is not acceptable.
    #[error("invalid parent: {0}")]
    InvalidParent(String),

    /// The branch name is already taken.
    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),

    /// The branch name cannot be used.
    #[error("invalid branch name {name:?}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// `stage_index` does not match the stage.
    #[error("stage index {index} does not match stage {stage} (expected {})", stage.index())]
    InvalidStageIndex { stage: Stage, index: u8 },

    /// An artifact was saved for a different stage than its node's.
    #[error("node {node} runs stage {expected}, artifact is for stage {actual}")]
    StageMismatch {
        node: NodeId,
        expected: Stage,
        actual: Stage,
    },

    /// The node is settled and can no longer change.
    #[error("node {0} is settled")]
    NodeSettled(NodeId),

    /// The requested status cannot be set directly.
    #[error("cannot move node {node} from {from} to {to}")]
    InvalidStatusTransition {
        node: NodeId,
        from: NodeStatus,
        to: NodeStatus,
    },

    /// The node offered as a cache source does not match.
    #[error("node {source_node} cannot serve as cache for {node}: {reason}")]
    CacheMismatch {
        node: NodeId,
        source_node: NodeId,
        reason: String,
    },

    /// Another writer holds the project lock.
    #[error("project is locked: {}", path.display())]
    Locked { path: PathBuf },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// A record could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A record could not be written.
    #[error("failed to write {record}: {reason}")]
    StorageWrite { record: String, reason: String },

    /// A record exists but cannot be read or decoded.
    #[error("failed to read {record}: {reason}")]
    StorageRead { record: String, reason: String },

    /// Artifact repository error.
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Version graph error.
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Error categories exposed to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidParent,
    BranchAlreadyExists,
    CycleDetected,
    Serialization,
    StorageWrite,
    StorageRead,
    /// Bad caller input: names, stage indexes, ids.
    InvalidInput,
    /// The request conflicts with node state.
    Conflict,
    Locked,
    Config,
}

impl StoreError {
    pub(crate) fn not_found(what: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }

    pub(crate) fn write(record: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::StorageWrite {
            record: record.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn read(record: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::StorageRead {
            record: record.into(),
            reason: reason.to_string(),
        }
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidParent(_) => ErrorKind::InvalidParent,
            Self::BranchAlreadyExists(_) => ErrorKind::BranchAlreadyExists,
            Self::InvalidBranchName { .. }
            | Self::InvalidStageIndex { .. }
            | Self::StageMismatch { .. }
            | Self::Type(_) => ErrorKind::InvalidInput,
            Self::NodeSettled(_)
            | Self::InvalidStatusTransition { .. }
            | Self::CacheMismatch { .. } => ErrorKind::Conflict,
            Self::Locked { .. } => ErrorKind::Locked,
            Self::Config(_) => ErrorKind::Config,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::StorageWrite { .. } => ErrorKind::StorageWrite,
            Self::StorageRead { .. } => ErrorKind::StorageRead,
            Self::Repo(e) => match e {
                RepoError::NotFound(_) => ErrorKind::NotFound,
                RepoError::Canon(_) => ErrorKind::Serialization,
                RepoError::InvalidArtifactType(_) | RepoError::StorageWrite { .. } => {
                    ErrorKind::StorageWrite
                }
                RepoError::StorageRead { .. } | RepoError::Io(_) => ErrorKind::StorageRead,
            },
            Self::Graph(e) => match e {
                GraphError::CycleDetected(_) => ErrorKind::CycleDetected,
                GraphError::NotFound(_) | GraphError::DanglingParent { .. } => ErrorKind::NotFound,
                GraphError::DuplicateNode(_) => ErrorKind::StorageRead,
            },
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
