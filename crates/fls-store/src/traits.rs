use std::sync::Arc;

use fls_graph::VersionNode;
use fls_repo::ArtifactRepository;
use fls_types::{NodeId, Project, ProjectId};

use crate::error::StoreResult;
use crate::lock::ProjectLock;
use crate::operation::BranchOperation;

/// Persistence for project records, node records, and branch operation logs.
///
/// Implementations must be thread-safe (`Send + Sync`) and must replace
/// records atomically: a reader sees either the previous or the new version
/// of a record, never a mix. Loading a record that was never written returns
/// `Ok(None)`; a record that exists but cannot be decoded is `StorageRead`.
pub trait ProjectStore: Send + Sync {
    /// Load a project record.
    fn load_project(&self, id: &ProjectId) -> StoreResult<Option<Project>>;

    /// Create or replace a project record.
    fn save_project(&self, project: &Project) -> StoreResult<()>;

    /// Load a node record of a project.
    fn load_node(&self, project: &ProjectId, id: &NodeId) -> StoreResult<Option<VersionNode>>;

    /// Create or replace a node record.
    fn save_node(&self, node: &VersionNode) -> StoreResult<()>;

    /// Append an entry to a project's branch operation log.
    fn append_operation(&self, project: &ProjectId, op: &BranchOperation) -> StoreResult<()>;

    /// The branch operation log, oldest first.
    fn operations(&self, project: &ProjectId) -> StoreResult<Vec<BranchOperation>>;

    /// The artifact repository of a project.
    fn artifacts(&self, project: &ProjectId) -> Arc<dyn ArtifactRepository>;

    /// Acquire the project's writer lock.
    fn lock(&self, project: &ProjectId) -> StoreResult<ProjectLock>;

    /// All stored project ids, sorted.
    fn list_projects(&self) -> StoreResult<Vec<ProjectId>>;
}
