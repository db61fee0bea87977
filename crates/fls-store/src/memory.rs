//! In-memory project store for tests and embedding.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use fls_graph::VersionNode;
use fls_repo::{ArtifactRepository, InMemoryArtifactRepository};
use fls_types::{NodeId, Project, ProjectId};

use crate::error::StoreResult;
use crate::lock::ProjectLock;
use crate::operation::BranchOperation;
use crate::traits::ProjectStore;

/// An in-memory implementation of [`ProjectStore`].
///
/// All records live in `HashMap`s behind `RwLock`s and are lost when the
/// store is dropped. Locks are not enforced: the facade's in-process mutex
/// already serializes writers that share this store.
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
    nodes: RwLock<HashMap<(ProjectId, NodeId), VersionNode>>,
    operations: RwLock<HashMap<ProjectId, Vec<BranchOperation>>>,
    artifacts: RwLock<HashMap<ProjectId, Arc<InMemoryArtifactRepository>>>,
}

impl InMemoryProjectStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of node records across all projects.
    pub fn node_count(&self) -> usize {
        self.nodes.read().expect("lock poisoned").len()
    }
}

impl ProjectStore for InMemoryProjectStore {
    fn load_project(&self, id: &ProjectId) -> StoreResult<Option<Project>> {
        Ok(self.projects.read().expect("lock poisoned").get(id).cloned())
    }

    fn save_project(&self, project: &Project) -> StoreResult<()> {
        self.projects
            .write()
            .expect("lock poisoned")
            .insert(project.id.clone(), project.clone());
        Ok(())
    }

    fn load_node(&self, project: &ProjectId, id: &NodeId) -> StoreResult<Option<VersionNode>> {
        let nodes = self.nodes.read().expect("lock poisoned");
        Ok(nodes.get(&(project.clone(), *id)).cloned())
    }

    fn save_node(&self, node: &VersionNode) -> StoreResult<()> {
        self.nodes
            .write()
            .expect("lock poisoned")
            .insert((node.project_id.clone(), node.id), node.clone());
        Ok(())
    }

    fn append_operation(&self, project: &ProjectId, op: &BranchOperation) -> StoreResult<()> {
        self.operations
            .write()
            .expect("lock poisoned")
            .entry(project.clone())
            .or_default()
            .push(op.clone());
        Ok(())
    }

    fn operations(&self, project: &ProjectId) -> StoreResult<Vec<BranchOperation>> {
        let ops = self.operations.read().expect("lock poisoned");
        Ok(ops.get(project).cloned().unwrap_or_default())
    }

    fn artifacts(&self, project: &ProjectId) -> Arc<dyn ArtifactRepository> {
        let mut repos = self.artifacts.write().expect("lock poisoned");
        let repo = repos
            .entry(project.clone())
            .or_insert_with(|| Arc::new(InMemoryArtifactRepository::new()));
        Arc::clone(repo) as Arc<dyn ArtifactRepository>
    }

    fn lock(&self, _project: &ProjectId) -> StoreResult<ProjectLock> {
        Ok(ProjectLock::unlocked())
    }

    fn list_projects(&self) -> StoreResult<Vec<ProjectId>> {
        let mut ids: Vec<ProjectId> = self
            .projects
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }
}
