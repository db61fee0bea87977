//! The [`ArtifactStore`] facade.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, info, warn};

use fls_graph::{version_label, ValidationReport, VersionGraph, VersionNode};
use fls_repo::{ArtifactDraft, ArtifactMetadata, ArtifactRepository};
use fls_types::{ArtifactId, ContentHash, NodeId, NodeStatus, Project, ProjectId, Stage};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::fs::FsProjectStore;
use crate::lock::ProjectLock;
use crate::memory::InMemoryProjectStore;
use crate::names::validate_branch_name;
use crate::operation::{BranchOperation, OperationType};
use crate::request::{NewNode, SaveArtifact};
use crate::traits::ProjectStore;

/// Metadata key holding a failed node's error message.
pub const ERROR_KEY: &str = "error";
/// Metadata key naming the node a cached node reused its artifact from.
pub const CACHED_FROM_KEY: &str = "cached_from";

/// Versioned artifact store for one project.
///
/// Reads go to the backend on every call, so a store sees writes made by
/// other processes. Writes in this process are serialized by a mutex and
/// re-read the project record under it; across processes, callers hold
/// [`ArtifactStore::lock`] around each write sequence.
///
/// Multi-record writes go artifact, then node, then project record, so a
/// crash leaves at worst an unreferenced record behind.
pub struct ArtifactStore {
    config: StoreConfig,
    project_id: ProjectId,
    backend: Arc<dyn ProjectStore>,
    artifacts: Arc<dyn ArtifactRepository>,
    writer: Mutex<()>,
}

impl ArtifactStore {
    /// Open (or create) a project under `config.root`.
    pub fn open(config: StoreConfig, project_id: ProjectId) -> StoreResult<Self> {
        let backend =
            FsProjectStore::new(config.projects_dir()).with_sync(config.sync_writes);
        Self::open_with(Arc::new(backend), config, project_id)
    }

    /// Open (or create) a project in a fresh in-memory backend.
    pub fn in_memory(project_id: ProjectId) -> StoreResult<Self> {
        Self::open_with(
            Arc::new(InMemoryProjectStore::new()),
            StoreConfig::default(),
            project_id,
        )
    }

    /// Open (or create) a project on an explicit backend.
    pub fn open_with(
        backend: Arc<dyn ProjectStore>,
        config: StoreConfig,
        project_id: ProjectId,
    ) -> StoreResult<Self> {
        validate_branch_name(&config.default_branch)?;
        if backend.load_project(&project_id)?.is_none() {
            let project = Project::new(project_id.clone());
            backend.save_project(&project)?;
            info!(project = %project_id, name = %project.name, "created project");
        }
        let artifacts = backend.artifacts(&project_id);
        Ok(Self {
            config,
            project_id,
            backend,
            artifacts,
            writer: Mutex::new(()),
        })
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Acquire the project's advisory writer lock.
    pub fn lock(&self) -> StoreResult<ProjectLock> {
        self.backend.lock(&self.project_id)
    }

    // ---------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------

    /// Record a new stage run.
    ///
    /// The first node of a project has no parent; every later node names an
    /// existing one. The node becomes HEAD and the head of its branch.
    pub fn create_node(&self, req: NewNode) -> StoreResult<VersionNode> {
        let _guard = self.write_guard();

        if req.stage_index != req.stage.index() {
            return Err(StoreError::InvalidStageIndex {
                stage: req.stage,
                index: req.stage_index,
            });
        }
        let branch_name = if req.branch_name.is_empty() {
            self.config.default_branch.clone()
        } else {
            req.branch_name
        };
        validate_branch_name(&branch_name)?;

        let mut project = self.load_project()?;
        let depth = match (req.parent_id, project.is_empty()) {
            (None, true) => 0,
            (None, false) => {
                return Err(StoreError::InvalidParent(
                    "only the first node of a project may omit its parent".into(),
                ))
            }
            (Some(parent), _) => self.parent_depth(&project, &parent)? + 1,
        };

        let now = chrono::Utc::now();
        let node = VersionNode {
            id: NodeId::new(),
            project_id: self.project_id.clone(),
            parent_id: req.parent_id,
            branch_name: branch_name.clone(),
            version: version_label(depth),
            commit_message: req.commit_message,
            stage: req.stage,
            stage_index: req.stage_index,
            artifact_reference: None,
            status: NodeStatus::Pending,
            created_at: now,
            updated_at: now,
            metadata: req.metadata,
            input_hash: req.input_hash,
        };

        self.backend.save_node(&node)?;
        project.record_node(node.id, &branch_name);
        self.backend.save_project(&project)?;

        info!(
            project = %self.project_id,
            node = %node.id,
            stage = %node.stage,
            branch = %branch_name,
            version = %node.version,
            "created node"
        );
        Ok(node)
    }

    /// Store a stage's output and settle the node as `Completed`.
    ///
    /// A settled node is never modified. If the repository write fails the
    /// node is left untouched.
    pub fn save_artifact(&self, node_id: &NodeId, req: SaveArtifact) -> StoreResult<ArtifactMetadata> {
        let _guard = self.write_guard();
        let project = self.load_project()?;
        let mut node = self.load_member(&project, node_id)?;

        if node.is_settled() {
            return Err(StoreError::NodeSettled(*node_id));
        }
        if req.stage != node.stage {
            return Err(StoreError::StageMismatch {
                node: *node_id,
                expected: node.stage,
                actual: req.stage,
            });
        }

        let draft = ArtifactDraft {
            node_id: *node_id,
            stage: req.stage,
            artifact_type: req.artifact_type,
            data: req.data,
            summary: req.summary,
            preview: req.preview,
            dependencies: req.dependencies,
        };
        let meta = self.artifacts.put(&draft)?;

        node.artifact_reference = Some(meta.id.clone());
        node.status = NodeStatus::Completed;
        node.touch();
        self.backend.save_node(&node)?;

        info!(
            project = %self.project_id,
            node = %node_id,
            artifact = %meta.id,
            size = meta.size_bytes,
            "saved artifact"
        );
        Ok(meta)
    }

    /// Load a node of this project.
    pub fn get_node(&self, id: &NodeId) -> StoreResult<VersionNode> {
        let project = self.load_project()?;
        self.load_member(&project, id)
    }

    /// Nodes of a branch (its head's history, root first), or every node in
    /// creation order when `branch` is `None`.
    pub fn list_nodes(&self, branch: Option<&str>) -> StoreResult<Vec<VersionNode>> {
        let project = self.load_project()?;
        match branch {
            Some(name) => {
                let head = Self::branch_head_id(&project, name)?;
                self.history_in(&project, &head)
            }
            None => Ok(self.full_graph(&project)?.nodes().cloned().collect()),
        }
    }

    /// Path from the root to `id`, root first.
    pub fn history(&self, id: &NodeId) -> StoreResult<Vec<VersionNode>> {
        let project = self.load_project()?;
        self.history_in(&project, id)
    }

    /// The current HEAD node, `None` for an empty project.
    pub fn head(&self) -> StoreResult<Option<VersionNode>> {
        let project = self.load_project()?;
        project
            .current_node_id
            .map(|id| self.load_member(&project, &id))
            .transpose()
    }

    /// Direct children of a node, in creation order.
    pub fn children(&self, id: &NodeId) -> StoreResult<Vec<VersionNode>> {
        let project = self.load_project()?;
        self.ensure_member(&project, id)?;
        let graph = self.full_graph(&project)?;
        Ok(graph.children(id).into_iter().cloned().collect())
    }

    /// The most recent node shared by the histories of `a` and `b`.
    pub fn fork_point(&self, a: &NodeId, b: &NodeId) -> StoreResult<Option<VersionNode>> {
        let project = self.load_project()?;
        let graph = self.lineage_graph(&project, &[*a, *b])?;
        Ok(graph.fork_point(a, b)?.cloned())
    }

    /// The nearest settled node at or above `id`.
    pub fn last_settled_ancestor(&self, id: &NodeId) -> StoreResult<Option<VersionNode>> {
        let project = self.load_project()?;
        let graph = self.lineage_graph(&project, &[*id])?;
        Ok(graph.last_settled_ancestor(id)?.cloned())
    }

    // ---------------------------------------------------------------
    // Status
    // ---------------------------------------------------------------

    /// Move an unsettled node to `Pending`, `Generating` or `Failed`.
    ///
    /// `error` is stored under `metadata["error"]`; leaving `Failed` clears
    /// it. `Completed` goes through [`Self::save_artifact`] and `Cached`
    /// through [`Self::mark_cached`].
    pub fn mark_status(
        &self,
        id: &NodeId,
        status: NodeStatus,
        error: Option<String>,
    ) -> StoreResult<VersionNode> {
        let _guard = self.write_guard();
        let project = self.load_project()?;
        let mut node = self.load_member(&project, id)?;

        if node.is_settled() {
            return Err(StoreError::NodeSettled(*id));
        }
        if status.is_settled() {
            return Err(StoreError::InvalidStatusTransition {
                node: *id,
                from: node.status,
                to: status,
            });
        }

        node.status = status;
        match (status, error) {
            (NodeStatus::Failed, Some(message)) => {
                node.metadata.insert(ERROR_KEY.into(), Value::String(message));
            }
            (NodeStatus::Failed, None) => {}
            _ => {
                node.metadata.remove(ERROR_KEY);
            }
        }
        node.touch();
        self.backend.save_node(&node)?;

        debug!(project = %self.project_id, node = %id, status = %status, "updated node status");
        Ok(node)
    }

    /// Settle `id` as `Cached` by reusing the artifact of `source_id`.
    ///
    /// The source must be settled, run the same stage, and carry the same
    /// input hash as `id`.
    pub fn mark_cached(&self, id: &NodeId, source_id: &NodeId) -> StoreResult<VersionNode> {
        let _guard = self.write_guard();
        let project = self.load_project()?;
        let mut node = self.load_member(&project, id)?;
        if node.is_settled() {
            return Err(StoreError::NodeSettled(*id));
        }
        let source = self.load_member(&project, source_id)?;

        let mismatch = |reason: &str| StoreError::CacheMismatch {
            node: *id,
            source_node: *source_id,
            reason: reason.to_string(),
        };
        if !source.is_settled() {
            return Err(mismatch("source is not settled"));
        }
        if source.stage != node.stage {
            return Err(mismatch("stages differ"));
        }
        match (&node.input_hash, &source.input_hash) {
            (Some(a), Some(b)) if a == b => {}
            (None, _) | (_, None) => return Err(mismatch("input hash missing")),
            _ => return Err(mismatch("input hashes differ")),
        }
        let Some(artifact) = source.artifact_reference.clone() else {
            return Err(mismatch("source has no artifact"));
        };

        node.artifact_reference = Some(artifact);
        node.status = NodeStatus::Cached;
        node.metadata
            .insert(CACHED_FROM_KEY.into(), Value::String(source_id.to_string()));
        node.touch();
        self.backend.save_node(&node)?;

        info!(project = %self.project_id, node = %id, source = %source_id, "reused cached artifact");
        Ok(node)
    }

    /// The most recent settled node on `branch` that ran `stage` on inputs
    /// hashing to `input_hash`.
    pub fn find_cached(
        &self,
        branch: &str,
        stage: Stage,
        input_hash: &ContentHash,
    ) -> StoreResult<Option<VersionNode>> {
        let project = self.load_project()?;
        let head = Self::branch_head_id(&project, branch)?;
        let graph = self.lineage_graph(&project, &[head])?;
        Ok(graph.find_cached(&head, stage, input_hash)?.cloned())
    }

    // ---------------------------------------------------------------
    // Branches
    // ---------------------------------------------------------------

    /// Fork a new branch from `from`.
    ///
    /// The new node is a child of `from` carrying its stage, artifact,
    /// status, input hash and metadata. It becomes the branch head; HEAD
    /// stays where it was until [`Self::switch_branch`].
    ///
    /// The operation record is logged before the project record commits the
    /// branch, so a failed call leaves at worst an unreferenced node and a
    /// log entry naming a branch that does not exist.
    pub fn create_branch(
        &self,
        from: &NodeId,
        branch_name: &str,
        commit_message: &str,
    ) -> StoreResult<VersionNode> {
        let _guard = self.write_guard();
        validate_branch_name(branch_name)?;
        let mut project = self.load_project()?;
        if project.branches.contains_key(branch_name) {
            return Err(StoreError::BranchAlreadyExists(branch_name.to_string()));
        }
        let source = self.load_member(&project, from)?;
        let depth = self.lineage_graph(&project, &[*from])?.depth(from)? + 1;

        let now = chrono::Utc::now();
        let node = VersionNode {
            id: NodeId::new(),
            project_id: self.project_id.clone(),
            parent_id: Some(*from),
            branch_name: branch_name.to_string(),
            version: version_label(depth),
            commit_message: commit_message.to_string(),
            stage: source.stage,
            stage_index: source.stage_index,
            artifact_reference: source.artifact_reference.clone(),
            status: source.status,
            created_at: now,
            updated_at: now,
            metadata: source.metadata.clone(),
            input_hash: source.input_hash,
        };

        self.backend.save_node(&node)?;
        self.backend.append_operation(
            &self.project_id,
            &BranchOperation::new(OperationType::CreateBranch, *from, branch_name, commit_message),
        )?;
        project.record_branch_node(node.id, branch_name);
        self.backend.save_project(&project)?;

        info!(
            project = %self.project_id,
            branch = %branch_name,
            from = %from,
            node = %node.id,
            "created branch"
        );
        Ok(node)
    }

    /// Move HEAD to the head of `branch_name`.
    pub fn switch_branch(&self, branch_name: &str) -> StoreResult<VersionNode> {
        let _guard = self.write_guard();
        let mut project = self.load_project()?;
        let head = Self::branch_head_id(&project, branch_name)?;
        let node = self.load_member(&project, &head)?;

        self.backend.append_operation(
            &self.project_id,
            &BranchOperation::new(OperationType::SwitchBranch, head, branch_name, ""),
        )?;
        project.current_node_id = Some(head);
        project.touch();
        self.backend.save_project(&project)?;

        debug!(project = %self.project_id, branch = %branch_name, head = %head, "switched branch");
        Ok(node)
    }

    /// The head node of a branch.
    pub fn get_branch_head(&self, branch_name: &str) -> StoreResult<VersionNode> {
        let project = self.load_project()?;
        let head = Self::branch_head_id(&project, branch_name)?;
        self.load_member(&project, &head)
    }

    /// Branch name to head node id.
    pub fn list_branches(&self) -> StoreResult<BTreeMap<String, NodeId>> {
        Ok(self.load_project()?.branches)
    }

    /// The branch operation log, oldest first.
    pub fn branch_operations(&self) -> StoreResult<Vec<BranchOperation>> {
        self.backend.operations(&self.project_id)
    }

    // ---------------------------------------------------------------
    // Artifacts
    // ---------------------------------------------------------------

    /// Load an artifact's data and metadata.
    pub fn get_artifact(&self, id: &ArtifactId) -> StoreResult<(Value, ArtifactMetadata)> {
        Ok(self.artifacts.get(id)?)
    }

    /// Load an artifact's preview blob, if it has one.
    pub fn read_preview(&self, id: &ArtifactId) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.artifacts.read_preview(id)?)
    }

    /// All stored artifact ids of this project, sorted.
    pub fn list_artifacts(&self) -> StoreResult<Vec<ArtifactId>> {
        Ok(self.artifacts.list()?)
    }

    // ---------------------------------------------------------------
    // Project
    // ---------------------------------------------------------------

    /// Snapshot of the project record.
    pub fn project(&self) -> StoreResult<Project> {
        self.load_project()
    }

    /// Update the project's name and/or description.
    pub fn set_project_metadata(
        &self,
        name: Option<&str>,
        description: Option<&str>,
    ) -> StoreResult<Project> {
        self.update_project(|project| {
            if let Some(name) = name {
                project.name = name.to_string();
            }
            if let Some(description) = description {
                project.description = description.to_string();
            }
        })
    }

    /// Set one project setting.
    pub fn set_setting(&self, key: &str, value: Value) -> StoreResult<Project> {
        self.update_project(|project| {
            project.settings.insert(key.to_string(), value);
        })
    }

    /// Check the project record against its node records.
    pub fn validate(&self) -> StoreResult<ValidationReport> {
        let project = self.load_project()?;
        let graph = self.full_graph(&project)?;
        let report = fls_graph::validate(&project, &graph);
        if !report.is_valid() {
            warn!(
                project = %self.project_id,
                errors = report.errors().count(),
                "project failed validation"
            );
        }
        Ok(report)
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().expect("lock poisoned")
    }

    fn update_project(&self, apply: impl FnOnce(&mut Project)) -> StoreResult<Project> {
        let _guard = self.write_guard();
        let mut project = self.load_project()?;
        apply(&mut project);
        project.touch();
        self.backend.save_project(&project)?;
        Ok(project)
    }

    fn load_project(&self) -> StoreResult<Project> {
        self.backend
            .load_project(&self.project_id)?
            .ok_or_else(|| StoreError::not_found("project", &self.project_id))
    }

    fn branch_head_id(project: &Project, name: &str) -> StoreResult<NodeId> {
        project
            .branch(name)
            .ok_or_else(|| StoreError::not_found("branch", name))
    }

    fn ensure_member(&self, project: &Project, id: &NodeId) -> StoreResult<()> {
        if project.contains(id) {
            Ok(())
        } else {
            Err(StoreError::not_found("node", id))
        }
    }

    /// Load a node that the project indexes.
    fn load_member(&self, project: &Project, id: &NodeId) -> StoreResult<VersionNode> {
        self.ensure_member(project, id)?;
        self.backend
            .load_node(&self.project_id, id)?
            .ok_or_else(|| StoreError::read(format!("node {id}"), "indexed node has no record"))
    }

    fn parent_depth(&self, project: &Project, parent: &NodeId) -> StoreResult<usize> {
        if !project.contains(parent) {
            return Err(StoreError::InvalidParent(format!(
                "parent {parent} does not resolve"
            )));
        }
        let graph = self.lineage_graph(project, &[*parent]).map_err(|e| match e {
            StoreError::NotFound { .. } => {
                StoreError::InvalidParent(format!("parent {parent} has no record"))
            }
            other => other,
        })?;
        Ok(graph.depth(parent)?)
    }

    fn history_in(&self, project: &Project, id: &NodeId) -> StoreResult<Vec<VersionNode>> {
        let graph = self.lineage_graph(project, &[*id])?;
        Ok(graph.history(id)?.into_iter().cloned().collect())
    }

    /// A graph holding the given nodes and everything reachable through
    /// their parent links. Loading stops at a revisit or a missing record;
    /// the graph's traversal then reports the cycle or dangling parent.
    fn lineage_graph(&self, project: &Project, starts: &[NodeId]) -> StoreResult<VersionGraph> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for start in starts {
            self.ensure_member(project, start)?;
            let mut next = Some(*start);
            while let Some(current) = next {
                if !seen.insert(current) {
                    break;
                }
                match self.backend.load_node(&self.project_id, &current)? {
                    Some(node) => {
                        next = node.parent_id;
                        nodes.push(node);
                    }
                    None if current == *start => {
                        return Err(StoreError::not_found("node", current));
                    }
                    None => break,
                }
            }
        }
        Ok(VersionGraph::from_nodes(nodes)?)
    }

    /// Every indexed node with a record, in creation order.
    fn full_graph(&self, project: &Project) -> StoreResult<VersionGraph> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(project.node_ids.len());
        for id in &project.node_ids {
            if !seen.insert(*id) {
                continue;
            }
            match self.backend.load_node(&self.project_id, id)? {
                Some(node) => nodes.push(node),
                None => warn!(project = %self.project_id, node = %id, "indexed node has no record"),
            }
        }
        Ok(VersionGraph::from_nodes(nodes)?)
    }
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("project_id", &self.project_id)
            .field("config", &self.config)
            .finish()
    }
}
