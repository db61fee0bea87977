//! Filesystem project store.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use fls_graph::VersionNode;
use fls_repo::{write_atomic, ArtifactRepository, FsArtifactRepository};
use fls_types::{NodeId, Project, ProjectId};

use crate::error::{StoreError, StoreResult};
use crate::lock::ProjectLock;
use crate::operation::BranchOperation;
use crate::traits::ProjectStore;

const PROJECT_FILE: &str = "project.json";
const NODES_DIR: &str = "nodes";
const ARTIFACTS_DIR: &str = "artifacts";
const OPERATIONS_FILE: &str = "operations.jsonl";
const LOCK_FILE: &str = ".lock";

/// Project store laid out as one directory per project:
///
/// ```text
/// <projects_dir>/<project_id>/
///     project.json
///     nodes/<node_id>.json
///     artifacts/<artifact_id>/{data.json,preview.bin,meta.json}
///     operations.jsonl
///     .lock
/// ```
///
/// Records are pretty-printed JSON replaced with write-temp-then-rename.
#[derive(Debug, Clone)]
pub struct FsProjectStore {
    projects_dir: PathBuf,
    sync_writes: bool,
}

impl FsProjectStore {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
            sync_writes: false,
        }
    }

    /// Enable or disable `fsync` on every record write.
    pub fn with_sync(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Directory of one project.
    pub fn project_dir(&self, id: &ProjectId) -> PathBuf {
        self.projects_dir.join(id.as_str())
    }

    fn node_path(&self, project: &ProjectId, id: &NodeId) -> PathBuf {
        self.project_dir(project)
            .join(NODES_DIR)
            .join(format!("{id}.json"))
    }

    fn read_record<T: DeserializeOwned>(&self, path: &Path, record: &str) -> StoreResult<Option<T>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::read(record, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::read(record, e))
    }

    fn write_record<T: Serialize>(&self, path: &Path, record: &str, value: &T) -> StoreResult<()> {
        let mut bytes =
            serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        bytes.push(b'\n');
        write_atomic(path, &bytes, self.sync_writes).map_err(|e| StoreError::write(record, e))
    }
}

impl ProjectStore for FsProjectStore {
    fn load_project(&self, id: &ProjectId) -> StoreResult<Option<Project>> {
        let record = format!("project {id}");
        let project: Option<Project> =
            self.read_record(&self.project_dir(id).join(PROJECT_FILE), &record)?;
        match project {
            Some(p) if p.id != *id => Err(StoreError::read(
                record,
                format!("record belongs to project {}", p.id),
            )),
            other => Ok(other),
        }
    }

    fn save_project(&self, project: &Project) -> StoreResult<()> {
        self.write_record(
            &self.project_dir(&project.id).join(PROJECT_FILE),
            &format!("project {}", project.id),
            project,
        )
    }

    fn load_node(&self, project: &ProjectId, id: &NodeId) -> StoreResult<Option<VersionNode>> {
        let record = format!("node {id}");
        let node: Option<VersionNode> = self.read_record(&self.node_path(project, id), &record)?;
        match node {
            Some(n) if n.id != *id => Err(StoreError::read(
                record,
                format!("record holds node {}", n.id),
            )),
            other => Ok(other),
        }
    }

    fn save_node(&self, node: &VersionNode) -> StoreResult<()> {
        self.write_record(
            &self.node_path(&node.project_id, &node.id),
            &format!("node {}", node.id),
            node,
        )
    }

    fn append_operation(&self, project: &ProjectId, op: &BranchOperation) -> StoreResult<()> {
        let mut line = serde_json::to_vec(op).map_err(|e| StoreError::Serialization(e.to_string()))?;
        line.push(b'\n');
        let dir = self.project_dir(project);
        let path = dir.join(OPERATIONS_FILE);
        let append = || -> io::Result<()> {
            fs::create_dir_all(&dir)?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(&line)?;
            if self.sync_writes {
                file.sync_all()?;
            }
            Ok(())
        };
        append().map_err(|e| StoreError::write(OPERATIONS_FILE, e))
    }

    fn operations(&self, project: &ProjectId) -> StoreResult<Vec<BranchOperation>> {
        let path = self.project_dir(project).join(OPERATIONS_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::read(OPERATIONS_FILE, e)),
        };
        let complete = content.ends_with('\n');
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let mut ops = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            match serde_json::from_str(line) {
                Ok(op) => ops.push(op),
                // A torn final line is an append that never finished.
                Err(e) if i + 1 == lines.len() && !complete => {
                    tracing::warn!(project = %project, error = %e, "ignoring incomplete operation log entry");
                }
                Err(e) => {
                    return Err(StoreError::read(
                        OPERATIONS_FILE,
                        format!("line {}: {e}", i + 1),
                    ))
                }
            }
        }
        Ok(ops)
    }

    fn artifacts(&self, project: &ProjectId) -> Arc<dyn ArtifactRepository> {
        Arc::new(
            FsArtifactRepository::new(self.project_dir(project).join(ARTIFACTS_DIR))
                .with_sync(self.sync_writes),
        )
    }

    fn lock(&self, project: &ProjectId) -> StoreResult<ProjectLock> {
        ProjectLock::acquire(&self.project_dir(project).join(LOCK_FILE))
    }

    fn list_projects(&self) -> StoreResult<Vec<ProjectId>> {
        let entries = match fs::read_dir(&self.projects_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::read("projects directory", e)),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::read("projects directory", e))?;
            if !entry.path().join(PROJECT_FILE).is_file() {
                continue;
            }
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| ProjectId::new(name).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationType;
    use fls_graph::version_label;
    use fls_types::{Metadata, NodeStatus, Stage};
    use tempfile::TempDir;

    fn store() -> (TempDir, FsProjectStore) {
        let dir = TempDir::new().unwrap();
        let store = FsProjectStore::new(dir.path().join("projects"));
        (dir, store)
    }

    fn pid() -> ProjectId {
        ProjectId::new("demo").unwrap()
    }

    fn node() -> VersionNode {
        let now = chrono::Utc::now();
        VersionNode {
            id: NodeId::new(),
            project_id: pid(),
            parent_id: None,
            branch_name: "main".into(),
            version: version_label(0),
            commit_message: "init".into(),
            stage: Stage::Input,
            stage_index: 0,
            artifact_reference: None,
            status: NodeStatus::Pending,
            created_at: now,
            updated_at: now,
            metadata: Metadata::new(),
            input_hash: None,
        }
    }

    #[test]
    fn project_record_roundtrip() {
        let (_dir, store) = store();
        assert!(store.load_project(&pid()).unwrap().is_none());
        let project = Project::new(pid());
        store.save_project(&project).unwrap();
        assert!(store.project_dir(&pid()).join(PROJECT_FILE).is_file());
        assert_eq!(store.load_project(&pid()).unwrap(), Some(project));
        assert_eq!(store.list_projects().unwrap(), vec![pid()]);
    }

    #[test]
    fn node_record_roundtrip() {
        let (_dir, store) = store();
        let n = node();
        store.save_node(&n).unwrap();
        let path = store.node_path(&pid(), &n.id);
        assert!(path.is_file());
        assert_eq!(store.load_node(&pid(), &n.id).unwrap(), Some(n));
        assert!(store.load_node(&pid(), &NodeId::new()).unwrap().is_none());
    }

    #[test]
    fn corrupted_node_is_a_read_error() {
        let (_dir, store) = store();
        let n = node();
        store.save_node(&n).unwrap();
        fs::write(store.node_path(&pid(), &n.id), b"{ truncated").unwrap();
        let err = store.load_node(&pid(), &n.id).unwrap_err();
        assert!(matches!(err, StoreError::StorageRead { .. }));
    }

    #[test]
    fn misfiled_node_is_a_read_error() {
        let (_dir, store) = store();
        let n = node();
        store.save_node(&n).unwrap();
        let other = NodeId::new();
        fs::copy(store.node_path(&pid(), &n.id), store.node_path(&pid(), &other)).unwrap();
        assert!(store.load_node(&pid(), &other).is_err());
    }

    #[test]
    fn operation_log_appends_lines() {
        let (_dir, store) = store();
        store.save_project(&Project::new(pid())).unwrap();
        let a = BranchOperation::new(OperationType::CreateBranch, NodeId::new(), "alt", "fork");
        let b = BranchOperation::new(OperationType::SwitchBranch, NodeId::new(), "main", "");
        store.append_operation(&pid(), &a).unwrap();
        store.append_operation(&pid(), &b).unwrap();

        let content = fs::read_to_string(store.project_dir(&pid()).join(OPERATIONS_FILE)).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(store.operations(&pid()).unwrap(), vec![a, b]);
    }

    #[test]
    fn torn_last_operation_is_ignored() {
        let (_dir, store) = store();
        store.save_project(&Project::new(pid())).unwrap();
        let a = BranchOperation::new(OperationType::CreateBranch, NodeId::new(), "alt", "");
        store.append_operation(&pid(), &a).unwrap();
        let path = store.project_dir(&pid()).join(OPERATIONS_FILE);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"id\":").unwrap();
        assert_eq!(store.operations(&pid()).unwrap(), vec![a]);
    }

    #[test]
    fn corrupted_middle_operation_is_a_read_error() {
        let (_dir, store) = store();
        store.save_project(&Project::new(pid())).unwrap();
        let path = store.project_dir(&pid()).join(OPERATIONS_FILE);
        fs::write(&path, "garbage\n").unwrap();
        let a = BranchOperation::new(OperationType::CreateBranch, NodeId::new(), "alt", "");
        store.append_operation(&pid(), &a).unwrap();
        assert!(matches!(
            store.operations(&pid()).unwrap_err(),
            StoreError::StorageRead { .. }
        ));
    }

    #[test]
    fn artifacts_live_under_the_project() {
        let (_dir, store) = store();
        let repo = store.artifacts(&pid());
        let draft = fls_repo::ArtifactDraft::new(
            NodeId::new(),
            Stage::Script,
            "script",
            serde_json::json!({"title": "T"}),
        );
        let meta = repo.put(&draft).unwrap();
        assert!(store
            .project_dir(&pid())
            .join(ARTIFACTS_DIR)
            .join(meta.id.as_str())
            .join("meta.json")
            .is_file());
    }

    #[test]
    fn lock_file_is_per_project() {
        let (_dir, store) = store();
        let guard = store.lock(&pid()).unwrap();
        assert!(store.project_dir(&pid()).join(LOCK_FILE).is_file());
        assert!(store.lock(&pid()).is_err());
        let other = ProjectId::new("other").unwrap();
        let _other_guard = store.lock(&other).unwrap();
        drop(guard);
        assert!(store.lock(&pid()).is_ok());
    }
}
