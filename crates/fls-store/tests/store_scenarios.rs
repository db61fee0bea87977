//! End-to-end behavior of the filesystem-backed store.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde_json::json;
use tempfile::TempDir;

use fls_store::{
    input_hash_of, ArtifactId, ArtifactStore, ErrorKind, NewNode, NodeId, NodeStatus, ProjectId,
    SaveArtifact, Stage, StoreConfig, StoreError, ViolationKind,
};

fn config(dir: &TempDir) -> StoreConfig {
    let mut config = StoreConfig::with_root(dir.path());
    config.sync_writes = false;
    config
}

fn open(dir: &TempDir) -> ArtifactStore {
    ArtifactStore::open(config(dir), ProjectId::new("film").unwrap()).unwrap()
}

fn project_dir(dir: &TempDir) -> PathBuf {
    dir.path().join("projects").join("film")
}

fn node_file(dir: &TempDir, id: &NodeId) -> PathBuf {
    project_dir(dir).join("nodes").join(format!("{id}.json"))
}

fn script(data: serde_json::Value) -> SaveArtifact {
    SaveArtifact::new(Stage::Script, "script", data)
}

// ---- Graph shape ----

#[test]
fn history_runs_root_to_node() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Input)).unwrap();
    let mut tip = root.clone();
    for stage in [Stage::Script, Stage::Storyboard, Stage::Image] {
        tip = store
            .create_node(NewNode::new(stage).child_of(tip.id))
            .unwrap();
    }

    let history = store.history(&tip.id).unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].id, root.id);
    assert_eq!(history[3].id, tip.id);
    assert_eq!(tip.version, "1.3.0");
    for pair in history.windows(2) {
        assert_eq!(pair[1].parent_id, Some(pair[0].id));
    }
    assert_eq!(store.list_nodes(Some("main")).unwrap(), history);
}

#[test]
fn fork_keeps_both_branch_heads() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Input)).unwrap();
    let s1 = store
        .create_node(NewNode::new(Stage::Script).child_of(root.id))
        .unwrap();
    let meta = store.save_artifact(&s1.id, script(json!({"title": "T"}))).unwrap();

    let s1b = store.create_branch(&s1.id, "alt", "darker ending").unwrap();
    assert_eq!(s1b.parent_id, Some(s1.id));
    assert_eq!(s1b.artifact_reference, Some(meta.id.clone()));
    assert_eq!(s1b.status, NodeStatus::Completed);
    assert_eq!(s1b.branch_name, "alt");
    assert_eq!(s1b.version, "1.2.0");

    let branches = store.list_branches().unwrap();
    assert_eq!(branches.len(), 2);
    assert_eq!(branches["main"], s1.id);
    assert_eq!(branches["alt"], s1b.id);
    assert_eq!(store.head().unwrap().unwrap().id, s1.id);
    assert_eq!(store.fork_point(&s1.id, &s1b.id).unwrap().unwrap().id, s1.id);
}

#[test]
fn fork_after_settled_input_root() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Input)).unwrap();
    store
        .save_artifact(
            &root.id,
            SaveArtifact::new(Stage::Input, "input", json!({"prompt": "a lighthouse at dusk"})),
        )
        .unwrap();
    assert_eq!(store.get_node(&root.id).unwrap().status, NodeStatus::Completed);

    let s1 = store
        .create_node(NewNode::new(Stage::Script).child_of(root.id))
        .unwrap();
    let meta = store.save_artifact(&s1.id, script(json!({"scenes": 3}))).unwrap();
    let s1b = store.create_branch(&s1.id, "alt", "").unwrap();

    let expected: BTreeMap<String, NodeId> =
        [("main".to_string(), s1.id), ("alt".to_string(), s1b.id)].into_iter().collect();
    assert_eq!(store.list_branches().unwrap(), expected);
    assert_eq!(s1b.status, NodeStatus::Completed);
    assert_eq!(s1b.artifact_reference, Some(meta.id));
    assert_eq!(store.get_node(&s1b.id).unwrap().status, NodeStatus::Completed);
    assert_eq!(store.history(&s1b.id).unwrap().len(), 3);
}

#[test]
fn branch_is_not_committed_when_the_log_cannot_be_written() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Input)).unwrap();
    store.create_branch(&root.id, "alt", "").unwrap();
    let before = store.project().unwrap();

    let log = project_dir(&dir).join("operations.jsonl");
    fs::remove_file(&log).unwrap();
    fs::create_dir_all(&log).unwrap();

    let err = store.create_branch(&root.id, "late", "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageWrite);
    let err = store.switch_branch("alt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageWrite);

    let after = store.project().unwrap();
    assert_eq!(after.branches, before.branches);
    assert_eq!(after.node_ids, before.node_ids);
    assert_eq!(after.current_node_id, Some(root.id));
    assert!(!store.list_branches().unwrap().contains_key("late"));
}

#[test]
fn duplicate_branch_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Input)).unwrap();
    store.create_branch(&root.id, "alt", "").unwrap();
    let before = store.project().unwrap();

    let err = store.create_branch(&root.id, "alt", "again").unwrap_err();
    assert!(matches!(err, StoreError::BranchAlreadyExists(ref b) if b == "alt"));
    let after = store.project().unwrap();
    assert_eq!(after.branches, before.branches);
    assert_eq!(after.node_ids, before.node_ids);
    assert_eq!(store.branch_operations().unwrap().len(), 1);
}

#[test]
fn branch_from_unknown_node() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    store.create_node(NewNode::new(Stage::Input)).unwrap();
    let err = store.create_branch(&NodeId::new(), "alt", "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(store.list_branches().unwrap().get("alt").is_none());
}

// ---- Artifacts ----

#[test]
fn equal_content_is_stored_once() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Script)).unwrap();
    let other = store
        .create_node(NewNode::new(Stage::Script).child_of(root.id))
        .unwrap();

    let a = store
        .save_artifact(&root.id, script(json!({"title": "T", "scenes": [1, 2]})))
        .unwrap();
    let b = store
        .save_artifact(&other.id, script(json!({"scenes": [1, 2], "title": "T"})))
        .unwrap();

    assert_eq!(a.id, b.id);
    assert_eq!(a.storage_location, b.storage_location);
    assert_eq!(b.node_id, other.id);
    assert_eq!(store.list_artifacts().unwrap(), vec![a.id.clone()]);

    let bundles = fs::read_dir(project_dir(&dir).join("artifacts")).unwrap().count();
    assert_eq!(bundles, 1);
}

#[test]
fn artifact_id_is_content_derived() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Script)).unwrap();
    let meta = store.save_artifact(&root.id, script(json!({"title": "T"}))).unwrap();
    assert_eq!(meta.id.as_str(), "script_script_6d05dcd7395808f6");
    assert!(meta.storage_location.ends_with("data.json"));
}

#[test]
fn unknown_artifact_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let err = store
        .get_artifact(&ArtifactId::from_raw("nonexistent"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn preview_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Image)).unwrap();
    let meta = store
        .save_artifact(
            &root.id,
            SaveArtifact::new(Stage::Image, "image", json!({"url": "a.png"})).preview(vec![0x89, 0x50]),
        )
        .unwrap();
    assert!(meta.preview_location.is_some());
    assert_eq!(store.read_preview(&meta.id).unwrap(), Some(vec![0x89, 0x50]));
}

// ---- Caching ----

#[test]
fn cached_run_reuses_the_earlier_artifact() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let inputs = input_hash_of(&json!({"prompt": "a cat", "seed": 7})).unwrap();

    let root = store.create_node(NewNode::new(Stage::Input)).unwrap();
    let first = store
        .create_node(NewNode::new(Stage::Script).child_of(root.id).input_hash(inputs))
        .unwrap();
    let meta = store.save_artifact(&first.id, script(json!({"title": "Cat"}))).unwrap();

    let hit = store.find_cached("main", Stage::Script, &inputs).unwrap().unwrap();
    assert_eq!(hit.id, first.id);
    let miss = input_hash_of(&json!({"prompt": "a dog", "seed": 7})).unwrap();
    assert!(store.find_cached("main", Stage::Script, &miss).unwrap().is_none());

    let rerun = store
        .create_node(NewNode::new(Stage::Script).child_of(first.id).input_hash(inputs))
        .unwrap();
    let cached = store.mark_cached(&rerun.id, &hit.id).unwrap();
    assert_eq!(cached.status, NodeStatus::Cached);
    assert_eq!(cached.artifact_reference, Some(meta.id));
    assert_eq!(cached.metadata[fls_store::CACHED_FROM_KEY], json!(first.id.to_string()));
}

#[test]
fn cache_needs_equal_inputs() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let a = input_hash_of(&json!({"seed": 1})).unwrap();
    let b = input_hash_of(&json!({"seed": 2})).unwrap();

    let root = store
        .create_node(NewNode::new(Stage::Script).input_hash(a))
        .unwrap();
    store.save_artifact(&root.id, script(json!({"v": 1}))).unwrap();
    let other = store
        .create_node(NewNode::new(Stage::Script).child_of(root.id).input_hash(b))
        .unwrap();

    let err = store.mark_cached(&other.id, &root.id).unwrap_err();
    assert!(matches!(err, StoreError::CacheMismatch { .. }));
    assert_eq!(store.get_node(&other.id).unwrap().status, NodeStatus::Pending);
}

#[test]
fn failed_node_falls_back_to_last_settled_ancestor() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Script)).unwrap();
    store.save_artifact(&root.id, script(json!({"v": 1}))).unwrap();
    let image = store
        .create_node(NewNode::new(Stage::Image).child_of(root.id))
        .unwrap();
    store
        .mark_status(&image.id, NodeStatus::Failed, Some("provider timeout".into()))
        .unwrap();

    let fallback = store.last_settled_ancestor(&image.id).unwrap().unwrap();
    assert_eq!(fallback.id, root.id);
}

// ---- Persistence ----

#[test]
fn reopen_sees_everything() {
    let dir = TempDir::new().unwrap();
    let (root, s1, meta) = {
        let store = open(&dir);
        store.set_project_metadata(Some("Short film"), Some("test")).unwrap();
        let root = store.create_node(NewNode::new(Stage::Input)).unwrap();
        let s1 = store
            .create_node(NewNode::new(Stage::Script).child_of(root.id))
            .unwrap();
        let meta = store.save_artifact(&s1.id, script(json!({"title": "T"}))).unwrap();
        store.create_branch(&s1.id, "alt", "").unwrap();
        (root, s1, meta)
    };

    let store = open(&dir);
    let project = store.project().unwrap();
    assert_eq!(project.name, "Short film");
    assert_eq!(project.root_node_id, Some(root.id));
    assert_eq!(project.node_ids.len(), 3);
    assert_eq!(store.get_node(&s1.id).unwrap().status, NodeStatus::Completed);
    let (data, stored) = store.get_artifact(&meta.id).unwrap();
    assert_eq!(data, json!({"title": "T"}));
    assert_eq!(stored, meta);
    assert_eq!(store.branch_operations().unwrap().len(), 1);
    assert!(store.validate().unwrap().is_valid());
}

#[test]
fn two_stores_on_one_root_share_state() {
    let dir = TempDir::new().unwrap();
    let a = open(&dir);
    let b = open(&dir);
    let root = a.create_node(NewNode::new(Stage::Input)).unwrap();
    assert_eq!(b.get_node(&root.id).unwrap(), root);
    let child = b
        .create_node(NewNode::new(Stage::Script).child_of(root.id))
        .unwrap();
    assert_eq!(a.project().unwrap().node_ids, vec![root.id, child.id]);
}

#[test]
fn writes_leave_no_temp_files() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Script)).unwrap();
    store.save_artifact(&root.id, script(json!({"v": 1}))).unwrap();
    store.set_setting("fps", json!(24)).unwrap();

    let leftovers: Vec<_> = walk(&project_dir(&dir))
        .into_iter()
        .filter(|p| p.to_string_lossy().contains(".tmp-"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

fn walk(dir: &PathBuf) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            out.extend(walk(&path));
        } else {
            out.push(path);
        }
    }
    out
}

// ---- Damage ----

#[test]
fn unindexed_node_record_is_invisible() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Input)).unwrap();

    let mut orphan = root.clone();
    orphan.id = NodeId::new();
    fs::write(
        node_file(&dir, &orphan.id),
        serde_json::to_vec_pretty(&orphan).unwrap(),
    )
    .unwrap();

    assert_eq!(store.get_node(&orphan.id).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.list_nodes(None).unwrap().len(), 1);
    assert!(store.validate().unwrap().is_valid());
}

#[test]
fn corrupted_node_record_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Input)).unwrap();
    fs::write(node_file(&dir, &root.id), b"{ not json").unwrap();

    assert_eq!(store.get_node(&root.id).unwrap_err().kind(), ErrorKind::StorageRead);
}

#[test]
fn corrupted_project_record_is_a_read_error() {
    let dir = TempDir::new().unwrap();
    open(&dir);
    fs::write(project_dir(&dir).join("project.json"), b"[]").unwrap();

    let err = ArtifactStore::open(config(&dir), ProjectId::new("film").unwrap()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageRead);
}

#[test]
fn hand_made_cycle_is_detected() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Input)).unwrap();
    let a = store
        .create_node(NewNode::new(Stage::Script).child_of(root.id))
        .unwrap();
    let b = store
        .create_node(NewNode::new(Stage::Storyboard).child_of(a.id))
        .unwrap();

    let mut looped = a.clone();
    looped.parent_id = Some(b.id);
    fs::write(
        node_file(&dir, &a.id),
        serde_json::to_vec_pretty(&looped).unwrap(),
    )
    .unwrap();

    let err = store.history(&b.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CycleDetected);

    let report = store.validate().unwrap();
    assert!(!report.is_valid());
    assert!(report
        .errors()
        .any(|v| v.kind == ViolationKind::ParentNotEarlier && v.node == Some(a.id)));

    // Nodes off the damaged path still resolve.
    assert_eq!(store.history(&root.id).unwrap().len(), 1);
}

#[test]
fn missing_node_record_is_reported() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let root = store.create_node(NewNode::new(Stage::Input)).unwrap();
    let child = store
        .create_node(NewNode::new(Stage::Script).child_of(root.id))
        .unwrap();
    fs::remove_file(node_file(&dir, &child.id)).unwrap();

    let report = store.validate().unwrap();
    assert!(report
        .errors()
        .any(|v| v.kind == ViolationKind::MissingNode && v.node == Some(child.id)));
    assert_eq!(store.get_node(&child.id).unwrap_err().kind(), ErrorKind::StorageRead);
}

// ---- Locking ----

#[test]
fn writer_lock_is_exclusive() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let other = open(&dir);

    let guard = store.lock().unwrap();
    assert_eq!(other.lock().unwrap_err().kind(), ErrorKind::Locked);
    drop(guard);
    assert!(other.lock().is_ok());
}

#[test]
fn projects_are_isolated() {
    let dir = TempDir::new().unwrap();
    let film = open(&dir);
    let ad = ArtifactStore::open(config(&dir), ProjectId::new("ad").unwrap()).unwrap();
    let root = film.create_node(NewNode::new(Stage::Input)).unwrap();

    assert_eq!(ad.get_node(&root.id).unwrap_err().kind(), ErrorKind::NotFound);
    assert!(ad.project().unwrap().is_empty());
}
