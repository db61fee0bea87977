use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fls_types::ArtifactId;
use serde_json::Value;

use crate::atomic::write_atomic;
use crate::error::{RepoError, RepoResult};
use crate::object::{decode_verified, ArtifactDraft, ArtifactMetadata, PreparedArtifact};
use crate::traits::ArtifactRepository;

const DATA_FILE: &str = "data.json";
const PREVIEW_FILE: &str = "preview.bin";
const META_FILE: &str = "meta.json";

/// Filesystem artifact repository.
///
/// One directory per artifact under the repository root:
///
/// ```text
/// <root>/<artifact_id>/
///     data.json     canonical bytes of the artifact data
///     preview.bin   optional preview blob
///     meta.json     ArtifactMetadata (written last)
/// ```
#[derive(Debug, Clone)]
pub struct FsArtifactRepository {
    root: PathBuf,
    sync_writes: bool,
}

impl FsArtifactRepository {
    /// Repository rooted at `root`. Directories are created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sync_writes: false,
        }
    }

    /// Enable or disable `fsync` on every file write.
    pub fn with_sync(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bundle_dir(&self, id: &ArtifactId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn location(&self, id: &ArtifactId, file: &str) -> RepoResult<String> {
        let path = self.bundle_dir(id).join(file);
        let absolute = std::path::absolute(&path).unwrap_or(path);
        Ok(fls_canon::normalize_path(&absolute)?)
    }

    fn write_file(&self, id: &ArtifactId, file: &str, bytes: &[u8]) -> RepoResult<()> {
        write_atomic(&self.bundle_dir(id).join(file), bytes, self.sync_writes)
            .map_err(|e| RepoError::write(id, format!("{file}: {e}")))
    }

    fn write_meta(&self, meta: &ArtifactMetadata) -> RepoResult<()> {
        let bytes = serde_json::to_vec_pretty(meta).map_err(|e| RepoError::write(&meta.id, e))?;
        self.write_file(&meta.id, META_FILE, &bytes)
    }

    /// Load the metadata record, `None` if the bundle was never committed.
    fn read_meta(&self, id: &ArtifactId) -> RepoResult<Option<ArtifactMetadata>> {
        if !id.is_path_safe() {
            return Ok(None);
        }
        let path = self.bundle_dir(id).join(META_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RepoError::read(id, format!("{META_FILE}: {e}"))),
        };
        let meta = serde_json::from_slice(&bytes)
            .map_err(|e| RepoError::read(id, format!("{META_FILE}: {e}")))?;
        Ok(Some(meta))
    }

    fn attach_preview(
        &self,
        mut existing: ArtifactMetadata,
        preview: &[u8],
    ) -> RepoResult<ArtifactMetadata> {
        self.write_file(&existing.id, PREVIEW_FILE, preview)?;
        existing.preview_location = Some(self.location(&existing.id, PREVIEW_FILE)?);
        self.write_meta(&existing)?;
        tracing::debug!(artifact = %existing.id, size = preview.len(), "attached preview");
        Ok(existing)
    }
}

impl ArtifactRepository for FsArtifactRepository {
    fn put(&self, draft: &ArtifactDraft) -> RepoResult<ArtifactMetadata> {
        let prepared = PreparedArtifact::prepare(draft)?;
        let id = &prepared.id;

        if let Some(existing) = self.read_meta(id).map_err(|e| RepoError::write(id, e))? {
            if existing.content_hash != prepared.hash {
                tracing::warn!(
                    artifact = %id,
                    existing = %existing.content_hash,
                    incoming = %prepared.hash,
                    "artifact id collision with different content"
                );
                return Err(RepoError::write(id, "id collision with different content"));
            }
            let existing = match (&existing.preview_location, &draft.preview) {
                (None, Some(preview)) => self.attach_preview(existing, preview)?,
                _ => existing,
            };
            tracing::debug!(artifact = %id, "artifact already stored");
            return Ok(existing.reuse_for(draft));
        }

        self.write_file(id, DATA_FILE, &prepared.bytes)?;
        let preview_location = match &draft.preview {
            Some(preview) => {
                self.write_file(id, PREVIEW_FILE, preview)?;
                Some(self.location(id, PREVIEW_FILE)?)
            }
            None => None,
        };
        let meta = prepared.metadata(draft, self.location(id, DATA_FILE)?, preview_location);
        self.write_meta(&meta)?;

        tracing::info!(
            artifact = %id,
            node = %draft.node_id,
            size = meta.size_bytes,
            path = %meta.storage_location,
            "stored artifact"
        );
        Ok(meta)
    }

    fn get(&self, id: &ArtifactId) -> RepoResult<(Value, ArtifactMetadata)> {
        let meta = self
            .read_meta(id)?
            .ok_or_else(|| RepoError::NotFound(id.clone()))?;
        let bytes = fs::read(self.bundle_dir(id).join(DATA_FILE))
            .map_err(|e| RepoError::read(id, format!("{DATA_FILE}: {e}")))?;
        let data = decode_verified(id, &bytes, &meta.content_hash)?;
        Ok((data, meta))
    }

    fn exists(&self, id: &ArtifactId) -> RepoResult<bool> {
        Ok(id.is_path_safe() && self.bundle_dir(id).join(META_FILE).is_file())
    }

    fn read_preview(&self, id: &ArtifactId) -> RepoResult<Option<Vec<u8>>> {
        let meta = self
            .read_meta(id)?
            .ok_or_else(|| RepoError::NotFound(id.clone()))?;
        if meta.preview_location.is_none() {
            return Ok(None);
        }
        fs::read(self.bundle_dir(id).join(PREVIEW_FILE))
            .map(Some)
            .map_err(|e| RepoError::read(id, format!("{PREVIEW_FILE}: {e}")))
    }

    fn list(&self) -> RepoResult<Vec<ArtifactId>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if entry.path().join(META_FILE).is_file() {
                ids.push(ArtifactId::from_raw(name));
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fls_types::{NodeId, Stage};
    use serde_json::json;
    use tempfile::TempDir;

    fn repo() -> (TempDir, FsArtifactRepository) {
        let dir = TempDir::new().unwrap();
        let repo = FsArtifactRepository::new(dir.path().join("artifacts"));
        (dir, repo)
    }

    fn draft(data: Value) -> ArtifactDraft {
        ArtifactDraft::new(NodeId::new(), Stage::Script, "script", data)
    }

    // ---- Layout ----

    #[test]
    fn put_writes_bundle_files() {
        let (_dir, repo) = repo();
        let meta = repo.put(&draft(json!({"title": "T"}))).unwrap();
        let bundle = repo.root().join(meta.id.as_str());
        assert_eq!(fs::read(bundle.join(DATA_FILE)).unwrap(), b"{\"title\":\"T\"}");
        assert!(bundle.join(META_FILE).is_file());
        assert!(!bundle.join(PREVIEW_FILE).exists());
        assert!(meta.storage_location.ends_with(&format!("{}/data.json", meta.id)));
        assert!(meta.storage_location.starts_with('/'));
    }

    #[test]
    fn get_returns_data_and_metadata() {
        let (_dir, repo) = repo();
        let meta = repo
            .put(&draft(json!({"scenes": [1, 2, 3]})).with_summary("three scenes"))
            .unwrap();
        let (data, stored) = repo.get(&meta.id).unwrap();
        assert_eq!(data, json!({"scenes": [1, 2, 3]}));
        assert_eq!(stored, meta);
        assert!(repo.exists(&meta.id).unwrap());
    }

    #[test]
    fn missing_and_unsafe_ids_are_not_found() {
        let (_dir, repo) = repo();
        for raw in ["nonexistent", "../escape", ""] {
            let id = ArtifactId::from_raw(raw);
            assert!(matches!(repo.get(&id).unwrap_err(), RepoError::NotFound(_)));
            assert!(!repo.exists(&id).unwrap());
        }
    }

    #[test]
    fn bundle_without_meta_does_not_exist() {
        let (_dir, repo) = repo();
        let id = ArtifactId::from_raw("script_script_0000000000000000");
        write_atomic(&repo.root().join(id.as_str()).join(DATA_FILE), b"{}", false).unwrap();
        assert!(!repo.exists(&id).unwrap());
        assert!(repo.list().unwrap().is_empty());
    }

    // ---- Deduplication ----

    #[test]
    fn equal_content_shares_location() {
        let (_dir, repo) = repo();
        let a = repo.put(&draft(json!({"a": 1, "b": {"c": 2}}))).unwrap();
        let b_draft = draft(serde_json::from_str(r#"{"b":{"c":2},"a":1}"#).unwrap())
            .with_summary("second writer");
        let b = repo.put(&b_draft).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.storage_location, b.storage_location);
        assert_eq!(a.created_at, b.created_at);
        assert_eq!(b.summary, "second writer");
        assert_eq!(b.node_id, b_draft.node_id);

        // The stored record still belongs to the first writer.
        let (_, stored) = repo.get(&a.id).unwrap();
        assert_eq!(stored.node_id, a.node_id);
        assert_eq!(repo.list().unwrap(), vec![a.id]);
    }

    #[test]
    fn prefix_collision_is_a_write_error() {
        let (_dir, repo) = repo();
        let meta = repo.put(&draft(json!("original"))).unwrap();

        // Forge a record whose hash disagrees with what the id would hold.
        let mut forged = meta.clone();
        forged.content_hash = fls_canon::hash_bytes(b"something else");
        repo.write_meta(&forged).unwrap();

        let err = repo.put(&draft(json!("original"))).unwrap_err();
        assert!(matches!(err, RepoError::StorageWrite { .. }));
    }

    // ---- Previews ----

    #[test]
    fn preview_roundtrip_and_late_attach() {
        let (_dir, repo) = repo();
        let first = repo.put(&draft(json!("img"))).unwrap();
        assert_eq!(repo.read_preview(&first.id).unwrap(), None);

        let second = repo
            .put(&draft(json!("img")).with_preview(b"PNG".to_vec()))
            .unwrap();
        assert!(second.preview_location.as_deref().unwrap().ends_with("preview.bin"));
        assert_eq!(repo.read_preview(&first.id).unwrap(), Some(b"PNG".to_vec()));

        repo.put(&draft(json!("img")).with_preview(b"OTHER".to_vec()))
            .unwrap();
        assert_eq!(repo.read_preview(&first.id).unwrap(), Some(b"PNG".to_vec()));
    }

    #[test]
    fn read_preview_of_missing_artifact() {
        let (_dir, repo) = repo();
        let err = repo.read_preview(&ArtifactId::from_raw("nope")).unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }

    // ---- Corruption ----

    #[test]
    fn tampered_data_is_a_read_error() {
        let (_dir, repo) = repo();
        let meta = repo.put(&draft(json!({"n": 1}))).unwrap();
        fs::write(repo.root().join(meta.id.as_str()).join(DATA_FILE), b"{\"n\":2}").unwrap();
        assert!(matches!(
            repo.get(&meta.id).unwrap_err(),
            RepoError::StorageRead { .. }
        ));
    }

    #[test]
    fn undecodable_meta_is_a_read_error() {
        let (_dir, repo) = repo();
        let meta = repo.put(&draft(json!({"n": 1}))).unwrap();
        fs::write(repo.root().join(meta.id.as_str()).join(META_FILE), b"not json").unwrap();
        assert!(matches!(
            repo.get(&meta.id).unwrap_err(),
            RepoError::StorageRead { .. }
        ));
    }

    #[test]
    fn missing_data_is_a_read_error() {
        let (_dir, repo) = repo();
        let meta = repo.put(&draft(json!({"n": 1}))).unwrap();
        fs::remove_file(repo.root().join(meta.id.as_str()).join(DATA_FILE)).unwrap();
        assert!(matches!(
            repo.get(&meta.id).unwrap_err(),
            RepoError::StorageRead { .. }
        ));
    }

    #[test]
    fn list_on_missing_root_is_empty() {
        let (_dir, repo) = repo();
        assert!(repo.list().unwrap().is_empty());
    }
}
