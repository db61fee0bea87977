use std::collections::HashMap;
use std::sync::RwLock;

use fls_types::ArtifactId;
use serde_json::Value;

use crate::error::{RepoError, RepoResult};
use crate::object::{decode_verified, ArtifactDraft, ArtifactMetadata, PreparedArtifact};
use crate::traits::ArtifactRepository;

#[derive(Clone)]
struct Bundle {
    bytes: Vec<u8>,
    preview: Option<Vec<u8>>,
    meta: ArtifactMetadata,
}

/// In-memory, HashMap-based artifact repository.
///
/// Intended for tests and embedding. Bundles hold the canonical bytes, so
/// reads go through the same hash check as the filesystem backend.
pub struct InMemoryArtifactRepository {
    bundles: RwLock<HashMap<ArtifactId, Bundle>>,
}

impl InMemoryArtifactRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self {
            bundles: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored bundles.
    pub fn len(&self) -> usize {
        self.bundles.read().expect("lock poisoned").len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.bundles.read().expect("lock poisoned").is_empty()
    }

    /// Total canonical bytes across all bundles.
    pub fn total_bytes(&self) -> u64 {
        self.bundles
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.bytes.len() as u64)
            .sum()
    }

    fn location(id: &ArtifactId, file: &str) -> String {
        format!("mem://{id}/{file}")
    }
}

impl Default for InMemoryArtifactRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactRepository for InMemoryArtifactRepository {
    fn put(&self, draft: &ArtifactDraft) -> RepoResult<ArtifactMetadata> {
        let prepared = PreparedArtifact::prepare(draft)?;
        let mut map = self.bundles.write().expect("lock poisoned");

        if let Some(existing) = map.get_mut(&prepared.id) {
            if existing.meta.content_hash != prepared.hash {
                return Err(RepoError::write(
                    &prepared.id,
                    "id collision with different content",
                ));
            }
            if existing.preview.is_none() {
                if let Some(preview) = &draft.preview {
                    existing.preview = Some(preview.clone());
                    existing.meta.preview_location =
                        Some(Self::location(&prepared.id, "preview.bin"));
                }
            }
            return Ok(existing.meta.reuse_for(draft));
        }

        let preview_location = draft
            .preview
            .as_ref()
            .map(|_| Self::location(&prepared.id, "preview.bin"));
        let meta = prepared.metadata(
            draft,
            Self::location(&prepared.id, "data.json"),
            preview_location,
        );
        map.insert(
            prepared.id.clone(),
            Bundle {
                bytes: prepared.bytes,
                preview: draft.preview.clone(),
                meta: meta.clone(),
            },
        );
        Ok(meta)
    }

    fn get(&self, id: &ArtifactId) -> RepoResult<(Value, ArtifactMetadata)> {
        let map = self.bundles.read().expect("lock poisoned");
        let bundle = map
            .get(id)
            .ok_or_else(|| RepoError::NotFound(id.clone()))?;
        let data = decode_verified(id, &bundle.bytes, &bundle.meta.content_hash)?;
        Ok((data, bundle.meta.clone()))
    }

    fn exists(&self, id: &ArtifactId) -> RepoResult<bool> {
        Ok(self.bundles.read().expect("lock poisoned").contains_key(id))
    }

    fn read_preview(&self, id: &ArtifactId) -> RepoResult<Option<Vec<u8>>> {
        let map = self.bundles.read().expect("lock poisoned");
        let bundle = map
            .get(id)
            .ok_or_else(|| RepoError::NotFound(id.clone()))?;
        Ok(bundle.preview.clone())
    }

    fn list(&self) -> RepoResult<Vec<ArtifactId>> {
        let map = self.bundles.read().expect("lock poisoned");
        let mut ids: Vec<ArtifactId> = map.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl std::fmt::Debug for InMemoryArtifactRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryArtifactRepository")
            .field("bundle_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use fls_types::{NodeId, Stage};
    use serde_json::json;

    fn draft(data: Value) -> ArtifactDraft {
        ArtifactDraft::new(NodeId::new(), Stage::Script, "script", data)
    }

    // ---- Basic operations ----

    #[test]
    fn put_then_get() {
        let repo = InMemoryArtifactRepository::new();
        let meta = repo
            .put(&draft(json!({"title": "T"})).with_summary("a script"))
            .unwrap();
        assert_eq!(meta.id.as_str(), "script_script_6d05dcd7395808f6");
        assert_eq!(meta.storage_location, format!("mem://{}/data.json", meta.id));
        assert_eq!(meta.size_bytes, 13);
        assert!(meta.preview_location.is_none());

        let (data, stored) = repo.get(&meta.id).unwrap();
        assert_eq!(data, json!({"title": "T"}));
        assert_eq!(stored, meta);
    }

    #[test]
    fn get_missing_is_not_found() {
        let repo = InMemoryArtifactRepository::new();
        let err = repo.get(&ArtifactId::from_raw("nonexistent")).unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
        assert!(!repo.exists(&ArtifactId::from_raw("nonexistent")).unwrap());
    }

    #[test]
    fn invalid_type_is_rejected() {
        let repo = InMemoryArtifactRepository::new();
        let bad = ArtifactDraft::new(NodeId::new(), Stage::Image, "a_b", json!(1));
        assert!(matches!(
            repo.put(&bad).unwrap_err(),
            RepoError::InvalidArtifactType(_)
        ));
        assert!(repo.is_empty());
    }

    // ---- Deduplication ----

    #[test]
    fn equal_content_is_stored_once() {
        let repo = InMemoryArtifactRepository::new();
        let first = repo.put(&draft(json!({"a": 1, "b": 2}))).unwrap();
        let second_draft = draft(serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap());
        let second = repo.put(&second_draft).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.storage_location, second.storage_location);
        assert_eq!(second.node_id, second_draft.node_id);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.total_bytes(), first.size_bytes);
    }

    #[test]
    fn late_preview_is_attached() {
        let repo = InMemoryArtifactRepository::new();
        let first = repo.put(&draft(json!("x"))).unwrap();
        assert_eq!(repo.read_preview(&first.id).unwrap(), None);

        let second = repo
            .put(&draft(json!("x")).with_preview(vec![1, 2, 3]))
            .unwrap();
        assert!(second.preview_location.is_some());
        assert_eq!(repo.read_preview(&first.id).unwrap(), Some(vec![1, 2, 3]));

        // The first preview wins.
        repo.put(&draft(json!("x")).with_preview(vec![9])).unwrap();
        assert_eq!(repo.read_preview(&first.id).unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn list_is_sorted() {
        let repo = InMemoryArtifactRepository::new();
        for i in 0..5 {
            repo.put(&draft(json!(i))).unwrap();
        }
        let ids = repo.list().unwrap();
        assert_eq!(ids.len(), 5);
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    // ---- Concurrency ----

    #[test]
    fn concurrent_puts_of_equal_content_converge() {
        let repo = Arc::new(InMemoryArtifactRepository::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                thread::spawn(move || repo.put(&draft(json!({"shared": true}))).unwrap().id)
            })
            .collect();
        let ids: Vec<ArtifactId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(repo.len(), 1);
    }
}
