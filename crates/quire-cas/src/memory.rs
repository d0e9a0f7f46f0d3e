//! In-memory content store.
//!
//! Used for testing and ephemeral deployments. All data is lost when dropped.

use std::collections::HashMap;

use parking_lot::RwLock;

use quire_types::{now_millis, ContentId};

use crate::error::{CasError, CasResult};
use crate::sniff::sniff_mimetype;
use crate::store::{digest, ContentMeta, ContentStore};

#[derive(Debug)]
struct Blob {
    bytes: Vec<u8>,
    meta: ContentMeta,
    refcount: u64,
}

#[derive(Debug, Default)]
struct Inner {
    blobs: HashMap<ContentId, Blob>,
    by_digest: HashMap<String, ContentId>,
    next_id: i64,
}

/// In-memory content store.
///
/// Thread-safe via internal `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    inner: RwLock<Inner>,
}

impl MemoryContentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs stored.
    pub fn len(&self) -> usize {
        self.inner.read().blobs.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().blobs.is_empty()
    }
}

impl ContentStore for MemoryContentStore {
    fn put(&self, bytes: &[u8]) -> CasResult<ContentId> {
        let sha256 = digest(bytes);
        let mut inner = self.inner.write();

        if let Some(id) = inner.by_digest.get(&sha256).copied() {
            if let Some(blob) = inner.blobs.get_mut(&id) {
                blob.refcount += 1;
                return Ok(id);
            }
        }

        inner.next_id += 1;
        let id = ContentId::new(inner.next_id);
        let meta = ContentMeta {
            id,
            sha256: sha256.clone(),
            mimetype: sniff_mimetype(bytes).to_string(),
            size: bytes.len() as u64,
            created: now_millis(),
            last_access: None,
            accessed: 0,
        };
        inner.blobs.insert(
            id,
            Blob {
                bytes: bytes.to_vec(),
                meta,
                refcount: 1,
            },
        );
        inner.by_digest.insert(sha256, id);
        Ok(id)
    }

    fn get(&self, id: ContentId) -> CasResult<Vec<u8>> {
        let mut inner = self.inner.write();
        let blob = inner.blobs.get_mut(&id).ok_or(CasError::NotFound(id))?;
        blob.meta.last_access = Some(now_millis());
        blob.meta.accessed += 1;
        Ok(blob.bytes.clone())
    }

    fn delete(&self, id: ContentId) -> CasResult<()> {
        let mut inner = self.inner.write();
        let blob = inner.blobs.get_mut(&id).ok_or(CasError::NotFound(id))?;
        blob.refcount -= 1;
        if blob.refcount == 0 {
            if let Some(blob) = inner.blobs.remove(&id) {
                inner.by_digest.remove(&blob.meta.sha256);
            }
        }
        Ok(())
    }

    fn meta(&self, id: ContentId) -> CasResult<ContentMeta> {
        self.inner
            .read()
            .blobs
            .get(&id)
            .map(|blob| blob.meta.clone())
            .ok_or(CasError::NotFound(id))
    }
}
