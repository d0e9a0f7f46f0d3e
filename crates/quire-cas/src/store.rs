//! The content store trait.

use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use quire_types::ContentId;

use crate::error::CasResult;

/// Metadata kept alongside every blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMeta {
    pub id: ContentId,
    /// Lowercase hex SHA-256 of the bytes.
    pub sha256: String,
    pub mimetype: String,
    pub size: u64,
    /// Unix millis.
    pub created: u64,
    /// Unix millis of the last read, if any.
    pub last_access: Option<u64>,
    /// Number of reads.
    pub accessed: u64,
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Blob storage keyed by opaque ids.
///
/// Implementations deduplicate by digest and reference-count: `put` of bytes
/// already present returns the existing id, and `delete` only removes the
/// bytes once every `put` has been matched by a `delete`.
///
/// Reads through [`get`](Self::get) and [`open`](Self::open) count as access
/// and update `last_access` / `accessed`; [`meta`](Self::meta) does not.
pub trait ContentStore: Send + Sync {
    /// Store bytes and return a reference to them.
    fn put(&self, bytes: &[u8]) -> CasResult<ContentId>;

    /// Read the full contents.
    fn get(&self, id: ContentId) -> CasResult<Vec<u8>>;

    /// Drop one reference to a blob.
    fn delete(&self, id: ContentId) -> CasResult<()>;

    /// Blob metadata without touching access statistics.
    fn meta(&self, id: ContentId) -> CasResult<ContentMeta>;

    /// Open a reader over the contents.
    fn open(&self, id: ContentId) -> CasResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.get(id)?)))
    }

    /// Size in bytes.
    fn size(&self, id: ContentId) -> CasResult<u64> {
        Ok(self.meta(id)?.size)
    }

    /// Detected MIME type.
    fn mimetype(&self, id: ContentId) -> CasResult<String> {
        Ok(self.meta(id)?.mimetype)
    }

    /// Hex SHA-256 digest.
    fn sha256(&self, id: ContentId) -> CasResult<String> {
        Ok(self.meta(id)?.sha256)
    }

    /// Whether the blob exists.
    fn exists(&self, id: ContentId) -> bool {
        self.meta(id).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_known_value() {
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
