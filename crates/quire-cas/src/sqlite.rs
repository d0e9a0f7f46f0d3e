//! SQLite-backed content store.
//!
//! Lives in its own database file, separate from the metadata store, so the
//! two can be placed and backed up independently.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use quire_types::{now_millis, ContentId};

use crate::error::{CasError, CasResult};
use crate::sniff::sniff_mimetype;
use crate::store::{digest, ContentMeta, ContentStore};

const SCHEMA: &str = r#"
-- Deduplicated blobs, one row per distinct digest
CREATE TABLE IF NOT EXISTS blobs (
    id INTEGER PRIMARY KEY,
    sha256 TEXT NOT NULL UNIQUE,
    mimetype TEXT NOT NULL,
    size INTEGER NOT NULL,
    bytes BLOB NOT NULL,
    refcount INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    last_access INTEGER,
    accessed INTEGER NOT NULL DEFAULT 0
);
"#;

/// Durable content store.
pub struct SqliteContentStore {
    conn: Mutex<Connection>,
}

impl SqliteContentStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> CasResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> CasResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Current reference count, `None` if the blob is gone.
    pub fn refcount(&self, id: ContentId) -> CasResult<Option<u64>> {
        let conn = self.conn.lock();
        let count = conn
            .query_row(
                "SELECT refcount FROM blobs WHERE id = ?1",
                params![id.get()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(count.map(|c| c as u64))
    }

    /// Number of distinct blobs stored.
    pub fn blob_count(&self) -> CasResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl ContentStore for SqliteContentStore {
    fn put(&self, bytes: &[u8]) -> CasResult<ContentId> {
        let sha256 = digest(bytes);
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;

        let existing = tx
            .query_row(
                "SELECT id FROM blobs WHERE sha256 = ?1",
                params![sha256],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE blobs SET refcount = refcount + 1 WHERE id = ?1",
                    params![id],
                )?;
                tracing::debug!(content = id, sha256 = %sha256, "deduplicated blob");
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO blobs (sha256, mimetype, size, bytes, refcount, created_at)
                     VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                    params![
                        sha256,
                        sniff_mimetype(bytes),
                        bytes.len() as i64,
                        bytes,
                        now_millis() as i64,
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        tx.commit()?;
        Ok(ContentId::new(id))
    }

    fn get(&self, id: ContentId) -> CasResult<Vec<u8>> {
        let conn = self.conn.lock();
        let bytes = conn
            .query_row(
                "SELECT bytes FROM blobs WHERE id = ?1",
                params![id.get()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?
            .ok_or(CasError::NotFound(id))?;

        conn.execute(
            "UPDATE blobs SET last_access = ?1, accessed = accessed + 1 WHERE id = ?2",
            params![now_millis() as i64, id.get()],
        )?;
        Ok(bytes)
    }

    fn delete(&self, id: ContentId) -> CasResult<()> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;

        let changed = tx.execute(
            "UPDATE blobs SET refcount = refcount - 1 WHERE id = ?1",
            params![id.get()],
        )?;
        if changed == 0 {
            return Err(CasError::NotFound(id));
        }
        let removed = tx.execute(
            "DELETE FROM blobs WHERE id = ?1 AND refcount <= 0",
            params![id.get()],
        )?;

        tx.commit()?;
        if removed > 0 {
            tracing::debug!(content = id.get(), "released last reference");
        }
        Ok(())
    }

    fn meta(&self, id: ContentId) -> CasResult<ContentMeta> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT sha256, mimetype, size, created_at, last_access, accessed
             FROM blobs WHERE id = ?1",
            params![id.get()],
            |row| {
                Ok(ContentMeta {
                    id,
                    sha256: row.get(0)?,
                    mimetype: row.get(1)?,
                    size: row.get::<_, i64>(2)? as u64,
                    created: row.get::<_, i64>(3)? as u64,
                    last_access: row.get::<_, Option<i64>>(4)?.map(|t| t as u64),
                    accessed: row.get::<_, i64>(5)? as u64,
                })
            },
        )
        .optional()?
        .ok_or(CasError::NotFound(id))
    }

    fn size(&self, id: ContentId) -> CasResult<u64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT size FROM blobs WHERE id = ?1",
            params![id.get()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .map(|s| s as u64)
        .ok_or(CasError::NotFound(id))
    }
}
