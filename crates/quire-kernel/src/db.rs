//! SQLite persistence for inodes, files, thumbnails, and quotas.
//!
//! Rows only. Bytes live in the content store; every content column here is
//! a [`ContentId`] into it. Name uniqueness is backed by UNIQUE indexes so a
//! lost check-then-insert race still surfaces as `FileExists`.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use quire_types::{
    now_millis, AccountId, ContentId, FileId, FileMode, InodeId, TenantId, ThumbnailId,
};

use crate::error::{is_unique_violation, Existing, FsError, FsResult};
use crate::model::{File, Inode, Resolution, Thumbnail};

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Directory hierarchy; content IS NULL means directory
CREATE TABLE IF NOT EXISTS inodes (
    id INTEGER PRIMARY KEY,
    parent INTEGER REFERENCES inodes(id),
    name TEXT NOT NULL,
    owner INTEGER NOT NULL,
    grp INTEGER NOT NULL,
    mode INTEGER NOT NULL,
    content INTEGER,
    created_at INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_inodes_sibling ON inodes(parent, name);
CREATE INDEX IF NOT EXISTS idx_inodes_scope ON inodes(grp) WHERE parent IS NULL;

-- Flat per-tenant files
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    tenant INTEGER NOT NULL,
    content INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (tenant, name)
);

-- Cached renditions, keyed by requested bounds
CREATE TABLE IF NOT EXISTS thumbnails (
    id INTEGER PRIMARY KEY,
    parent INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    req_x INTEGER NOT NULL,
    req_y INTEGER NOT NULL,
    size_x INTEGER NOT NULL,
    size_y INTEGER NOT NULL,
    content INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (parent, req_x, req_y)
);

-- Explicit per-tenant limits; absent rows fall back to the configured default
CREATE TABLE IF NOT EXISTS quotas (
    tenant INTEGER PRIMARY KEY,
    limit_bytes INTEGER NOT NULL
);
"#;

const INODE_COLUMNS: &str = "id, parent, name, owner, grp, mode, content, created_at";
const FILE_COLUMNS: &str = "id, name, tenant, content, created_at";
const THUMBNAIL_COLUMNS: &str = "id, parent, req_x, req_y, size_x, size_y, content, created_at";

fn inode_from_row(row: &Row<'_>) -> rusqlite::Result<Inode> {
    Ok(Inode {
        id: InodeId::new(row.get(0)?),
        parent: row.get::<_, Option<i64>>(1)?.map(InodeId::new),
        name: row.get(2)?,
        owner: AccountId::new(row.get(3)?),
        group: TenantId::new(row.get(4)?),
        mode: FileMode::new(row.get::<_, i64>(5)? as u16),
        content: row.get::<_, Option<i64>>(6)?.map(ContentId::new),
        created: row.get::<_, i64>(7)? as u64,
    })
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<File> {
    Ok(File {
        id: FileId::new(row.get(0)?),
        name: row.get(1)?,
        tenant: TenantId::new(row.get(2)?),
        content: ContentId::new(row.get(3)?),
        created: row.get::<_, i64>(4)? as u64,
    })
}

fn thumbnail_from_row(row: &Row<'_>) -> rusqlite::Result<Thumbnail> {
    Ok(Thumbnail {
        id: ThumbnailId::new(row.get(0)?),
        parent: FileId::new(row.get(1)?),
        requested: Resolution::new(row.get::<_, i64>(2)? as u32, row.get::<_, i64>(3)? as u32),
        size: Resolution::new(row.get::<_, i64>(4)? as u32, row.get::<_, i64>(5)? as u32),
        content: ContentId::new(row.get(6)?),
        created: row.get::<_, i64>(7)? as u64,
    })
}

/// Metadata database handle.
pub struct FsDb {
    conn: Mutex<Connection>,
}

impl FsDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> FsResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> FsResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ========================================================================
    // Inodes
    // ========================================================================

    /// Insert an inode row. A sibling with the same name yields `FileExists`.
    pub fn insert_inode(
        &self,
        parent: Option<InodeId>,
        name: &str,
        owner: AccountId,
        group: TenantId,
        mode: FileMode,
        content: Option<ContentId>,
    ) -> FsResult<Inode> {
        let created = now_millis();
        let inserted = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO inodes (parent, name, owner, grp, mode, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    parent.map(InodeId::get),
                    name,
                    owner.get(),
                    group.get(),
                    mode.bits() as i64,
                    content.map(ContentId::get),
                    created as i64,
                ],
            )
            .map(|_| conn.last_insert_rowid())
        };

        match inserted {
            Ok(id) => Ok(Inode {
                id: InodeId::new(id),
                parent,
                name: name.to_string(),
                owner,
                group,
                mode,
                content,
                created,
            }),
            Err(e) if is_unique_violation(&e) => Err(self.sibling_conflict(parent, name, e)),
            Err(e) => Err(e.into()),
        }
    }

    fn sibling_conflict(&self, parent: Option<InodeId>, name: &str, e: rusqlite::Error) -> FsError {
        let Some(parent) = parent else {
            return e.into();
        };
        match self.child(parent, name) {
            Ok(Some(existing)) => FsError::FileExists {
                name: name.to_string(),
                existing: Existing::Inode(existing.id),
            },
            Ok(None) => e.into(),
            Err(lookup) => lookup,
        }
    }

    /// Get an inode by id.
    pub fn get_inode(&self, id: InodeId) -> FsResult<Option<Inode>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {INODE_COLUMNS} FROM inodes WHERE id = ?1");
        Ok(conn
            .query_row(&sql, params![id.get()], inode_from_row)
            .optional()?)
    }

    /// The root directory of a tenant: its oldest parentless inode.
    pub fn scope_root(&self, tenant: TenantId) -> FsResult<Option<Inode>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {INODE_COLUMNS} FROM inodes WHERE parent IS NULL AND grp = ?1 ORDER BY id LIMIT 1"
        );
        Ok(conn
            .query_row(&sql, params![tenant.get()], inode_from_row)
            .optional()?)
    }

    /// Look up a child by name.
    pub fn child(&self, parent: InodeId, name: &str) -> FsResult<Option<Inode>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {INODE_COLUMNS} FROM inodes WHERE parent = ?1 AND name = ?2");
        Ok(conn
            .query_row(&sql, params![parent.get(), name], inode_from_row)
            .optional()?)
    }

    /// Children of a directory, ordered by name.
    pub fn children(&self, parent: InodeId) -> FsResult<Vec<Inode>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {INODE_COLUMNS} FROM inodes WHERE parent = ?1 ORDER BY name");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![parent.get()], inode_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Number of children of a directory.
    pub fn child_count(&self, parent: InodeId) -> FsResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM inodes WHERE parent = ?1",
            params![parent.get()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Content-bearing inodes of a tenant.
    pub fn content_inodes(&self, tenant: TenantId) -> FsResult<Vec<Inode>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {INODE_COLUMNS} FROM inodes WHERE grp = ?1 AND content IS NOT NULL ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![tenant.get()], inode_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Rename an inode in place.
    pub fn set_inode_name(&self, id: InodeId, name: &str) -> FsResult<()> {
        let (parent, result) = {
            let conn = self.conn.lock();
            let parent = conn
                .query_row(
                    "SELECT parent FROM inodes WHERE id = ?1",
                    params![id.get()],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .optional()?
                .ok_or_else(|| FsError::no_such_node(format!("inode {id}")))?;
            let result = conn.execute(
                "UPDATE inodes SET name = ?1 WHERE id = ?2",
                params![name, id.get()],
            );
            (parent.map(InodeId::new), result)
        };
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(self.sibling_conflict(parent, name, e)),
            Err(e) => Err(e.into()),
        }
    }

    /// Change an inode's mode bits.
    pub fn set_inode_mode(&self, id: InodeId, mode: FileMode) -> FsResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE inodes SET mode = ?1 WHERE id = ?2",
            params![mode.bits() as i64, id.get()],
        )?;
        Ok(())
    }

    /// Point an inode at a different blob.
    pub fn set_inode_content(&self, id: InodeId, content: ContentId) -> FsResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE inodes SET content = ?1 WHERE id = ?2",
            params![content.get(), id.get()],
        )?;
        Ok(())
    }

    /// Delete a single inode row. Returns whether a row was removed.
    pub fn delete_inode(&self, id: InodeId) -> FsResult<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM inodes WHERE id = ?1", params![id.get()])?;
        Ok(removed > 0)
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// Insert a file row. A same-named file of the tenant yields `FileExists`.
    pub fn insert_file(&self, name: &str, tenant: TenantId, content: ContentId) -> FsResult<File> {
        let created = now_millis();
        let inserted = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO files (name, tenant, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![name, tenant.get(), content.get(), created as i64],
            )
            .map(|_| conn.last_insert_rowid())
        };

        match inserted {
            Ok(id) => Ok(File {
                id: FileId::new(id),
                name: name.to_string(),
                tenant,
                content,
                created,
            }),
            Err(e) if is_unique_violation(&e) => match self.file_by_name(tenant, name)? {
                Some(existing) => Err(FsError::FileExists {
                    name: name.to_string(),
                    existing: Existing::File(existing.id),
                }),
                None => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Get a file by id.
    pub fn get_file(&self, id: FileId) -> FsResult<Option<File>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1");
        Ok(conn
            .query_row(&sql, params![id.get()], file_from_row)
            .optional()?)
    }

    /// Get a tenant's file by name.
    pub fn file_by_name(&self, tenant: TenantId, name: &str) -> FsResult<Option<File>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE tenant = ?1 AND name = ?2");
        Ok(conn
            .query_row(&sql, params![tenant.get(), name], file_from_row)
            .optional()?)
    }

    /// All files of a tenant, oldest first.
    pub fn list_files(&self, tenant: TenantId) -> FsResult<Vec<File>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE tenant = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![tenant.get()], file_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete a file row; its thumbnail rows go with it.
    pub fn delete_file(&self, id: FileId) -> FsResult<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM files WHERE id = ?1", params![id.get()])?;
        Ok(removed > 0)
    }

    // ========================================================================
    // Thumbnails
    // ========================================================================

    /// Cached thumbnail for exactly these requested bounds.
    pub fn thumbnail(&self, parent: FileId, requested: Resolution) -> FsResult<Option<Thumbnail>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {THUMBNAIL_COLUMNS} FROM thumbnails
             WHERE parent = ?1 AND req_x = ?2 AND req_y = ?3"
        );
        Ok(conn
            .query_row(
                &sql,
                params![parent.get(), requested.width as i64, requested.height as i64],
                thumbnail_from_row,
            )
            .optional()?)
    }

    /// All thumbnails of a file.
    pub fn thumbnails_of(&self, parent: FileId) -> FsResult<Vec<Thumbnail>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {THUMBNAIL_COLUMNS} FROM thumbnails WHERE parent = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![parent.get()], thumbnail_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Record a generated thumbnail.
    pub fn insert_thumbnail(
        &self,
        parent: FileId,
        requested: Resolution,
        size: Resolution,
        content: ContentId,
    ) -> FsResult<Thumbnail> {
        let created = now_millis();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO thumbnails (parent, req_x, req_y, size_x, size_y, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                parent.get(),
                requested.width as i64,
                requested.height as i64,
                size.width as i64,
                size.height as i64,
                content.get(),
                created as i64,
            ],
        )?;
        Ok(Thumbnail {
            id: ThumbnailId::new(conn.last_insert_rowid()),
            parent,
            requested,
            size,
            content,
            created,
        })
    }

    // ========================================================================
    // Quotas
    // ========================================================================

    /// Explicit limit for a tenant, if one was set.
    pub fn quota_limit(&self, tenant: TenantId) -> FsResult<Option<u64>> {
        let conn = self.conn.lock();
        let limit = conn
            .query_row(
                "SELECT limit_bytes FROM quotas WHERE tenant = ?1",
                params![tenant.get()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(limit.map(|l| l.max(0) as u64))
    }

    /// Set or replace a tenant's limit.
    pub fn set_quota_limit(&self, tenant: TenantId, bytes: u64) -> FsResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO quotas (tenant, limit_bytes) VALUES (?1, ?2)
             ON CONFLICT(tenant) DO UPDATE SET limit_bytes = excluded.limit_bytes",
            params![tenant.get(), bytes.min(i64::MAX as u64) as i64],
        )?;
        Ok(())
    }

    /// Blobs referenced by a tenant's inodes and files.
    pub fn tenant_content(&self, tenant: TenantId) -> FsResult<Vec<ContentId>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT content FROM inodes WHERE grp = ?1 AND content IS NOT NULL
             UNION ALL
             SELECT content FROM files WHERE tenant = ?1",
        )?;
        let rows = stmt.query_map(params![tenant.get()], |row| row.get::<_, i64>(0))?;
        rows.map(|r| r.map(ContentId::new).map_err(FsError::from))
            .collect()
    }
}
