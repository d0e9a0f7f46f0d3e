//! Inode lifecycle.
//!
//! Mechanism only: creation, content replacement, rename, chmod and guarded
//! removal. Permission checks belong to the caller; quota is enforced here
//! because nothing may reach the content store without an allocation.

use std::sync::Arc;

use quire_cas::ContentStore;
use quire_types::{AccountId, ContentId, FileMode, InodeId, TenantId};

use crate::db::FsDb;
use crate::error::{Existing, FsError, FsResult};
use crate::model::{validate_name, Inode};
use crate::quota::QuotaLedger;
use crate::resolver::PathResolver;

/// Name given to scope roots. It never appears in paths.
pub const ROOT_NAME: &str = "root";

pub struct InodeManager {
    db: Arc<FsDb>,
    store: Arc<dyn ContentStore>,
    quota: Arc<QuotaLedger>,
    resolver: PathResolver,
}

impl InodeManager {
    pub fn new(db: Arc<FsDb>, store: Arc<dyn ContentStore>, quota: Arc<QuotaLedger>) -> Self {
        Self {
            resolver: PathResolver::new(db.clone()),
            db,
            store,
            quota,
        }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn get(&self, id: InodeId) -> FsResult<Inode> {
        self.db
            .get_inode(id)?
            .ok_or_else(|| FsError::no_such_node(format!("inode {id}")))
    }

    /// Path for messages; falls back to the bare name if the chain is broken.
    fn describe(&self, inode: &Inode) -> String {
        self.resolver
            .path_of(inode)
            .unwrap_or_else(|_| inode.name.clone())
    }

    /// Root directory of a tenant, created on first use and owned by
    /// `owner`.
    pub fn ensure_root(&self, owner: AccountId, tenant: TenantId) -> FsResult<Inode> {
        if let Some(root) = self.db.scope_root(tenant)? {
            return Ok(root);
        }
        let root = self
            .db
            .insert_inode(None, ROOT_NAME, owner, tenant, FileMode::DIRECTORY, None)?;
        tracing::info!(owner = %owner, tenant = %tenant, inode = %root.id, "created scope root");
        Ok(root)
    }

    /// Create a node below `parent`. With `content` it is a file, without a
    /// directory.
    pub fn create(
        &self,
        parent: &Inode,
        name: &str,
        owner: AccountId,
        tenant: TenantId,
        mode: FileMode,
        content: Option<&[u8]>,
    ) -> FsResult<Inode> {
        validate_name(name)?;
        if !parent.is_dir() {
            return Err(FsError::not_a_directory(self.describe(parent)));
        }
        if let Some(existing) = self.db.child(parent.id, name)? {
            return Err(FsError::FileExists {
                name: name.to_string(),
                existing: Existing::Inode(existing.id),
            });
        }

        let blob = match content {
            Some(bytes) => {
                self.quota.alloc(tenant, bytes.len() as u64)?;
                Some(self.store.put(bytes).map_err(FsError::WriteError)?)
            }
            None => None,
        };

        match self
            .db
            .insert_inode(Some(parent.id), name, owner, tenant, mode, blob)
        {
            Ok(inode) => {
                tracing::debug!(inode = %inode.id, parent = %parent.id, name, "created inode");
                Ok(inode)
            }
            Err(e) => {
                if let Some(blob) = blob {
                    self.release(blob);
                }
                Err(e)
            }
        }
    }

    /// Swap a file's content. The old blob is released only once the row
    /// points at the new one.
    pub fn replace_content(&self, inode: &Inode, bytes: &[u8]) -> FsResult<Inode> {
        let Some(old) = inode.content else {
            return Err(FsError::not_a_file(self.describe(inode)));
        };
        self.quota.alloc(inode.group, bytes.len() as u64)?;

        let new = self.store.put(bytes).map_err(FsError::WriteError)?;
        if let Err(e) = self.db.set_inode_content(inode.id, new) {
            self.release(new);
            return Err(e);
        }
        self.release(old);

        Ok(Inode {
            content: Some(new),
            ..inode.clone()
        })
    }

    /// Rename in place.
    pub fn rename(&self, inode: &Inode, name: &str) -> FsResult<Inode> {
        validate_name(name)?;
        if inode.name == name {
            return Ok(inode.clone());
        }
        if let Some(parent) = inode.parent {
            if let Some(existing) = self.db.child(parent, name)? {
                return Err(FsError::FileExists {
                    name: name.to_string(),
                    existing: Existing::Inode(existing.id),
                });
            }
        }
        self.db.set_inode_name(inode.id, name)?;
        tracing::debug!(inode = %inode.id, from = %inode.name, to = name, "renamed inode");
        Ok(Inode {
            name: name.to_string(),
            ..inode.clone()
        })
    }

    pub fn chmod(&self, inode: &Inode, mode: FileMode) -> FsResult<Inode> {
        self.db.set_inode_mode(inode.id, mode)?;
        Ok(Inode {
            mode,
            ..inode.clone()
        })
    }

    /// Children of a directory, by name.
    pub fn children(&self, inode: &Inode) -> FsResult<Vec<Inode>> {
        if !inode.is_dir() {
            return Err(FsError::not_a_directory(self.describe(inode)));
        }
        self.db.children(inode.id)
    }

    /// Delete a node. Directories with children need `recursive`; the
    /// subtree is then removed depth-first. Scope roots are never removed.
    ///
    /// Returns the removed ids, children before their parents.
    pub fn remove(&self, inode: &Inode, recursive: bool) -> FsResult<Vec<InodeId>> {
        if inode.is_root() {
            return Err(FsError::RootDeletion);
        }
        if inode.is_dir() && !recursive && self.db.child_count(inode.id)? > 0 {
            return Err(FsError::directory_not_empty(self.describe(inode)));
        }

        let mut removed = Vec::new();
        self.remove_subtree(inode, &mut removed)?;
        tracing::info!(inode = %inode.id, count = removed.len(), "removed inode");
        Ok(removed)
    }

    fn remove_subtree(&self, inode: &Inode, removed: &mut Vec<InodeId>) -> FsResult<()> {
        if inode.is_dir() {
            for child in self.db.children(inode.id)? {
                self.remove_subtree(&child, removed)?;
            }
        }
        if self.db.delete_inode(inode.id)? {
            removed.push(inode.id);
        }
        if let Some(content) = inode.content {
            self.release(content);
        }
        Ok(())
    }

    /// Content-bearing inodes of a tenant whose blob has this digest.
    pub fn by_sha256(&self, sha256: &str, tenant: TenantId) -> FsResult<Vec<Inode>> {
        let sha256 = sha256.to_ascii_lowercase();
        let mut found = Vec::new();
        for inode in self.db.content_inodes(tenant)? {
            let Some(content) = inode.content else {
                continue;
            };
            match self.store.sha256(content) {
                Ok(digest) if digest == sha256 => found.push(inode),
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(FsError::ReadError(e)),
            }
        }
        Ok(found)
    }

    /// Drop a blob reference, logging instead of failing.
    fn release(&self, content: ContentId) {
        if let Err(e) = self.store.delete(content) {
            tracing::warn!(content = %content, error = %e, "failed to release blob");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_cas::{digest, MemoryContentStore};

    const OWNER: AccountId = AccountId::new(1);
    const TENANT: TenantId = TenantId::new(1);

    struct Fixture {
        inodes: InodeManager,
        quota: Arc<QuotaLedger>,
        store: Arc<MemoryContentStore>,
        root: Inode,
    }

    fn fixture(limit: u64) -> Fixture {
        let db = Arc::new(FsDb::in_memory().unwrap());
        let store = Arc::new(MemoryContentStore::new());
        let quota = Arc::new(QuotaLedger::new(db.clone(), store.clone(), limit));
        let inodes = InodeManager::new(db, store.clone(), quota.clone());
        let root = inodes.ensure_root(OWNER, TENANT).unwrap();
        Fixture {
            inodes,
            quota,
            store,
            root,
        }
    }

    impl Fixture {
        fn mkdir(&self, parent: &Inode, name: &str) -> Inode {
            self.inodes
                .create(parent, name, OWNER, TENANT, FileMode::DIRECTORY, None)
                .unwrap()
        }

        fn touch(&self, parent: &Inode, name: &str, bytes: &[u8]) -> Inode {
            self.inodes
                .create(parent, name, OWNER, TENANT, FileMode::FILE, Some(bytes))
                .unwrap()
        }
    }

    #[test]
    fn test_ensure_root_is_idempotent() {
        let fx = fixture(100);
        let again = fx.inodes.ensure_root(OWNER, TENANT).unwrap();
        assert_eq!(again.id, fx.root.id);
        assert!(again.is_root());
        assert_eq!(again.name, ROOT_NAME);
    }

    #[test]
    fn test_create_checks_name_and_collisions() {
        let fx = fixture(100);
        let a = fx.mkdir(&fx.root, "a");

        let err = fx
            .inodes
            .create(&fx.root, "a", OWNER, TENANT, FileMode::DIRECTORY, None)
            .unwrap_err();
        assert!(matches!(err, FsError::FileExists { existing: Existing::Inode(id), .. } if id == a.id));

        for bad in ["", "x/y"] {
            assert!(matches!(
                fx.inodes
                    .create(&fx.root, bad, OWNER, TENANT, FileMode::FILE, Some(b"1")),
                Err(FsError::InvalidFileName(_))
            ));
        }
    }

    #[test]
    fn test_create_below_file_fails() {
        let fx = fixture(100);
        let file = fx.touch(&fx.root, "a", b"x");
        let err = fx
            .inodes
            .create(&file, "b", OWNER, TENANT, FileMode::FILE, Some(b"y"))
            .unwrap_err();
        assert!(matches!(err, FsError::NotADirectory(p) if p == "/a"));
    }

    #[test]
    fn test_create_allocates_quota() {
        let fx = fixture(10);
        fx.touch(&fx.root, "a", b"12345678");
        assert_eq!(fx.quota.used(TENANT).unwrap(), 8);

        let err = fx
            .inodes
            .create(&fx.root, "b", OWNER, TENANT, FileMode::FILE, Some(b"123"))
            .unwrap_err();
        assert!(matches!(err, FsError::QuotaExceeded { free: 2, requested: 3, .. }));
        assert_eq!(fx.quota.used(TENANT).unwrap(), 8);
    }

    #[test]
    fn test_replace_content_releases_old_blob() {
        let fx = fixture(100);
        let file = fx.touch(&fx.root, "a", b"old");
        let old = file.content.unwrap();

        let file = fx.inodes.replace_content(&file, b"newer").unwrap();
        assert_ne!(file.content, Some(old));
        assert!(!fx.store.exists(old));
        assert_eq!(fx.quota.used(TENANT).unwrap(), 5);

        // Same bytes again keeps the blob alive through dedup
        let same = fx.inodes.replace_content(&file, b"newer").unwrap();
        assert_eq!(same.content, file.content);
        assert!(fx.store.exists(same.content.unwrap()));
    }

    #[test]
    fn test_replace_content_of_directory() {
        let fx = fixture(100);
        let dir = fx.mkdir(&fx.root, "d");
        assert!(matches!(
            fx.inodes.replace_content(&dir, b"x"),
            Err(FsError::NotAFile(_))
        ));
    }

    #[test]
    fn test_rename_and_chmod() {
        let fx = fixture(100);
        fx.mkdir(&fx.root, "taken");
        let a = fx.mkdir(&fx.root, "a");

        assert!(matches!(
            fx.inodes.rename(&a, "taken"),
            Err(FsError::FileExists { .. })
        ));
        let b = fx.inodes.rename(&a, "b").unwrap();
        assert_eq!(fx.inodes.get(a.id).unwrap().name, "b");

        let locked = fx.inodes.chmod(&b, FileMode::new(0o700)).unwrap();
        assert_eq!(fx.inodes.get(a.id).unwrap().mode, locked.mode);
    }

    #[test]
    fn test_remove_guards() {
        let fx = fixture(100);
        let a = fx.mkdir(&fx.root, "a");
        let f = fx.touch(&a, "f", b"data");

        assert!(matches!(fx.inodes.remove(&fx.root, true), Err(FsError::RootDeletion)));
        assert!(matches!(
            fx.inodes.remove(&a, false),
            Err(FsError::DirectoryNotEmpty(p)) if p == "/a"
        ));
        // Tree unchanged
        assert_eq!(fx.inodes.children(&a).unwrap().len(), 1);

        let removed = fx.inodes.remove(&a, true).unwrap();
        assert_eq!(removed, vec![f.id, a.id]);
        assert!(fx.inodes.children(&fx.root).unwrap().is_empty());
        assert!(!fx.store.exists(f.content.unwrap()));
    }

    #[test]
    fn test_remove_empty_directory_without_recursion() {
        let fx = fixture(100);
        let a = fx.mkdir(&fx.root, "a");
        assert_eq!(fx.inodes.remove(&a, false).unwrap(), vec![a.id]);
    }

    #[test]
    fn test_by_sha256() {
        let fx = fixture(100);
        let a = fx.touch(&fx.root, "a", b"same");
        let b = fx.touch(&fx.root, "b", b"same");
        fx.touch(&fx.root, "c", b"other");

        let found: Vec<_> = fx
            .inodes
            .by_sha256(&digest(b"same").to_uppercase(), TENANT)
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(found, vec![a.id, b.id]);
        assert!(fx.inodes.by_sha256(&digest(b"same"), TenantId::new(2)).unwrap().is_empty());
    }
}
