//! The assembled file system.
//!
//! `Quire` owns the stores and wires the components together once at
//! startup. Requests go through a [`Session`] bound to one principal.

use std::path::Path;
use std::sync::Arc;

use quire_cas::{ContentStore, MemoryContentStore, SqliteContentStore};
use quire_types::Principal;

use crate::config::{QuireConfig, IN_MEMORY};
use crate::db::FsDb;
use crate::error::{FsError, FsResult};
use crate::files::FileManager;
use crate::hooks::HookRegistry;
use crate::inodes::InodeManager;
use crate::pdf::PdfRasterizer;
use crate::quota::QuotaLedger;
use crate::session::Session;
use crate::thumbnail::Thumbnailer;

pub struct Quire {
    pub(crate) config: QuireConfig,
    pub(crate) store: Arc<dyn ContentStore>,
    pub(crate) quota: Arc<QuotaLedger>,
    pub(crate) inodes: InodeManager,
    pub(crate) files: FileManager,
}

fn is_in_memory(path: &Path) -> bool {
    path.as_os_str() == IN_MEMORY
}

impl Quire {
    /// Open both stores as configured and register `hooks`.
    pub fn open(config: QuireConfig, hooks: HookRegistry) -> FsResult<Self> {
        let storage = &config.storage;
        let db = if is_in_memory(&storage.database) {
            FsDb::in_memory()?
        } else {
            FsDb::open(&storage.database)?
        };
        let store = if is_in_memory(&storage.content_database) {
            SqliteContentStore::in_memory()
        } else {
            SqliteContentStore::open(&storage.content_database)
        }
        .map_err(FsError::StoreUnavailable)?;

        tracing::info!(
            database = %storage.database.display(),
            content = %storage.content_database.display(),
            "opened quire stores"
        );
        Ok(Self::assemble(config, Arc::new(db), Arc::new(store), hooks))
    }

    /// Fully in-memory instance without hooks (for testing).
    pub fn in_memory(config: QuireConfig) -> FsResult<Self> {
        let db = FsDb::in_memory()?;
        Ok(Self::assemble(
            config,
            Arc::new(db),
            Arc::new(MemoryContentStore::new()),
            HookRegistry::new(),
        ))
    }

    /// Wire components over existing stores.
    pub fn assemble(
        config: QuireConfig,
        db: Arc<FsDb>,
        store: Arc<dyn ContentStore>,
        hooks: HookRegistry,
    ) -> Self {
        let quota = Arc::new(QuotaLedger::new(
            db.clone(),
            store.clone(),
            config.quota.default_bytes,
        ));
        let inodes = InodeManager::new(db.clone(), store.clone(), quota.clone());
        let files = FileManager::new(db, store.clone(), quota.clone(), &config.files)
            .with_hooks(Arc::new(hooks), config.hooks.on_delete.clone());

        Self {
            config,
            store,
            quota,
            inodes,
            files,
        }
    }

    /// Replace the thumbnail renderer.
    pub fn with_thumbnailer(mut self, thumbnailer: Arc<dyn Thumbnailer>) -> Self {
        self.files = self.files.with_thumbnailer(thumbnailer);
        self
    }

    /// Enable PDF conversion.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PdfRasterizer>) -> Self {
        self.files = self.files.with_rasterizer(rasterizer);
        self
    }

    /// Act as `principal`.
    pub fn session(&self, principal: Principal) -> Session<'_> {
        Session::new(self, principal)
    }

    pub fn config(&self) -> &QuireConfig {
        &self.config
    }

    pub fn quota(&self) -> &QuotaLedger {
        &self.quota
    }

    pub fn inodes(&self) -> &InodeManager {
        &self.inodes
    }

    pub fn files(&self) -> &FileManager {
        &self.files
    }

    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_types::{AccountId, TenantId};

    #[test]
    fn test_open_in_memory_from_default_config() {
        let quire = Quire::open(QuireConfig::default(), HookRegistry::new()).unwrap();
        let root = quire
            .inodes()
            .ensure_root(AccountId::new(1), TenantId::new(1))
            .unwrap();
        assert!(root.is_root());
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = QuireConfig::default();
        config.storage.database = dir.path().join("fs.db");
        config.storage.content_database = dir.path().join("content.db");

        let tenant = TenantId::new(3);
        let id = {
            let quire = Quire::open(config.clone(), HookRegistry::new()).unwrap();
            quire.files().add("a.txt", tenant, b"kept", false).unwrap().id
        };

        let quire = Quire::open(config, HookRegistry::new()).unwrap();
        let file = quire.files().get(id).unwrap();
        assert_eq!(quire.files().content(&file).unwrap().bytes().unwrap(), b"kept");
        assert_eq!(quire.quota().used(tenant).unwrap(), 4);
    }

    #[test]
    fn test_default_quota_from_config() {
        let quire = Quire::in_memory(QuireConfig::default().with_default_quota(42)).unwrap();
        assert_eq!(quire.quota().limit(TenantId::new(1)).unwrap(), 42);
    }
}
