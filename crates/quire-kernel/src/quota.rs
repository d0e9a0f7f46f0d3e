//! Per-tenant quota ledger.
//!
//! Usage is never cached: every call sums the sizes of the blobs the
//! tenant's inodes and files reference. Allocation is a check, not a
//! reservation. Two concurrent writers may both pass `alloc` and together
//! overshoot the limit.

use std::sync::Arc;

use quire_cas::ContentStore;
use quire_types::TenantId;

use crate::db::FsDb;
use crate::error::{FsError, FsResult};
use crate::records::QuotaRecord;

pub struct QuotaLedger {
    db: Arc<FsDb>,
    store: Arc<dyn ContentStore>,
    default_limit: u64,
}

impl QuotaLedger {
    pub fn new(db: Arc<FsDb>, store: Arc<dyn ContentStore>, default_limit: u64) -> Self {
        Self {
            db,
            store,
            default_limit,
        }
    }

    /// Configured limit, or the default when the tenant has no quota row.
    pub fn limit(&self, tenant: TenantId) -> FsResult<u64> {
        Ok(self.db.quota_limit(tenant)?.unwrap_or(self.default_limit))
    }

    /// Bytes currently referenced by the tenant.
    pub fn used(&self, tenant: TenantId) -> FsResult<u64> {
        let mut used = 0u64;
        for content in self.db.tenant_content(tenant)? {
            match self.store.size(content) {
                Ok(size) => used = used.saturating_add(size),
                Err(e) if e.is_not_found() => {
                    tracing::warn!(tenant = %tenant, content = %content, "dangling content reference");
                }
                Err(e) => return Err(FsError::ReadError(e)),
            }
        }
        Ok(used)
    }

    /// `limit - used`, floored at zero.
    pub fn free(&self, tenant: TenantId) -> FsResult<u64> {
        Ok(self.limit(tenant)?.saturating_sub(self.used(tenant)?))
    }

    /// Refuse with `QuotaExceeded` unless `bytes` fit into what is free.
    pub fn alloc(&self, tenant: TenantId, bytes: u64) -> FsResult<()> {
        let limit = self.limit(tenant)?;
        let free = limit.saturating_sub(self.used(tenant)?);
        if bytes > free {
            tracing::info!(tenant = %tenant, requested = bytes, free, limit, "quota exceeded");
            return Err(FsError::QuotaExceeded {
                limit,
                free,
                requested: bytes,
            });
        }
        Ok(())
    }

    /// Set the tenant's limit.
    pub fn set_limit(&self, tenant: TenantId, bytes: u64) -> FsResult<()> {
        self.db.set_quota_limit(tenant, bytes)?;
        tracing::info!(tenant = %tenant, limit = bytes, "quota limit set");
        Ok(())
    }

    pub fn record(&self, tenant: TenantId) -> FsResult<QuotaRecord> {
        let limit = self.limit(tenant)?;
        let used = self.used(tenant)?;
        Ok(QuotaRecord {
            tenant,
            limit,
            used,
            free: limit.saturating_sub(used),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_cas::MemoryContentStore;

    const ACME: TenantId = TenantId::new(1);

    fn ledger(default_limit: u64) -> (QuotaLedger, Arc<FsDb>, Arc<MemoryContentStore>) {
        let db = Arc::new(FsDb::in_memory().unwrap());
        let store = Arc::new(MemoryContentStore::new());
        let ledger = QuotaLedger::new(db.clone(), store.clone(), default_limit);
        (ledger, db, store)
    }

    #[test]
    fn test_default_limit_applies_without_row() {
        let (ledger, _, _) = ledger(100);
        assert_eq!(ledger.limit(ACME).unwrap(), 100);
        ledger.set_limit(ACME, 7).unwrap();
        assert_eq!(ledger.limit(ACME).unwrap(), 7);
    }

    #[test]
    fn test_used_sums_files() {
        let (ledger, db, store) = ledger(100);
        let a = store.put(b"1234").unwrap();
        let b = store.put(b"123456").unwrap();
        db.insert_file("a", ACME, a).unwrap();
        db.insert_file("b", ACME, b).unwrap();
        db.insert_file("other", TenantId::new(2), b).unwrap();

        assert_eq!(ledger.used(ACME).unwrap(), 10);
        assert_eq!(ledger.free(ACME).unwrap(), 90);
    }

    #[test]
    fn test_alloc_boundary() {
        let (ledger, db, store) = ledger(10);
        let c = store.put(b"12345678").unwrap();
        db.insert_file("eight", ACME, c).unwrap();

        assert!(ledger.alloc(ACME, 2).is_ok());
        match ledger.alloc(ACME, 3) {
            Err(FsError::QuotaExceeded {
                limit,
                free,
                requested,
            }) => {
                assert_eq!((limit, free, requested), (10, 2, 3));
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_free_never_negative() {
        let (ledger, db, store) = ledger(4);
        let c = store.put(b"12345678").unwrap();
        db.insert_file("big", ACME, c).unwrap();
        assert_eq!(ledger.free(ACME).unwrap(), 0);
        assert!(ledger.alloc(ACME, 0).is_ok());
        assert!(ledger.alloc(ACME, 1).is_err());
    }

    #[test]
    fn test_record() {
        let (ledger, db, store) = ledger(10);
        let c = store.put(b"abc").unwrap();
        db.insert_file("abc", ACME, c).unwrap();
        let record = ledger.record(ACME).unwrap();
        assert_eq!((record.limit, record.used, record.free), (10, 3, 7));
    }
}
