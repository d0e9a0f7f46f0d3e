//! The acting principal.
//!
//! A `Principal` is whoever a request runs as: an account, the tenant it acts
//! within, and whether it is a super-user. The identity layer in front of
//! quire authenticates and builds one; quire only evaluates it.

use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, TenantId};

/// An account acting within a tenant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// The acting account.
    pub account: AccountId,
    /// The tenant the account acts within.
    pub tenant: TenantId,
    /// Super-users bypass every permission check.
    #[serde(default)]
    pub root: bool,
}

impl Principal {
    /// A regular account.
    pub fn new(account: AccountId, tenant: TenantId) -> Self {
        Self {
            account,
            tenant,
            root: false,
        }
    }

    /// A super-user account.
    pub fn superuser(account: AccountId, tenant: TenantId) -> Self {
        Self {
            account,
            tenant,
            root: true,
        }
    }

    /// Whether permission checks are bypassed.
    pub fn is_root(&self) -> bool {
        self.root
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "account {}@tenant {}", self.account, self.tenant)?;
        if self.root {
            write!(f, " (root)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
