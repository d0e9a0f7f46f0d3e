//! Typed identifiers for accounts, tenants, inodes, files, and content.
//!
//! Every ID wraps the signed 64-bit rowid the relational store hands out.
//! They are opaque to callers: the only way to get one is from a record the
//! store returned, or by parsing a decimal string at the boundary. They
//! serialize as bare integers so JSON records stay flat.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An account identifier (the acting user).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

/// A tenant identifier (customer / group scope).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(i64);

/// A node in the directory hierarchy.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InodeId(i64);

/// A file in a tenant's flat namespace.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(i64);

/// A cached thumbnail derived from a file.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThumbnailId(i64);

/// A blob in the content store.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(i64);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_row_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Wrap a raw rowid.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw rowid, for binding into queries.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $T {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$T> for i64 {
            fn from(id: $T) -> i64 {
                id.0
            }
        }

        impl FromStr for $T {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.0)
            }
        }
    };
}

impl_row_id!(AccountId, "AccountId");
impl_row_id!(TenantId, "TenantId");
impl_row_id!(InodeId, "InodeId");
impl_row_id!(FileId, "FileId");
impl_row_id!(ThumbnailId, "ThumbnailId");
impl_row_id!(ContentId, "ContentId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_bare_integer() {
        assert_eq!(InodeId::new(42).to_string(), "42");
        assert_eq!(format!("{:?}", InodeId::new(42)), "InodeId(42)");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let id: FileId = " 17 ".parse().unwrap();
        assert_eq!(id.get(), 17);
        assert!("abc".parse::<FileId>().is_err());
    }

    #[test]
    fn test_serializes_transparently() {
        let json = serde_json::to_string(&ContentId::new(9)).unwrap();
        assert_eq!(json, "9");
        let parsed: ContentId = serde_json::from_str("9").unwrap();
        assert_eq!(parsed, ContentId::new(9));
    }

    #[test]
    fn test_distinct_types_do_not_mix() {
        // Same raw value, different meaning; only equal within a type.
        let a = TenantId::new(1);
        let b = TenantId::from(1);
        assert_eq!(a, b);
        assert_eq!(i64::from(AccountId::new(1)), a.get());
    }
}
