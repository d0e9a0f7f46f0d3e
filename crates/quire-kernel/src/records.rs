//! Serializable records handed to the boundary layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use quire_cas::ContentMeta;
use quire_types::{AccountId, FileId, InodeId, TenantId};

use crate::model::{File, Inode};

/// Metadata of a flat file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub mimetype: String,
    pub sha256: String,
    pub size: u64,
    pub created: u64,
    pub last_access: Option<u64>,
    pub access_count: u64,
}

impl FileRecord {
    pub fn new(file: &File, meta: &ContentMeta) -> Self {
        Self {
            id: file.id,
            name: file.name.clone(),
            mimetype: meta.mimetype.clone(),
            sha256: meta.sha256.clone(),
            size: meta.size,
            created: file.created,
            last_access: meta.last_access,
            access_count: meta.accessed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// Metadata of a hierarchy node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InodeRecord {
    pub id: InodeId,
    pub name: String,
    pub path: String,
    pub kind: NodeKind,
    pub owner: AccountId,
    pub group: TenantId,
    /// Octal, e.g. `"755"`.
    pub mode: String,
    pub created: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_access: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub access_count: Option<u64>,
}

impl InodeRecord {
    /// Build a record; `meta` is the blob metadata for files, `None` for
    /// directories.
    pub fn new(inode: &Inode, path: String, meta: Option<&ContentMeta>) -> Self {
        Self {
            id: inode.id,
            name: inode.name.clone(),
            path,
            kind: if inode.is_dir() {
                NodeKind::Directory
            } else {
                NodeKind::File
            },
            owner: inode.owner,
            group: inode.group,
            mode: format!("{:o}", inode.mode.bits()),
            created: inode.created,
            mimetype: meta.map(|m| m.mimetype.clone()),
            sha256: meta.map(|m| m.sha256.clone()),
            size: meta.map(|m| m.size),
            last_access: meta.and_then(|m| m.last_access),
            access_count: meta.map(|m| m.accessed),
        }
    }
}

/// Nested directory listing. Children of a directory the principal may not
/// traverse are left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(flatten)]
    pub node: InodeRecord,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub children: Option<Vec<Listing>>,
}

impl Listing {
    /// Total number of nodes in this listing, itself included.
    pub fn count(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(Listing::count)
            .sum::<usize>()
    }

    /// Find a descendant by name path relative to this node.
    pub fn find(&self, names: &[&str]) -> Option<&Listing> {
        match names.split_first() {
            None => Some(self),
            Some((first, rest)) => self
                .children
                .iter()
                .flatten()
                .find(|child| child.node.name == *first)
                .and_then(|child| child.find(rest)),
        }
    }
}

/// Quota state of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRecord {
    pub tenant: TenantId,
    pub limit: u64,
    pub used: u64,
    pub free: u64,
}

/// Per-item outcome of a batch create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Requested name to new file id.
    pub created: BTreeMap<String, FileId>,
    /// Name of the colliding file to its id.
    pub existing: BTreeMap<String, FileId>,
    pub too_large: Vec<String>,
    pub quota_exceeded: Vec<String>,
    /// Names that are not valid file names.
    pub invalid: Vec<String>,
    /// Any other per-item error, by name. Items before and after a failure
    /// are still processed and stay stored.
    pub failed: BTreeMap<String, String>,
}

impl BatchReport {
    /// 400 when anything was refused or failed, 200 otherwise. Collisions
    /// alone do not fail the batch.
    pub fn status(&self) -> u16 {
        if self.refused() == 0 { 200 } else { 400 }
    }

    /// Number of items that were not stored and have no existing file.
    pub fn refused(&self) -> usize {
        self.too_large.len() + self.quota_exceeded.len() + self.invalid.len() + self.failed.len()
    }
}

/// Result of rasterizing a PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagesRecord {
    /// One file per page, in page order.
    pub pages: Vec<FileId>,
}
