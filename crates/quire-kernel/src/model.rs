//! Persistent entities and their content accessors.
//!
//! Entities are plain rows. None of them carry bytes; content is reached by
//! asking for a [`ContentRef`] over the entity's content id, which wraps the
//! store explicitly instead of forwarding attribute access.

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use quire_cas::{ContentMeta, ContentStore};
use quire_types::{AccountId, ContentId, FileId, FileMode, InodeId, TenantId, ThumbnailId};

use crate::error::{FsError, FsResult};

/// Separator between path components.
pub const PATHSEP: char = '/';

/// Check a node or file name: non-empty, separator-free, and neither `.`
/// nor `..`.
pub fn validate_name(name: &str) -> FsResult<()> {
    if matches!(name, "" | "." | "..") || name.contains(PATHSEP) {
        return Err(FsError::invalid_file_name(name));
    }
    Ok(())
}

/// Split `name` into stem and extension (with its dot). A leading dot does
/// not start an extension: `".profile"` has none.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// A node in the directory hierarchy.
///
/// There is no separate directory type: a node without content is a
/// directory, a node with content is a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub id: InodeId,
    /// `None` for the root of an owner/tenant scope.
    pub parent: Option<InodeId>,
    pub name: String,
    pub owner: AccountId,
    pub group: TenantId,
    pub mode: FileMode,
    pub content: Option<ContentId>,
    /// Unix millis.
    pub created: u64,
}

impl Inode {
    pub fn is_dir(&self) -> bool {
        self.content.is_none()
    }

    pub fn is_file(&self) -> bool {
        self.content.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A file in a tenant's flat namespace, outside the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub id: FileId,
    pub name: String,
    pub tenant: TenantId,
    pub content: ContentId,
    pub created: u64,
}

/// A cached, scaled-down rendition of an image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub id: ThumbnailId,
    pub parent: FileId,
    /// The bounds this thumbnail was requested for (the cache key).
    pub requested: Resolution,
    /// The actual dimensions after aspect-preserving scaling.
    pub size: Resolution,
    pub content: ContentId,
    pub created: u64,
}

/// Image dimensions in pixels, written `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
        let width = w.trim().parse().map_err(|_| format!("bad width in {s:?}"))?;
        let height = h.trim().parse().map_err(|_| format!("bad height in {s:?}"))?;
        Ok(Self { width, height })
    }
}

/// Anything that may reference a content store blob.
pub trait HasContent {
    fn content_id(&self) -> Option<ContentId>;

    /// Human label for error messages.
    fn label(&self) -> String;
}

impl HasContent for Inode {
    fn content_id(&self) -> Option<ContentId> {
        self.content
    }

    fn label(&self) -> String {
        format!("inode {} ({})", self.id, self.name)
    }
}

impl HasContent for File {
    fn content_id(&self) -> Option<ContentId> {
        Some(self.content)
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

impl HasContent for Thumbnail {
    fn content_id(&self) -> Option<ContentId> {
        Some(self.content)
    }

    fn label(&self) -> String {
        format!("thumbnail {} of file {}", self.id, self.parent)
    }
}

/// Explicit handle on an entity's blob.
#[derive(Clone, Copy)]
pub struct ContentRef<'s> {
    id: ContentId,
    store: &'s dyn ContentStore,
}

impl<'s> ContentRef<'s> {
    /// Content of `entity`, failing with NotAFile for directories.
    pub fn of(store: &'s dyn ContentStore, entity: &impl HasContent) -> FsResult<Self> {
        let id = entity
            .content_id()
            .ok_or_else(|| FsError::not_a_file(entity.label()))?;
        Ok(Self { id, store })
    }

    pub fn id(&self) -> ContentId {
        self.id
    }

    pub fn bytes(&self) -> FsResult<Vec<u8>> {
        self.store.get(self.id).map_err(FsError::ReadError)
    }

    pub fn open(&self) -> FsResult<Box<dyn Read + Send>> {
        self.store.open(self.id).map_err(FsError::ReadError)
    }

    pub fn meta(&self) -> FsResult<ContentMeta> {
        self.store.meta(self.id).map_err(FsError::ReadError)
    }

    pub fn size(&self) -> FsResult<u64> {
        self.store.size(self.id).map_err(FsError::ReadError)
    }

    pub fn mimetype(&self) -> FsResult<String> {
        self.store.mimetype(self.id).map_err(FsError::ReadError)
    }

    pub fn sha256(&self) -> FsResult<String> {
        self.store.sha256(self.id).map_err(FsError::ReadError)
    }
}

impl fmt::Debug for ContentRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentRef").field("id", &self.id).finish()
    }
}
