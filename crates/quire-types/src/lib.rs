//! Shared identity and permission types for quire.
//!
//! This crate is the leaf of the workspace: typed row identifiers, the acting
//! principal, and POSIX-style mode bits. It has **no internal quire
//! dependencies** and knows nothing about storage.
//!
//! # Entity Overview
//!
//! ```text
//! Tenant (TenantId) ← customer / group, bounds visibility and quota
//!     └── has Accounts (AccountId)
//!     └── owns Inodes (InodeId) in a directory hierarchy
//!     └── owns Files (FileId) in a flat namespace
//!             └── derives Thumbnails (ThumbnailId)
//!
//! Inode / File / Thumbnail
//!     └── references a blob in the content store (ContentId)
//! ```
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`Principal`]     | Who is acting (account + tenant + root flag) |
//! | [`FileMode`]      | Owner / group / other rwx triads             |
//! | [`Access`]        | A single read / write / execute request      |
//! | [`InodeId`]       | Hierarchy node                               |
//! | [`FileId`]        | Flat file entity                             |
//! | [`ContentId`]     | Opaque content store reference               |
//! |-------------------|----------------------------------------------|

pub mod ids;
pub mod mode;
pub mod principal;

pub use ids::{AccountId, ContentId, FileId, InodeId, TenantId, ThumbnailId};
pub use mode::{Access, Class, FileMode, ModeParseError};
pub use principal::Principal;

/// Current time as Unix milliseconds. Used for created/accessed timestamps.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
