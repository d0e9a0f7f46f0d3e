//! quire kernel: a multi-tenant virtual file system.
//!
//! The kernel layers a POSIX-like hierarchy and a flat per-tenant file
//! namespace over two stores: a SQLite metadata database ([`FsDb`]) and a
//! content store holding the bytes ([`quire_cas::ContentStore`]).
//!
//! # Layout
//!
//! ```text
//! Quire (kernel.rs)          ← built once from QuireConfig
//!   ├── QuotaLedger          ← used / free / alloc per tenant
//!   ├── InodeManager         ← create, replace, rename, chmod, remove
//!   │     └── PathResolver   ← path → chain root..target
//!   └── FileManager          ← flat files, thumbnails, PDF pages, delete hooks
//!
//! Session (session.rs)       ← one principal; permission checks, contract surface
//! ```
//!
//! Permission evaluation is pure ([`permissions`]); the managers never check
//! permissions themselves, the session does before calling them.

pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod hooks;
pub mod inodes;
pub mod kernel;
pub mod model;
pub mod pdf;
pub mod permissions;
pub mod quota;
pub mod records;
pub mod resolver;
pub mod session;
pub mod stream;
pub mod thumbnail;

pub use config::{ConfigError, QuireConfig};
pub use db::FsDb;
pub use error::{Existing, FsError, FsResult};
pub use files::{FileManager, Rendition};
pub use hooks::{Deleted, HookError, HookRegistry};
pub use inodes::InodeManager;
pub use kernel::Quire;
pub use model::{ContentRef, File, HasContent, Inode, Resolution, Thumbnail};
pub use pdf::{PageFormat, PdfRasterizer};
pub use quota::QuotaLedger;
pub use records::{BatchReport, FileRecord, InodeRecord, Listing, NodeKind, PagesRecord, QuotaRecord};
pub use resolver::{PathResolver, Resolved, Scope};
pub use session::{Delivery, Fetched, Session};
pub use stream::FileStream;
pub use thumbnail::{ImageThumbnailer, Thumbnailer};

pub use quire_types::{AccountId, FileId, FileMode, InodeId, Principal, TenantId};
