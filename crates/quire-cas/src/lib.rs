//! Content addressable blob storage for quire.
//!
//! Blobs are stored once per distinct SHA-256 digest and handed out by an
//! opaque [`ContentId`]. Every `put` of the same bytes returns the same id
//! and bumps a reference count; every `delete` drops one reference and the
//! bytes go away with the last one. Records in the metadata store hold only
//! the id, never the bytes.
//!
//! Key components:
//!
//! - [`ContentStore`] - The trait the core consumes
//! - [`SqliteContentStore`] - Durable store in its own SQLite database
//! - [`MemoryContentStore`] - Ephemeral store for tests and scratch use
//! - [`sniff_mimetype`] - Magic-byte MIME detection applied on `put`

mod error;
mod memory;
mod sniff;
mod sqlite;
mod store;

pub use error::{CasError, CasResult};
pub use memory::MemoryContentStore;
pub use sniff::{sniff_mimetype, OCTET_STREAM};
pub use sqlite::SqliteContentStore;
pub use store::{digest, ContentMeta, ContentStore};

pub use quire_types::ContentId;
