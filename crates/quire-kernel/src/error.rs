//! Filesystem error types.
//!
//! Every failure the core can raise is a typed [`FsError`] variant. The
//! boundary layer translates them with [`FsError::status`]; nothing in the
//! core swallows a logical error.

use quire_cas::CasError;
use quire_types::{FileId, InodeId};
use rusqlite::ffi;
use thiserror::Error;

/// The entity a name collision ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existing {
    Inode(InodeId),
    File(FileId),
}

impl Existing {
    /// Raw id of the conflicting entity.
    pub fn id(&self) -> i64 {
        match self {
            Existing::Inode(id) => id.get(),
            Existing::File(id) => id.get(),
        }
    }
}

/// Filesystem error type.
#[derive(Debug, Error)]
pub enum FsError {
    /// Path lookup failed at the given prefix.
    #[error("no such node: {0}")]
    NoSuchNode(String),

    /// File lookup by id or name failed.
    #[error("no such file: {0}")]
    NoSuchFile(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Non-recursive delete of a populated directory.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// The scope root cannot be deleted.
    #[error("cannot delete the root directory")]
    RootDeletion,

    /// Name collision on create or rename.
    #[error("file exists: {name}")]
    FileExists { name: String, existing: Existing },

    /// Empty name or name containing the separator.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    /// Read permission denied.
    #[error("not readable: {0}")]
    NotReadable(String),

    /// Write permission denied.
    #[error("not writable: {0}")]
    NotWritable(String),

    /// Execute (traversal) permission denied.
    #[error("not executable: {0}")]
    NotExecutable(String),

    /// Allocation refused by the tenant's quota.
    #[error("quota exceeded: requested {requested} bytes, {free} of {limit} free")]
    QuotaExceeded { limit: u64, free: u64, requested: u64 },

    /// Content store read failed.
    #[error("read error: {0}")]
    ReadError(#[source] CasError),

    /// Content store write failed.
    #[error("write error: {0}")]
    WriteError(#[source] CasError),

    /// Thumbnail or conversion requested on an incompatible type.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// PDF conversion requested on something that is not a PDF.
    #[error("not a PDF document")]
    NotAPdf,

    /// Rename-on-conflict ran out of suffixes.
    #[error("no free name for {name:?} after {attempts} attempts")]
    RenameExhausted { name: String, attempts: u32 },

    /// Image or PDF collaborator failed.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// No PDF rasterizer was registered.
    #[error("no PDF rasterizer configured")]
    RasterizerUnavailable,

    /// The store refused because other rows still reference this one.
    #[error("in use: {0}")]
    InUse(String),

    /// The content store could not be opened.
    #[error("content store unavailable: {0}")]
    StoreUnavailable(#[source] CasError),

    /// Metadata store failure.
    #[error("database error: {0}")]
    Db(rusqlite::Error),
}

impl FsError {
    /// Create a NoSuchNode error.
    pub fn no_such_node(path: impl Into<String>) -> Self {
        Self::NoSuchNode(path.into())
    }

    /// Create a NoSuchFile error.
    pub fn no_such_file(what: impl ToString) -> Self {
        Self::NoSuchFile(what.to_string())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create a NotAFile error.
    pub fn not_a_file(path: impl Into<String>) -> Self {
        Self::NotAFile(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create an InvalidFileName error.
    pub fn invalid_file_name(name: impl Into<String>) -> Self {
        Self::InvalidFileName(name.into())
    }

    /// Create a NotReadable error.
    pub fn not_readable(path: impl Into<String>) -> Self {
        Self::NotReadable(path.into())
    }

    /// Create a NotWritable error.
    pub fn not_writable(path: impl Into<String>) -> Self {
        Self::NotWritable(path.into())
    }

    /// Create a NotExecutable error.
    pub fn not_executable(path: impl Into<String>) -> Self {
        Self::NotExecutable(path.into())
    }

    /// Whether this is a permission denial.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            FsError::NotReadable(_) | FsError::NotWritable(_) | FsError::NotExecutable(_)
        )
    }

    /// Whether this is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NoSuchNode(_) | FsError::NoSuchFile(_))
    }

    /// The HTTP status a boundary layer should answer with.
    pub fn status(&self) -> u16 {
        match self {
            FsError::NoSuchNode(_) | FsError::NoSuchFile(_) => 404,
            FsError::FileExists { .. } | FsError::RenameExhausted { .. } => 409,
            FsError::NotReadable(_)
            | FsError::NotWritable(_)
            | FsError::NotExecutable(_)
            | FsError::QuotaExceeded { .. } => 403,
            FsError::NotADirectory(_)
            | FsError::NotAFile(_)
            | FsError::DirectoryNotEmpty(_)
            | FsError::RootDeletion
            | FsError::InvalidFileName(_)
            | FsError::UnsupportedFileType(_)
            | FsError::NotAPdf => 400,
            FsError::InUse(_) => 423,
            FsError::RasterizerUnavailable => 501,
            FsError::ReadError(_)
            | FsError::WriteError(_)
            | FsError::Conversion(_)
            | FsError::StoreUnavailable(_)
            | FsError::Db(_) => 500,
        }
    }
}

/// Foreign key violations mean a row is still referenced; everything else is
/// a plain database error.
impl From<rusqlite::Error> for FsError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(inner, msg) = &e {
            if inner.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                return FsError::InUse(msg.clone().unwrap_or_else(|| "referenced".into()));
            }
        }
        FsError::Db(e)
    }
}

/// Whether a database error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(FsError::no_such_node("/a").status(), 404);
        assert_eq!(FsError::not_executable("/a").status(), 403);
        assert_eq!(FsError::RootDeletion.status(), 400);
        assert_eq!(
            FsError::QuotaExceeded {
                limit: 10,
                free: 8,
                requested: 9
            }
            .status(),
            403
        );
        let exists = FsError::FileExists {
            name: "a.txt".into(),
            existing: Existing::File(FileId::new(4)),
        };
        assert_eq!(exists.status(), 409);
    }

    #[test]
    fn test_quota_message_carries_numbers() {
        let e = FsError::QuotaExceeded {
            limit: 10,
            free: 8,
            requested: 9,
        };
        assert_eq!(e.to_string(), "quota exceeded: requested 9 bytes, 8 of 10 free");
    }

    #[test]
    fn test_denial_classification() {
        assert!(FsError::not_readable("/x").is_denial());
        assert!(!FsError::no_such_node("/x").is_denial());
        assert!(FsError::no_such_file(3).is_not_found());
    }

    #[test]
    fn test_existing_id() {
        assert_eq!(Existing::Inode(InodeId::new(7)).id(), 7);
    }
}
