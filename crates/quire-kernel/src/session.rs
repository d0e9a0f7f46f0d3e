//! Principal-bound operations.
//!
//! A [`Session`] is what a boundary layer (HTTP handler, CLI) talks to. It
//! resolves paths in the principal's tenant, checks permissions, and then
//! calls into the lifecycle managers. Every failure is a typed [`FsError`];
//! [`FsError::status`] gives the status to answer with.

use quire_types::{FileId, FileMode, InodeId, Principal, TenantId};

use crate::error::{FsError, FsResult};
use crate::files::Rendition;
use crate::hooks::Deleted;
use crate::kernel::Quire;
use crate::model::{ContentRef, File, Inode, Resolution};
use crate::pdf::PageFormat;
use crate::permissions;
use crate::records::{BatchReport, FileRecord, InodeRecord, Listing, PagesRecord, QuotaRecord};
use crate::resolver::{child_path, join, normalize, Resolved, Scope};
use crate::stream::FileStream;

/// How a fetched file should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Raw bytes.
    #[default]
    Bytes,
    /// Bytes with a download name.
    Named,
    /// Chunked stream.
    Stream,
    /// Metadata only.
    Metadata,
}

/// A fetched file in the requested delivery.
#[derive(Debug)]
pub enum Fetched {
    Bytes(Vec<u8>),
    Named { filename: String, bytes: Vec<u8> },
    Stream(FileStream),
    Metadata(FileRecord),
}

pub struct Session<'q> {
    fs: &'q Quire,
    principal: Principal,
}

impl<'q> Session<'q> {
    pub(crate) fn new(fs: &'q Quire, principal: Principal) -> Self {
        Self { fs, principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    fn scope(&self) -> Scope {
        Scope::from(&self.principal)
    }

    fn chunk_size(&self) -> usize {
        self.fs.config.files.chunk_size
    }

    /// With `hide_forbidden`, denials on a path read as "no such node".
    fn conceal(&self, err: FsError, path: &str) -> FsError {
        if self.fs.config.policy.hide_forbidden && err.is_denial() {
            FsError::no_such_node(path)
        } else {
            err
        }
    }

    // ========================================================================
    // Flat files
    // ========================================================================

    /// Metadata of every file of the principal's tenant.
    pub fn list(&self) -> FsResult<Vec<FileRecord>> {
        self.fs
            .files
            .list(self.principal.tenant)?
            .iter()
            .map(|file| self.fs.files.record(file))
            .collect()
    }

    pub fn file(&self, id: FileId) -> FsResult<File> {
        self.fs.files.get_for(id, &self.principal)
    }

    /// Fetch a file, substituting a thumbnail when `thumbnail` is given and
    /// the file is an image.
    pub fn fetch(
        &self,
        id: FileId,
        thumbnail: Option<Resolution>,
        delivery: Delivery,
    ) -> FsResult<Fetched> {
        let file = self.file(id)?;
        let rendition = match thumbnail {
            Some(bounds) => self.fs.files.thumbnail_or_original(&file, bounds)?,
            None => Rendition::Original(file.clone()),
        };
        let content = self.fs.files.content(&rendition)?;

        Ok(match delivery {
            Delivery::Bytes => Fetched::Bytes(content.bytes()?),
            Delivery::Named => Fetched::Named {
                filename: file.name.clone(),
                bytes: content.bytes()?,
            },
            Delivery::Stream => Fetched::Stream(FileStream::open(content, self.chunk_size())?),
            Delivery::Metadata => Fetched::Metadata(FileRecord::new(&file, &content.meta()?)),
        })
    }

    /// Store a new file in the principal's tenant.
    pub fn create(&self, name: &str, bytes: &[u8], rename: bool) -> FsResult<File> {
        self.fs
            .files
            .add(name, self.principal.tenant, bytes, rename)
    }

    /// Store several files, collecting a per-item outcome instead of
    /// stopping at the first error. Items are stored one at a time, so a
    /// failed item never rolls back the ones already created.
    pub fn create_batch<I, N>(&self, items: I, rename: bool) -> FsResult<BatchReport>
    where
        I: IntoIterator<Item = (N, Vec<u8>)>,
        N: Into<String>,
    {
        let max = self.fs.config.files.max_upload_bytes;
        let mut report = BatchReport::default();

        for (name, bytes) in items {
            let name = name.into();
            if bytes.len() as u64 > max {
                report.too_large.push(name);
                continue;
            }
            match self.create(&name, &bytes, rename) {
                Ok(file) => {
                    report.created.insert(name, file.id);
                }
                Err(FsError::FileExists { name, existing }) => {
                    report.existing.insert(name, FileId::new(existing.id()));
                }
                Err(FsError::QuotaExceeded { .. }) => report.quota_exceeded.push(name),
                Err(FsError::InvalidFileName(_)) => report.invalid.push(name),
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "batch item failed");
                    report.failed.insert(name, e.to_string());
                }
            }
        }

        tracing::info!(
            tenant = %self.principal.tenant,
            created = report.created.len(),
            existing = report.existing.len(),
            refused = report.refused(),
            "batch create"
        );
        Ok(report)
    }

    /// Delete a file by id.
    pub fn delete(&self, id: FileId) -> FsResult<()> {
        let file = self.file(id)?;
        self.fs.files.delete(&file)
    }

    /// Rasterize a PDF file into page images.
    pub fn convert_pdf(&self, id: FileId, format: PageFormat) -> FsResult<PagesRecord> {
        let file = self.file(id)?;
        let pages = self.fs.files.convert_pdf(&file, format)?;
        Ok(PagesRecord {
            pages: pages.into_iter().map(|page| page.id).collect(),
        })
    }

    // ========================================================================
    // Quota
    // ========================================================================

    pub fn quota(&self) -> FsResult<QuotaRecord> {
        self.fs.quota.record(self.principal.tenant)
    }

    /// Quota of any tenant; other tenants are visible to super-users only.
    pub fn quota_of(&self, tenant: TenantId) -> FsResult<QuotaRecord> {
        if tenant != self.principal.tenant && !self.principal.is_root() {
            return Err(FsError::not_readable(format!("quota of tenant {tenant}")));
        }
        self.fs.quota.record(tenant)
    }

    /// Set a tenant's limit. Super-users only.
    pub fn set_quota(&self, tenant: TenantId, bytes: u64) -> FsResult<QuotaRecord> {
        if !self.principal.is_root() {
            return Err(FsError::not_writable(format!("quota of tenant {tenant}")));
        }
        self.fs.quota.set_limit(tenant, bytes)?;
        self.fs.quota.record(tenant)
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// Root of the principal's tenant, created on first use.
    pub fn ensure_root(&self) -> FsResult<Inode> {
        self.fs
            .inodes
            .ensure_root(self.principal.account, self.principal.tenant)
    }

    /// Resolve `path`, requiring execute on every directory walked through.
    pub fn resolve(&self, path: &str) -> FsResult<Resolved> {
        self.fs
            .inodes
            .resolver()
            .resolve_as(path, self.scope(), &self.principal)
            .map_err(|e| self.conceal(e, &join(&normalize(path))))
    }

    /// An inode reached by id, under the same traversal rules as a path.
    pub fn inode(&self, id: InodeId) -> FsResult<Resolved> {
        let inode = self.fs.inodes.get(id)?;
        if !self.principal.is_root() && inode.group != self.principal.tenant {
            return Err(FsError::no_such_node(format!("inode {id}")));
        }
        let resolved = self.fs.inodes.resolver().chain_of(inode)?;
        resolved
            .check_traverse(&self.principal)
            .map_err(|e| self.conceal(e, &resolved.path()))?;
        Ok(resolved)
    }

    fn require(&self, ok: bool, denial: fn(String) -> FsError, path: &str) -> FsResult<()> {
        if ok {
            Ok(())
        } else {
            Err(self.conceal(denial(path.to_string()), path))
        }
    }

    fn record(&self, inode: &Inode, path: String) -> FsResult<InodeRecord> {
        let meta = match inode.content {
            Some(_) => Some(ContentRef::of(self.fs.store.as_ref(), inode)?.meta()?),
            None => None,
        };
        Ok(InodeRecord::new(inode, path, meta.as_ref()))
    }

    /// Metadata of a node.
    pub fn stat(&self, path: &str) -> FsResult<InodeRecord> {
        let resolved = self.resolve(path)?;
        self.record(resolved.target(), resolved.path())
    }

    /// Full content of a file.
    pub fn read(&self, path: &str) -> FsResult<Vec<u8>> {
        let resolved = self.resolve(path)?;
        let target = resolved.target();
        let path = resolved.path();
        if target.is_dir() {
            return Err(FsError::not_a_file(path));
        }
        self.require(
            permissions::can_read(target, &self.principal),
            FsError::NotReadable,
            &path,
        )?;
        ContentRef::of(self.fs.store.as_ref(), target)?.bytes()
    }

    /// Stream a file in configured chunks.
    pub fn open(&self, path: &str) -> FsResult<FileStream> {
        let resolved = self.resolve(path)?;
        let target = resolved.target();
        let path = resolved.path();
        if target.is_dir() {
            return Err(FsError::not_a_file(path));
        }
        self.require(
            permissions::can_read(target, &self.principal),
            FsError::NotReadable,
            &path,
        )?;
        Ok(FileStream::open(ContentRef::of(self.fs.store.as_ref(), target)?, self.chunk_size())?
            .named(target.name.clone()))
    }

    /// Nested listing of a directory. Subdirectories the principal may not
    /// enter and read are shown without their children.
    pub fn list_dir(&self, path: &str) -> FsResult<Listing> {
        let resolved = self.resolve(path)?;
        let target = resolved.target();
        let path = resolved.path();
        if !target.is_dir() {
            return Err(FsError::not_a_directory(path));
        }
        self.require(
            permissions::can_execute(target, &self.principal),
            FsError::NotExecutable,
            &path,
        )?;
        self.require(
            permissions::can_read(target, &self.principal),
            FsError::NotReadable,
            &path,
        )?;
        self.listing(target, path)
    }

    fn listing(&self, inode: &Inode, path: String) -> FsResult<Listing> {
        let node = self.record(inode, path.clone())?;
        if !inode.is_dir() {
            return Ok(Listing {
                node,
                children: None,
            });
        }

        let mut children = Vec::new();
        for child in self.fs.inodes.children(inode)? {
            let child_path = child_path(&path, &child.name);
            if child.is_dir()
                && !(permissions::can_execute(&child, &self.principal)
                    && permissions::can_read(&child, &self.principal))
            {
                children.push(Listing {
                    node: self.record(&child, child_path)?,
                    children: None,
                });
            } else {
                children.push(self.listing(&child, child_path)?);
            }
        }
        Ok(Listing {
            node,
            children: Some(children),
        })
    }

    /// Split a path into its parent directory and final name.
    fn parent_and_name(&self, path: &str) -> FsResult<(Resolved, String)> {
        let parts = normalize(path);
        let Some((name, parent)) = parts.split_last() else {
            return Err(FsError::invalid_file_name(path));
        };
        let parent = self.resolve(&join(parent))?;
        let parent_path = parent.path();
        let dir = parent.target();
        if !dir.is_dir() {
            return Err(FsError::not_a_directory(parent_path));
        }
        self.require(
            permissions::can_execute(dir, &self.principal),
            FsError::NotExecutable,
            &parent_path,
        )?;
        Ok((parent, name.to_string()))
    }

    /// Write a file, creating it with `mode` (default `rw-r--r--`) or
    /// replacing the content of an existing one.
    pub fn write(&self, path: &str, bytes: &[u8], mode: Option<FileMode>) -> FsResult<InodeRecord> {
        let (parent, name) = self.parent_and_name(path)?;
        let dir = parent.target();

        let inode = match self.fs.inodes.resolver().resolve(path, self.scope()) {
            Ok(existing) => {
                let target = existing.target();
                let path = existing.path();
                if target.is_dir() {
                    return Err(FsError::not_a_file(path));
                }
                self.require(
                    permissions::can_write(target, &self.principal),
                    FsError::NotWritable,
                    &path,
                )?;
                self.fs.inodes.replace_content(target, bytes)?
            }
            Err(FsError::NoSuchNode(_)) => {
                self.require(
                    permissions::can_write(dir, &self.principal),
                    FsError::NotWritable,
                    &parent.path(),
                )?;
                self.fs.inodes.create(
                    dir,
                    &name,
                    self.principal.account,
                    self.principal.tenant,
                    mode.unwrap_or(FileMode::FILE),
                    Some(bytes),
                )?
            }
            Err(e) => return Err(e),
        };
        let path = self.fs.inodes.resolver().path_of(&inode)?;
        self.record(&inode, path)
    }

    /// Create a directory with `mode` (default `rwxr-xr-x`).
    pub fn mkdir(&self, path: &str, mode: Option<FileMode>) -> FsResult<InodeRecord> {
        let (parent, name) = self.parent_and_name(path)?;
        let dir = parent.target();
        self.require(
            permissions::can_write(dir, &self.principal),
            FsError::NotWritable,
            &parent.path(),
        )?;
        let inode = self.fs.inodes.create(
            dir,
            &name,
            self.principal.account,
            self.principal.tenant,
            mode.unwrap_or(FileMode::DIRECTORY),
            None,
        )?;
        let path = self.fs.inodes.resolver().path_of(&inode)?;
        self.record(&inode, path)
    }

    /// Delete a node; the root is always refused. Delete hooks run for every
    /// removed node.
    pub fn remove(&self, path: &str, recursive: bool) -> FsResult<Vec<InodeId>> {
        let resolved = self.resolve(path)?;
        self.remove_resolved(&resolved, recursive)
    }

    /// Delete a node reached by id.
    pub fn remove_inode(&self, id: InodeId, recursive: bool) -> FsResult<Vec<InodeId>> {
        let resolved = self.inode(id)?;
        self.remove_resolved(&resolved, recursive)
    }

    fn remove_resolved(&self, resolved: &Resolved, recursive: bool) -> FsResult<Vec<InodeId>> {
        let target = resolved.target();
        if target.is_root() {
            return Err(FsError::RootDeletion);
        }
        let Some(parent) = resolved.ancestors().last() else {
            return Err(FsError::RootDeletion);
        };
        let parent_path = resolved.parent_path();
        self.require(
            permissions::can_write(parent, &self.principal),
            FsError::NotWritable,
            &parent_path,
        )?;

        let removed = self.fs.inodes.remove(target, recursive)?;
        for id in &removed {
            self.fs.files.run_delete_hooks(Deleted::Inode(*id));
        }
        Ok(removed)
    }

    /// Rename a node within its directory.
    pub fn rename(&self, path: &str, name: &str) -> FsResult<InodeRecord> {
        let resolved = self.resolve(path)?;
        let target = resolved.target();
        if let Some(parent) = resolved.ancestors().last() {
            let parent_path = resolved.parent_path();
            self.require(
                permissions::can_write(parent, &self.principal),
                FsError::NotWritable,
                &parent_path,
            )?;
        } else if !self.principal.is_root() {
            return Err(self.conceal(FsError::not_writable(resolved.path()), &resolved.path()));
        }
        let inode = self.fs.inodes.rename(target, name)?;
        let path = self.fs.inodes.resolver().path_of(&inode)?;
        self.record(&inode, path)
    }

    /// Change mode bits. Only the owner or a super-user may.
    pub fn chmod(&self, path: &str, mode: FileMode) -> FsResult<InodeRecord> {
        let resolved = self.resolve(path)?;
        let target = resolved.target();
        let path = resolved.path();
        self.require(
            self.principal.is_root() || target.owner == self.principal.account,
            FsError::NotWritable,
            &path,
        )?;
        let inode = self.fs.inodes.chmod(target, mode)?;
        self.record(&inode, path)
    }

    /// Readable files in the tenant whose content has this digest.
    pub fn by_sha256(&self, sha256: &str) -> FsResult<Vec<InodeRecord>> {
        let mut found = Vec::new();
        for inode in self.fs.inodes.by_sha256(sha256, self.principal.tenant)? {
            let resolved = self.fs.inodes.resolver().chain_of(inode)?;
            let visible = resolved.check_traverse(&self.principal).is_ok()
                && permissions::can_read(resolved.target(), &self.principal);
            if visible {
                found.push(self.record(resolved.target(), resolved.path())?);
            }
        }
        Ok(found)
    }
}
