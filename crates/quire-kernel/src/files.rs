//! Flat per-tenant files and their thumbnails.
//!
//! Files live outside the hierarchy: a name, a tenant and a blob. Names are
//! unique per tenant; on collision a caller may ask for `"stem (n).ext"`
//! suffixing, which tries a bounded number of candidates.

use std::sync::Arc;

use quire_cas::ContentStore;
use quire_types::{ContentId, FileId, Principal, TenantId};

use crate::config::FilesConfig;
use crate::db::FsDb;
use crate::error::{Existing, FsError, FsResult};
use crate::hooks::{Deleted, HookRegistry};
use crate::model::{split_extension, validate_name, ContentRef, File, HasContent, Resolution, Thumbnail};
use crate::pdf::{is_pdf, page_name, PageFormat, PdfRasterizer};
use crate::quota::QuotaLedger;
use crate::records::FileRecord;
use crate::thumbnail::{scaled_resolution, ImageThumbnailer, Thumbnailer};

/// What to serve for a thumbnail request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendition {
    /// The source already fits, or cannot be thumbnailed.
    Original(File),
    Thumbnail(Thumbnail),
}

impl Rendition {
    pub fn is_original(&self) -> bool {
        matches!(self, Rendition::Original(_))
    }
}

impl HasContent for Rendition {
    fn content_id(&self) -> Option<ContentId> {
        match self {
            Rendition::Original(file) => file.content_id(),
            Rendition::Thumbnail(thumb) => thumb.content_id(),
        }
    }

    fn label(&self) -> String {
        match self {
            Rendition::Original(file) => file.label(),
            Rendition::Thumbnail(thumb) => thumb.label(),
        }
    }
}

/// `"stem (n).ext"`.
pub fn suffixed_name(name: &str, n: u32) -> String {
    let (stem, ext) = split_extension(name);
    format!("{stem} ({n}){ext}")
}

pub struct FileManager {
    db: Arc<FsDb>,
    store: Arc<dyn ContentStore>,
    quota: Arc<QuotaLedger>,
    thumbnailer: Arc<dyn Thumbnailer>,
    rasterizer: Option<Arc<dyn PdfRasterizer>>,
    hooks: Arc<HookRegistry>,
    on_delete: Vec<String>,
    max_rename_attempts: u32,
}

impl FileManager {
    pub fn new(
        db: Arc<FsDb>,
        store: Arc<dyn ContentStore>,
        quota: Arc<QuotaLedger>,
        config: &FilesConfig,
    ) -> Self {
        Self {
            db,
            store,
            quota,
            thumbnailer: Arc::new(ImageThumbnailer),
            rasterizer: None,
            hooks: Arc::new(HookRegistry::new()),
            on_delete: Vec::new(),
            max_rename_attempts: config.max_rename_attempts,
        }
    }

    pub fn with_thumbnailer(mut self, thumbnailer: Arc<dyn Thumbnailer>) -> Self {
        self.thumbnailer = thumbnailer;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PdfRasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Hooks and the names of those to run on delete.
    pub fn with_hooks(mut self, hooks: Arc<HookRegistry>, on_delete: Vec<String>) -> Self {
        for name in &on_delete {
            if !hooks.contains(name) {
                tracing::warn!(hook = %name, "configured delete hook is not registered");
            }
        }
        self.hooks = hooks;
        self.on_delete = on_delete;
        self
    }

    pub fn content<'s>(&'s self, entity: &impl HasContent) -> FsResult<ContentRef<'s>> {
        ContentRef::of(self.store.as_ref(), entity)
    }

    /// Pick the name a new file will get.
    fn free_name(&self, name: &str, tenant: TenantId, rename: bool) -> FsResult<String> {
        let Some(existing) = self.db.file_by_name(tenant, name)? else {
            return Ok(name.to_string());
        };
        if !rename {
            return Err(FsError::FileExists {
                name: name.to_string(),
                existing: Existing::File(existing.id),
            });
        }

        for n in 1..=self.max_rename_attempts {
            let candidate = suffixed_name(name, n);
            if self.db.file_by_name(tenant, &candidate)?.is_none() {
                return Ok(candidate);
            }
        }
        Err(FsError::RenameExhausted {
            name: name.to_string(),
            attempts: self.max_rename_attempts,
        })
    }

    /// Store `bytes` as a new file of `tenant`.
    ///
    /// On a name collision this fails with `FileExists` carrying the
    /// existing file, unless `rename` is set.
    pub fn add(&self, name: &str, tenant: TenantId, bytes: &[u8], rename: bool) -> FsResult<File> {
        validate_name(name)?;
        let name = self.free_name(name, tenant, rename)?;
        self.quota.alloc(tenant, bytes.len() as u64)?;

        let content = self.store.put(bytes).map_err(FsError::WriteError)?;
        match self.db.insert_file(&name, tenant, content) {
            Ok(file) => {
                tracing::info!(file = %file.id, tenant = %tenant, name = %file.name, size = bytes.len(), "added file");
                Ok(file)
            }
            Err(e) => {
                self.release(content);
                Err(e)
            }
        }
    }

    pub fn get(&self, id: FileId) -> FsResult<File> {
        self.db.get_file(id)?.ok_or_else(|| FsError::no_such_file(id))
    }

    /// A file as seen by `principal`: super-users reach every tenant,
    /// everybody else only their own. Foreign files look absent.
    pub fn get_for(&self, id: FileId, principal: &Principal) -> FsResult<File> {
        let file = self.get(id)?;
        if principal.is_root() || file.tenant == principal.tenant {
            Ok(file)
        } else {
            Err(FsError::no_such_file(id))
        }
    }

    pub fn by_name(&self, tenant: TenantId, name: &str) -> FsResult<Option<File>> {
        self.db.file_by_name(tenant, name)
    }

    pub fn list(&self, tenant: TenantId) -> FsResult<Vec<File>> {
        self.db.list_files(tenant)
    }

    /// Metadata record; does not count as an access.
    pub fn record(&self, file: &File) -> FsResult<FileRecord> {
        let meta = self.content(file)?.meta()?;
        Ok(FileRecord::new(file, &meta))
    }

    /// Run the configured delete hooks for `deleted`.
    pub fn run_delete_hooks(&self, deleted: Deleted) {
        self.hooks.run_delete(&self.on_delete, deleted);
    }

    /// Delete a file, its thumbnails, and their blobs. Delete hooks run
    /// first and cannot stop it.
    pub fn delete(&self, file: &File) -> FsResult<()> {
        self.run_delete_hooks(Deleted::File(file.id));

        let thumbnails = self.db.thumbnails_of(file.id)?;
        if !self.db.delete_file(file.id)? {
            return Err(FsError::no_such_file(file.id));
        }

        self.release(file.content);
        for thumb in thumbnails {
            self.release(thumb.content);
        }
        tracing::info!(file = %file.id, name = %file.name, "deleted file");
        Ok(())
    }

    /// Thumbnail of `file` fitting into `bounds`.
    ///
    /// Cached per exact bounds. When the image already fits, the original is
    /// returned and nothing is stored. Non-images fail `UnsupportedFileType`.
    pub fn thumbnail(&self, file: &File, bounds: Resolution) -> FsResult<Rendition> {
        let source = self.content(file)?;
        let mimetype = source.mimetype()?;
        if !self.thumbnailer.supports(&mimetype) {
            return Err(FsError::UnsupportedFileType(mimetype));
        }

        if let Some(cached) = self.db.thumbnail(file.id, bounds)? {
            return Ok(Rendition::Thumbnail(cached));
        }

        let bytes = source.bytes()?;
        let dimensions = self.thumbnailer.dimensions(&bytes)?;
        let Some(size) = scaled_resolution(dimensions, bounds) else {
            return Ok(Rendition::Original(file.clone()));
        };

        let rendered = self.thumbnailer.render(&bytes, &mimetype, size)?;
        let content = self.store.put(&rendered).map_err(FsError::WriteError)?;
        match self.db.insert_thumbnail(file.id, bounds, size, content) {
            Ok(thumb) => {
                tracing::debug!(file = %file.id, requested = %bounds, size = %size, "generated thumbnail");
                Ok(Rendition::Thumbnail(thumb))
            }
            Err(e) => {
                self.release(content);
                Err(e)
            }
        }
    }

    /// Like [`thumbnail`](Self::thumbnail), but files that cannot be
    /// thumbnailed are served as they are.
    pub fn thumbnail_or_original(&self, file: &File, bounds: Resolution) -> FsResult<Rendition> {
        match self.thumbnail(file, bounds) {
            Err(FsError::UnsupportedFileType(_)) => Ok(Rendition::Original(file.clone())),
            other => other,
        }
    }

    /// Rasterize a PDF into one file per page, named
    /// `"{stem}-page{n}.{ext}"`. A page whose name is taken reuses the
    /// existing file. Every page is allocated against the quota; running out
    /// midway keeps the pages already stored.
    pub fn convert_pdf(&self, file: &File, format: PageFormat) -> FsResult<Vec<File>> {
        let rasterizer = self
            .rasterizer
            .as_ref()
            .ok_or(FsError::RasterizerUnavailable)?;
        let bytes = self.content(file)?.bytes()?;
        if !is_pdf(&bytes) {
            return Err(FsError::NotAPdf);
        }

        let mut pages = Vec::new();
        for (index, page) in rasterizer.rasterize(&bytes, format)?.into_iter().enumerate() {
            let name = page_name(&file.name, index + 1, format);
            let page = match self.add(&name, file.tenant, &page, false) {
                Ok(created) => created,
                Err(FsError::FileExists {
                    existing: Existing::File(id),
                    ..
                }) => self.get(id)?,
                Err(e) => return Err(e),
            };
            pages.push(page);
        }
        tracing::info!(file = %file.id, pages = pages.len(), format = %format, "converted PDF");
        Ok(pages)
    }

    fn release(&self, content: ContentId) {
        if let Err(e) = self.store.delete(content) {
            tracing::warn!(content = %content, error = %e, "failed to release blob");
        }
    }
}
