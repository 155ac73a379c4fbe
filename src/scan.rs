//! Media-root scanning and catalog maintenance.
//!
//! The scanner walks the media root in file-name order and keeps the catalog
//! in step with it:
//!
//! ```text
//! media/
//! ├── .lightbox-cache/             # skipped (hidden)
//! ├── thumbs/                      # skipped when it is the configured cache_dir
//! ├── Trips/                       # folder "Trips"
//! │   ├── 2024 Paris/              # folder "Trips/2024 Paris", parent "Trips"
//! │   │   ├── IMG_0001.JPG         # photo, slug trips/2024-paris/img_0001.jpg
//! │   │   └── notes.txt            # ignored (extension)
//! │   └── .DS_Store                # skipped (hidden)
//! └── cover.png                    # photo at the root, no folder
//! ```
//!
//! ## Ingestion
//!
//! A file already in the catalog (by relative path) is skipped without any
//! further work. A new file goes through, in order: GPS stripping, metadata
//! extraction, dimensions and placeholder grid, the catalog upsert with a
//! unique slug, and eager generation of every thumbnail tier.
//!
//! ## Failure policy
//!
//! One bad entry never aborts a walk: per-file failures are logged and
//! counted. Only an unreadable scan root, a missing folder for a folder
//! scan, or a catalog failure outside a single file are returned.

use crate::catalog::{Catalog, CatalogError};
use crate::config::ScanConfig;
use crate::derivatives::{DerivativeCache, SizeTier};
use crate::imaging::Dimensions;
use crate::metadata::MetadataCodec;
use crate::privacy::{self, StripOutcome};
use crate::slug::{MAX_SUFFIX_ATTEMPTS, unique_url_path};
use crate::types::{FolderId, NewPhoto, PhotoId};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Folder not found in catalog: {0}")]
    FolderNotFound(String),
}

/// Counters of one scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Folders seen (created or reused).
    pub folders: usize,
    pub added: usize,
    /// Already in the catalog.
    pub skipped: usize,
    pub failed: usize,
    pub gps_stripped: usize,
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} folders, {} added, {} skipped",
            self.folders, self.added, self.skipped
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.gps_stripped > 0 {
            write!(f, ", GPS stripped from {}", self.gps_stripped)?;
        }
        Ok(())
    }
}

/// Result of [`Scanner::clean_orphans`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub photos_removed: usize,
    pub folders_removed: usize,
    pub derivatives_removed: usize,
}

impl fmt::Display for CleanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} photos, {} folders, {} cached files removed",
            self.photos_removed, self.folders_removed, self.derivatives_removed
        )
    }
}

enum Ingested {
    Added,
    Skipped,
}

/// Keeps the catalog in step with the media root.
pub struct Scanner {
    catalog: Arc<dyn Catalog>,
    codec: MetadataCodec,
    derivatives: Arc<DerivativeCache>,
    media_root: PathBuf,
    scan: ScanConfig,
}

impl Scanner {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        codec: MetadataCodec,
        derivatives: Arc<DerivativeCache>,
        media_root: impl Into<PathBuf>,
        scan: ScanConfig,
    ) -> Self {
        Self {
            catalog,
            codec,
            derivatives,
            media_root: media_root.into(),
            scan,
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn derivatives(&self) -> &Arc<DerivativeCache> {
        &self.derivatives
    }

    /// The derivative cache as a path under the media root, when it lives
    /// there. Hidden default caches are skipped anyway; this covers a
    /// visible `cache_dir` such as `media/thumbs`.
    fn cache_inside_root(&self) -> Option<PathBuf> {
        let root = std::path::absolute(&self.media_root).ok()?;
        let cache = std::path::absolute(self.derivatives.root()).ok()?;
        let rel = cache.strip_prefix(&root).ok()?;
        if rel.as_os_str().is_empty() {
            return None;
        }
        Some(self.media_root.join(rel))
    }

    /// Walk the whole media root.
    #[tracing::instrument(skip(self), fields(root = %self.media_root.display()))]
    pub fn scan_all(&self) -> Result<ScanReport, ScanError> {
        let report = self.walk("", None)?;
        tracing::info!(%report, "scan finished");
        Ok(report)
    }

    /// Walk one folder that the catalog already knows. An empty path is the
    /// media root.
    #[tracing::instrument(skip(self))]
    pub fn scan_folder(&self, rel: &str) -> Result<ScanReport, ScanError> {
        let rel = rel.trim_matches('/');
        if rel.is_empty() {
            return self.scan_all();
        }
        let folder = self
            .catalog
            .folder_by_path(rel)?
            .ok_or_else(|| ScanError::FolderNotFound(rel.to_string()))?;
        let report = self.walk(rel, Some(folder.id))?;
        tracing::info!(%report, "folder scan finished");
        Ok(report)
    }

    fn walk(&self, base_rel: &str, base_folder: Option<FolderId>) -> Result<ScanReport, ScanError> {
        let base = if base_rel.is_empty() {
            self.media_root.clone()
        } else {
            self.media_root.join(base_rel)
        };
        // An unreadable root fails the scan; anything below it is per-entry
        fs::read_dir(&base)?;

        let mut report = ScanReport::default();
        let mut folders: HashMap<PathBuf, Option<FolderId>> = HashMap::new();

        let cache = self.cache_inside_root();
        let mut entries = WalkDir::new(&base)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !e.file_name().to_string_lossy().starts_with('.')
                    && cache.as_deref() != Some(e.path())
            });

        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot read entry");
                    report.failed += 1;
                    continue;
                }
            };
            let rel = self.relative(entry.path());
            let parent_dir = entry.path().parent().map(Path::to_path_buf).unwrap_or_default();
            let parent = folders.get(&parent_dir).copied().unwrap_or(base_folder);

            if entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy();
                match self.catalog.upsert_folder(&rel, &name, parent) {
                    Ok(id) => {
                        folders.insert(entry.path().to_path_buf(), Some(id));
                        report.folders += 1;
                    }
                    Err(e) => {
                        tracing::warn!(path = %rel, error = %e, "cannot record folder, skipping subtree");
                        report.failed += 1;
                        entries.skip_current_dir();
                    }
                }
                continue;
            }

            if !entry.file_type().is_file() || !self.scan.accepts(&entry.file_name().to_string_lossy()) {
                continue;
            }
            match self.ingest(&rel, entry.path(), parent, &mut report) {
                Ok(Ingested::Added) => report.added += 1,
                Ok(Ingested::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(path = %rel, error = %e, "cannot ingest photo");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// `/`-joined path relative to the media root.
    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.media_root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn ingest(
        &self,
        rel: &str,
        abs: &Path,
        folder: Option<FolderId>,
        report: &mut ScanReport,
    ) -> Result<Ingested, ScanError> {
        if self.catalog.photo_exists(rel)? {
            return Ok(Ingested::Skipped);
        }
        let size_bytes = fs::metadata(abs)?.len();

        match privacy::strip_gps(abs) {
            Ok(StripOutcome::Stripped(_)) => report.gps_stripped += 1,
            Ok(_) => {}
            Err(e) => tracing::warn!(path = %rel, error = %e, "cannot strip GPS"),
        }

        let extraction = self.codec.extract(abs);
        let dimensions = self.derivatives.dimensions(abs).unwrap_or_else(|e| {
            tracing::warn!(path = %rel, error = %e, "cannot read dimensions");
            Dimensions { width: 0, height: 0 }
        });
        let placeholder = match self.derivatives.placeholder_encoding(abs) {
            Ok(encoding) => Some(encoding),
            Err(e) => {
                tracing::warn!(path = %rel, error = %e, "cannot sample placeholder");
                None
            }
        };
        let metadata = if extraction.info.is_empty() {
            None
        } else {
            serde_json::to_string(&extraction.info).ok()
        };

        let mut photo = NewPhoto {
            width: dimensions.width,
            height: dimensions.height,
            size_bytes,
            placeholder,
            metadata,
            taken_at: extraction.taken_at.map(|t| t.and_utc()),
            ..NewPhoto::at_path(rel, folder)
        };
        let id = self.insert_with_unique_slug(&mut photo)?;

        for tier in SizeTier::ALL {
            if let Err(e) = self.derivatives.thumbnail(id, abs, tier) {
                tracing::warn!(path = %rel, %tier, error = %e, "cannot generate thumbnail");
            }
        }
        tracing::debug!(path = %rel, id = %id, "ingested");
        Ok(Ingested::Added)
    }

    /// Upsert with a fresh slug, moving to the next disambiguator whenever a
    /// concurrent insert wins the unique index.
    fn insert_with_unique_slug(&self, photo: &mut NewPhoto) -> Result<PhotoId, ScanError> {
        let mut start = 0;
        loop {
            photo.url_path = Some(unique_url_path(self.catalog.as_ref(), &photo.path, start)?);
            match self.catalog.upsert_photo(photo) {
                Ok(id) => return Ok(id),
                Err(CatalogError::UrlPathTaken(slug)) if start < MAX_SUFFIX_ATTEMPTS => {
                    tracing::debug!(path = %photo.path, %slug, "slug taken concurrently, retrying");
                    start += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Drop photos whose files are gone, then folders left with neither
    /// photos nor subfolders.
    #[tracing::instrument(skip(self))]
    pub fn clean_orphans(&self) -> Result<CleanReport, ScanError> {
        // A missing root would make every photo look orphaned
        fs::read_dir(&self.media_root)?;
        let mut report = CleanReport::default();
        for (id, rel) in self.catalog.photo_paths()? {
            match fs::symlink_metadata(self.media_root.join(&rel)) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                _ => continue,
            }
            if !self.catalog.delete_photo(id)? {
                continue;
            }
            report.photos_removed += 1;
            match self.derivatives.invalidate(id) {
                Ok(n) => report.derivatives_removed += n,
                Err(e) => tracing::warn!(path = %rel, error = %e, "cannot remove cached derivatives"),
            }
        }
        report.folders_removed = self.catalog.delete_empty_folders()?;
        tracing::info!(%report, "orphans cleaned");
        Ok(report)
    }

    /// Reassign every slug from scratch in photo id order, so the earliest
    /// ingested photo of a colliding group keeps the bare slug.
    #[tracing::instrument(skip(self))]
    pub fn regenerate_url_paths(&self) -> Result<usize, ScanError> {
        let photos = self.catalog.photo_paths()?;
        self.catalog.clear_url_paths()?;
        for (id, rel) in &photos {
            let mut start = 0;
            loop {
                let slug = unique_url_path(self.catalog.as_ref(), rel, start)?;
                match self.catalog.set_url_path(*id, &slug) {
                    Ok(()) => break,
                    Err(CatalogError::UrlPathTaken(_)) if start < MAX_SUFFIX_ATTEMPTS => start += 1,
                    Err(e) => return Err(e.into()),
                }
            }
        }
        tracing::info!(photos = photos.len(), "regenerated URL paths");
        Ok(photos.len())
    }
}
