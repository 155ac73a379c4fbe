//! Derivative cache: thumbnails and placeholders keyed by photo identity.
//!
//! Thumbnails are slow to produce (full decode, Lanczos resize, re-encode),
//! so every derivative is generated once and served from disk afterwards.
//!
//! # Layout
//!
//! ```text
//! <cache_root>/
//! ├── small/<photo_id>.jpg        # or .png for PNG sources
//! ├── medium/<photo_id>.jpg
//! ├── large/<photo_id>.jpg
//! └── placeholder/<photo_id>.png
//! ```
//!
//! Names depend only on the catalog identity and tier, so a photo's files
//! survive renames and moves. A source whose pixels change without a catalog
//! delete keeps its old derivatives.
//!
//! Tier directories appear with their first file, so opening a cache over a
//! mistyped path leaves nothing behind.
//!
//! # Existence index
//!
//! An in-memory set of cache paths known to exist. A hit answers without
//! touching the filesystem or the source image. Entries are added on
//! generation, on the first disk hit, and in bulk by [`DerivativeCache::prewarm`];
//! they are removed only by [`DerivativeCache::invalidate`].
//!
//! # Concurrency
//!
//! At most one generation runs per cache path: callers racing on the same
//! path serialize on a per-path lock and the losers find the file indexed.
//! Files are written to a temp file in the tier directory and renamed into
//! place, so a reader never sees a partial derivative.

use crate::config::Config;
use crate::imaging::operations::{self, source_extension};
use crate::imaging::{BackendError, Dimensions, ImageBackend, OutputFormat, Quality, ThumbnailSpec};
use crate::types::PhotoId;
use dashmap::{DashMap, DashSet};
use rayon::prelude::*;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Directory holding rendered placeholders.
pub const PLACEHOLDER_DIR: &str = "placeholder";

/// Output extensions a derivative may carry.
const DERIVATIVE_EXTENSIONS: [&str; 2] = ["jpg", "png"];

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Image processing failed: {0}")]
    Backend(#[from] BackendError),
    #[error("Unknown size tier: {0}")]
    UnknownTier(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// Thumbnail size tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeTier {
    Small,
    Medium,
    Large,
}

impl SizeTier {
    pub const ALL: [SizeTier; 3] = [SizeTier::Small, SizeTier::Medium, SizeTier::Large];

    /// Directory name and CLI spelling.
    pub fn name(self) -> &'static str {
        match self {
            SizeTier::Small => "small",
            SizeTier::Medium => "medium",
            SizeTier::Large => "large",
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SizeTier {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        SizeTier::ALL
            .into_iter()
            .find(|tier| tier.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CacheError::UnknownTier(s.to_string()))
    }
}

/// Per-tier resize targets and placeholder render size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativeSettings {
    pub small: ThumbnailSpec,
    pub medium: ThumbnailSpec,
    pub large: ThumbnailSpec,
    pub placeholder_size: u32,
}

impl DerivativeSettings {
    pub fn from_config(config: &Config) -> Self {
        let spec = |tier: crate::config::TierConfig| ThumbnailSpec {
            max_width: tier.width,
            quality: Quality::new(tier.quality),
        };
        Self {
            small: spec(config.thumbnails.small),
            medium: spec(config.thumbnails.medium),
            large: spec(config.thumbnails.large),
            placeholder_size: config.placeholder.render_size,
        }
    }

    pub fn spec(&self, tier: SizeTier) -> ThumbnailSpec {
        match tier {
            SizeTier::Small => self.small,
            SizeTier::Medium => self.medium,
            SizeTier::Large => self.large,
        }
    }
}

impl Default for DerivativeSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Concurrent set of derivative paths known to be on disk.
#[derive(Debug, Default)]
pub struct ExistenceIndex {
    paths: DashSet<PathBuf>,
}

impl ExistenceIndex {
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn insert(&self, path: PathBuf) {
        self.paths.insert(path);
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.paths.remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// How derivative requests were answered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Answered from the existence index alone.
    pub index_hits: u64,
    /// Found on disk but not yet indexed.
    pub disk_hits: u64,
    /// Produced by the image backend.
    pub generated: u64,
}

impl CacheStats {
    pub fn total(&self) -> u64 {
        self.index_hits + self.disk_hits + self.generated
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index_hits > 0 || self.disk_hits > 0 {
            write!(
                f,
                "{} indexed, {} on disk, {} generated ({} total)",
                self.index_hits,
                self.disk_hits,
                self.generated,
                self.total()
            )
        } else {
            write!(f, "{} generated", self.generated)
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    index_hits: AtomicU64,
    disk_hits: AtomicU64,
    generated: AtomicU64,
}

/// Tiered on-disk derivative cache with an in-memory existence index.
pub struct DerivativeCache {
    root: PathBuf,
    settings: DerivativeSettings,
    backend: Arc<dyn ImageBackend>,
    index: ExistenceIndex,
    in_flight: DashMap<PathBuf, Arc<Mutex<()>>>,
    counters: Counters,
}

impl DerivativeCache {
    /// Open the cache at `root`. Nothing is created on disk until the
    /// first derivative is written.
    pub fn new(
        root: impl Into<PathBuf>,
        settings: DerivativeSettings,
        backend: Arc<dyn ImageBackend>,
    ) -> Result<Self> {
        let root = root.into();
        Ok(Self {
            root,
            settings,
            backend,
            index: ExistenceIndex::default(),
            in_flight: DashMap::new(),
            counters: Counters::default(),
        })
    }

    fn dir_names() -> [&'static str; 4] {
        [
            SizeTier::Small.name(),
            SizeTier::Medium.name(),
            SizeTier::Large.name(),
            PLACEHOLDER_DIR,
        ]
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &DerivativeSettings {
        &self.settings
    }

    pub fn index(&self) -> &ExistenceIndex {
        &self.index
    }

    /// Where the `tier` thumbnail of a photo lives for a given source.
    pub fn thumbnail_path(&self, id: PhotoId, source: &Path, tier: SizeTier) -> PathBuf {
        let format = OutputFormat::for_source(&source_extension(source), self.settings.spec(tier).quality);
        self.root
            .join(tier.name())
            .join(format!("{}.{}", id, format.extension()))
    }

    pub fn placeholder_path(&self, id: PhotoId) -> PathBuf {
        self.root.join(PLACEHOLDER_DIR).join(format!("{id}.png"))
    }

    /// Path of the `tier` thumbnail of a photo, generating it on first request.
    pub fn thumbnail(&self, id: PhotoId, source: &Path, tier: SizeTier) -> Result<PathBuf> {
        let path = self.thumbnail_path(id, source, tier);
        let spec = self.settings.spec(tier);
        self.materialize(path, |tmp| {
            operations::create_thumbnail(self.backend.as_ref(), source, tmp, &spec).map(|_| ())
        })
    }

    /// Path of a photo's rendered placeholder, generating it on first request.
    ///
    /// A missing or malformed encoding renders flat gray.
    pub fn placeholder(&self, id: PhotoId, encoding: Option<&str>) -> Result<PathBuf> {
        let path = self.placeholder_path(id);
        let size = self.settings.placeholder_size;
        self.materialize(path, |tmp| {
            operations::create_placeholder(self.backend.as_ref(), encoding, tmp, size)
        })
    }

    /// Compute the stored placeholder encoding of a source image.
    pub fn placeholder_encoding(&self, source: &Path) -> Result<String> {
        Ok(operations::placeholder_encoding(self.backend.as_ref(), source)?)
    }

    /// Pixel dimensions of a source image.
    pub fn dimensions(&self, source: &Path) -> Result<Dimensions> {
        Ok(self.backend.identify(source)?)
    }

    fn materialize(
        &self,
        path: PathBuf,
        generate: impl FnOnce(&Path) -> std::result::Result<(), BackendError>,
    ) -> Result<PathBuf> {
        if self.index.contains(&path) {
            self.counters.index_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(path);
        }

        let lock = self.in_flight.entry(path.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.materialize_locked(&path, generate)
        };
        // The map and this call hold the only references when nobody else waits
        self.in_flight
            .remove_if(&path, |_, entry| Arc::strong_count(entry) <= 2);

        result.map(|()| path)
    }

    fn materialize_locked(
        &self,
        path: &Path,
        generate: impl FnOnce(&Path) -> std::result::Result<(), BackendError>,
    ) -> Result<()> {
        if self.index.contains(path) {
            self.counters.index_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        if path.is_file() {
            self.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
            self.index.insert(path.to_path_buf());
            return Ok(());
        }

        let dir = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(dir)?;
        let tmp = tempfile::Builder::new()
            .prefix(".tmp-")
            .tempfile_in(dir)?
            .into_temp_path();
        generate(&tmp)?;
        tmp.persist(path).map_err(|e| e.error)?;

        self.counters.generated.fetch_add(1, Ordering::Relaxed);
        self.index.insert(path.to_path_buf());
        tracing::debug!(path = %path.display(), "generated derivative");
        Ok(())
    }

    /// Delete every derivative of a photo and evict it from the index.
    /// Returns the number of files removed.
    pub fn invalidate(&self, id: PhotoId) -> Result<usize> {
        let mut removed = 0;
        for dir in Self::dir_names() {
            for ext in DERIVATIVE_EXTENSIONS {
                let path = self.root.join(dir).join(format!("{id}.{ext}"));
                self.index.remove(&path);
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(removed)
    }

    /// Index every derivative already on disk. Returns the number indexed.
    #[tracing::instrument(skip(self), fields(root = %self.root.display()))]
    pub fn prewarm(&self) -> Result<usize> {
        let counts = Self::dir_names()
            .par_iter()
            .map(|dir| self.index_dir(&self.root.join(dir)))
            .collect::<Result<Vec<usize>>>()?;
        let total = counts.iter().sum();
        tracing::info!(indexed = total, "prewarmed derivative index");
        Ok(total)
    }

    fn index_dir(&self, dir: &Path) -> Result<usize> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut count = 0;
        for entry in entries {
            let entry = entry?;
            // Skip leftovers of interrupted writes
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if entry.file_type()?.is_file() {
                self.index.insert(entry.path());
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            index_hits: self.counters.index_hits.load(Ordering::Relaxed),
            disk_hits: self.counters.disk_hits.load(Ordering::Relaxed),
            generated: self.counters.generated.load(Ordering::Relaxed),
        }
    }
}
