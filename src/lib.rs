//! # Lightbox
//!
//! The ingestion side of a self-hosted photo library. A directory tree of
//! JPEG and PNG files is the source of truth; Lightbox keeps a relational
//! catalog in step with it and produces everything a gallery front end needs
//! to serve it.
//!
//! # Architecture: Scan, Catalog, Derive
//!
//! ```text
//! media/  ──scan──▶  catalog (SQLite)   folders, photos, slugs, EXIF JSON
//!    │                    │
//!    └──────derive────────┴──▶  <cache>/{small,medium,large,placeholder}/<id>.*
//! ```
//!
//! A scan walks the media root, strips GPS pointers from JPEGs in place,
//! extracts metadata, computes a placeholder grid, inserts the photo under a
//! collision-free URL slug and warms the thumbnail tiers. Derivatives are
//! keyed by photo id and generated lazily on first request afterwards.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `lightbox.toml` loading, stock defaults, merging and validation |
//! | [`types`] | Catalog records shared by every stage (`Folder`, `Photo`, ids) |
//! | [`catalog`] | The `Catalog` query contract and its SQLite implementation |
//! | [`slug`] | URL slug sanitising and collision-free assignment |
//! | [`metadata`] | EXIF extraction through exiftool or the built-in TIFF decoder |
//! | [`privacy`] | In-place removal of GPS pointers from JPEG EXIF |
//! | [`imaging`] | Image backend trait, pure-Rust backend, sizing calculations |
//! | [`derivatives`] | Tiered on-disk thumbnail and placeholder cache |
//! | [`scan`] | Filesystem walk, ingestion, orphan cleanup, slug regeneration |
//! | [`jobs`] | Background scans with pollable status |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Filesystem Wins
//!
//! Nothing in the catalog outlives its file. `clean` removes rows whose file is
//! gone, drops their cached derivatives and prunes folders left empty. A file
//! that has been renamed is a new photo.
//!
//! ## Privacy Before Anything Else
//!
//! GPS stripping runs before metadata extraction and before any derivative is
//! produced, so neither the catalog nor the cache ever sees a location. The
//! strip edits the pointer entries in place and leaves every other byte of the
//! file alone.
//!
//! ## No System Dependencies Required
//!
//! exiftool is used when it is installed and ignored when it is not. The
//! built-in decoder and the `image` crate cover everything the pipeline needs,
//! and SQLite is bundled.

pub mod catalog;
pub mod config;
pub mod derivatives;
pub mod imaging;
pub mod jobs;
pub mod metadata;
pub mod output;
pub mod privacy;
pub mod scan;
pub mod slug;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
