//! Catalog records shared by the scanner, the catalog and the CLI.

use crate::metadata::ExifInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog identity of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(pub i64);

/// Catalog identity of a photo. Also the key of every cached derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(pub i64);

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directory under the media root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    /// `None` for top-level folders.
    pub parent_id: Option<FolderId>,
    /// Final path segment.
    pub name: String,
    /// Path relative to the media root, `/`-separated. Unique.
    pub path: String,
    pub cover_photo_id: Option<PhotoId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An ingested image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub folder_id: Option<FolderId>,
    pub filename: String,
    /// Path relative to the media root, `/`-separated. Unique natural key.
    pub path: String,
    /// URL slug. Unique when present.
    pub url_path: Option<String>,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    /// Base64 placeholder grid.
    pub placeholder: Option<String>,
    /// [`ExifInfo`] as JSON.
    pub metadata: Option<String>,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub taken_at: Option<DateTime<Utc>>,
}

impl Photo {
    /// Ordering timestamp: capture time, or ingestion time when unknown.
    pub fn sort_time(&self) -> DateTime<Utc> {
        self.taken_at.unwrap_or(self.created_at)
    }

    /// Decode the stored metadata blob. Unparseable blobs read as absent.
    pub fn exif(&self) -> Option<ExifInfo> {
        self.metadata
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
    }
}

/// Everything the scanner knows about a photo before it has an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub folder_id: Option<FolderId>,
    pub filename: String,
    pub path: String,
    pub url_path: Option<String>,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub placeholder: Option<String>,
    pub metadata: Option<String>,
    pub taken_at: Option<DateTime<Utc>>,
}

impl NewPhoto {
    /// A bare record for `path` with no derived data yet.
    pub fn at_path(path: &str, folder_id: Option<FolderId>) -> Self {
        let filename = path.rsplit('/').next().unwrap_or(path).to_string();
        Self {
            folder_id,
            filename,
            path: path.to_string(),
            url_path: None,
            width: 0,
            height: 0,
            size_bytes: 0,
            placeholder: None,
            metadata: None,
            taken_at: None,
        }
    }
}

/// Catalog-wide totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub folders: u64,
    pub photos: u64,
    pub hidden: u64,
    pub total_bytes: u64,
}

/// A folder with its direct photo count and subfolders, for tree display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderNode {
    pub name: String,
    pub path: String,
    pub photos: usize,
    pub hidden: usize,
    pub children: Vec<FolderNode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn photo(taken_at: Option<DateTime<Utc>>) -> Photo {
        Photo {
            id: PhotoId(1),
            folder_id: None,
            filename: "a.jpg".into(),
            path: "a.jpg".into(),
            url_path: None,
            width: 0,
            height: 0,
            size_bytes: 0,
            placeholder: None,
            metadata: None,
            hidden: false,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            taken_at,
        }
    }

    #[test]
    fn sort_time_prefers_capture_time() {
        let taken = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(photo(Some(taken)).sort_time(), taken);
    }

    #[test]
    fn sort_time_falls_back_to_creation() {
        let p = photo(None);
        assert_eq!(p.sort_time(), p.created_at);
    }

    #[test]
    fn exif_blob_decodes() {
        let mut p = photo(None);
        p.metadata = Some(r#"{"camera_make":"Sony"}"#.into());
        assert_eq!(p.exif().unwrap().camera_make.as_deref(), Some("Sony"));
        p.metadata = Some("not json".into());
        assert_eq!(p.exif(), None);
    }

    #[test]
    fn new_photo_takes_filename_from_path() {
        let p = NewPhoto::at_path("Trips/Paris/IMG_1.JPG", Some(FolderId(3)));
        assert_eq!(p.filename, "IMG_1.JPG");
        assert_eq!(NewPhoto::at_path("top.png", None).filename, "top.png");
    }
}
