//! The catalog: folders and photos persisted in SQLite.
//!
//! [`Catalog`] is the query contract the scanner and CLI depend on. Every
//! operation is a single statement; conflicts are resolved by unique
//! constraints (`folders.path`, `photos.path`, `photos.url_path`) rather
//! than multi-statement transactions, so concurrent scanners converge on the
//! same rows.
//!
//! [`SqliteCatalog`] is the implementation, over bundled SQLite through
//! `rusqlite`. It works on a file or fully in memory.

use crate::types::{CatalogCounts, Folder, FolderId, FolderNode, NewPhoto, Photo, PhotoId};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("URL path already taken: {0}")]
    UrlPathTaken(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Query contract of the photo catalog.
pub trait Catalog: Send + Sync {
    fn folder(&self, id: FolderId) -> Result<Option<Folder>>;
    fn folder_by_path(&self, path: &str) -> Result<Option<Folder>>;
    /// Insert or reuse the folder at `path`. An existing row keeps its id;
    /// its name is refreshed and `updated_at` only moves if the name changed.
    fn upsert_folder(&self, path: &str, name: &str, parent: Option<FolderId>) -> Result<FolderId>;
    fn subfolders(&self, parent: Option<FolderId>) -> Result<Vec<Folder>>;
    fn set_cover(&self, folder: FolderId, photo: Option<PhotoId>) -> Result<bool>;
    /// Delete folders that hold neither photos nor subfolders, repeating
    /// until nested empty chains are gone. Returns the number removed.
    fn delete_empty_folders(&self) -> Result<usize>;

    fn photo_exists(&self, path: &str) -> Result<bool>;
    fn url_path_exists(&self, url_path: &str) -> Result<bool>;
    /// Insert keyed by `path`. On conflict the existing row is kept and a
    /// null `url_path` is filled in; a non-null one is never replaced.
    fn upsert_photo(&self, photo: &NewPhoto) -> Result<PhotoId>;
    fn photo(&self, id: PhotoId) -> Result<Option<Photo>>;
    fn photo_by_url_path(&self, url_path: &str) -> Result<Option<Photo>>;
    /// `(id, path)` of every photo in id order.
    fn photo_paths(&self) -> Result<Vec<(PhotoId, String)>>;
    /// Photos directly in `folder` (root when `None`), ordered by capture
    /// time falling back to ingestion time.
    fn photos_in_folder(&self, folder: Option<FolderId>, include_hidden: bool) -> Result<Vec<Photo>>;
    fn delete_photo(&self, id: PhotoId) -> Result<bool>;
    fn set_hidden(&self, id: PhotoId, hidden: bool) -> Result<bool>;
    fn move_photo(&self, id: PhotoId, folder: Option<FolderId>) -> Result<bool>;
    fn clear_url_paths(&self) -> Result<usize>;
    fn set_url_path(&self, id: PhotoId, url_path: &str) -> Result<()>;
    fn counts(&self) -> Result<CatalogCounts>;
}

/// The folder forest below `parent`, with per-folder photo counts.
pub fn folder_tree(catalog: &dyn Catalog, parent: Option<FolderId>) -> Result<Vec<FolderNode>> {
    catalog
        .subfolders(parent)?
        .into_iter()
        .map(|folder| {
            let photos = catalog.photos_in_folder(Some(folder.id), true)?;
            let hidden = photos.iter().filter(|p| p.hidden).count();
            Ok(FolderNode {
                children: folder_tree(catalog, Some(folder.id))?,
                photos: photos.len(),
                hidden,
                name: folder.name,
                path: folder.path,
            })
        })
        .collect()
}

const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS folders (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id       INTEGER REFERENCES folders(id) ON DELETE CASCADE,
    name            TEXT NOT NULL,
    path            TEXT NOT NULL UNIQUE,
    cover_photo_id  INTEGER REFERENCES photos(id) ON DELETE SET NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS photos (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_id       INTEGER REFERENCES folders(id) ON DELETE CASCADE,
    filename        TEXT NOT NULL,
    path            TEXT NOT NULL UNIQUE,
    url_path        TEXT UNIQUE,
    width           INTEGER NOT NULL DEFAULT 0,
    height          INTEGER NOT NULL DEFAULT 0,
    size_bytes      INTEGER NOT NULL DEFAULT 0,
    placeholder     TEXT,
    exif_data       TEXT,
    hidden          INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    taken_at        TEXT
);

CREATE INDEX IF NOT EXISTS idx_folders_parent ON folders(parent_id);
CREATE INDEX IF NOT EXISTS idx_photos_folder ON photos(folder_id);
CREATE INDEX IF NOT EXISTS idx_photos_hidden ON photos(hidden);
";

const FOLDER_COLUMNS: &str = "id, parent_id, name, path, cover_photo_id, created_at, updated_at";

const PHOTO_COLUMNS: &str = "id, folder_id, filename, path, url_path, width, height, size_bytes, \
     placeholder, exif_data, hidden, created_at, updated_at, taken_at";

fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: FolderId(row.get(0)?),
        parent_id: row.get::<_, Option<i64>>(1)?.map(FolderId),
        name: row.get(2)?,
        path: row.get(3)?,
        cover_photo_id: row.get::<_, Option<i64>>(4)?.map(PhotoId),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: PhotoId(row.get(0)?),
        folder_id: row.get::<_, Option<i64>>(1)?.map(FolderId),
        filename: row.get(2)?,
        path: row.get(3)?,
        url_path: row.get(4)?,
        width: row.get(5)?,
        height: row.get(6)?,
        size_bytes: row.get::<_, i64>(7)?.max(0) as u64,
        placeholder: row.get(8)?,
        metadata: row.get(9)?,
        hidden: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        taken_at: row.get(13)?,
    })
}

/// Map a unique-index rejection on `photos.url_path` to [`CatalogError::UrlPathTaken`].
fn url_path_conflict(err: rusqlite::Error, url_path: Option<&str>) -> CatalogError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err
        && failure.code == rusqlite::ErrorCode::ConstraintViolation
        && message.contains("photos.url_path")
    {
        return CatalogError::UrlPathTaken(url_path.unwrap_or_default().to_string());
    }
    CatalogError::Sqlite(err)
}

/// SQLite-backed [`Catalog`].
///
/// One connection behind a mutex; statements are short and single-shot.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open (or create) the catalog file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// A private in-memory catalog.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn photo_where(&self, clause: &str, param: &dyn rusqlite::ToSql) -> Result<Option<Photo>> {
        let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE {clause}");
        Ok(self
            .conn()
            .query_row(&sql, [param], photo_from_row)
            .optional()?)
    }

    fn folder_where(&self, clause: &str, param: &dyn rusqlite::ToSql) -> Result<Option<Folder>> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE {clause}");
        Ok(self
            .conn()
            .query_row(&sql, [param], folder_from_row)
            .optional()?)
    }
}

impl Catalog for SqliteCatalog {
    fn folder(&self, id: FolderId) -> Result<Option<Folder>> {
        self.folder_where("id = ?1", &id.0)
    }

    fn folder_by_path(&self, path: &str) -> Result<Option<Folder>> {
        self.folder_where("path = ?1", &path)
    }

    fn upsert_folder(&self, path: &str, name: &str, parent: Option<FolderId>) -> Result<FolderId> {
        let id = self.conn().query_row(
            "INSERT INTO folders (parent_id, name, path, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(path) DO UPDATE SET
                 name = excluded.name,
                 updated_at = CASE WHEN folders.name = excluded.name
                                   THEN folders.updated_at
                                   ELSE excluded.updated_at END
             RETURNING id",
            params![parent.map(|p| p.0), name, path, Utc::now()],
            |row| row.get(0),
        )?;
        Ok(FolderId(id))
    }

    fn subfolders(&self, parent: Option<FolderId>) -> Result<Vec<Folder>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE parent_id IS ?1 ORDER BY name, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([parent.map(|p| p.0)], folder_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn set_cover(&self, folder: FolderId, photo: Option<PhotoId>) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE folders SET cover_photo_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![photo.map(|p| p.0), Utc::now(), folder.0],
        )?;
        Ok(changed > 0)
    }

    fn delete_empty_folders(&self) -> Result<usize> {
        let conn = self.conn();
        let mut total = 0;
        loop {
            let removed = conn.execute(
                "DELETE FROM folders
                 WHERE NOT EXISTS (SELECT 1 FROM photos p WHERE p.folder_id = folders.id)
                   AND NOT EXISTS (SELECT 1 FROM folders c WHERE c.parent_id = folders.id)",
                [],
            )?;
            if removed == 0 {
                return Ok(total);
            }
            total += removed;
        }
    }

    fn photo_exists(&self, path: &str) -> Result<bool> {
        Ok(self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM photos WHERE path = ?1)",
            [path],
            |row| row.get(0),
        )?)
    }

    fn url_path_exists(&self, url_path: &str) -> Result<bool> {
        Ok(self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM photos WHERE url_path = ?1)",
            [url_path],
            |row| row.get(0),
        )?)
    }

    fn upsert_photo(&self, photo: &NewPhoto) -> Result<PhotoId> {
        let size_bytes = i64::try_from(photo.size_bytes).unwrap_or(i64::MAX);
        self.conn()
            .query_row(
                "INSERT INTO photos (folder_id, filename, path, url_path, width, height,
                                     size_bytes, placeholder, exif_data, taken_at,
                                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                 ON CONFLICT(path) DO UPDATE SET
                     url_path = COALESCE(photos.url_path, excluded.url_path)
                 RETURNING id",
                params![
                    photo.folder_id.map(|f| f.0),
                    photo.filename,
                    photo.path,
                    photo.url_path,
                    photo.width,
                    photo.height,
                    size_bytes,
                    photo.placeholder,
                    photo.metadata,
                    photo.taken_at,
                    Utc::now(),
                ],
                |row| row.get(0),
            )
            .map(PhotoId)
            .map_err(|e| url_path_conflict(e, photo.url_path.as_deref()))
    }

    fn photo(&self, id: PhotoId) -> Result<Option<Photo>> {
        self.photo_where("id = ?1", &id.0)
    }

    fn photo_by_url_path(&self, url_path: &str) -> Result<Option<Photo>> {
        self.photo_where("url_path = ?1", &url_path)
    }

    fn photo_paths(&self) -> Result<Vec<(PhotoId, String)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, path FROM photos ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((PhotoId(row.get(0)?), row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn photos_in_folder(&self, folder: Option<FolderId>, include_hidden: bool) -> Result<Vec<Photo>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos
             WHERE folder_id IS ?1 AND (?2 OR hidden = 0)
             ORDER BY COALESCE(taken_at, created_at), id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![folder.map(|f| f.0), include_hidden], photo_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn delete_photo(&self, id: PhotoId) -> Result<bool> {
        Ok(self.conn().execute("DELETE FROM photos WHERE id = ?1", [id.0])? > 0)
    }

    fn set_hidden(&self, id: PhotoId, hidden: bool) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE photos SET hidden = ?1, updated_at = ?2 WHERE id = ?3",
            params![hidden, Utc::now(), id.0],
        )?;
        Ok(changed > 0)
    }

    fn move_photo(&self, id: PhotoId, folder: Option<FolderId>) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE photos SET folder_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![folder.map(|f| f.0), Utc::now(), id.0],
        )?;
        Ok(changed > 0)
    }

    fn clear_url_paths(&self) -> Result<usize> {
        Ok(self
            .conn()
            .execute("UPDATE photos SET url_path = NULL WHERE url_path IS NOT NULL", [])?)
    }

    fn set_url_path(&self, id: PhotoId, url_path: &str) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE photos SET url_path = ?1, updated_at = ?2 WHERE id = ?3",
                params![url_path, Utc::now(), id.0],
            )
            .map_err(|e| url_path_conflict(e, Some(url_path)))?;
        Ok(())
    }

    fn counts(&self) -> Result<CatalogCounts> {
        let conn = self.conn();
        let folders: i64 = conn.query_row("SELECT COUNT(*) FROM folders", [], |row| row.get(0))?;
        let (photos, hidden, total_bytes): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(hidden), 0), COALESCE(SUM(size_bytes), 0) FROM photos",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(CatalogCounts {
            folders: folders.max(0) as u64,
            photos: photos.max(0) as u64,
            hidden: hidden.max(0) as u64,
            total_bytes: total_bytes.max(0) as u64,
        })
    }
}
