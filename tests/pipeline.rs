//! End-to-end pipeline: scan a media tree into the catalog, serve
//! derivatives from the cache, then clean up after deleted files.

use image::{ImageFormat, Rgb, RgbImage};
use lightbox::catalog::{Catalog, SqliteCatalog, folder_tree};
use lightbox::config::{Config, DEFAULT_CACHE_DIR_NAME};
use lightbox::derivatives::{DerivativeCache, DerivativeSettings, SizeTier};
use lightbox::imaging::RustBackend;
use lightbox::jobs::{ScanQueue, ScanRequest, ScanState};
use lightbox::metadata::MetadataCodec;
use lightbox::scan::Scanner;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_image(path: &Path, width: u32, height: u32, format: ImageFormat) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7) as u8, (y * 5) as u8, 90]));
    img.save_with_format(path, format).unwrap();
}

struct Library {
    _tmp: TempDir,
    config: Config,
    catalog: Arc<SqliteCatalog>,
    derivatives: Arc<DerivativeCache>,
    scanner: Arc<Scanner>,
}

fn library() -> Library {
    let tmp = TempDir::new().unwrap();
    let media = tmp.path().join("media");
    write_image(&media.join("Home/kitchen.jpg"), 640, 480, ImageFormat::Jpeg);
    write_image(&media.join("Trips/Beach Day.jpg"), 400, 300, ImageFormat::Jpeg);
    write_image(&media.join("Trips/Alps/summit.png"), 120, 90, ImageFormat::Png);
    write_image(&media.join(".private/secret.jpg"), 10, 10, ImageFormat::Jpeg);
    std::fs::write(media.join("Home/notes.txt"), "not a photo").unwrap();

    let config = Config {
        media_root: media.clone(),
        database: tmp.path().join("catalog.db"),
        ..Config::default()
    };
    let catalog = Arc::new(SqliteCatalog::open(&config.database).unwrap());
    let derivatives = Arc::new(
        DerivativeCache::new(
            config.cache_root(),
            DerivativeSettings::from_config(&config),
            Arc::new(RustBackend::new()),
        )
        .unwrap(),
    );
    let scanner = Arc::new(Scanner::new(
        catalog.clone(),
        MetadataCodec::Builtin,
        derivatives.clone(),
        &media,
        config.scan.clone(),
    ));
    Library {
        _tmp: tmp,
        config,
        catalog,
        derivatives,
        scanner,
    }
}

#[test]
fn scan_catalogues_tree_and_warms_cache() {
    let lib = library();
    let report = lib.scanner.scan_all().unwrap();

    assert_eq!(report.added, 3);
    assert_eq!(report.folders, 3);
    assert_eq!(report.failed, 0);
    assert!(lib.config.cache_root().ends_with(DEFAULT_CACHE_DIR_NAME));
    assert!(!lib.catalog.photo_exists(".private/secret.jpg").unwrap());

    let beach = lib
        .catalog
        .photo_by_url_path("trips/beach-day.jpg")
        .unwrap()
        .expect("slugged photo");
    assert_eq!(beach.path, "Trips/Beach Day.jpg");
    assert_eq!((beach.width, beach.height), (400, 300));
    assert!(beach.placeholder.is_some());

    let source = lib.config.media_root.join(&beach.path);
    for tier in SizeTier::ALL {
        assert!(lib.derivatives.thumbnail_path(beach.id, &source, tier).exists());
    }
    let small = image::open(lib.derivatives.thumbnail_path(beach.id, &source, SizeTier::Small)).unwrap();
    assert_eq!((small.width(), small.height()), (300, 225));

    let tree = folder_tree(lib.catalog.as_ref(), None).unwrap();
    let names: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["Home", "Trips"]);
    assert_eq!(tree[1].photos, 1);
    assert_eq!(tree[1].children[0].path, "Trips/Alps");
}

#[test]
fn rescan_is_idempotent() {
    let lib = library();
    lib.scanner.scan_all().unwrap();
    let again = lib.scanner.scan_all().unwrap();
    assert_eq!(again.added, 0);
    assert_eq!(again.skipped, 3);
    assert_eq!(lib.catalog.counts().unwrap().photos, 3);
}

#[test]
fn background_scan_then_clean_orphans() {
    let lib = library();
    let queue = ScanQueue::new(lib.scanner.clone());
    let handle = queue.submit(ScanRequest::All);
    assert!(matches!(handle.wait(), ScanState::Finished(r) if r.added == 3));

    let summit = lib.catalog.photo_by_url_path("trips/alps/summit.png").unwrap().unwrap();
    let placeholder = lib
        .derivatives
        .placeholder(summit.id, summit.placeholder.as_deref())
        .unwrap();
    assert!(placeholder.exists());

    std::fs::remove_file(lib.config.media_root.join("Trips/Alps/summit.png")).unwrap();
    let report = lib.scanner.clean_orphans().unwrap();

    assert_eq!(report.photos_removed, 1);
    assert_eq!(report.folders_removed, 1);
    assert_eq!(report.derivatives_removed, 4);
    assert!(!placeholder.exists());
    assert!(lib.catalog.folder_by_path("Trips/Alps").unwrap().is_none());
    assert!(lib.catalog.folder_by_path("Trips").unwrap().is_some());
}

#[test]
fn prewarm_indexes_previous_run() {
    let lib = library();
    lib.scanner.scan_all().unwrap();

    let fresh = DerivativeCache::new(
        lib.config.cache_root(),
        DerivativeSettings::from_config(&lib.config),
        Arc::new(RustBackend::new()),
    )
    .unwrap();
    assert_eq!(fresh.prewarm().unwrap(), 9);

    let kitchen = lib.catalog.photo_by_url_path("home/kitchen.jpg").unwrap().unwrap();
    fresh
        .thumbnail(kitchen.id, &lib.config.media_root.join(&kitchen.path), SizeTier::Medium)
        .unwrap();
    let stats = fresh.stats();
    assert_eq!(stats.index_hits, 1);
    assert_eq!(stats.generated, 0);
}
