use clap::{Parser, Subcommand};
use lightbox::catalog::{self, Catalog, SqliteCatalog};
use lightbox::config::{self, Config};
use lightbox::derivatives::{DerivativeCache, DerivativeSettings, SizeTier};
use lightbox::imaging::RustBackend;
use lightbox::jobs::{ScanQueue, ScanRequest};
use lightbox::metadata::MetadataCodec;
use lightbox::output;
use lightbox::privacy;
use lightbox::scan::Scanner;
use lightbox::types::PhotoId;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// How often a foreground scan reports that it is still running.
const SCAN_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "lightbox")]
#[command(about = "Photo library ingestion: catalog, EXIF, GPS stripping, thumbnails")]
#[command(long_about = "\
Photo library ingestion: catalog, EXIF, GPS stripping, thumbnails

The media root is the source of truth. Directories become folders, JPEG and
PNG files become photos. Hidden entries (leading '.') are never scanned, which
keeps the default cache directory out of the catalog.

  media/
  ├── .lightbox-cache/          # Derivatives (default location)
  │   ├── small/ medium/ large/ # <photo id>.jpg or .png
  │   └── placeholder/          # <photo id>.png
  ├── 2024 Paris/
  │   └── IMG_0001.JPG          # GPS stripped in place on first scan
  └── Home/

Settings resolve as: stock defaults, then lightbox.toml, then environment
(MEDIA_ROOT, CACHE_DIR, DATABASE_PATH), then flags.

Run 'lightbox gen-config' to generate a documented lightbox.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file means stock defaults)
    #[arg(long, default_value = "lightbox.toml", global = true)]
    config: PathBuf,

    /// Root of the photo tree
    #[arg(long, env = "MEDIA_ROOT", global = true)]
    media_root: Option<PathBuf>,

    /// Derivative cache directory
    #[arg(long, env = "CACHE_DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// SQLite catalog file
    #[arg(long, env = "DATABASE_PATH", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the media root (or one catalogued folder) into the catalog
    Scan {
        /// Folder path relative to the media root
        #[arg(long)]
        folder: Option<String>,
    },
    /// Remove catalog rows whose file is gone, and their derivatives
    Clean,
    /// Reassign every URL slug in ingestion order
    RegenerateUrls,
    /// Index derivatives already on disk
    Prewarm,
    /// Print the metadata of an image file
    Exif { file: PathBuf },
    /// Remove GPS pointers from a JPEG in place
    StripGps { file: PathBuf },
    /// Produce (or reuse) a thumbnail and print its path
    Thumb {
        id: i64,
        #[arg(long, default_value = "small")]
        size: SizeTier,
    },
    /// Produce (or reuse) a placeholder PNG and print its path
    Placeholder { id: i64 },
    /// Print the catalogued folder tree
    Tree,
    /// Print catalog totals
    Stats,
    /// Print a stock lightbox.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        Command::StripGps { file } => {
            let outcome = privacy::strip_gps(file)?;
            println!("{}", output::format_strip_outcome(&display_name(file), outcome));
            return Ok(());
        }
        _ => {}
    }

    let config = resolve(&cli)?;

    match cli.command {
        Command::Exif { file } => {
            let codec = MetadataCodec::detect(&config.metadata);
            let extraction = codec.extract(&file);
            output::print_exif(&display_name(&file), codec.name(), &extraction);
        }
        Command::Scan { folder } => {
            let queue = ScanQueue::new(Arc::new(open_scanner(&config)?));
            let request = match folder {
                Some(path) => ScanRequest::Folder(path),
                None => ScanRequest::All,
            };
            let handle = queue.submit(request);
            let state = loop {
                match handle.wait_timeout(SCAN_POLL_INTERVAL) {
                    Some(state) => break state,
                    None => tracing::info!(scan = handle.id(), "scan still running"),
                }
            };
            output::print_scan_state(handle.id(), &state);
            if let lightbox::jobs::ScanState::Failed(error) = state {
                return Err(error.into());
            }
        }
        Command::Clean => {
            let report = open_scanner(&config)?.clean_orphans()?;
            output::print_clean_report(&report);
        }
        Command::RegenerateUrls => {
            let count = open_scanner(&config)?.regenerate_url_paths()?;
            println!("Reassigned {} URL paths", count);
        }
        Command::Prewarm => {
            let cache = open_derivatives(&config)?;
            let count = cache.prewarm()?;
            println!("Indexed {} cached files", count);
        }
        Command::Thumb { id, size } => {
            let (catalog, cache) = (open_catalog(&config)?, open_derivatives(&config)?);
            let photo = catalog
                .photo(PhotoId(id))?
                .ok_or_else(|| format!("no photo with id {id}"))?;
            let path = cache.thumbnail(photo.id, &config.media_root.join(&photo.path), size)?;
            println!("{}", path.display());
            println!("{}", output::format_cache_stats(&cache.stats()));
        }
        Command::Placeholder { id } => {
            let (catalog, cache) = (open_catalog(&config)?, open_derivatives(&config)?);
            let photo = catalog
                .photo(PhotoId(id))?
                .ok_or_else(|| format!("no photo with id {id}"))?;
            let path = cache.placeholder(photo.id, photo.placeholder.as_deref())?;
            println!("{}", path.display());
        }
        Command::Tree => {
            let catalog = open_catalog(&config)?;
            output::print_folder_tree(&catalog::folder_tree(&*catalog, None)?);
        }
        Command::Stats => {
            output::print_counts(&open_catalog(&config)?.counts()?);
        }
        Command::GenConfig | Command::StripGps { .. } => {}
    }

    Ok(())
}

/// Config file, then environment and flag overrides, then validation.
fn resolve(cli: &Cli) -> Result<Config, Box<dyn Error>> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(root) = &cli.media_root {
        config.media_root = root.clone();
    }
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(db) = &cli.database {
        config.database = db.clone();
    }
    config.validate()?;
    Ok(config)
}

fn open_catalog(config: &Config) -> Result<Arc<SqliteCatalog>, Box<dyn Error>> {
    Ok(Arc::new(SqliteCatalog::open(&config.database)?))
}

fn open_derivatives(config: &Config) -> Result<Arc<DerivativeCache>, Box<dyn Error>> {
    if config.cache_dir.as_os_str().is_empty() {
        config.check_media_root()?;
    }
    Ok(Arc::new(DerivativeCache::new(
        config.cache_root(),
        DerivativeSettings::from_config(config),
        Arc::new(RustBackend::new()),
    )?))
}

fn open_scanner(config: &Config) -> Result<Scanner, Box<dyn Error>> {
    config.check_media_root()?;
    Ok(Scanner::new(
        open_catalog(config)?,
        MetadataCodec::detect(&config.metadata),
        open_derivatives(config)?,
        &config.media_root,
        config.scan.clone(),
    ))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
