//! Import orchestration.
//!
//! ```text
//! load cache
//!   └─▶ check source ─▶ reset output roots ─▶ scan + extract ─▶ transcode ─▶ manifests
//!                                                                              │
//! save cache ◀──────────────────── always, success or failure ◀────────────────┘
//! ```
//!
//! The save is tied to a [`CacheGuard`], so it also happens when a stage
//! unwinds.
//!
//! Setup problems (missing source, output roots that cannot be reset, an
//! unreadable subdirectory, a manifest that cannot be written) abort the run
//! with an [`ImportError`]. Everything per-file is isolated further down and
//! only shows up in the [`ImportSummary`].

use crate::config::{ConfigError, ImportConfig, effective_threads};
use crate::geocode::{
    Clock, GeocodeCache, GeocodeError, GeocodeStats, Geocoder, NominatimClient, RateGate,
    ReverseGeocode,
};
use crate::imaging::{ImageBackend, RustBackend};
use crate::manifest::{ManifestError, write_manifest};
use crate::process::{ProcessConfig, ProcessError, gallery_relative_dir, process_galleries};
use crate::scan::{ScanError, scan};
use crate::scheduler::Scheduler;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("source {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("cannot read source {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("output directory {} contains the source {}", output.display(), source_dir.display())]
    OutputContainsSource {
        output: PathBuf,
        source_dir: PathBuf,
    },
    #[error("cannot reset output directory {}: {source}", path.display())]
    ResetOutput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("cannot build geocoding client: {0}")]
    Geocoder(#[from] GeocodeError),
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub source: PathBuf,
    pub assets_dir: PathBuf,
    pub content_dir: PathBuf,
    pub cache_file: PathBuf,
    pub config: ImportConfig,
}

/// Counts reported at the end of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub galleries: usize,
    pub files: usize,
    /// Images with both derivatives written.
    pub vignettes: usize,
    /// Images that could not be transcoded and were copied verbatim.
    pub fallbacks: usize,
    /// Non-image media copied verbatim.
    pub copied: usize,
    pub failed: usize,
    pub geocode: GeocodeStats,
    pub elapsed: Duration,
}

/// Run an import with the production backend and geocoding client.
pub fn run_import(options: &ImportOptions) -> Result<ImportSummary, ImportError> {
    let cache = Arc::new(GeocodeCache::load(&options.cache_file));
    let _save = CacheGuard::new(Arc::clone(&cache), &options.cache_file);

    let client = NominatimClient::new(&options.config.geocoder)?;
    let gate = RateGate::new(options.config.geocoder.interval());
    let geocoder = Geocoder::new(cache, gate, client);
    import_with(options, &RustBackend::new(), &geocoder)
}

/// Run an import with an explicit backend and geocoder. The caller owns the
/// cache and is responsible for saving it.
pub fn import_with<G: ReverseGeocode, C: Clock>(
    options: &ImportOptions,
    backend: &impl ImageBackend,
    geocoder: &Geocoder<G, C>,
) -> Result<ImportSummary, ImportError> {
    let start = Instant::now();

    check_source(&options.source)?;
    for root in [&options.assets_dir, &options.content_dir] {
        reset_output_dir(root, &options.source)?;
    }

    let scheduler = Scheduler::new(effective_threads(&options.config.processing))?;
    log::info!("Using {} workers", scheduler.workers());

    let mut galleries = scan(&options.source, &scheduler, geocoder)?;
    let processed = process_galleries(
        backend,
        &scheduler,
        &mut galleries,
        &options.source,
        &options.assets_dir,
        &ProcessConfig::from_images_config(&options.config.images),
    )?;

    for gallery in &galleries {
        let dir = options
            .content_dir
            .join(gallery_relative_dir(&options.source, gallery));
        let path = write_manifest(gallery, &dir)?;
        log::debug!("Wrote {}", path.display());
    }

    Ok(ImportSummary {
        galleries: galleries.len(),
        files: processed.total(),
        vignettes: processed.transcoded(),
        fallbacks: processed.fallbacks(),
        copied: processed.copied(),
        failed: processed.failed(),
        geocode: geocoder.stats(),
        elapsed: start.elapsed(),
    })
}

/// Save the cache, logging instead of failing: the run's own outcome is what
/// the caller reports.
pub fn persist_cache(cache: &GeocodeCache, path: &Path) {
    if let Err(e) = cache.save(path) {
        log::error!("Failed to save location cache {}: {e}", path.display());
    }
}

/// Writes the cache to disk when dropped, whichever way the run ends.
pub struct CacheGuard<'a> {
    cache: Arc<GeocodeCache>,
    path: &'a Path,
}

impl<'a> CacheGuard<'a> {
    pub fn new(cache: Arc<GeocodeCache>, path: &'a Path) -> Self {
        Self { cache, path }
    }
}

impl Drop for CacheGuard<'_> {
    fn drop(&mut self) {
        persist_cache(&self.cache, self.path);
    }
}

fn check_source(source: &Path) -> Result<(), ImportError> {
    let meta = fs::metadata(source).map_err(|e| ImportError::SourceUnreadable {
        path: source.to_path_buf(),
        source: e,
    })?;
    if !meta.is_dir() {
        return Err(ImportError::NotADirectory(source.to_path_buf()));
    }
    Ok(())
}

/// Remove and recreate an output root. Refuses to delete a directory that
/// contains the source tree.
fn reset_output_dir(dir: &Path, source: &Path) -> Result<(), ImportError> {
    let reset_err = |e| ImportError::ResetOutput {
        path: dir.to_path_buf(),
        source: e,
    };

    if dir.exists() {
        let output = dir.canonicalize().map_err(reset_err)?;
        if let Ok(source_dir) = source.canonicalize() {
            if source_dir.starts_with(&output) {
                return Err(ImportError::OutputContainsSource { output, source_dir });
            }
        }
        fs::remove_dir_all(dir).map_err(reset_err)?;
    }
    fs::create_dir_all(dir).map_err(reset_err)
}
