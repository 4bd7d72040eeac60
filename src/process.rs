//! Derivative generation and output naming.
//!
//! Takes the galleries produced by the scan stage and writes every media file
//! into the assets tree. Each gallery gets its own directory mirroring the
//! source layout:
//!
//! ```text
//! assets/
//! └── 2024/Japan/
//!     ├── 20240315123045_Tokyo_vignette.jpg     # 640px-wide preview
//!     ├── 20240316090000_Kyoto_vignette.jpg
//!     └── _fullsize/
//!         ├── 20240315123045_Tokyo.jpg          # full-resolution re-encode
//!         ├── 20240316090000_Kyoto.jpg
//!         └── 20240317181500_Japan.mp4          # videos: verbatim copy
//! ```
//!
//! ## Naming
//!
//! `<YYYYMMDDhhmmss>_<location>[_vignette]<ext>`: the first 14 digits of the
//! capture timestamp, the location with every non-ASCII-alphanumeric
//! character replaced by `_`, and the source extension lowercased. Names are
//! planned per gallery *before* any work starts, so two shots from the same
//! second and place get `_2`, `_3`… instead of overwriting each other.
//!
//! ## Failure isolation
//!
//! | Item | Outcome |
//! |---|---|
//! | Image, transcode ok | vignette + full-size re-encode |
//! | Image, transcode fails or panics | warning; source copied verbatim to the full-size path, no vignette |
//! | Video | source copied verbatim to the full-size path |
//! | Copy fails | error logged, item counted as failed; the batch continues |

use crate::config::ImagesConfig;
use crate::imaging::{BackendError, ImageBackend, Quality, TranscodeParams};
use crate::scheduler::{Scheduler, run_isolated};
use crate::types::{GalleryInfo, MediaKind, MediaMetadata};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sub-directory of each gallery's assets holding full-size files.
pub const FULLSIZE_DIR: &str = "_fullsize";
pub const VIGNETTE_SUFFIX: &str = "_vignette";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("cannot create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Configuration for derivative generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessConfig {
    pub vignette_width: u32,
    pub quality: Quality,
}

impl ProcessConfig {
    pub fn from_images_config(config: &ImagesConfig) -> Self {
        Self {
            vignette_width: config.vignette_width,
            quality: Quality::new(config.quality),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::from_images_config(&ImagesConfig::default())
    }
}

// ============================================================================
// Naming
// ============================================================================

/// First 14 digits of an ISO timestamp: `YYYYMMDDhhmmss`.
///
/// ```
/// # use gallery_import::process::timestamp_prefix;
/// assert_eq!(timestamp_prefix("2024-03-15T12:30:45.000Z"), "20240315123045");
/// ```
pub fn timestamp_prefix(iso_date_time: &str) -> String {
    iso_date_time
        .chars()
        .filter(char::is_ascii_digit)
        .take(14)
        .collect()
}

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_location(location: &str) -> String {
    location
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// `<timestamp>_<location>` for one media record.
pub fn base_name(media: &MediaMetadata) -> String {
    format!(
        "{}_{}",
        timestamp_prefix(&media.iso_date_time),
        sanitize_location(&media.location)
    )
}

/// Lowercased source extension including the dot, or empty.
pub fn output_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Derive the vignette file name from a full-size file name.
pub fn vignette_name(fullsize_name: &str) -> String {
    let ext = output_extension(fullsize_name);
    let stem = fullsize_name.strip_suffix(&ext).unwrap_or(fullsize_name);
    format!("{stem}{VIGNETTE_SUFFIX}{ext}")
}

/// Plan unique full-size file names for one gallery, in media order.
///
/// The first media with a given name keeps it; later ones get `_2`, `_3`…
/// appended to the base name.
pub fn plan_file_names(medias: &[MediaMetadata]) -> Vec<String> {
    let mut used = HashSet::new();
    medias
        .iter()
        .map(|media| {
            let base = base_name(media);
            let ext = output_extension(&media.file_name);
            let mut candidate = format!("{base}{ext}");
            let mut n = 2;
            while used.contains(&candidate) {
                candidate = format!("{base}_{n}{ext}");
                n += 1;
            }
            used.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// Gallery path relative to the source root, used to mirror the layout under
/// the assets and content roots. Falls back to the gallery name for paths
/// outside the root.
pub fn gallery_relative_dir(source_root: &Path, gallery: &GalleryInfo) -> PathBuf {
    Path::new(&gallery.path)
        .strip_prefix(source_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(&gallery.name))
}

// ============================================================================
// Per-item processing
// ============================================================================

/// Everything needed to produce the outputs of one media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaTask {
    pub source: PathBuf,
    pub kind: MediaKind,
    pub fullsize_path: PathBuf,
    pub vignette_path: PathBuf,
}

impl MediaTask {
    pub fn new(source: PathBuf, gallery_assets_dir: &Path, fullsize_name: &str) -> Self {
        let kind = MediaKind::from_path(&source).unwrap_or(MediaKind::Video);
        Self {
            source,
            kind,
            fullsize_path: gallery_assets_dir.join(FULLSIZE_DIR).join(fullsize_name),
            vignette_path: gallery_assets_dir.join(vignette_name(fullsize_name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Vignette and full-size re-encode written.
    Transcoded,
    /// Transcode failed; source copied to the full-size path.
    FallbackCopy,
    /// Non-image media copied verbatim.
    Copied,
    /// Nothing usable was written.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub status: ItemStatus,
}

fn copy_verbatim(task: &MediaTask, ok_status: ItemStatus) -> ItemStatus {
    match std::fs::copy(&task.source, &task.fullsize_path) {
        Ok(_) => ok_status,
        Err(e) => {
            log::error!(
                "Failed to copy {} to {}: {e}",
                task.source.display(),
                task.fullsize_path.display()
            );
            ItemStatus::Failed
        }
    }
}

/// Produce the outputs for one media file. Never fails; the status says what
/// was written.
pub fn process_item(
    backend: &impl ImageBackend,
    task: &MediaTask,
    config: &ProcessConfig,
) -> ItemStatus {
    if task.kind != MediaKind::Image {
        return copy_verbatim(task, ItemStatus::Copied);
    }

    let params = TranscodeParams {
        source: task.source.clone(),
        fullsize_output: task.fullsize_path.clone(),
        vignette_output: task.vignette_path.clone(),
        vignette_width: config.vignette_width,
        quality: config.quality,
    };
    let result = run_isolated(|| backend.transcode(&params)).unwrap_or_else(|panic| {
        Err(BackendError::ProcessingFailed(format!("transcoder panicked: {panic}")))
    });
    match result {
        Ok(outcome) => {
            log::debug!(
                "{} → {}x{} + {}x{} vignette",
                task.source.display(),
                outcome.fullsize.width,
                outcome.fullsize.height,
                outcome.vignette.width,
                outcome.vignette.height
            );
            ItemStatus::Transcoded
        }
        Err(e) => {
            log::warn!("Error processing image {}: {e}", task.source.display());
            if task.vignette_path.exists() {
                let _ = std::fs::remove_file(&task.vignette_path);
            }
            copy_verbatim(task, ItemStatus::FallbackCopy)
        }
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Outcome of the transcode phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessSummary {
    pub items: Vec<ItemReport>,
}

impl ProcessSummary {
    fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn transcoded(&self) -> usize {
        self.count(ItemStatus::Transcoded)
    }

    pub fn fallbacks(&self) -> usize {
        self.count(ItemStatus::FallbackCopy)
    }

    pub fn copied(&self) -> usize {
        self.count(ItemStatus::Copied)
    }

    pub fn failed(&self) -> usize {
        self.count(ItemStatus::Failed)
    }
}

/// Write every gallery's media into `assets_root` and rewrite each record's
/// `file_name` to its full-size output name.
///
/// Output directories are created up front; a failure there is fatal. After
/// that, per-item failures are isolated (see the [module docs](self)).
pub fn process_galleries(
    backend: &impl ImageBackend,
    scheduler: &Scheduler,
    galleries: &mut [GalleryInfo],
    source_root: &Path,
    assets_root: &Path,
    config: &ProcessConfig,
) -> Result<ProcessSummary, ProcessError> {
    let mut tasks = Vec::new();
    let mut planned_names = Vec::with_capacity(galleries.len());

    for gallery in galleries.iter() {
        let assets_dir = assets_root.join(gallery_relative_dir(source_root, gallery));
        let fullsize_dir = assets_dir.join(FULLSIZE_DIR);
        std::fs::create_dir_all(&fullsize_dir).map_err(|source| ProcessError::CreateDir {
            path: fullsize_dir.clone(),
            source,
        })?;

        let names = plan_file_names(&gallery.medias);
        for (media, name) in gallery.medias.iter().zip(&names) {
            tasks.push(MediaTask::new(
                media.source_path.clone(),
                &assets_dir,
                name,
            ));
        }
        planned_names.push(names);
    }

    log::info!("Importing {} files to gallery assets...", tasks.len());
    let items = scheduler.map(tasks, |task| {
        let status = process_item(backend, &task, config);
        ItemReport {
            source: task.source,
            output: task.fullsize_path,
            status,
        }
    });

    for (gallery, names) in galleries.iter_mut().zip(planned_names) {
        for (media, name) in gallery.medias.iter_mut().zip(names) {
            media.file_name = name;
        }
    }

    Ok(ProcessSummary { items })
}
