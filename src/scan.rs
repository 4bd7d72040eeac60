//! Filesystem scanning and gallery assembly.
//!
//! Stage 1 of the import pipeline. Walks the source tree, groups supported
//! media by the directory that directly contains them, and extracts metadata
//! for every file on the worker pool.
//!
//! ## Directory Structure
//!
//! ```text
//! photos/                      # Source root (a gallery itself if it holds media)
//! ├── 2024/                    # No media: no gallery, still walked
//! │   ├── Japan/               # Gallery "Japan"
//! │   │   ├── IMG_0001.JPG
//! │   │   ├── IMG_0002.jpg
//! │   │   └── clip.mov
//! │   └── Italy/               # Gallery "Italy"
//! │       └── rome.webp
//! ├── notes.txt                # Unsupported: ignored
//! └── .thumbnails/             # Hidden: skipped entirely
//! ```
//!
//! ## Rules
//!
//! - A gallery is a directory with at least one file whose lowercase extension
//!   is in [`IMAGE_EXTENSIONS`](crate::types::IMAGE_EXTENSIONS) or
//!   [`VIDEO_EXTENSIONS`](crate::types::VIDEO_EXTENSIONS).
//! - Galleries are never merged: a parent and its child are separate galleries.
//! - Order is pre-order (a directory before its subdirectories), entries sorted
//!   by name, so two runs over the same tree produce identical output.
//! - The walk uses an explicit worklist; tree depth never touches the call stack.
//! - The default location for every file in a gallery is the directory name.

use crate::geocode::{Clock, Geocoder, ReverseGeocode};
use crate::metadata::{extract_media, unreadable_media};
use crate::scheduler::{Scheduler, run_isolated};
use crate::types::{GalleryInfo, MediaKind};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A directory holding supported media, before metadata extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryListing {
    pub name: String,
    pub path: PathBuf,
    /// Supported files directly inside `path`, sorted by name.
    pub files: Vec<PathBuf>,
}

/// Walk `root` and list every directory that directly contains supported
/// media, in pre-order.
pub fn discover(root: &Path) -> Result<Vec<GalleryListing>, ScanError> {
    let mut listings = Vec::new();
    let mut worklist = vec![root.to_path_buf()];

    while let Some(dir) = worklist.pop() {
        let (files, subdirs) = collect_entries(&dir)?;
        if !files.is_empty() {
            listings.push(GalleryListing {
                name: dir_name(&dir),
                path: dir.clone(),
                files,
            });
        }
        // Reversed so the first subdirectory is popped next.
        worklist.extend(subdirs.into_iter().rev());
    }

    Ok(listings)
}

/// Supported files and subdirectories of `dir`, each sorted by name. Hidden
/// entries are skipped. Symlinks are not followed.
fn collect_entries(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), ScanError> {
    let read_err = |source| ScanError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let file_type = entry.file_type().map_err(read_err)?;
        let path = entry.path();
        if file_type.is_dir() {
            subdirs.push(path);
        } else if file_type.is_file() && MediaKind::from_path(&path).is_some() {
            files.push(path);
        }
    }

    files.sort();
    subdirs.sort();
    Ok((files, subdirs))
}

/// Last path component; for `.`-style roots, the canonical directory name.
fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            path.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Scan `root` and extract metadata for every supported file.
///
/// Extraction for the whole tree is one batch on the scheduler, so the pool
/// stays busy across gallery boundaries; results are regrouped in listing
/// order.
pub fn scan<G: ReverseGeocode, C: Clock>(
    root: &Path,
    scheduler: &Scheduler,
    geocoder: &Geocoder<G, C>,
) -> Result<Vec<GalleryInfo>, ScanError> {
    let listings = discover(root)?;
    let total: usize = listings.iter().map(|l| l.files.len()).sum();
    log::info!(
        "Found {} media files in {} galleries, extracting metadata...",
        total,
        listings.len()
    );

    let jobs: Vec<(PathBuf, String)> = listings
        .iter()
        .flat_map(|l| l.files.iter().map(move |f| (f.clone(), l.name.clone())))
        .collect();
    let mut medias = scheduler
        .map(jobs, |(path, default_location)| {
            run_isolated(|| extract_media(&path, &default_location, geocoder)).unwrap_or_else(
                |panic| {
                    log::warn!("Metadata extraction panicked for {}: {panic}", path.display());
                    unreadable_media(&path)
                },
            )
        })
        .into_iter();

    Ok(listings
        .into_iter()
        .map(|listing| GalleryInfo {
            medias: medias.by_ref().take(listing.files.len()).collect(),
            name: listing.name,
            path: listing.path.to_string_lossy().into_owned(),
        })
        .collect())
}
