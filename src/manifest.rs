//! Per-gallery manifest files.
//!
//! Each gallery gets an `index.md` whose front matter carries the gallery
//! record as JSON, which the site-rendering layer parses as YAML:
//!
//! ```text
//! ---
//! name: "Japan"
//! path: "/photos/2024/Japan"
//! medias: [
//!   {
//!     "fileName": "20240315123045_Tokyo.jpg",
//!     ...
//!   }
//! ]
//! ---
//!
//! # Japan (12 media files)
//! ```

use crate::types::GalleryInfo;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "index.md";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Render the manifest text for one gallery.
pub fn render_manifest(gallery: &GalleryInfo) -> Result<String, ManifestError> {
    let name = serde_json::to_string(&gallery.name)?;
    let path = serde_json::to_string(&gallery.path)?;
    let medias = serde_json::to_string_pretty(&gallery.medias)?;
    Ok(format!(
        "---\nname: {name}\npath: {path}\nmedias: {medias}\n---\n\n# {} ({} media files)\n",
        gallery.name,
        gallery.medias.len()
    ))
}

/// Create `dir` and write (or overwrite) its `index.md`. Returns the written
/// path.
pub fn write_manifest(gallery: &GalleryInfo, dir: &Path) -> Result<PathBuf, ManifestError> {
    let content = render_manifest(gallery)?;
    std::fs::create_dir_all(dir).map_err(|source| ManifestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(MANIFEST_FILE);
    std::fs::write(&path, content).map_err(|source| ManifestError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
