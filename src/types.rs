//! Shared records passed between pipeline stages.
//!
//! Both types are serialized verbatim into the per-gallery manifests, so their
//! field names (camelCase) are the contract with the site-rendering layer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Image extensions the importer decodes and transcodes (lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
/// Video extensions the importer copies verbatim (lowercase).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

/// Sentinel for exposure fields the camera did not record.
pub const NOT_AVAILABLE: &str = "N/A";
pub const UNKNOWN_CAMERA: &str = "Unknown Camera";
pub const UNKNOWN_LENS: &str = "Unknown Lens";
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// What the importer does with a file, decided by its extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a path by its (case-insensitive) extension. `None` for
    /// anything the importer ignores.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }
}

/// Capture metadata for one media file.
///
/// Created once during extraction. Only `file_name` changes afterwards: the
/// process stage rewrites it to the derivative name the manifest points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub file_name: String,
    /// Source path as shown in the manifest; lossy for non-UTF-8 names.
    pub original_path: String,
    /// The source path itself, used for every filesystem access.
    #[serde(skip)]
    pub source_path: PathBuf,
    /// ISO-8601 UTC, millisecond precision (`2024-03-15T12:30:45.000Z`).
    pub iso_date_time: String,
    pub camera: String,
    pub lens: String,
    pub iso: u32,
    pub shutter_speed: String,
    pub aperture: String,
    pub focal_length: String,
    /// `[latitude, longitude]` in decimal degrees.
    pub gps_coords: Option<(f64, f64)>,
    pub location: String,
}

/// One source directory and the media it directly contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryInfo {
    /// Directory name.
    pub name: String,
    /// Source directory path as given on the command line, joined with the
    /// relative path of the gallery.
    pub path: String,
    pub medias: Vec<MediaMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MediaMetadata {
        MediaMetadata {
            file_name: "dawn.jpg".into(),
            original_path: "/photos/trip/dawn.jpg".into(),
            source_path: PathBuf::from("/photos/trip/dawn.jpg"),
            iso_date_time: "2024-03-15T12:30:45.000Z".into(),
            camera: "FUJIFILM X-T5".into(),
            lens: UNKNOWN_LENS.into(),
            iso: 200,
            shutter_speed: "1/250".into(),
            aperture: "f/5.6".into(),
            focal_length: "23mm".into(),
            gps_coords: Some((48.8584, 2.2945)),
            location: "Paris".into(),
        }
    }

    #[test]
    fn media_kind_by_extension() {
        assert_eq!(MediaKind::from_path(Path::new("a/dawn.JPG")), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path(Path::new("b.webp")), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path(Path::new("clip.MOV")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(MediaKind::from_path(Path::new("README")), None);
        assert_eq!(MediaKind::from_path(Path::new("photo.heic")), None);
    }

    #[test]
    fn media_serializes_with_camel_case_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["fileName"], "dawn.jpg");
        assert_eq!(json["originalPath"], "/photos/trip/dawn.jpg");
        assert_eq!(json["isoDateTime"], "2024-03-15T12:30:45.000Z");
        assert_eq!(json["shutterSpeed"], "1/250");
        assert_eq!(json["focalLength"], "23mm");
    }

    #[test]
    fn gps_coords_serialize_as_pair_or_null() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["gpsCoords"], serde_json::json!([48.8584, 2.2945]));

        let no_gps = MediaMetadata {
            gps_coords: None,
            ..sample()
        };
        let json = serde_json::to_value(no_gps).unwrap();
        assert!(json["gpsCoords"].is_null());
    }

    #[test]
    fn source_path_stays_out_of_manifests() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("sourcePath").is_none());
        assert_eq!(json.as_object().unwrap().len(), 11);
    }
}
