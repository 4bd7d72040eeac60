//! Capture metadata extraction.
//!
//! Turns one media file into a [`MediaMetadata`] record. Extraction never
//! fails from the caller's point of view: every problem degrades to a
//! documented default and a warning.
//!
//! ## Two layers
//!
//! - [`read_capture_tags`] reads the raw EXIF values with `kamadak-exif` and
//!   returns `Result<CaptureTags, MetadataError>`. A file that is readable but
//!   simply carries no EXIF block is *not* an error; it yields empty tags.
//! - [`extract_media`] orchestrates: classify the file, read tags, format
//!   exposure values, resolve GPS through the [`Geocoder`], and substitute
//!   defaults.
//!
//! ## Defaults
//!
//! | Situation | camera | lens | location |
//! |---|---|---|---|
//! | Video | `N/A` | `N/A` | caller default |
//! | Image, tag missing | `Unknown Camera` | `Unknown Lens` | caller default |
//! | Image, unreadable | `Unknown Camera` | `Unknown Lens` | `Unknown Location` |
//!
//! ## Capture time
//!
//! `DateTimeOriginal`, then `DateTime`, then the time of extraction. EXIF
//! stores local wall-clock time without an offset; it is taken as UTC so a
//! timestamp never shifts with the machine running the import.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use exif::{Exif, In, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::geocode::{Clock, Geocoder, ReverseGeocode};
use crate::types::{
    MediaKind, MediaMetadata, NOT_AVAILABLE, UNKNOWN_CAMERA, UNKNOWN_LENS, UNKNOWN_LOCATION,
};

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("cannot open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed EXIF in {}: {source}", path.display())]
    Exif { path: PathBuf, source: exif::Error },
}

/// Raw capture values as recorded by the camera.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureTags {
    pub date_time_original: Option<DateTime<Utc>>,
    pub date_time: Option<DateTime<Utc>>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub lens_model: Option<String>,
    pub iso: Option<u32>,
    /// Seconds.
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    /// Millimetres.
    pub focal_length: Option<f64>,
    /// Signed decimal degrees `(latitude, longitude)`.
    pub gps: Option<(f64, f64)>,
}

impl CaptureTags {
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.date_time_original.or(self.date_time)
    }
}

/// Read EXIF tags from an image file.
pub fn read_capture_tags(path: &Path) -> Result<CaptureTags, MetadataError> {
    let file = File::open(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(tags_from_exif(&exif)),
        Err(exif::Error::NotFound(_)) => Ok(CaptureTags::default()),
        Err(source) => Err(MetadataError::Exif {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn tags_from_exif(exif: &Exif) -> CaptureTags {
    CaptureTags {
        date_time_original: datetime_tag(exif, Tag::DateTimeOriginal),
        date_time: datetime_tag(exif, Tag::DateTime),
        make: ascii_tag(exif, Tag::Make),
        model: ascii_tag(exif, Tag::Model),
        lens_model: ascii_tag(exif, Tag::LensModel),
        iso: exif
            .get_field(Tag::PhotographicSensitivity, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0))
            .filter(|&iso| iso > 0),
        exposure_time: rational_tag(exif, Tag::ExposureTime),
        f_number: rational_tag(exif, Tag::FNumber),
        focal_length: rational_tag(exif, Tag::FocalLength),
        gps: gps_coordinates(exif),
    }
}

fn ascii_tag(exif: &Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => {
            let raw = parts.first()?;
            let s = String::from_utf8_lossy(raw);
            let s = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    }
}

fn rational_tag(exif: &Exif, tag: Tag) -> Option<f64> {
    let value = match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(v) => v.first()?.to_f64(),
        Value::SRational(v) => v.first()?.to_f64(),
        _ => return None,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn datetime_tag(exif: &Exif, tag: Tag) -> Option<DateTime<Utc>> {
    parse_exif_datetime(&ascii_tag(exif, tag)?)
}

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` timestamp as UTC.
///
/// Trailing sub-second or offset text is ignored; unknown dates written as
/// all zeros or blanks yield `None`.
pub fn parse_exif_datetime(s: &str) -> Option<DateTime<Utc>> {
    let head = s.get(..19)?;
    NaiveDateTime::parse_from_str(head, "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn gps_coordinates(exif: &Exif) -> Option<(f64, f64)> {
    let lat = gps_axis(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S')?;
    let lon = gps_axis(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W')?;
    Some((lat, lon))
}

/// Degrees/minutes/seconds rationals plus an optional hemisphere reference.
fn gps_axis(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative: u8) -> Option<f64> {
    let degrees = match &exif.get_field(value_tag, In::PRIMARY)?.value {
        Value::Rational(r) if r.len() >= 3 => {
            r[0].to_f64() + r[1].to_f64() / 60.0 + r[2].to_f64() / 3600.0
        }
        _ => return None,
    };
    if !degrees.is_finite() {
        return None;
    }
    let southern_or_western = exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Ascii(parts) => parts.first().and_then(|p| p.first()).copied(),
            _ => None,
        })
        .is_some_and(|c| c.eq_ignore_ascii_case(&negative));
    Some(if southern_or_western { -degrees } else { degrees })
}

// ============================================================================
// Formatting
// ============================================================================

/// ISO-8601 UTC with millisecond precision and a `Z` suffix.
pub fn format_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `1/N` for sub-second exposures, `{t}s` for long ones.
pub fn format_shutter_speed(exposure: Option<f64>) -> String {
    match exposure {
        Some(t) if t < 1.0 => format!("1/{}", (1.0 / t).round() as u64),
        Some(t) => format!("{t}s"),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_aperture(f_number: Option<f64>) -> String {
    f_number.map_or_else(|| NOT_AVAILABLE.to_string(), |f| format!("f/{f}"))
}

pub fn format_focal_length(focal: Option<f64>) -> String {
    focal.map_or_else(|| NOT_AVAILABLE.to_string(), |mm| format!("{mm}mm"))
}

/// `"Make Model"` when both are recorded.
pub fn format_camera(make: Option<&str>, model: Option<&str>) -> String {
    match (make, model) {
        (Some(make), Some(model)) => format!("{make} {model}"),
        _ => UNKNOWN_CAMERA.to_string(),
    }
}

// ============================================================================
// Orchestration
// ============================================================================

/// The record before any tags are read.
fn base_record(path: &Path, location: &str, now: DateTime<Utc>) -> MediaMetadata {
    MediaMetadata {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        original_path: path.to_string_lossy().into_owned(),
        source_path: path.to_path_buf(),
        iso_date_time: format_iso(now),
        camera: NOT_AVAILABLE.to_string(),
        lens: NOT_AVAILABLE.to_string(),
        iso: 0,
        shutter_speed: NOT_AVAILABLE.to_string(),
        aperture: NOT_AVAILABLE.to_string(),
        focal_length: NOT_AVAILABLE.to_string(),
        gps_coords: None,
        location: location.to_string(),
    }
}

/// Record for an image whose metadata could not be read at all.
pub fn unreadable_media(path: &Path) -> MediaMetadata {
    MediaMetadata {
        camera: UNKNOWN_CAMERA.to_string(),
        lens: UNKNOWN_LENS.to_string(),
        ..base_record(path, UNKNOWN_LOCATION, Utc::now())
    }
}

/// Build the metadata record for one file.
///
/// `default_location` is used for videos, for images without GPS, and when
/// geocoding fails. Only an unreadable image falls back to
/// `Unknown Location`.
pub fn extract_media<G: ReverseGeocode, C: Clock>(
    path: &Path,
    default_location: &str,
    geocoder: &Geocoder<G, C>,
) -> MediaMetadata {
    let now = Utc::now();
    let base = base_record(path, default_location, now);

    if MediaKind::from_path(path) != Some(MediaKind::Image) {
        return base;
    }

    let tags = match read_capture_tags(path) {
        Ok(tags) => tags,
        Err(e) => {
            log::warn!("Failed to extract EXIF data: {e}");
            return unreadable_media(path);
        }
    };

    let location = match tags.gps {
        Some((lat, lon)) => match geocoder.resolve(lat, lon) {
            Ok(place) => place,
            Err(e) => {
                log::warn!("Failed to reverse geocode coordinates [{lat}, {lon}]: {e}");
                default_location.to_string()
            }
        },
        None => default_location.to_string(),
    };

    MediaMetadata {
        iso_date_time: format_iso(tags.captured_at().unwrap_or(now)),
        camera: format_camera(tags.make.as_deref(), tags.model.as_deref()),
        lens: tags
            .lens_model
            .clone()
            .unwrap_or_else(|| UNKNOWN_LENS.to_string()),
        iso: tags.iso.unwrap_or(0),
        shutter_speed: format_shutter_speed(tags.exposure_time),
        aperture: format_aperture(tags.f_number),
        focal_length: format_focal_length(tags.focal_length),
        gps_coords: tags.gps,
        location,
        ..base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::gate::tests::FakeClock;
    use crate::geocode::tests::{FakeClient, fake_geocoder};
    use crate::geocode::{GeocodeCache, GeocodeError};
    use crate::test_helpers::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn full_fixture() -> ExifFixture {
        ExifFixture::camera("FUJIFILM", "X-T5")
            .taken("2024:03:15 12:30:45")
            .modified("2024:04:01 09:00:00")
            .lens("XF23mmF1.4 R LM WR")
            .exposure(200, (1, 250), (56, 10), (23, 1))
            .gps(48.8584, 2.2945)
    }

    fn no_network() -> Geocoder<FakeClient, Arc<FakeClock>> {
        fake_geocoder(FakeClient::new(), GeocodeCache::new())
    }

    // =========================================================================
    // Tag reading
    // =========================================================================

    #[test]
    fn reads_every_tag() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dawn.jpg");
        write_jpeg(&path, 32, 24, Some(&full_fixture()));

        let tags = read_capture_tags(&path).unwrap();
        assert_eq!(tags.make.as_deref(), Some("FUJIFILM"));
        assert_eq!(tags.model.as_deref(), Some("X-T5"));
        assert_eq!(tags.lens_model.as_deref(), Some("XF23mmF1.4 R LM WR"));
        assert_eq!(tags.iso, Some(200));
        assert_eq!(tags.exposure_time, Some(0.004));
        assert_eq!(tags.f_number, Some(5.6));
        assert_eq!(tags.focal_length, Some(23.0));
        assert_eq!(
            tags.date_time_original,
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 45).unwrap())
        );
        let (lat, lon) = tags.gps.unwrap();
        assert!((lat - 48.8584).abs() < 1e-6, "lat {lat}");
        assert!((lon - 2.2945).abs() < 1e-6, "lon {lon}");
    }

    #[test]
    fn degrees_minutes_seconds_combine() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("eiffel.jpg");
        let exif = ExifFixture::default().gps_dms(
            "N",
            [(48, 1), (51, 1), (3024, 100)],
            "E",
            [(2, 1), (17, 1), (402, 10)],
        );
        write_jpeg(&path, 8, 8, Some(&exif));

        let (lat, lon) = read_capture_tags(&path).unwrap().gps.unwrap();
        assert!((lat - 48.8584).abs() < 1e-9, "lat {lat}");
        assert!((lon - 2.2945).abs() < 1e-9, "lon {lon}");
    }

    #[test]
    fn lowercase_refs_still_flip_sign() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rio.jpg");
        let exif = ExifFixture::default().gps_dms(
            "s",
            [(22, 1), (54, 1), (0, 1)],
            "w",
            [(43, 1), (12, 1), (0, 1)],
        );
        write_jpeg(&path, 8, 8, Some(&exif));

        let (lat, lon) = read_capture_tags(&path).unwrap().gps.unwrap();
        assert!((lat + 22.9).abs() < 1e-9);
        assert!((lon + 43.2).abs() < 1e-9);
    }

    #[test]
    fn southern_and_western_hemispheres_are_negative() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nemo.jpg");
        write_jpeg(
            &path,
            8,
            8,
            Some(&ExifFixture::default().gps(-48.876667, -123.393333)),
        );
        let (lat, lon) = read_capture_tags(&path).unwrap().gps.unwrap();
        assert!((lat + 48.876667).abs() < 1e-6);
        assert!((lon + 123.393333).abs() < 1e-6);
    }

    #[test]
    fn missing_exif_block_is_empty_not_error() {
        let tmp = TempDir::new().unwrap();
        let jpg = tmp.path().join("plain.jpg");
        write_jpeg(&jpg, 8, 8, None);
        assert_eq!(read_capture_tags(&jpg).unwrap(), CaptureTags::default());

        let png = tmp.path().join("plain.png");
        write_png(&png, 8, 8);
        assert_eq!(read_capture_tags(&png).unwrap(), CaptureTags::default());
    }

    #[test]
    fn garbage_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        assert!(matches!(
            read_capture_tags(&path),
            Err(MetadataError::Exif { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(matches!(
            read_capture_tags(Path::new("/nonexistent/photo.jpg")),
            Err(MetadataError::Io { .. })
        ));
    }

    #[test]
    fn datetime_parsing() {
        assert_eq!(
            parse_exif_datetime("2024:03:15 12:30:45"),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 45).unwrap())
        );
        assert!(parse_exif_datetime("2024:03:15 12:30:45.123").is_some());
        assert_eq!(parse_exif_datetime("0000:00:00 00:00:00"), None);
        assert_eq!(parse_exif_datetime("    :  :     :  :  "), None);
        assert_eq!(parse_exif_datetime("2024"), None);
    }

    // =========================================================================
    // Formatting
    // =========================================================================

    #[test]
    fn shutter_speed_formats() {
        assert_eq!(format_shutter_speed(Some(1.0 / 250.0)), "1/250");
        assert_eq!(format_shutter_speed(Some(0.5)), "1/2");
        assert_eq!(format_shutter_speed(Some(1.0 / 3.0)), "1/3");
        assert_eq!(format_shutter_speed(Some(2.0)), "2s");
        assert_eq!(format_shutter_speed(Some(1.5)), "1.5s");
        assert_eq!(format_shutter_speed(None), "N/A");
    }

    #[test]
    fn aperture_and_focal_length_formats() {
        assert_eq!(format_aperture(Some(2.8)), "f/2.8");
        assert_eq!(format_aperture(Some(8.0)), "f/8");
        assert_eq!(format_aperture(None), "N/A");
        assert_eq!(format_focal_length(Some(35.0)), "35mm");
        assert_eq!(format_focal_length(Some(4.25)), "4.25mm");
        assert_eq!(format_focal_length(None), "N/A");
    }

    #[test]
    fn camera_needs_make_and_model() {
        assert_eq!(format_camera(Some("Canon"), Some("EOS R5")), "Canon EOS R5");
        assert_eq!(format_camera(Some("Canon"), None), UNKNOWN_CAMERA);
        assert_eq!(format_camera(None, Some("EOS R5")), UNKNOWN_CAMERA);
    }

    #[test]
    fn iso_timestamp_has_millis_and_z() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 45).unwrap();
        assert_eq!(format_iso(dt), "2024-03-15T12:30:45.000Z");
    }

    // =========================================================================
    // extract_media
    // =========================================================================

    #[test]
    fn extracts_full_record_with_geocoded_location() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dawn.jpg");
        write_jpeg(&path, 32, 24, Some(&full_fixture()));
        let geocoder = fake_geocoder(
            FakeClient::new().with_city(48.8584, 2.2945, "Paris"),
            GeocodeCache::new(),
        );

        let media = extract_media(&path, "trip", &geocoder);
        assert_eq!(media.file_name, "dawn.jpg");
        assert_eq!(media.original_path, path.to_string_lossy());
        assert_eq!(media.source_path, path);
        assert_eq!(media.iso_date_time, "2024-03-15T12:30:45.000Z");
        assert_eq!(media.camera, "FUJIFILM X-T5");
        assert_eq!(media.lens, "XF23mmF1.4 R LM WR");
        assert_eq!(media.iso, 200);
        assert_eq!(media.shutter_speed, "1/250");
        assert_eq!(media.aperture, "f/5.6");
        assert_eq!(media.focal_length, "23mm");
        assert!(media.gps_coords.is_some());
        assert_eq!(media.location, "Paris");
    }

    #[test]
    fn falls_back_to_datetime_tag() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("edit.jpg");
        let exif = ExifFixture::camera("Apple", "iPhone 15").modified("2023:12:31 23:59:59");
        write_jpeg(&path, 8, 8, Some(&exif));

        let media = extract_media(&path, "trip", &no_network());
        assert_eq!(media.iso_date_time, "2023-12-31T23:59:59.000Z");
    }

    #[test]
    fn image_without_tags_uses_unknown_camera_and_caller_location() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plain.jpg");
        write_jpeg(&path, 8, 8, None);

        let before = Utc::now();
        let media = extract_media(&path, "Holidays", &no_network());
        assert_eq!(media.camera, UNKNOWN_CAMERA);
        assert_eq!(media.lens, UNKNOWN_LENS);
        assert_eq!(media.iso, 0);
        assert_eq!(media.shutter_speed, NOT_AVAILABLE);
        assert_eq!(media.aperture, NOT_AVAILABLE);
        assert_eq!(media.focal_length, NOT_AVAILABLE);
        assert_eq!(media.gps_coords, None);
        assert_eq!(media.location, "Holidays");

        let stamped = DateTime::parse_from_rfc3339(&media.iso_date_time).unwrap();
        assert!(stamped.timestamp() >= before.timestamp());
    }

    #[test]
    fn unreadable_image_uses_unknown_location() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let media = extract_media(&path, "Holidays", &no_network());
        assert_eq!(media.camera, UNKNOWN_CAMERA);
        assert_eq!(media.lens, UNKNOWN_LENS);
        assert_eq!(media.location, UNKNOWN_LOCATION);
        assert_eq!(media.gps_coords, None);
    }

    #[test]
    fn video_skips_tag_reading() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clip.mp4");
        write_video(&path);
        let geocoder = no_network();

        let media = extract_media(&path, "Holidays", &geocoder);
        assert_eq!(media.camera, NOT_AVAILABLE);
        assert_eq!(media.lens, NOT_AVAILABLE);
        assert_eq!(media.location, "Holidays");
        assert_eq!(geocoder.stats().dispatches, 0);
    }

    #[test]
    fn failed_geocode_keeps_coordinates_and_default_location() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rate-limited.jpg");
        write_jpeg(
            &path,
            8,
            8,
            Some(&ExifFixture::camera("Sony", "A7 IV").gps(10.0, 10.0)),
        );
        let geocoder = fake_geocoder(
            FakeClient::new().with_error(10.0, 10.0, GeocodeError::Http(503)),
            GeocodeCache::new(),
        );

        let media = extract_media(&path, "Safari", &geocoder);
        assert_eq!(media.location, "Safari");
        assert!(media.gps_coords.is_some());
        assert!(geocoder.cache().is_empty());
    }

    #[test]
    fn unresolvable_ocean_keeps_default_location() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nemo.jpg");
        write_jpeg(
            &path,
            8,
            8,
            Some(&ExifFixture::default().gps(-48.876667, -123.393333)),
        );
        let media = extract_media(&path, "Pacific", &no_network());
        assert_eq!(media.location, "Pacific");
    }
}
