//! Shared test utilities for the gallery-import test suite.
//!
//! Builds small but real media files on disk: JPEGs carrying a hand-assembled
//! EXIF block, PNGs with an optional `eXIf` chunk, and placeholder videos. Nothing here needs fixture
//! files from the repository.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let exif = ExifFixture::camera("FUJIFILM", "X-T5")
//!     .taken("2024:03:15 12:30:45")
//!     .gps(48.8584, 2.2945);
//! write_jpeg(&tmp.path().join("dawn.jpg"), 64, 48, Some(&exif));
//! ```

use image::{ImageEncoder, RgbImage};
use std::path::Path;

// =========================================================================
// EXIF block builder
// =========================================================================

/// Tag values for the synthetic EXIF block. `None` fields are omitted.
#[derive(Debug, Clone, Default)]
pub struct ExifFixture {
    pub make: Option<String>,
    pub model: Option<String>,
    pub orientation: Option<u16>,
    pub date_time: Option<String>,
    pub date_time_original: Option<String>,
    pub lens_model: Option<String>,
    pub iso: Option<u16>,
    pub exposure: Option<(u32, u32)>,
    pub f_number: Option<(u32, u32)>,
    pub focal_length: Option<(u32, u32)>,
    pub gps: Option<GpsTags>,
}

/// Raw GPS IFD values: ref letter plus three rationals per axis.
#[derive(Debug, Clone)]
pub struct GpsTags {
    pub lat_ref: &'static str,
    pub lat: [(u32, u32); 3],
    pub lon_ref: &'static str,
    pub lon: [(u32, u32); 3],
}

impl ExifFixture {
    pub fn camera(make: &str, model: &str) -> Self {
        Self {
            make: Some(make.into()),
            model: Some(model.into()),
            ..Default::default()
        }
    }

    pub fn taken(mut self, date_time_original: &str) -> Self {
        self.date_time_original = Some(date_time_original.into());
        self
    }

    pub fn modified(mut self, date_time: &str) -> Self {
        self.date_time = Some(date_time.into());
        self
    }

    pub fn lens(mut self, lens: &str) -> Self {
        self.lens_model = Some(lens.into());
        self
    }

    pub fn exposure(mut self, iso: u16, time: (u32, u32), f: (u32, u32), focal: (u32, u32)) -> Self {
        self.iso = Some(iso);
        self.exposure = Some(time);
        self.f_number = Some(f);
        self.focal_length = Some(focal);
        self
    }

    pub fn oriented(mut self, orientation: u16) -> Self {
        self.orientation = Some(orientation);
        self
    }

    /// Decimal degrees, stored as a single degrees rational with zero
    /// minutes and seconds so the value reads back bit-identical.
    pub fn gps(mut self, lat: f64, lon: f64) -> Self {
        self.gps = Some(GpsTags {
            lat_ref: if lat < 0.0 { "S" } else { "N" },
            lat: decimal_degrees(lat.abs()),
            lon_ref: if lon < 0.0 { "W" } else { "E" },
            lon: decimal_degrees(lon.abs()),
        });
        self
    }

    /// Degrees/minutes/seconds exactly as a camera writes them.
    pub fn gps_dms(
        mut self,
        lat_ref: &'static str,
        lat: [(u32, u32); 3],
        lon_ref: &'static str,
        lon: [(u32, u32); 3],
    ) -> Self {
        self.gps = Some(GpsTags {
            lat_ref,
            lat,
            lon_ref,
            lon,
        });
        self
    }

    /// Big-endian TIFF structure: IFD0, then the Exif IFD, then the GPS IFD.
    pub fn to_tiff(&self) -> Vec<u8> {
        let mut ifd0 = Vec::new();
        push_ascii(&mut ifd0, 0x010F, &self.make);
        push_ascii(&mut ifd0, 0x0110, &self.model);
        if let Some(o) = self.orientation {
            ifd0.push((0x0112, TagValue::Short(o)));
        }
        push_ascii(&mut ifd0, 0x0132, &self.date_time);

        let mut exif_ifd = Vec::new();
        if let Some(t) = self.exposure {
            exif_ifd.push((0x829A, TagValue::Rational(vec![t])));
        }
        if let Some(f) = self.f_number {
            exif_ifd.push((0x829D, TagValue::Rational(vec![f])));
        }
        if let Some(iso) = self.iso {
            exif_ifd.push((0x8827, TagValue::Short(iso)));
        }
        push_ascii(&mut exif_ifd, 0x9003, &self.date_time_original);
        if let Some(fl) = self.focal_length {
            exif_ifd.push((0x920A, TagValue::Rational(vec![fl])));
        }
        push_ascii(&mut exif_ifd, 0xA434, &self.lens_model);

        let mut gps_ifd = Vec::new();
        if let Some(gps) = &self.gps {
            gps_ifd.push((0x0001, TagValue::Ascii(gps.lat_ref.into())));
            gps_ifd.push((0x0002, TagValue::Rational(gps.lat.to_vec())));
            gps_ifd.push((0x0003, TagValue::Ascii(gps.lon_ref.into())));
            gps_ifd.push((0x0004, TagValue::Rational(gps.lon.to_vec())));
        }

        // Pointer entries are inline LONGs, so IFD0's size is known before
        // their values are.
        let has_exif = !exif_ifd.is_empty();
        let has_gps = !gps_ifd.is_empty();
        if has_exif {
            ifd0.push((0x8769, TagValue::Long(0)));
        }
        if has_gps {
            ifd0.push((0x8825, TagValue::Long(0)));
        }
        let exif_offset = 8 + ifd_size(&ifd0);
        let gps_offset = exif_offset + if has_exif { ifd_size(&exif_ifd) } else { 0 };
        for (tag, value) in ifd0.iter_mut() {
            match *tag {
                0x8769 => *value = TagValue::Long(exif_offset as u32),
                0x8825 => *value = TagValue::Long(gps_offset as u32),
                _ => {}
            }
        }

        let mut out = vec![b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08];
        write_ifd(&mut out, &mut ifd0);
        if has_exif {
            write_ifd(&mut out, &mut exif_ifd);
        }
        if has_gps {
            write_ifd(&mut out, &mut gps_ifd);
        }
        out
    }

    /// JPEG APP1 segment (marker included) wrapping [`Self::to_tiff`].
    pub fn to_app1(&self) -> Vec<u8> {
        let tiff = self.to_tiff();
        let len = (2 + 6 + tiff.len()) as u16;
        let mut seg = vec![0xFF, 0xE1];
        seg.extend_from_slice(&len.to_be_bytes());
        seg.extend_from_slice(b"Exif\0\0");
        seg.extend_from_slice(&tiff);
        seg
    }
}

#[derive(Debug, Clone)]
enum TagValue {
    Ascii(String),
    Short(u16),
    Long(u32),
    Rational(Vec<(u32, u32)>),
}

impl TagValue {
    fn type_and_count(&self) -> (u16, u32) {
        match self {
            TagValue::Ascii(s) => (2, s.len() as u32 + 1),
            TagValue::Short(_) => (3, 1),
            TagValue::Long(_) => (4, 1),
            TagValue::Rational(v) => (5, v.len() as u32),
        }
    }

    fn bytes(&self) -> Vec<u8> {
        match self {
            TagValue::Ascii(s) => {
                let mut b = s.as_bytes().to_vec();
                b.push(0);
                b
            }
            TagValue::Short(v) => v.to_be_bytes().to_vec(),
            TagValue::Long(v) => v.to_be_bytes().to_vec(),
            TagValue::Rational(v) => v
                .iter()
                .flat_map(|(n, d)| n.to_be_bytes().into_iter().chain(d.to_be_bytes()))
                .collect(),
        }
    }
}

fn push_ascii(entries: &mut Vec<(u16, TagValue)>, tag: u16, value: &Option<String>) {
    if let Some(v) = value {
        entries.push((tag, TagValue::Ascii(v.clone())));
    }
}

fn decimal_degrees(deg: f64) -> [(u32, u32); 3] {
    [((deg * 1_000_000.0).round() as u32, 1_000_000), (0, 1), (0, 1)]
}

fn padded(len: usize) -> usize {
    len + (len & 1)
}

fn ifd_size(entries: &[(u16, TagValue)]) -> usize {
    let data: usize = entries
        .iter()
        .map(|(_, v)| v.bytes().len())
        .filter(|&n| n > 4)
        .map(padded)
        .sum();
    2 + 12 * entries.len() + 4 + data
}

/// Append an IFD at `out.len()`, followed by its out-of-line value area.
fn write_ifd(out: &mut Vec<u8>, entries: &mut [(u16, TagValue)]) {
    entries.sort_by_key(|(tag, _)| *tag);
    let start = out.len();
    let mut data_offset = start + 2 + 12 * entries.len() + 4;
    let mut data = Vec::new();

    out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for (tag, value) in entries.iter() {
        let (ty, count) = value.type_and_count();
        let bytes = value.bytes();
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&ty.to_be_bytes());
        out.extend_from_slice(&count.to_be_bytes());
        if bytes.len() <= 4 {
            let mut inline = bytes.clone();
            inline.resize(4, 0);
            out.extend_from_slice(&inline);
        } else {
            out.extend_from_slice(&(data_offset as u32).to_be_bytes());
            data.extend_from_slice(&bytes);
            if bytes.len() & 1 == 1 {
                data.push(0);
            }
            data_offset += padded(bytes.len());
        }
    }
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&data);
}

// =========================================================================
// Media files
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Encode a gradient JPEG in memory, optionally with an EXIF APP1 segment
/// right after SOI.
pub fn jpeg_bytes(width: u32, height: u32, exif: Option<&ExifFixture>) -> Vec<u8> {
    let img = gradient(width, height);
    let mut encoded = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut encoded)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();

    match exif {
        Some(exif) => {
            let mut out = encoded[..2].to_vec();
            out.extend_from_slice(&exif.to_app1());
            out.extend_from_slice(&encoded[2..]);
            out
        }
        None => encoded,
    }
}

pub fn write_jpeg(path: &Path, width: u32, height: u32, exif: Option<&ExifFixture>) {
    ensure_parent(path);
    std::fs::write(path, jpeg_bytes(width, height, exif)).unwrap();
}

/// Encode a gradient PNG in memory, optionally with an `eXIf` chunk.
pub fn png_bytes(width: u32, height: u32, exif: Option<&ExifFixture>) -> Vec<u8> {
    let mut encoded = Vec::new();
    gradient(width, height)
        .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Png)
        .unwrap();
    let Some(exif) = exif else {
        return encoded;
    };
    let mut png = img_parts::png::Png::from_bytes(encoded.into()).unwrap();
    img_parts::ImageEXIF::set_exif(&mut png, Some(exif.to_tiff().into()));
    let mut out = Vec::new();
    png.encoder().write_to(&mut out).unwrap();
    out
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    gradient(width, height).save(path).unwrap();
}

pub fn write_png_with_exif(path: &Path, width: u32, height: u32, exif: &ExifFixture) {
    ensure_parent(path);
    std::fs::write(path, png_bytes(width, height, Some(exif))).unwrap();
}

/// Not a real container; videos are only ever copied.
pub fn write_video(path: &Path) {
    ensure_parent(path);
    std::fs::write(path, b"\x00\x00\x00\x18ftypmp42 not really a video").unwrap();
}

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
}

/// Read back the dimensions of an encoded image.
pub fn image_dimensions(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_parses_with_exif_reader() {
        let exif = ExifFixture::camera("Canon", "EOS R5")
            .taken("2023:07:01 08:00:00")
            .lens("RF24-70mm F2.8 L IS USM")
            .exposure(400, (1, 125), (28, 10), (35, 1))
            .oriented(6)
            .gps(-33.8568, 151.2153);
        let bytes = jpeg_bytes(16, 8, Some(&exif));

        let parsed = exif::Reader::new()
            .read_from_container(&mut std::io::Cursor::new(bytes))
            .unwrap();
        let make = parsed
            .get_field(exif::Tag::Make, exif::In::PRIMARY)
            .unwrap();
        assert!(matches!(&make.value, exif::Value::Ascii(v) if v[0] == b"Canon"));
        let orientation = parsed
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .unwrap();
        assert_eq!(orientation.value.get_uint(0), Some(6));
        assert!(
            parsed
                .get_field(exif::Tag::GPSLongitude, exif::In::PRIMARY)
                .is_some()
        );
    }

    #[test]
    fn jpeg_with_exif_still_decodes() {
        let exif = ExifFixture::camera("Nikon", "Z6");
        let bytes = jpeg_bytes(20, 10, Some(&exif));
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (20, 10));
    }
}
