//! Embedded metadata carry-over.
//!
//! Re-encoding through the `image` crate drops everything but pixels. The
//! source's metadata is lifted with `img-parts` and attached to each freshly
//! encoded output:
//!
//! | Source | Carried |
//! |---|---|
//! | JPEG | EXIF, ICC profile, XMP (APP1) and IPTC (APP13) segments |
//! | PNG | `eXIf` and `iCCP` chunks |
//! | WebP | `EXIF` and `ICCP` chunks |
//!
//! EXIF and ICC go into any output format. XMP and IPTC segments only have a
//! home in JPEG outputs.
//!
//! The pixels written are already upright, so a carried Orientation tag is
//! rewritten to 1 with `little_exif`; otherwise viewers would rotate the
//! image a second time. If that rewrite fails the EXIF block is left out.

use image::ImageFormat;
use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::png::Png;
use img_parts::webp::WebP;
use img_parts::{Bytes, ImageEXIF, ImageICC};
use little_exif::exif_tag::ExifTag;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

const APP1: u8 = 0xE1;
const APP13: u8 = 0xED;
const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// `FF E1` + length + `Exif\0\0` in front of the TIFF block little_exif emits.
const APP1_HEADER_SIZE: usize = 10;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("cannot parse {format:?} container: {reason}")]
    Parse { format: ImageFormat, reason: String },
    #[error("cannot write {format:?} container: {source}")]
    Write {
        format: ImageFormat,
        source: std::io::Error,
    },
    #[error("cannot reset EXIF orientation: {0}")]
    Orientation(String),
}

/// Metadata lifted from a source image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedMetadata {
    /// Raw TIFF block, no `Exif\0\0` prefix.
    pub exif: Option<Bytes>,
    pub icc: Option<Bytes>,
    /// JPEG-only segments (XMP, IPTC) as `(marker, contents)`.
    pub segments: Vec<(u8, Bytes)>,
}

fn parse_error(format: ImageFormat, e: img_parts::Error) -> EmbedError {
    EmbedError::Parse {
        format,
        reason: e.to_string(),
    }
}

fn is_carried_segment(segment: &JpegSegment) -> bool {
    match segment.marker() {
        APP1 => segment.contents().starts_with(XMP_HEADER),
        APP13 => true,
        _ => false,
    }
}

fn is_app_marker(marker: u8) -> bool {
    (0xE0..=0xEF).contains(&marker)
}

impl EmbeddedMetadata {
    /// Lift metadata from an encoded source. Formats without a container
    /// reader yield nothing.
    pub fn lift(bytes: &[u8], format: ImageFormat) -> Result<Self, EmbedError> {
        let data = Bytes::copy_from_slice(bytes);
        let lifted = match format {
            ImageFormat::Jpeg => {
                let jpeg = Jpeg::from_bytes(data).map_err(|e| parse_error(format, e))?;
                let segments = jpeg
                    .segments()
                    .iter()
                    .filter(|s| is_carried_segment(s))
                    .map(|s| (s.marker(), s.contents().clone()))
                    .collect();
                Self {
                    exif: jpeg.exif(),
                    icc: jpeg.icc_profile(),
                    segments,
                }
            }
            ImageFormat::Png => {
                let png = Png::from_bytes(data).map_err(|e| parse_error(format, e))?;
                Self {
                    exif: png.exif(),
                    icc: png.icc_profile(),
                    segments: Vec::new(),
                }
            }
            ImageFormat::WebP => {
                let webp = WebP::from_bytes(data).map_err(|e| parse_error(format, e))?;
                Self {
                    exif: webp.exif(),
                    icc: webp.icc_profile(),
                    segments: Vec::new(),
                }
            }
            _ => Self::default(),
        };
        Ok(lifted)
    }

    pub fn is_empty(&self) -> bool {
        self.exif.is_none() && self.icc.is_none() && self.segments.is_empty()
    }

    /// Rewrite a carried Orientation to 1. On failure the EXIF block is
    /// dropped and the error returned for logging.
    pub fn make_upright(&mut self) -> Result<(), EmbedError> {
        let Some(tiff) = self.exif.take() else {
            return Ok(());
        };
        if exif_orientation(&tiff).is_none_or(|o| o == 1) {
            self.exif = Some(tiff);
            return Ok(());
        }
        self.exif = Some(reset_orientation(&tiff)?);
        Ok(())
    }

    /// Attach the carried metadata to an encoded output of `format`.
    pub fn attach(&self, encoded: Vec<u8>, format: ImageFormat) -> Result<Vec<u8>, EmbedError> {
        let data = Bytes::from(encoded);
        let mut out = Vec::new();
        let written = match format {
            ImageFormat::Jpeg => {
                let mut jpeg = Jpeg::from_bytes(data).map_err(|e| parse_error(format, e))?;
                self.attach_common(&mut jpeg);
                let at = jpeg
                    .segments()
                    .iter()
                    .position(|s| !is_app_marker(s.marker()))
                    .unwrap_or(jpeg.segments().len());
                for (offset, (marker, contents)) in self.segments.iter().enumerate() {
                    jpeg.segments_mut().insert(
                        at + offset,
                        JpegSegment::new_with_contents(*marker, contents.clone()),
                    );
                }
                jpeg.encoder().write_to(&mut out)
            }
            ImageFormat::Png => {
                let mut png = Png::from_bytes(data).map_err(|e| parse_error(format, e))?;
                self.attach_common(&mut png);
                png.encoder().write_to(&mut out)
            }
            ImageFormat::WebP => {
                let mut webp = WebP::from_bytes(data).map_err(|e| parse_error(format, e))?;
                self.attach_common(&mut webp);
                webp.encoder().write_to(&mut out)
            }
            _ => return Ok(data.to_vec()),
        };
        written.map_err(|source| EmbedError::Write { format, source })?;
        Ok(out)
    }

    fn attach_common<I: ImageEXIF + ImageICC>(&self, image: &mut I) {
        if self.exif.is_some() {
            image.set_exif(self.exif.clone());
        }
        if self.icc.is_some() {
            image.set_icc_profile(self.icc.clone());
        }
    }
}

/// Orientation tag of a raw TIFF block, if present.
pub fn exif_orientation(tiff: &[u8]) -> Option<u32> {
    let parsed = exif::Reader::new().read_raw(tiff.to_vec()).ok()?;
    parsed
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
        .value
        .get_uint(0)
}

/// A JPEG holding nothing but an EXIF APP1 segment, for little_exif to read.
fn exif_only_jpeg(tiff: &[u8]) -> Result<Vec<u8>, EmbedError> {
    let length = u16::try_from(tiff.len() + APP1_HEADER_SIZE - 2)
        .map_err(|_| EmbedError::Orientation("EXIF block too large".into()))?;
    let mut jpeg = vec![0xFF, 0xD8, 0xFF, APP1];
    jpeg.extend_from_slice(&length.to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    Ok(jpeg)
}

fn reset_orientation(tiff: &[u8]) -> Result<Bytes, EmbedError> {
    let container = exif_only_jpeg(tiff)?;
    let rewritten = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Vec<u8>, String> {
        let mut metadata = Metadata::new_from_vec(&container, FileExtension::JPEG)
            .map_err(|e| format!("{e:?}"))?;
        metadata.set_tag(ExifTag::Orientation(vec![1]));
        metadata
            .as_u8_vec(FileExtension::JPEG)
            .map_err(|e| format!("{e:?}"))
    }));

    let app1 = match rewritten {
        Ok(Ok(app1)) => app1,
        Ok(Err(reason)) => return Err(EmbedError::Orientation(reason)),
        Err(_) => return Err(EmbedError::Orientation("EXIF writer panicked".into())),
    };
    if app1.len() <= APP1_HEADER_SIZE {
        return Err(EmbedError::Orientation("EXIF data too short".into()));
    }
    Ok(Bytes::copy_from_slice(&app1[APP1_HEADER_SIZE..]))
}
