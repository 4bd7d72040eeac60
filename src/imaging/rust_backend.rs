//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP) | `image` crate (pure Rust decoders), format sniffed from content |
//! | Auto-orient | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at the configured quality |
//! | Encode → PNG / WebP | `image` lossless encoders |
//! | Metadata carry-over | `img-parts` containers, `little_exif` Orientation reset ([`embedded`](super::embedded)) |
//!
//! ## One decode, two encodes
//!
//! ```text
//!              ┌─▶ encode ───────────────────▶ full-size bytes ─┐
//! decode ─▶ orient                                               ├─▶ write both
//!              └─▶ resize (width) ─▶ encode ─▶ vignette bytes  ─┘
//! ```
//!
//! Nothing touches the disk until both encodes have succeeded, and a failed
//! full-size write removes the vignette again, so a failed transcode never
//! leaves half its output behind.

use super::backend::{BackendError, Dimensions, ImageBackend, TranscodeOutcome};
use super::calculations::{
    MAX_VIGNETTE_PIXELS, calculate_vignette_dimensions, vignette_within_bounds,
};
use super::embedded::EmbeddedMetadata;
use super::params::{Quality, TranscodeParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, reason: impl std::fmt::Display) -> BackendError {
    BackendError::Decode {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Decode an in-memory image and turn it upright.
fn decode_upright(path: &Path, bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), BackendError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| decode_error(path, "unrecognized image format"))?;
    let mut decoder = reader.into_decoder().map_err(|e| decode_error(path, e))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
    img.apply_orientation(orientation);
    Ok((img, format))
}

/// Output format follows the output file's extension.
fn output_format(path: &Path) -> Result<ImageFormat, BackendError> {
    match ImageFormat::from_path(path) {
        Ok(f @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP)) => Ok(f),
        _ => Err(BackendError::ProcessingFailed(format!(
            "Unsupported output format: {}",
            path.display()
        ))),
    }
}

fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let result = match format {
        ImageFormat::Jpeg => {
            // Baseline JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.as_u8()))
        }
        ImageFormat::WebP => {
            let flat = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            flat.write_to(&mut Cursor::new(&mut buf), format)
        }
        _ => img.write_to(&mut Cursor::new(&mut buf), format),
    };
    result.map_err(|e| BackendError::ProcessingFailed(format!("{format:?} encode failed: {e}")))?;
    Ok(buf)
}

/// Metadata to carry from the source, Orientation already reset.
///
/// Carry-over is best effort: a container that cannot be parsed, or an EXIF
/// block whose Orientation cannot be rewritten, costs the metadata, never the
/// transcode.
fn carried_metadata(path: &Path, format: ImageFormat, bytes: &[u8]) -> EmbeddedMetadata {
    let mut carried = match EmbeddedMetadata::lift(bytes, format) {
        Ok(carried) => carried,
        Err(e) => {
            log::warn!("Metadata of {} not carried: {e}", path.display());
            return EmbeddedMetadata::default();
        }
    };
    if let Err(e) = carried.make_upright() {
        log::warn!("EXIF of {} not carried: {e}", path.display());
    }
    carried
}

/// Attach carried metadata to one encoded output. Falls back to the bare
/// encode if the result would not read back.
fn attach_metadata(
    carried: &EmbeddedMetadata,
    encoded: Vec<u8>,
    format: ImageFormat,
    output: &Path,
) -> (Vec<u8>, bool) {
    if carried.is_empty() {
        return (encoded, false);
    }
    let attached = carried
        .attach(encoded.clone(), format)
        .map_err(|e| e.to_string())
        .and_then(|bytes| {
            ImageReader::with_format(Cursor::new(&bytes), format)
                .into_dimensions()
                .map(|_| bytes)
                .map_err(|e| e.to_string())
        });
    match attached {
        Ok(bytes) => (bytes, true),
        Err(reason) => {
            log::warn!("Metadata not attached to {}: {reason}", output.display());
            (encoded, false)
        }
    }
}

fn dimensions(img: &DynamicImage) -> Dimensions {
    Dimensions {
        width: img.width(),
        height: img.height(),
    }
}

impl ImageBackend for RustBackend {
    fn transcode(&self, params: &TranscodeParams) -> Result<TranscodeOutcome, BackendError> {
        let bytes = std::fs::read(&params.source)?;
        let (img, source_format) = decode_upright(&params.source, &bytes)?;

        let (vw, vh) =
            calculate_vignette_dimensions((img.width(), img.height()), params.vignette_width);
        if !vignette_within_bounds((vw, vh)) {
            return Err(BackendError::ProcessingFailed(format!(
                "{vw}x{vh} vignette exceeds {MAX_VIGNETTE_PIXELS} pixels"
            )));
        }
        let vignette = img.resize_exact(vw, vh, FilterType::Lanczos3);

        let full_format = output_format(&params.fullsize_output)?;
        let vignette_format = output_format(&params.vignette_output)?;
        let full_bytes = encode(&img, full_format, params.quality)?;
        let vignette_bytes = encode(&vignette, vignette_format, params.quality)?;

        let carried = carried_metadata(&params.source, source_format, &bytes);
        let (full_bytes, metadata_preserved) =
            attach_metadata(&carried, full_bytes, full_format, &params.fullsize_output);
        let (vignette_bytes, _) =
            attach_metadata(&carried, vignette_bytes, vignette_format, &params.vignette_output);

        std::fs::write(&params.vignette_output, &vignette_bytes)?;
        if let Err(e) = std::fs::write(&params.fullsize_output, &full_bytes) {
            let _ = std::fs::remove_file(&params.vignette_output);
            return Err(e.into());
        }

        Ok(TranscodeOutcome {
            fullsize: dimensions(&img),
            vignette: dimensions(&vignette),
            metadata_preserved,
        })
    }
}
