//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the one operation the importer needs:
//! decode a source image once and write both derivatives (full size and
//! vignette) from it.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust with no system
//! libraries. Tests use `MockBackend`, which records calls and can be told to
//! fail for specific sources.

use super::params::TranscodeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an encoded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// What a successful transcode wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOutcome {
    pub fullsize: Dimensions,
    pub vignette: Dimensions,
    /// Whether source metadata segments were carried into the outputs.
    pub metadata_preserved: bool,
}

/// Trait for image processing backends.
///
/// `transcode` either writes both outputs or leaves neither behind; callers
/// rely on that to decide whether a verbatim fallback copy is needed.
pub trait ImageBackend: Sync {
    fn transcode(&self, params: &TranscodeParams) -> Result<TranscodeOutcome, BackendError>;
}
