//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They are the interface
//! between [`process`](crate::process) (which decides file names and fallback
//! behavior) and the [`backend`](super::backend) (which does the pixel work),
//! so a mock backend can stand in for tests.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 75). Clamped on construction.
//! - [`TranscodeParams`]: one source, two outputs: the full-size copy and the vignette.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// The JPEG encoder takes a `u8`; the clamp keeps this lossless.
    pub fn as_u8(self) -> u8 {
        self.0.clamp(1, 100) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// Parameters for producing both derivatives of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeParams {
    pub source: PathBuf,
    /// Full-resolution re-encode.
    pub fullsize_output: PathBuf,
    /// Reduced-width preview.
    pub vignette_output: PathBuf,
    /// Vignette width in pixels; height follows the aspect ratio.
    pub vignette_width: u32,
    pub quality: Quality,
}
