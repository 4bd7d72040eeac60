//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode + auto-orient** | `image` decoders, EXIF orientation from the decoder |
//! | **Vignette resize** | Lanczos3 to a fixed width |
//! | **Encode** | JPEG at configured quality; PNG/WebP lossless |
//! | **Metadata carry-over** | `img-parts` for EXIF/ICC/XMP/IPTC, `little_exif` for Orientation |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a transcode
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Embedded**: metadata lifted from the source and attached to each output

pub mod backend;
mod calculations;
pub mod embedded;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, TranscodeOutcome};
pub use calculations::{
    MAX_VIGNETTE_PIXELS, calculate_vignette_dimensions, vignette_within_bounds,
};
pub use params::{Quality, TranscodeParams};
pub use rust_backend::RustBackend;
