//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Upper bound on vignette pixels. A narrow, very tall source at a fixed
/// vignette width would otherwise ask the resizer for gigabytes.
pub const MAX_VIGNETTE_PIXELS: u64 = 50_000_000;

/// Calculate vignette dimensions for a target width, preserving aspect ratio.
///
/// The width is always exactly `target_width`, including when the source is
/// narrower (the vignette is then an upscale). The height is rounded and
/// never drops below one pixel.
///
/// # Examples
/// ```
/// # use gallery_import::imaging::calculate_vignette_dimensions;
/// // 4000x3000 landscape → 640x480
/// assert_eq!(calculate_vignette_dimensions((4000, 3000), 640), (640, 480));
///
/// // 3000x4000 portrait → 640x853
/// assert_eq!(calculate_vignette_dimensions((3000, 4000), 640), (640, 853));
/// ```
pub fn calculate_vignette_dimensions(source: (u32, u32), target_width: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return (target_width.max(1), 1);
    }
    let ratio = target_width as f64 / src_w as f64;
    let height = (src_h as f64 * ratio).round().max(1.0) as u32;
    (target_width.max(1), height)
}

/// Whether a vignette of `dimensions` fits in [`MAX_VIGNETTE_PIXELS`].
pub fn vignette_within_bounds(dimensions: (u32, u32)) -> bool {
    u64::from(dimensions.0) * u64::from(dimensions.1) <= MAX_VIGNETTE_PIXELS
}
