//! # gallery-import
//!
//! Batch importer for a photo site. Point it at a directory tree of photos
//! and videos; every directory that directly holds media becomes a gallery
//! with derivatives under `assets/` and an `index.md` manifest under the
//! content root.
//!
//! # Architecture: One Pass, Two Concurrency Domains
//!
//! ```text
//! 1. Scan       source/   →  galleries      (walk + EXIF, on the worker pool)
//!                              │ GPS?
//!                              └─▶ geocoder (cache → FIFO rate gate → HTTP)
//! 2. Process    galleries →  assets/         (vignette + full size, on the worker pool)
//! 3. Manifest   galleries →  content/**/index.md
//! ```
//!
//! The worker pool is CPU-bound and sized to the core count. The geocoder is
//! network-bound and serialized: at most one request starts per interval, no
//! matter how many workers are waiting. A worker waiting for its turn at the
//! gate blocks only itself.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the source tree, groups media by directory, runs extraction |
//! | [`metadata`] | EXIF tag reading and `MediaMetadata` assembly with defaults |
//! | [`geocode`] | Reverse geocoding: persistent cache, rate gate, Nominatim client |
//! | [`scheduler`] | Bounded rayon pool with FIFO start and ordered results |
//! | [`imaging`] | Pure-Rust decode, orient, resize, encode, metadata carry-over |
//! | [`process`] | Output naming, per-item transcode with verbatim-copy fallback |
//! | [`manifest`] | Per-gallery `index.md` with JSON front matter |
//! | [`pipeline`] | Orchestration, fatal errors, cache persistence, summary |
//! | [`config`] | `import.toml` loading, env overrides, validation |
//! | [`types`] | Records shared between stages and serialized into manifests |
//! | [`output`] | CLI output formatting: summary and content tree |
//!
//! # Design Decisions
//!
//! ## Failures Stay Per-File
//!
//! A batch can hold thousands of files. A corrupt JPEG, a missing EXIF block
//! or a geocoding timeout must never cost the rest of the run, so every
//! per-file stage returns a value rather than an error: extraction falls back
//! to defaults, geocoding to the directory name, transcoding to a verbatim
//! copy. A panic inside a decoder is caught per file and treated the same
//! way. Only setup problems (unreadable source, output roots that cannot be
//! reset, manifests that cannot be written) are fatal.
//!
//! ## The Cache Always Survives
//!
//! Geocoding is the slow part and the service is rate-limited. The location
//! cache is loaded before anything else and written back after the run,
//! whether it succeeded or not, so an interrupted import never re-pays for
//! lookups it already made.
//!
//! ## Decode Once
//!
//! Each image is decoded a single time; the full-size and vignette encodes
//! both branch from that buffer. Both are encoded in memory before either is
//! written, so a failure leaves no half-finished pair on disk.
//!
//! ## Deterministic Output
//!
//! Directory entries are sorted, galleries are emitted in pre-order, results
//! come back from the pool in submission order, and colliding output names
//! are resolved before any concurrent work starts. Two runs over the same
//! tree produce the same manifests.

pub mod config;
pub mod geocode;
pub mod imaging;
pub mod manifest;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod scan;
pub mod scheduler;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
