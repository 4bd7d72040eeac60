//! Import configuration.
//!
//! Configuration is layered: stock defaults, then an optional TOML file, then
//! environment variables. Each layer only needs to name the values it
//! overrides.
//!
//! ## Config File
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [images]
//! vignette_width = 640      # Vignette width in pixels (env: VIGNETTE_WIDTH)
//! quality = 75              # JPEG recompression quality 1-100 (env: JPEG_QUALITY)
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!                           # (env: IMPORT_CONCURRENCY)
//!
//! [geocoder]
//! endpoint = "https://nominatim.openstreetmap.org/reverse"
//! zoom = 10                 # Nominatim zoom level (10 = city)
//! interval_ms = 1100        # Minimum spacing between request starts
//! timeout_secs = 20
//! user_agent = "gallery-import/0.4.0"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "import.toml";

pub const ENV_VIGNETTE_WIDTH: &str = "VIGNETTE_WIDTH";
pub const ENV_QUALITY: &str = "JPEG_QUALITY";
pub const ENV_CONCURRENCY: &str = "IMPORT_CONCURRENCY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Import configuration.
///
/// All fields have defaults matching the historical behavior of the importer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Derivative image settings.
    pub images: ImagesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Reverse-geocoding service settings.
    pub geocoder: GeocoderConfig,
}

impl ImportConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.vignette_width == 0 {
            return Err(ConfigError::Validation(
                "images.vignette_width must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if self.geocoder.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "geocoder.endpoint must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Derivative image settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Target width of the vignette; height follows the aspect ratio.
    pub vignette_width: u32,
    /// Recompression quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            vignette_width: 640,
            quality: 75,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel extraction/transcoding workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    threads_for(config.max_processes, cores)
}

/// [`effective_threads`] for a known core count. A request above the core
/// count is capped with a warning.
pub fn threads_for(requested: Option<usize>, cores: usize) -> usize {
    match requested {
        Some(n) if n > cores => {
            log::warn!(
                "{n} workers requested ({ENV_CONCURRENCY} / processing.max_processes); \
                 capped at {cores} CPU cores"
            );
            cores
        }
        Some(n) => n,
        None => cores,
    }
}

/// Reverse-geocoding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeocoderConfig {
    /// Nominatim-compatible `/reverse` endpoint.
    pub endpoint: String,
    /// Detail level requested from the service.
    pub zoom: u8,
    /// Minimum spacing between the start of two requests, in milliseconds.
    pub interval_ms: u64,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Sent with every request; Nominatim rejects anonymous clients.
    pub user_agent: String,
}

impl GeocoderConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/reverse".to_string(),
            zoom: 10,
            interval_ms: 1100,
            timeout_secs: 20,
            user_agent: concat!("gallery-import/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    // An empty table deserializes to the same defaults via `#[serde(default)]`.
    toml::Value::try_from(ImportConfig::default())
        .unwrap_or_else(|_| toml::Value::Table(toml::map::Map::new()))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Apply environment overrides on top of a file-resolved config.
///
/// `lookup` is injected so tests don't have to mutate the process
/// environment.
pub fn apply_env_overrides(
    mut config: ImportConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ImportConfig, ConfigError> {
    if let Some(width) = parse_env(&lookup, ENV_VIGNETTE_WIDTH)? {
        config.images.vignette_width = width;
    }
    if let Some(quality) = parse_env(&lookup, ENV_QUALITY)? {
        config.images.quality = quality;
    }
    if let Some(workers) = parse_env(&lookup, ENV_CONCURRENCY)? {
        config.processing.max_processes = Some(workers);
    }
    Ok(config)
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Env { var, value: raw })
}

/// Merge an optional overlay onto the defaults, apply environment overrides,
/// then validate.
pub fn resolve_config(
    overlay: Option<toml::Value>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ImportConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ImportConfig = merged.try_into()?;
    let config = apply_env_overrides(config, lookup)?;
    config.validate()?;
    Ok(config)
}

/// Load the import config from `path` (if it exists) and the process
/// environment.
pub fn load_config(path: &Path) -> Result<ImportConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    resolve_config(overlay, |var| std::env::var(var).ok())
}

/// Returns a fully-commented stock `import.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# gallery-import configuration
# ===========================
# All options are optional. Values shown are the defaults.
# Environment variables override this file.

[images]
# Width of the preview ("vignette") derivative in pixels. Height follows the
# source aspect ratio. Env: VIGNETTE_WIDTH
vignette_width = 640
# Recompression quality for JPEG derivatives (1-100). Env: JPEG_QUALITY
quality = 75

[processing]
# Maximum parallel extraction/transcoding workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# Env: IMPORT_CONCURRENCY
# max_processes = 4

[geocoder]
# Nominatim-compatible reverse-geocoding endpoint.
endpoint = "https://nominatim.openstreetmap.org/reverse"
# Detail level of the returned address (10 = city).
zoom = 10
# Minimum spacing between the start of two requests. The public Nominatim
# instance allows one request per second.
interval_ms = 1100
# Per-request timeout in seconds.
timeout_secs = 20
# Sent with every request; Nominatim rejects anonymous clients. Defaults to
# "gallery-import/<version>". Name your site and a contact address here.
# user_agent = "my-photo-site/1.0 (admin@example.org)"
"##
}
