//! Persistent reverse-geocoding cache.
//!
//! Maps a rounded coordinate key to the place name the service returned for
//! it. Rounding to three decimals (~100 m) makes neighbouring shots of one
//! scene share a single lookup.
//!
//! ## Storage
//!
//! A JSON array of `[key, value]` pairs, sorted by key:
//!
//! ```json
//! [
//!   ["40.689,-74.044", "New York"],
//!   ["48.858,2.295", "Paris"]
//! ]
//! ```
//!
//! Loading is best-effort: a missing or unreadable file is an empty cache.
//! Only successful resolutions are ever inserted, so failed lookups get
//! retried on the next run.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::RwLock;

/// Round a coordinate pair to its cache key.
///
/// Pure and deterministic: the same input always yields the same key.
///
/// ```
/// # use gallery_import::geocode::round_coordinates;
/// assert_eq!(round_coordinates(48.858401, 2.294501), "48.858,2.295");
/// ```
pub fn round_coordinates(lat: f64, lon: f64) -> String {
    format!("{lat:.3},{lon:.3}")
}

/// Thread-safe key → place-name map shared by every extraction worker.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: RwLock<HashMap<String, String>>,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache pre-seeded with entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(map),
        }
    }

    /// Load from disk. Missing or corrupt files yield an empty cache.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::info!(
                    "No location cache at {} ({e}); a new one will be created",
                    path.display()
                );
                return Self::new();
            }
        };
        match serde_json::from_str::<Vec<(String, String)>>(&content) {
            Ok(pairs) => {
                log::info!("Loaded {} locations from cache", pairs.len());
                Self::with_entries(pairs)
            }
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable location cache {}: {e}",
                    path.display()
                );
                Self::new()
            }
        }
    }

    /// Write every entry to disk, overwriting the previous file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let pairs = self.snapshot();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&pairs)?;
        std::fs::write(path, json)?;
        log::info!("Saved {} locations to cache", pairs.len());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn insert(&self, key: String, place: String) {
        self.write().insert(key, place);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries sorted by key.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    // A panicking writer can only have completed or skipped a single
    // `insert`, so the map is still consistent after poisoning.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // Coordinate rounding
    // =========================================================================

    #[test]
    fn rounding_is_deterministic() {
        let a = round_coordinates(43.4832, -1.5586);
        let b = round_coordinates(43.4832, -1.5586);
        assert_eq!(a, b);
        assert_eq!(a, "43.483,-1.559");
    }

    #[test]
    fn nearby_points_share_a_key() {
        assert_eq!(
            round_coordinates(48.8584, 2.2945),
            round_coordinates(48.858401, 2.294501)
        );
        assert_eq!(round_coordinates(48.8584, 2.2945), "48.858,2.295");
    }

    #[test]
    fn rounding_is_idempotent() {
        let key = round_coordinates(40.6892, -74.0445);
        assert_eq!(key, "40.689,-74.044");
        let (lat, lon) = key.split_once(',').unwrap();
        let again = round_coordinates(lat.parse().unwrap(), lon.parse().unwrap());
        assert_eq!(again, key);
    }

    #[test]
    fn distant_points_get_distinct_keys() {
        assert_ne!(
            round_coordinates(48.8584, 2.2945),
            round_coordinates(48.8604, 2.2945)
        );
    }

    // =========================================================================
    // In-memory behavior
    // =========================================================================

    #[test]
    fn insert_then_get() {
        let cache = GeocodeCache::new();
        assert!(cache.is_empty());
        cache.insert("1.000,2.000".into(), "Somewhere".into());
        assert_eq!(cache.get("1.000,2.000").as_deref(), Some("Somewhere"));
        assert!(cache.contains("1.000,2.000"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn snapshot_is_sorted() {
        let cache = GeocodeCache::with_entries([("b", "2"), ("a", "1"), ("c", "3")]);
        let keys: Vec<String> = cache.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[test]
    fn save_then_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cached-locations.json");

        let cache = GeocodeCache::with_entries([("48.858,2.295", "Paris")]);
        cache.save(&path).unwrap();

        let loaded = GeocodeCache::load(&path);
        assert_eq!(loaded.get("48.858,2.295").as_deref(), Some("Paris"));
    }

    #[test]
    fn saved_file_is_array_of_pairs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        GeocodeCache::with_entries([("1.000,1.000", "A")])
            .save(&path)
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!([["1.000,1.000", "A"]]));
    }

    #[test]
    fn save_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state/nested/cache.json");
        GeocodeCache::new().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let cache = GeocodeCache::load(&tmp.path().join("absent.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(GeocodeCache::load(&path).is_empty());

        fs::write(&path, r#"{"48.858,2.295": "Paris"}"#).unwrap();
        assert!(GeocodeCache::load(&path).is_empty());
    }
}
