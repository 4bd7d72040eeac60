//! Rate-limited, cached reverse geocoding.
//!
//! Resolves a GPS coordinate to a human-readable place name. Every lookup
//! follows the same path:
//!
//! ```text
//! cache check ──hit──▶ name
//!      │
//!     miss
//!      ▼
//! rate gate (FIFO, one start per interval)
//!      ▼
//! cache re-check ──hit──▶ name      (a sibling resolved the cell meanwhile)
//!      ▼
//! HTTP request ──▶ place-name precedence ──▶ cache insert ──▶ name
//! ```
//!
//! Failures (HTTP status, transport, no usable address) come back as
//! [`GeocodeError`] and are never cached. Turning them into a default location
//! and a warning is the caller's job.
//!
//! | Module | Role |
//! |--------|------|
//! | [`cache`] | Disk-backed rounded-key → name map |
//! | [`gate`] | FIFO rate gate with injectable clock |
//! | [`client`] | HTTP seam and the Nominatim client |
//! | [`address`] | Response shape and place-name precedence |

pub mod address;
pub mod cache;
pub mod client;
pub mod gate;

pub use cache::{GeocodeCache, round_coordinates};
pub use client::{NominatimClient, ReverseGeocode};
pub use gate::{Admission, Clock, RateGate, SystemClock};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    #[error("HTTP error status {0}")]
    Http(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no address found")]
    NoAddress,
}

/// Counters for the import summary.
#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    dispatches: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of geocoder activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeStats {
    pub cache_hits: u64,
    pub dispatches: u64,
    pub failures: u64,
}

impl fmt::Display for GeocodeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cached, {} requested, {} unresolved",
            self.cache_hits, self.dispatches, self.failures
        )
    }
}

/// Cache + gate + client, shared by every extraction worker.
pub struct Geocoder<G: ReverseGeocode = NominatimClient, C: Clock = SystemClock> {
    cache: Arc<GeocodeCache>,
    gate: RateGate<C>,
    client: G,
    counters: Counters,
}

impl<G: ReverseGeocode> Geocoder<G, SystemClock> {
    pub fn new(cache: Arc<GeocodeCache>, gate: RateGate, client: G) -> Self {
        Self::with_gate(cache, gate, client)
    }
}

impl<G: ReverseGeocode, C: Clock> Geocoder<G, C> {
    pub fn with_gate(cache: Arc<GeocodeCache>, gate: RateGate<C>, client: G) -> Self {
        Self {
            cache,
            gate,
            client,
            counters: Counters::default(),
        }
    }

    pub fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    pub fn gate(&self) -> &RateGate<C> {
        &self.gate
    }

    pub fn stats(&self) -> GeocodeStats {
        GeocodeStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            dispatches: self.counters.dispatches.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Resolve a coordinate to a place name.
    pub fn resolve(&self, lat: f64, lon: f64) -> Result<String, GeocodeError> {
        let key = round_coordinates(lat, lon);
        if let Some(place) = self.cached(&key) {
            return Ok(place);
        }

        let admission = self.gate.admit();
        if let Some(place) = self.cached(&key) {
            return Ok(place);
        }
        admission.dispatch();

        self.counters.dispatches.fetch_add(1, Ordering::Relaxed);
        log::debug!("Geocoding [{lat}, {lon}] (key {key})");
        let outcome = self
            .client
            .reverse(lat, lon)
            .and_then(|response| address::place_name(&response).ok_or(GeocodeError::NoAddress));

        match outcome {
            Ok(place) => {
                self.cache.insert(key, place.clone());
                Ok(place)
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn cached(&self, key: &str) -> Option<String> {
        let hit = self.cache.get(key)?;
        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        log::debug!("Location cache hit for {key}: {hit}");
        Some(hit)
    }
}
