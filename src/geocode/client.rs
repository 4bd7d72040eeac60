//! Outbound reverse-geocoding call.
//!
//! [`ReverseGeocode`] is the seam between the geocoder's cache/gate logic and
//! the network. Production uses [`NominatimClient`]; tests plug in a fake that
//! counts calls.

use super::GeocodeError;
use super::address::ReverseResponse;
use crate::config::GeocoderConfig;

/// One reverse-geocoding request. Implementations must not rate-limit or
/// cache; the [`Geocoder`](super::Geocoder) does both.
pub trait ReverseGeocode: Send + Sync {
    fn reverse(&self, lat: f64, lon: f64) -> Result<ReverseResponse, GeocodeError>;
}

/// Blocking client for a Nominatim-compatible `/reverse` endpoint.
pub struct NominatimClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    zoom: u8,
}

impl NominatimClient {
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            zoom: config.zoom,
        })
    }
}

impl ReverseGeocode for NominatimClient {
    fn reverse(&self, lat: f64, lon: f64) -> Result<ReverseResponse, GeocodeError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("format", "json".to_string()),
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("zoom", self.zoom.to_string()),
            ])
            .send()
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Http(status.as_u16()));
        }

        response
            .json::<ReverseResponse>()
            .map_err(|e| GeocodeError::Transport(format!("invalid response body: {e}")))
    }
}
