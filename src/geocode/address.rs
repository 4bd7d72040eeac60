//! Reverse-geocoding response shape and place-name selection.
//!
//! A Nominatim `/reverse` answer carries a structured `address` object whose
//! populated fields depend on what lies at the coordinate: a city centre has
//! `city`, a hiking trail may only have `county` and `state`. The name shown
//! in the gallery is the most specific field available, in this order:
//!
//! ```text
//! city → town → village → hamlet → county → state → country → display_name
//! ```
//!
//! Each step is a plain function from the response to an optional string, so
//! the precedence is the order of [`PLACE_NAME_FIELDS`] and nothing else.

use serde::Deserialize;

/// The subset of a reverse-geocoding response the importer reads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReverseResponse {
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Structured address fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub hamlet: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

type FieldExtractor = fn(&ReverseResponse) -> Option<&str>;

/// Place-name sources, most specific first.
pub const PLACE_NAME_FIELDS: &[(&str, FieldExtractor)] = &[
    ("city", city),
    ("town", town),
    ("village", village),
    ("hamlet", hamlet),
    ("county", county),
    ("state", state),
    ("country", country),
    ("display_name", display_name),
];

fn address_field(
    response: &ReverseResponse,
    pick: impl FnOnce(&Address) -> Option<&String>,
) -> Option<&str> {
    response.address.as_ref().and_then(pick).map(String::as_str)
}

fn city(r: &ReverseResponse) -> Option<&str> {
    address_field(r, |a| a.city.as_ref())
}

fn town(r: &ReverseResponse) -> Option<&str> {
    address_field(r, |a| a.town.as_ref())
}

fn village(r: &ReverseResponse) -> Option<&str> {
    address_field(r, |a| a.village.as_ref())
}

fn hamlet(r: &ReverseResponse) -> Option<&str> {
    address_field(r, |a| a.hamlet.as_ref())
}

fn county(r: &ReverseResponse) -> Option<&str> {
    address_field(r, |a| a.county.as_ref())
}

fn state(r: &ReverseResponse) -> Option<&str> {
    address_field(r, |a| a.state.as_ref())
}

fn country(r: &ReverseResponse) -> Option<&str> {
    address_field(r, |a| a.country.as_ref())
}

fn display_name(r: &ReverseResponse) -> Option<&str> {
    r.display_name.as_deref()
}

/// Pick the place name for a response: the first non-empty field wins.
pub fn place_name(response: &ReverseResponse) -> Option<String> {
    PLACE_NAME_FIELDS
        .iter()
        .filter_map(|(_, extract)| extract(response))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}
