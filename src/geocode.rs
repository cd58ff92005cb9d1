use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{FetchError, GeocodeError};
use crate::fetch::{log_tls_guidance, HttpGet};
use crate::record::{ConvictionRecord, Coordinates, Field};

const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Address string in, coordinates out.
pub trait GeocodeProvider {
    fn lookup(&self, address: &str) -> Result<Coordinates, GeocodeError>;
}

pub struct GoogleGeocoder<H> {
    http: H,
    api_key: Option<String>,
}

impl<H: HttpGet> GoogleGeocoder<H> {
    pub fn new(http: H, api_key: Option<String>) -> Self {
        GoogleGeocoder { http, api_key }
    }

    #[cfg(test)]
    pub fn http(&self) -> &H {
        &self.http
    }

    fn request_url(&self, address: &str) -> String {
        let mut params = vec![("address", address)];
        if let Some(key) = &self.api_key {
            params.push(("key", key.as_str()));
        }
        match Url::parse_with_params(GOOGLE_GEOCODE_URL, &params) {
            Ok(url) => url.to_string(),
            Err(_) => GOOGLE_GEOCODE_URL.to_string(),
        }
    }
}

impl<H: HttpGet> GeocodeProvider for GoogleGeocoder<H> {
    fn lookup(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let url = self.request_url(address);
        let response = self
            .http
            .get(&url)
            .map_err(without_key)
            .inspect_err(|e| {
                if let FetchError::Tls { .. } = e {
                    log_tls_guidance(GOOGLE_GEOCODE_URL, e);
                }
            })?;
        if !response.is_success() {
            return Err(FetchError::Status {
                url: GOOGLE_GEOCODE_URL.to_string(),
                status: response.status,
            }
            .into());
        }
        parse_response(address, &response.body)
    }
}

/// Point transport errors at the bare endpoint so the API key never reaches
/// the logs.
fn without_key(err: FetchError) -> FetchError {
    let url = GOOGLE_GEOCODE_URL.to_string();
    match err {
        FetchError::Tls { reason, .. } => FetchError::Tls { url, reason },
        FetchError::Transport { reason, .. } => FetchError::Transport { url, reason },
        other => other,
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

pub fn parse_response(address: &str, body: &str) -> Result<Coordinates, GeocodeError> {
    let parsed: GeocodeResponse = serde_json::from_str(body)?;
    match parsed.status.as_str() {
        "OK" => parsed
            .results
            .into_iter()
            .next()
            .map(|r| Coordinates {
                lat: r.geometry.location.lat,
                lng: r.geometry.location.lng,
            })
            .ok_or_else(|| GeocodeError::NotFound(address.to_string())),
        "ZERO_RESULTS" => Err(GeocodeError::NotFound(address.to_string())),
        _ => Err(GeocodeError::Provider {
            status: parsed.status,
            message: parsed.error_message.unwrap_or_default(),
        }),
    }
}

/// Geocoder with a per-run cache keyed by the raw address string.
pub struct Geocoder<P> {
    provider: P,
    cache: HashMap<String, Coordinates>,
}

impl<P: GeocodeProvider> Geocoder<P> {
    pub fn new(provider: P) -> Self {
        Geocoder {
            provider,
            cache: HashMap::new(),
        }
    }

    pub fn locate(&mut self, address: &str) -> Result<Coordinates, GeocodeError> {
        if let Some(hit) = self.cache.get(address) {
            debug!("Geocoding [cache hit] '{}'", address);
            return Ok(*hit);
        }
        debug!("Geocoding '{}'", address);
        let coords = self.provider.lookup(address)?;
        self.cache.insert(address.to_string(), coords);
        Ok(coords)
    }

    /// Resolve the record's address and store the coordinates on it.
    pub fn geocode(&mut self, record: &mut ConvictionRecord) -> Result<Coordinates, GeocodeError> {
        let address = record
            .get(Field::Address)
            .ok_or_else(|| GeocodeError::MissingAddress(record.link.clone()))?
            .to_string();
        let coords = self.locate(&address)?;
        record.location = Some(coords);
        Ok(coords)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    #[cfg(test)]
    pub fn provider(&self) -> &P {
        &self.provider
    }
}
