use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use super::error::{snippet, FetchError};
use crate::geo::{bounding_box, BoundingBox, GeoPoint};

pub const OPENSKY_URL: &str = "https://opensky-network.org/api/states/all";

const MIN_BACKOFF_S: u64 = 5;
const DEFAULT_RETRY_AFTER_S: u64 = 60;

/// One aircraft state vector. Only aircraft with a known position are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftVector {
    pub icao24: String,
    pub callsign: Option<String>,
    pub origin_country: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub baro_altitude_m: Option<f64>,
    pub velocity_ms: Option<f64>,
    pub true_track_deg: Option<f64>,
    pub on_ground: bool,
}

impl AircraftVector {
    pub fn position(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// Supplier of the aircraft snapshot for one polling cycle.
#[async_trait]
pub trait AircraftSource: Send {
    async fn fetch(&mut self) -> Result<Vec<AircraftVector>, FetchError>;
}

/// Anonymous OpenSky `/states/all` query restricted to a bounding box around
/// the observer.
pub struct OpenSkySource {
    http: reqwest::Client,
    url: String,
    bbox: BoundingBox,
    timeout: Duration,
    backoff_until: Option<Instant>,
}

impl OpenSkySource {
    /// `margin` widens the box beyond `radius_km` so aircraft are seen before
    /// they cross the circle.
    pub fn new(
        http: reqwest::Client,
        url: impl Into<String>,
        center: GeoPoint,
        radius_km: f64,
        margin: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            bbox: bounding_box(center, radius_km * margin),
            timeout,
            backoff_until: None,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

#[async_trait]
impl AircraftSource for OpenSkySource {
    async fn fetch(&mut self) -> Result<Vec<AircraftVector>, FetchError> {
        if let Some(until) = self.backoff_until {
            let now = Instant::now();
            if now < until {
                return Err(FetchError::BackingOff(until - now));
            }
            self.backoff_until = None;
        }

        let response = self
            .http
            .get(&self.url)
            .timeout(self.timeout)
            .query(&[
                ("lamin", self.bbox.lat_min),
                ("lamax", self.bbox.lat_max),
                ("lomin", self.bbox.lon_min),
                ("lomax", self.bbox.lon_max),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_s = retry_after(response.headers());
            self.backoff_until =
                Some(Instant::now() + Duration::from_secs(retry_after_s.max(MIN_BACKOFF_S)));
            log::warn!("OpenSky rate limited, backing off {}s", retry_after_s.max(MIN_BACKOFF_S));
            return Err(FetchError::RateLimited { retry_after_s });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: snippet(&body, 120),
            });
        }

        let body = response.bytes().await?;
        let data: Value =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        let vectors = parse_states(&data);
        log::debug!("OpenSky returned {} aircraft in box", vectors.len());
        Ok(vectors)
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> u64 {
    ["X-Rate-Limit-Retry-After-Seconds", "Retry-After"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| s as u64)
        .unwrap_or(DEFAULT_RETRY_AFTER_S)
}

/// Decodes the positional `states` arrays of an OpenSky response.
///
/// Index layout: 0 icao24, 1 callsign, 2 origin_country, 5 lon, 6 lat,
/// 7 baro_altitude, 8 on_ground, 9 velocity, 10 true_track.
pub fn parse_states(data: &Value) -> Vec<AircraftVector> {
    let Some(states) = data["states"].as_array() else {
        return Vec::new();
    };

    states
        .iter()
        .filter_map(|s| {
            let icao24 = s[0].as_str().map(|v| v.trim().to_lowercase())?;
            if icao24.is_empty() {
                return None;
            }
            let lon = s[5].as_f64()?;
            let lat = s[6].as_f64()?;

            Some(AircraftVector {
                icao24,
                callsign: trimmed(&s[1]),
                origin_country: trimmed(&s[2]),
                lat,
                lon,
                baro_altitude_m: s[7].as_f64(),
                velocity_ms: s[9].as_f64(),
                true_track_deg: s[10].as_f64(),
                on_ground: s[8].as_bool().unwrap_or(false),
            })
        })
        .collect()
}

fn trimmed(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
