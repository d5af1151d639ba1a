use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::error::ProviderError;
use super::provider::EnrichmentProvider;
use super::record::{non_empty, AircraftQuery, EnrichedFields, Route};

pub const ADSBDB_URL: &str = "https://api.adsbdb.com/v0";

/// Public ADSBDB registry: airframe by Mode-S hex, plus the flight route when
/// a callsign is known. No key required.
pub struct AdsbdbProvider {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl AdsbdbProvider {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            timeout,
        }
    }

    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NoMatch);
        }
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl EnrichmentProvider for AdsbdbProvider {
    fn name(&self) -> &'static str {
        "adsbdb"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn lookup(&self, query: &AircraftQuery) -> Result<EnrichedFields, ProviderError> {
        if query.icao24.is_empty() {
            return Err(ProviderError::NotApplicable("empty icao24"));
        }

        let url = format!("{}/aircraft/{}", self.base_url, query.icao24);
        let mut request = self.http.get(&url).timeout(self.timeout);
        if let Some(callsign) = &query.callsign {
            request = request.query(&[("callsign", callsign)]);
        }

        let aircraft = match self.fetch(request).await {
            Ok(body) => parse_response(&body),
            Err(ProviderError::NoMatch) => EnrichedFields::default(),
            Err(e) => return Err(e),
        };

        if !aircraft.is_empty() {
            return Ok(aircraft);
        }

        // Unknown airframes may still have a known route for their callsign.
        let callsign = query.callsign.as_deref().ok_or(ProviderError::NoMatch)?;
        let url = format!("{}/callsign/{}", self.base_url, callsign);
        let route = parse_response(&self.fetch(self.http.get(&url).timeout(self.timeout)).await?);
        if route.is_empty() {
            return Err(ProviderError::NoMatch);
        }
        Ok(route)
    }
}

/// Extracts fields from `{"response": {"aircraft": {...}, "flightroute": {...}}}`.
/// Unknown aircraft come back as a string response and yield nothing.
pub fn parse_response(body: &Value) -> EnrichedFields {
    let response = &body["response"];
    let aircraft = &response["aircraft"];
    let route = &response["flightroute"];
    let airline = &route["airline"];

    let airport_code = |airport: &Value| {
        non_empty(airport["iata_code"].as_str())
            .or_else(|| non_empty(airport["icao_code"].as_str()))
    };

    EnrichedFields {
        registration: non_empty(aircraft["registration"].as_str()),
        aircraft_type: non_empty(aircraft["icao_type"].as_str())
            .or_else(|| non_empty(aircraft["type"].as_str())),
        owner: non_empty(aircraft["registered_owner"].as_str()),
        airline: non_empty(airline["name"].as_str()),
        airline_icao: non_empty(airline["icao"].as_str()),
        route: Route::from_parts(
            airport_code(&route["origin"]),
            airport_code(&route["destination"]),
        ),
        flight_iata: non_empty(route["callsign_iata"].as_str()),
        flight_icao: non_empty(route["callsign_icao"].as_str()),
    }
}
