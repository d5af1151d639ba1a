use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::error::ProviderError;
use super::provider::EnrichmentProvider;
use super::record::{non_empty, AircraftQuery, EnrichedFields, Route};

pub const AIRLABS_URL: &str = "https://airlabs.co/api/v9";

/// AirLabs live flights API. Looked up by hex first, then by ICAO flight
/// number when the hex yields nothing.
pub struct AirLabsProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl AirLabsProvider {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    async fn flights(&self, key: &str, value: &str) -> Result<Value, ProviderError> {
        let url = format!("{}/flights", self.base_url);
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .query(&[("api_key", self.api_key.as_str()), (key, value)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        if let Some(message) = body["error"]["message"].as_str() {
            return Err(ProviderError::Decode(message.to_string()));
        }
        Ok(body)
    }
}

#[async_trait]
impl EnrichmentProvider for AirLabsProvider {
    fn name(&self) -> &'static str {
        "airlabs"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn lookup(&self, query: &AircraftQuery) -> Result<EnrichedFields, ProviderError> {
        let by_hex = parse_flights(&self.flights("hex", &query.icao24).await?);
        if !by_hex.is_empty() {
            return Ok(by_hex);
        }

        match &query.callsign {
            Some(callsign) => Ok(parse_flights(&self.flights("flight_icao", callsign).await?)),
            None => Err(ProviderError::NoMatch),
        }
    }
}

/// Reads the first entry of `{"response": [...]}`.
pub fn parse_flights(body: &Value) -> EnrichedFields {
    let flight = &body["response"][0];
    if !flight.is_object() {
        return EnrichedFields::default();
    }

    let airport = |iata: &str, icao: &str| {
        non_empty(flight[iata].as_str()).or_else(|| non_empty(flight[icao].as_str()))
    };

    EnrichedFields {
        registration: non_empty(flight["reg_number"].as_str()),
        aircraft_type: non_empty(flight["aircraft_icao"].as_str()),
        owner: None,
        airline: None,
        airline_icao: non_empty(flight["airline_icao"].as_str()),
        route: Route::from_parts(
            airport("dep_iata", "dep_icao"),
            airport("arr_iata", "arr_icao"),
        ),
        flight_iata: non_empty(flight["flight_iata"].as_str()),
        flight_icao: non_empty(flight["flight_icao"].as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_flight() {
        let body: Value = serde_json::from_str(
            r#"{
                "request": {"params": {"hex": "a1b2c3"}},
                "response": [
                    {
                        "hex": "A1B2C3",
                        "reg_number": "N123DL",
                        "flag": "US",
                        "lat": 40.7,
                        "lng": -73.9,
                        "flight_number": "123",
                        "flight_icao": "DAL123",
                        "flight_iata": "DL123",
                        "dep_icao": "KJFK",
                        "dep_iata": "JFK",
                        "arr_icao": "KLAX",
                        "arr_iata": null,
                        "airline_icao": "DAL",
                        "airline_iata": "DL",
                        "aircraft_icao": "A321"
                    },
                    {"reg_number": "OTHER"}
                ]
            }"#,
        )
        .unwrap();

        let fields = parse_flights(&body);
        assert_eq!(fields.registration.as_deref(), Some("N123DL"));
        assert_eq!(fields.aircraft_type.as_deref(), Some("A321"));
        assert_eq!(fields.airline_icao.as_deref(), Some("DAL"));
        assert_eq!(fields.route, Some(Route::new("JFK", "KLAX")));
        assert_eq!(fields.flight_iata.as_deref(), Some("DL123"));
        assert_eq!(fields.flight_icao.as_deref(), Some("DAL123"));
        assert_eq!(fields.airline, None);
    }

    #[test]
    fn empty_response_list() {
        let body: Value = serde_json::from_str(r#"{"response": []}"#).unwrap();
        assert!(parse_flights(&body).is_empty());
    }

    #[test]
    fn departure_only_is_not_a_route() {
        let body: Value =
            serde_json::from_str(r#"{"response": [{"dep_iata": "JFK", "flight_icao": "DAL1"}]}"#)
                .unwrap();
        let fields = parse_flights(&body);
        assert_eq!(fields.route, None);
        assert_eq!(fields.flight_icao.as_deref(), Some("DAL1"));
    }
}
