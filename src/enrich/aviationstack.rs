use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::error::ProviderError;
use super::provider::EnrichmentProvider;
use super::record::{non_empty, AircraftQuery, EnrichedFields, Route};

pub const AVIATIONSTACK_URL: &str = "http://api.aviationstack.com/v1";

/// Aviationstack flights endpoint. Keyed by flight number only, so aircraft
/// without a callsign are not applicable.
pub struct AviationstackProvider {
    http: reqwest::Client,
    base_url: String,
    access_key: String,
    timeout: Duration,
}

impl AviationstackProvider {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        access_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            access_key: access_key.into(),
            timeout,
        }
    }
}

#[async_trait]
impl EnrichmentProvider for AviationstackProvider {
    fn name(&self) -> &'static str {
        "aviationstack"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn lookup(&self, query: &AircraftQuery) -> Result<EnrichedFields, ProviderError> {
        let callsign = query
            .callsign
            .as_deref()
            .ok_or(ProviderError::NotApplicable("no callsign"))?;

        let url = format!("{}/flights", self.base_url);
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .query(&[
                ("access_key", self.access_key.as_str()),
                ("flight_icao", callsign),
                ("limit", "1"),
            ])
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

        // Errors come back as 200 with an error object.
        if let Some(code) = body["error"]["code"].as_str() {
            return Err(ProviderError::Decode(code.to_string()));
        }
        Ok(parse_flights(&body))
    }
}

/// Reads the first entry of `{"data": [...]}`.
pub fn parse_flights(body: &Value) -> EnrichedFields {
    let flight = &body["data"][0];
    if !flight.is_object() {
        return EnrichedFields::default();
    }

    let airport = |side: &Value| {
        non_empty(side["iata"].as_str()).or_else(|| non_empty(side["icao"].as_str()))
    };

    EnrichedFields {
        registration: non_empty(flight["aircraft"]["registration"].as_str()),
        aircraft_type: non_empty(flight["aircraft"]["icao"].as_str()),
        owner: None,
        airline: non_empty(flight["airline"]["name"].as_str()),
        airline_icao: non_empty(flight["airline"]["icao"].as_str()),
        route: Route::from_parts(airport(&flight["departure"]), airport(&flight["arrival"])),
        flight_iata: non_empty(flight["flight"]["iata"].as_str()),
        flight_icao: non_empty(flight["flight"]["icao"].as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_flight() {
        let body: Value = serde_json::from_str(
            r#"{
                "pagination": {"limit": 1, "offset": 0, "count": 1, "total": 1},
                "data": [{
                    "flight_date": "2024-05-01",
                    "flight_status": "active",
                    "departure": {"airport": "Hartsfield-Jackson", "iata": "ATL", "icao": "KATL"},
                    "arrival": {"airport": "Logan", "iata": "BOS", "icao": "KBOS"},
                    "airline": {"name": "Delta Air Lines", "iata": "DL", "icao": "DAL"},
                    "flight": {"number": "123", "iata": "DL123", "icao": "DAL123"},
                    "aircraft": null,
                    "live": null
                }]
            }"#,
        )
        .unwrap();

        let fields = parse_flights(&body);
        assert_eq!(fields.airline.as_deref(), Some("Delta Air Lines"));
        assert_eq!(fields.airline_icao.as_deref(), Some("DAL"));
        assert_eq!(fields.route, Some(Route::new("ATL", "BOS")));
        assert_eq!(fields.flight_iata.as_deref(), Some("DL123"));
        assert_eq!(fields.flight_icao.as_deref(), Some("DAL123"));
        assert_eq!(fields.registration, None);
        assert_eq!(fields.aircraft_type, None);
    }

    #[test]
    fn reads_aircraft_block_when_present() {
        let body: Value = serde_json::from_str(
            r#"{"data": [{"aircraft": {"registration": "N123DL", "icao": "B739"}}]}"#,
        )
        .unwrap();
        let fields = parse_flights(&body);
        assert_eq!(fields.registration.as_deref(), Some("N123DL"));
        assert_eq!(fields.aircraft_type.as_deref(), Some("B739"));
    }

    #[test]
    fn no_data_is_empty() {
        let body: Value = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(parse_flights(&body).is_empty());
    }

    #[tokio::test]
    async fn missing_callsign_is_not_applicable() {
        let provider = AviationstackProvider::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            "key",
            Duration::from_secs(1),
        );
        let err = provider
            .lookup(&AircraftQuery::new("a1b2c3", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotApplicable(_)));
    }
}
