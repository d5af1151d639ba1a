use std::fmt;

use serde::{Serialize, Serializer};

/// Upper-cases and strips whitespace. Placeholder callsigns yield `None`.
pub fn normalize_callsign(raw: &str) -> Option<String> {
    let cs: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if cs.is_empty() || cs.starts_with('(') || cs == "NOCALLSIGN" || cs == "NO_CALLSIGN" {
        return None;
    }
    Some(cs)
}

/// The bare aircraft identity handed to providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AircraftQuery {
    pub icao24: String,
    pub callsign: Option<String>,
}

impl AircraftQuery {
    pub fn new(icao24: &str, callsign: Option<&str>) -> Self {
        Self {
            icao24: icao24.trim().to_lowercase(),
            callsign: callsign.and_then(normalize_callsign),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    #[serde(rename = "from")]
    pub origin: String,
    #[serde(rename = "to")]
    pub destination: String,
}

impl Route {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }

    /// Both ends are required; a half-known route is no route.
    pub fn from_parts(origin: Option<String>, destination: Option<String>) -> Option<Self> {
        match (origin, destination) {
            (Some(o), Some(d)) => Some(Self::new(o, d)),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.origin, self.destination)
    }
}

/// Metadata fields a provider may contribute. Every field is optional and
/// merged independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aircraft_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airline_icao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_iata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_icao: Option<String>,
}

impl EnrichedFields {
    pub const FIELD_COUNT: usize = 8;

    /// Left-biased merge: only fields still empty in `self` are taken from
    /// `other`. Returns how many fields were filled.
    pub fn merge_missing(&mut self, other: EnrichedFields) -> usize {
        [
            fill(&mut self.registration, other.registration),
            fill(&mut self.aircraft_type, other.aircraft_type),
            fill(&mut self.owner, other.owner),
            fill(&mut self.airline, other.airline),
            fill(&mut self.airline_icao, other.airline_icao),
            fill(&mut self.route, other.route),
            fill(&mut self.flight_iata, other.flight_iata),
            fill(&mut self.flight_icao, other.flight_icao),
        ]
        .into_iter()
        .filter(|filled| *filled)
        .count()
    }

    pub fn present_count(&self) -> usize {
        [
            self.registration.is_some(),
            self.aircraft_type.is_some(),
            self.owner.is_some(),
            self.airline.is_some(),
            self.airline_icao.is_some(),
            self.route.is_some(),
            self.flight_iata.is_some(),
            self.flight_icao.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }

    pub fn is_complete(&self) -> bool {
        self.present_count() == Self::FIELD_COUNT
    }
}

fn fill<T>(dst: &mut Option<T>, src: Option<T>) -> bool {
    if dst.is_none() && src.is_some() {
        *dst = src;
        return true;
    }
    false
}

/// Trims and drops empty strings from provider payloads.
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Ok,
    Fail,
    Skipped,
}

impl ProviderStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Ok => "ok",
            ProviderStatus::Fail => "fail",
            ProviderStatus::Skipped => "skipped",
        }
    }
}

/// `provider:status` tag recorded for every provider in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOutcome {
    pub provider: &'static str,
    pub status: ProviderStatus,
}

impl fmt::Display for ProviderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.status.as_str())
    }
}

impl Serialize for ProviderOutcome {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Bare query plus everything the provider chain managed to add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedRecord {
    #[serde(skip)]
    pub query: AircraftQuery,
    #[serde(flatten)]
    pub fields: EnrichedFields,
    #[serde(rename = "enrich_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<&'static str>,
    #[serde(rename = "enrich_status")]
    pub outcomes: Vec<ProviderOutcome>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cached: bool,
}

impl EnrichedRecord {
    pub fn bare(query: AircraftQuery) -> Self {
        Self {
            query,
            fields: EnrichedFields::default(),
            source: None,
            outcomes: Vec::new(),
            cached: false,
        }
    }

    pub fn status_of(&self, provider: &str) -> Option<ProviderStatus> {
        self.outcomes
            .iter()
            .find(|o| o.provider == provider)
            .map(|o| o.status)
    }

    pub(crate) fn record(&mut self, provider: &'static str, status: ProviderStatus) {
        self.outcomes.push(ProviderOutcome { provider, status });
    }

    pub(crate) fn absorb(&mut self, provider: &'static str, fields: EnrichedFields) {
        if self.fields.merge_missing(fields) > 0 && self.source.is_none() {
            self.source = Some(provider);
        }
        self.record(provider, ProviderStatus::Ok);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_left_biased_per_field() {
        let mut a = EnrichedFields {
            route: Some(Route::new("JFK", "LAX")),
            ..Default::default()
        };
        let b = EnrichedFields {
            route: Some(Route::new("X", "Y")),
            airline: Some("Delta".to_string()),
            ..Default::default()
        };

        assert_eq!(a.merge_missing(b), 1);
        assert_eq!(a.route, Some(Route::new("JFK", "LAX")));
        assert_eq!(a.airline.as_deref(), Some("Delta"));
    }

    #[test]
    fn completeness_counts_every_field() {
        let mut fields = EnrichedFields::default();
        assert!(fields.is_empty());
        fields.merge_missing(EnrichedFields {
            registration: Some("N123".into()),
            aircraft_type: Some("B738".into()),
            owner: Some("Delta Air Lines".into()),
            airline: Some("Delta".into()),
            airline_icao: Some("DAL".into()),
            route: Some(Route::new("ATL", "BOS")),
            flight_iata: Some("DL123".into()),
            flight_icao: Some("DAL123".into()),
        });
        assert!(fields.is_complete());
    }

    #[test]
    fn callsign_normalization() {
        assert_eq!(normalize_callsign(" ual 2048 ").as_deref(), Some("UAL2048"));
        assert_eq!(normalize_callsign("   "), None);
        assert_eq!(normalize_callsign("(no callsign)"), None);
        assert_eq!(normalize_callsign("nocallsign"), None);
    }

    #[test]
    fn query_lowercases_hex() {
        let q = AircraftQuery::new(" A1B2C3 ", Some("dal123"));
        assert_eq!(q.icao24, "a1b2c3");
        assert_eq!(q.callsign.as_deref(), Some("DAL123"));
    }

    #[test]
    fn record_serializes_status_tags() {
        let mut record = EnrichedRecord::bare(AircraftQuery::new("abc123", None));
        record.absorb(
            "adsbdb",
            EnrichedFields {
                route: Some(Route::new("JFK", "LAX")),
                ..Default::default()
            },
        );
        record.record("airlabs", ProviderStatus::Fail);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["route"]["from"], "JFK");
        assert_eq!(json["enrich_source"], "adsbdb");
        assert_eq!(json["enrich_status"][0], "adsbdb:ok");
        assert_eq!(json["enrich_status"][1], "airlabs:fail");
        assert!(json.get("cached").is_none());
        assert!(json.get("airline").is_none());
    }
}
