use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::geo::{GeoError, ObserverFix};
use crate::source::{CELESTRAK_ACTIVE_URL, OPENSKY_URL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid observer location: {0}")]
    Observer(#[from] GeoError),
    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub observer: ObserverConfig,
    #[serde(default)]
    pub aircraft: AircraftConfig,
    #[serde(default)]
    pub satellites: SatelliteConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObserverConfig {
    /// `"lat, lon"`; takes precedence over `latitude`/`longitude`.
    pub coordinates: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_m: Option<f64>,
    #[serde(default)]
    pub geolocation: bool,
    #[serde(default = "default_geolocation_timeout", deserialize_with = "duration")]
    pub geolocation_timeout: Duration,
}

impl ObserverConfig {
    /// The manually configured location.
    pub fn manual_fix(&self) -> Result<ObserverFix, ConfigError> {
        match (&self.coordinates, self.latitude, self.longitude) {
            (Some(coordinates), _, _) => {
                Ok(ObserverFix::from_coordinates(coordinates, self.altitude_m)?)
            }
            (None, Some(lat), Some(lon)) => Ok(ObserverFix::new(lat, lon, self.altitude_m)?),
            _ => Err(ConfigError::Invalid {
                field: "observer",
                message: "set either coordinates or latitude and longitude".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AircraftConfig {
    pub enabled: bool,
    pub url: String,
    pub radius_km: f64,
    pub overhead_radius_m: f64,
    #[serde(deserialize_with = "duration")]
    pub overhead_cooldown: Duration,
    #[serde(deserialize_with = "duration")]
    pub poll_interval: Duration,
    pub stale_after_cycles: u64,
    #[serde(deserialize_with = "duration")]
    pub fetch_timeout: Duration,
    pub bbox_margin: f64,
}

impl Default for AircraftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: OPENSKY_URL.to_string(),
            radius_km: 10.0,
            overhead_radius_m: 1500.0,
            overhead_cooldown: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(10),
            stale_after_cycles: 3,
            fetch_timeout: Duration::from_secs(20),
            bbox_margin: 1.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SatelliteConfig {
    pub enabled: bool,
    pub min_elevation_deg: f64,
    #[serde(deserialize_with = "duration")]
    pub update_interval: Duration,
    pub stale_after_cycles: u64,
    pub tle_url: String,
    pub tle_cache_file: PathBuf,
    #[serde(deserialize_with = "duration")]
    pub tle_max_age: Duration,
    #[serde(deserialize_with = "duration")]
    pub fetch_timeout: Duration,
    pub track_all: bool,
    pub only_norad_ids: Vec<u32>,
    pub space_objects_file: PathBuf,
    #[serde(deserialize_with = "duration")]
    pub reload_interval: Duration,
}

impl Default for SatelliteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_elevation_deg: 15.0,
            update_interval: Duration::from_secs(2),
            stale_after_cycles: 3,
            tle_url: CELESTRAK_ACTIVE_URL.to_string(),
            tle_cache_file: PathBuf::from("data/tles_active.tle"),
            tle_max_age: Duration::from_secs(12 * 3600),
            fetch_timeout: Duration::from_secs(30),
            track_all: false,
            only_norad_ids: Vec::new(),
            space_objects_file: PathBuf::from("data/space_objects.json"),
            reload_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Adsbdb,
    Airlabs,
    Aviationstack,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_provider_timeout", deserialize_with = "duration")]
    pub timeout: Duration,
    /// Overrides the provider's public endpoint.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    #[serde(deserialize_with = "duration")]
    pub total_timeout: Duration,
    #[serde(deserialize_with = "duration")]
    pub cache_ttl: Duration,
    /// Priority order: earlier providers win field conflicts.
    pub providers: Vec<ProviderConfig>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        let provider = |kind, enabled| ProviderConfig {
            kind,
            enabled,
            timeout: default_provider_timeout(),
            url: None,
        };
        Self {
            total_timeout: Duration::from_secs(8),
            cache_ttl: Duration::from_secs(6 * 3600),
            providers: vec![
                provider(ProviderKind::Adsbdb, true),
                provider(ProviderKind::Airlabs, true),
                provider(ProviderKind::Aviationstack, false),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub out_file: Option<PathBuf>,
    pub console: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            out_file: Some(PathBuf::from("data/events.jsonl")),
            console: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_geolocation_timeout() -> Duration {
    Duration::from_secs(8)
}

fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

const MIN_INTERVAL: Duration = Duration::from_secs(1);

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.observer.manual_fix()?;

        let aircraft = &self.aircraft;
        check_interval("aircraft.poll_interval", aircraft.poll_interval)?;
        check_cycles("aircraft.stale_after_cycles", aircraft.stale_after_cycles)?;
        check(
            "aircraft.radius_km",
            aircraft.radius_km.is_finite() && aircraft.radius_km > 0.0,
            "must be positive",
        )?;
        check(
            "aircraft.overhead_radius_m",
            aircraft.overhead_radius_m.is_finite() && aircraft.overhead_radius_m >= 0.0,
            "must not be negative",
        )?;
        check(
            "aircraft.bbox_margin",
            aircraft.bbox_margin.is_finite() && aircraft.bbox_margin >= 1.0,
            "must be at least 1",
        )?;

        let satellites = &self.satellites;
        check_interval("satellites.update_interval", satellites.update_interval)?;
        check_interval("satellites.reload_interval", satellites.reload_interval)?;
        check_cycles("satellites.stale_after_cycles", satellites.stale_after_cycles)?;
        check(
            "satellites.min_elevation_deg",
            (-90.0..=90.0).contains(&satellites.min_elevation_deg),
            "must be within [-90, 90]",
        )?;

        check(
            "enrichment.total_timeout",
            !self.enrichment.total_timeout.is_zero(),
            "must be positive",
        )?;
        Ok(())
    }
}

fn check(field: &'static str, ok: bool, message: &str) -> Result<(), ConfigError> {
    if ok {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        field,
        message: message.to_string(),
    })
}

fn check_interval(field: &'static str, interval: Duration) -> Result<(), ConfigError> {
    check(field, interval >= MIN_INTERVAL, "must be at least 1s")
}

fn check_cycles(field: &'static str, cycles: u64) -> Result<(), ConfigError> {
    check(field, cycles >= 1, "must be at least 1")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
observer:
  coordinates: "40.758, -73.9855"
  altitude_m: 10
aircraft:
  radius_km: 12
  overhead_cooldown: 15m
  poll_interval: 10s
satellites:
  min_elevation_deg: 20
  only_norad_ids: [25544, 20580]
  tle_max_age: 6h
enrichment:
  total_timeout: 5s
  providers:
    - { kind: adsbdb, timeout: 2s }
    - { kind: aviationstack, enabled: false }
events:
  console: false
"#;

    #[test]
    fn parses_with_defaults() {
        let config = Config::from_yaml(FULL).unwrap();
        assert_eq!(config.aircraft.radius_km, 12.0);
        assert_eq!(config.aircraft.overhead_cooldown, Duration::from_secs(900));
        assert_eq!(config.aircraft.stale_after_cycles, 3);
        assert_eq!(config.aircraft.url, OPENSKY_URL);
        assert_eq!(config.satellites.min_elevation_deg, 20.0);
        assert_eq!(config.satellites.only_norad_ids, vec![25544, 20580]);
        assert_eq!(config.satellites.tle_max_age, Duration::from_secs(6 * 3600));
        assert_eq!(config.satellites.update_interval, Duration::from_secs(2));
        assert_eq!(config.enrichment.providers.len(), 2);
        assert_eq!(config.enrichment.providers[0].kind, ProviderKind::Adsbdb);
        assert_eq!(config.enrichment.providers[0].timeout, Duration::from_secs(2));
        assert!(!config.enrichment.providers[1].enabled);
        assert!(!config.events.console);
        assert_eq!(config.events.out_file, Some(PathBuf::from("data/events.jsonl")));

        let fix = config.observer.manual_fix().unwrap();
        assert_eq!(fix.latitude_deg(), 40.758);
        assert_eq!(fix.altitude_m(), Some(10.0));
    }

    #[test]
    fn latitude_longitude_keys() {
        let config = Config::from_yaml("observer: { latitude: 51.5, longitude: -0.12 }").unwrap();
        assert_eq!(config.observer.manual_fix().unwrap().longitude_deg(), -0.12);
        assert_eq!(config.enrichment.providers.len(), 3);
    }

    #[test]
    fn rejects_invalid_values() {
        const HOME: &str = "observer: { coordinates: \"1, 2\" }\n";
        let cases = [
            ("observer: { coordinates: \"95, 0\" }".to_string(), "observer"),
            ("observer: {}".to_string(), "observer"),
            (format!("{HOME}aircraft: {{ poll_interval: 500ms }}"), "aircraft.poll_interval"),
            (format!("{HOME}aircraft: {{ radius_km: 0 }}"), "aircraft.radius_km"),
            (
                format!("{HOME}satellites: {{ stale_after_cycles: 0 }}"),
                "satellites.stale_after_cycles",
            ),
            (
                format!("{HOME}satellites: {{ min_elevation_deg: 95 }}"),
                "satellites.min_elevation_deg",
            ),
        ];
        for (yaml, field) in cases {
            let yaml = yaml.as_str();
            match Config::from_yaml(yaml) {
                Err(ConfigError::Invalid { field: f, .. }) => assert_eq!(f, field, "{yaml}"),
                Err(ConfigError::Observer(_)) => assert_eq!(field, "observer", "{yaml}"),
                other => panic!("{yaml}: expected rejection, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn bad_duration_is_a_parse_error() {
        let yaml = "observer: { coordinates: \"1, 2\" }\naircraft: { poll_interval: soon }";
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
