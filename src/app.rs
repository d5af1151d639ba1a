use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{Config, ConfigError, EnrichmentConfig, ObserverConfig, ProviderKind};
use crate::enrich::{
    AdsbdbProvider, AirLabsProvider, AviationstackProvider, EnrichmentCoordinator,
    EnrichmentProvider, ADSBDB_URL, AIRLABS_URL, AVIATIONSTACK_URL,
};
use crate::event::{run_sink, ConsoleSink, Event, JsonLinesSink, MultiSink, TrackKind};
use crate::geo::ObserverFix;
use crate::registry::{AllowlistWatcher, EntityRegistry, SelectionPolicy};
use crate::scheduler::{
    spawn, AircraftSettings, AircraftTrack, SatelliteSettings, SatelliteTrack, WorkerHandle,
};
use crate::source::{geolocate, OpenSkySource, TleSource};

pub const AIRLABS_KEY_ENV: &str = "AIRLABS_API_KEY";
pub const AVIATIONSTACK_KEY_ENV: &str = "AVIATIONSTACK_API_KEY";

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open event log: {0}")]
    EventLog(#[from] std::io::Error),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Runs every enabled track until Ctrl-C, then stops the loops between cycles
/// and drains the event channel.
pub async fn run(config: Config) -> Result<(), AppError> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("skywatch/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut sink = MultiSink::new();
    if config.events.console {
        sink.push(Box::new(ConsoleSink));
    }
    if let Some(path) = &config.events.out_file {
        sink.push(Box::new(JsonLinesSink::open(path)?));
        log::info!("Writing events to {}", path.display());
    }
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let sink_task = tokio::spawn(run_sink(rx, sink));

    let (observer, location_source) = resolve_observer(&config.observer, &http).await?;
    log::info!(
        "Observer at {:.4}, {:.4} ({})",
        observer.latitude_deg(),
        observer.longitude_deg(),
        location_source
    );
    let _ = tx
        .send(
            Event::info(TrackKind::Home, "home", "home_location_selected")
                .with("lat", observer.latitude_deg())
                .with("lon", observer.longitude_deg())
                .with("source", location_source),
        )
        .await;

    let mut workers: Vec<WorkerHandle> = Vec::new();

    if config.aircraft.enabled {
        let aircraft = &config.aircraft;
        let source = OpenSkySource::new(
            http.clone(),
            aircraft.url.clone(),
            observer.point(),
            aircraft.radius_km,
            aircraft.bbox_margin,
            aircraft.fetch_timeout,
        );
        let coordinator = build_coordinator(&config.enrichment, &http);
        log::info!("Enrichment chain: {:?}", coordinator.provider_names());

        let track = AircraftTrack::new(
            Box::new(source),
            observer,
            AircraftSettings {
                radius_km: aircraft.radius_km,
                overhead_radius_m: aircraft.overhead_radius_m,
                overhead_cooldown: aircraft.overhead_cooldown,
                stale_after_cycles: aircraft.stale_after_cycles,
            },
            coordinator,
        );
        workers.push(spawn(track, aircraft.poll_interval, tx.clone()));
    }

    if config.satellites.enabled {
        let satellites = &config.satellites;
        let registry = EntityRegistry::new(SelectionPolicy {
            track_all: satellites.track_all,
            only_norad_ids: satellites.only_norad_ids.iter().copied().collect(),
        });

        // Load the curated list before the first propagation cycle.
        let mut watcher = AllowlistWatcher::new(registry.clone(), &satellites.space_objects_file);
        if let Some(event) = watcher.poll().await {
            let _ = tx.send(event).await;
        }
        workers.push(spawn(watcher, satellites.reload_interval, tx.clone()));

        let source = TleSource::new(
            http.clone(),
            satellites.tle_url.clone(),
            &satellites.tle_cache_file,
            satellites.tle_max_age,
            satellites.fetch_timeout,
        );
        let track = SatelliteTrack::new(
            Box::new(source),
            observer,
            SatelliteSettings {
                min_elevation_deg: satellites.min_elevation_deg,
                stale_after_cycles: satellites.stale_after_cycles,
            },
            registry,
        );
        workers.push(spawn(track, satellites.update_interval, tx.clone()));
    }

    if workers.is_empty() {
        log::warn!("Both aircraft and satellite tracking are disabled");
        let _ = tx
            .send(Event::warn(TrackKind::System, "config", "no_trackers_enabled"))
            .await;
    } else {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("Shutdown requested"),
            Err(e) => log::error!("Failed to listen for Ctrl-C: {}", e),
        }
    }

    for worker in workers {
        log::debug!("Stopping {}", worker.name());
        worker.stop().await;
    }

    drop(tx);
    if let Err(e) = sink_task.await {
        log::warn!("Event sink ended abnormally: {}", e);
    }
    Ok(())
}

/// IP geolocation when enabled, the configured coordinates otherwise or when
/// it fails.
async fn resolve_observer(
    config: &ObserverConfig,
    http: &reqwest::Client,
) -> Result<(ObserverFix, String), ConfigError> {
    let manual = config.manual_fix()?;
    if !config.geolocation {
        return Ok((manual, "manual".to_string()));
    }

    match geolocate(http, config.geolocation_timeout).await {
        Ok(fix) => match ObserverFix::new(fix.lat, fix.lon, config.altitude_m) {
            Ok(observer) => Ok((observer, format!("ip_geolocation:{}", fix.source))),
            Err(e) => {
                log::warn!("Geolocation via {} returned an invalid fix: {}", fix.source, e);
                Ok((manual, "ip_geolocation_failed_fallback_to_manual".to_string()))
            }
        },
        Err(e) => {
            log::warn!("IP geolocation failed, using configured coordinates: {}", e);
            Ok((manual, "ip_geolocation_failed_fallback_to_manual".to_string()))
        }
    }
}

/// Providers in configured order. Keyed providers without their key in the
/// environment are left out.
pub fn build_providers(
    config: &EnrichmentConfig,
    http: &reqwest::Client,
) -> Vec<Box<dyn EnrichmentProvider>> {
    let mut providers: Vec<Box<dyn EnrichmentProvider>> = Vec::new();

    for provider in config.providers.iter().filter(|p| p.enabled) {
        match provider.kind {
            ProviderKind::Adsbdb => providers.push(Box::new(AdsbdbProvider::new(
                http.clone(),
                provider.url.as_deref().unwrap_or(ADSBDB_URL),
                provider.timeout,
            ))),
            ProviderKind::Airlabs => match api_key(AIRLABS_KEY_ENV) {
                Some(key) => providers.push(Box::new(AirLabsProvider::new(
                    http.clone(),
                    provider.url.as_deref().unwrap_or(AIRLABS_URL),
                    key,
                    provider.timeout,
                ))),
                None => log::warn!("{} not set, AirLabs enrichment disabled", AIRLABS_KEY_ENV),
            },
            ProviderKind::Aviationstack => match api_key(AVIATIONSTACK_KEY_ENV) {
                Some(key) => providers.push(Box::new(AviationstackProvider::new(
                    http.clone(),
                    provider.url.as_deref().unwrap_or(AVIATIONSTACK_URL),
                    key,
                    provider.timeout,
                ))),
                None => log::warn!(
                    "{} not set, aviationstack enrichment disabled",
                    AVIATIONSTACK_KEY_ENV
                ),
            },
        }
    }

    providers
}

fn build_coordinator(config: &EnrichmentConfig, http: &reqwest::Client) -> EnrichmentCoordinator {
    EnrichmentCoordinator::new(
        build_providers(config, http),
        config.total_timeout,
        config.cache_ttl,
    )
}

fn api_key(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// One line per track describing the effective configuration.
pub fn describe(config: &Config) -> Vec<String> {
    let mut lines = Vec::new();
    match config.observer.manual_fix() {
        Ok(fix) => lines.push(format!(
            "observer: {:.4}, {:.4}{}",
            fix.latitude_deg(),
            fix.longitude_deg(),
            if config.observer.geolocation {
                " (IP geolocation first)"
            } else {
                ""
            }
        )),
        Err(e) => lines.push(format!("observer: {}", e)),
    }

    if config.aircraft.enabled {
        lines.push(format!(
            "aircraft: radius {} km, every {}, stale after {} cycles",
            config.aircraft.radius_km,
            humantime::format_duration(config.aircraft.poll_interval),
            config.aircraft.stale_after_cycles
        ));
        let chain: Vec<String> = config
            .enrichment
            .providers
            .iter()
            .filter(|p| p.enabled)
            .map(|p| format!("{:?}", p.kind).to_lowercase())
            .collect();
        lines.push(format!("enrichment: [{}]", chain.join(", ")));
    } else {
        lines.push("aircraft: disabled".to_string());
    }

    if config.satellites.enabled {
        let selection = if config.satellites.track_all {
            "all".to_string()
        } else if config.satellites.only_norad_ids.is_empty() {
            format!("curated ({})", config.satellites.space_objects_file.display())
        } else {
            format!(
                "curated ({}) or {:?}",
                config.satellites.space_objects_file.display(),
                config.satellites.only_norad_ids
            )
        };
        lines.push(format!(
            "satellites: min elevation {}°, every {}, tracking {}",
            config.satellites.min_elevation_deg,
            humantime::format_duration(config.satellites.update_interval),
            selection
        ));
    } else {
        lines.push("satellites: disabled".to_string());
    }

    lines
}
