use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::stats::TrackStats;
use super::worker::Track;
use crate::detector::{ThresholdRule, Transition, TransitionDetector};
use crate::enrich::{AircraftQuery, EnrichedRecord, EnrichmentCoordinator};
use crate::event::{AircraftPayload, Event, EventKind, ExitReason, Payload, TrackKind};
use crate::geo::{surface_distance, ObserverFix};
use crate::source::{AircraftSource, AircraftVector, FetchError};

#[derive(Debug, Clone)]
pub struct AircraftSettings {
    pub radius_km: f64,
    pub overhead_radius_m: f64,
    pub overhead_cooldown: Duration,
    pub stale_after_cycles: u64,
}

/// What the last successful snapshot said about an aircraft, kept so an
/// eviction can still describe it.
struct LastSeen {
    label: String,
    payload: AircraftPayload,
}

/// Aircraft proximity track: ENTER/EXIT against a radius around the observer,
/// plus OVERHEAD for close passes.
pub struct AircraftTrack {
    source: Box<dyn AircraftSource>,
    observer: ObserverFix,
    settings: AircraftSettings,
    detector: TransitionDetector<String>,
    coordinator: EnrichmentCoordinator,
    last_seen: HashMap<String, LastSeen>,
    enrichment: HashMap<String, EnrichedRecord>,
    overhead_sent: HashMap<String, Instant>,
    stats: TrackStats,
}

impl AircraftTrack {
    pub fn new(
        source: Box<dyn AircraftSource>,
        observer: ObserverFix,
        settings: AircraftSettings,
        coordinator: EnrichmentCoordinator,
    ) -> Self {
        Self {
            source,
            observer,
            settings,
            detector: TransitionDetector::new(),
            coordinator,
            last_seen: HashMap::new(),
            enrichment: HashMap::new(),
            overhead_sent: HashMap::new(),
            stats: TrackStats::default(),
        }
    }

    pub fn stats(&self) -> &TrackStats {
        &self.stats
    }

    pub fn detector(&self) -> &TransitionDetector<String> {
        &self.detector
    }

    pub fn coordinator(&self) -> &EnrichmentCoordinator {
        &self.coordinator
    }

    /// One polling cycle. A failed fetch yields at most a WARN and leaves
    /// every state untouched.
    pub async fn poll(&mut self) -> Vec<Event> {
        self.stats.cycles += 1;

        let vectors = match self.source.fetch().await {
            Ok(vectors) => vectors,
            Err(e) => {
                self.stats.fetch_failures += 1;
                return fetch_warning(&e).into_iter().collect();
            }
        };

        self.detector.begin_cycle();
        let rule = ThresholdRule::WithinRadius {
            radius_km: self.settings.radius_km,
        };
        let now = Instant::now();
        let mut events = Vec::new();

        for vector in vectors {
            let distance_km = match surface_distance(self.observer.point(), vector.position()) {
                Ok(d) => d,
                Err(e) => {
                    log::debug!("Skipping {}: {}", vector.icao24, e);
                    continue;
                }
            };
            let key = vector.icao24.clone();
            let label = display_label(&vector);
            let live = AircraftPayload::from_vector(&vector, distance_km);

            match self.detector.observe(&key, distance_km, rule) {
                Some(Transition::Enter) => {
                    let query = AircraftQuery::new(&vector.icao24, vector.callsign.as_deref());
                    let record = self.coordinator.enrich(&query).await;
                    self.enrichment.insert(key.clone(), record.clone());

                    let payload = AircraftPayload {
                        enrichment: Some(record),
                        ..live.clone()
                    };
                    events.push(aircraft_event(EventKind::Enter, &key, &label, payload));
                    self.stats.entered += 1;
                }
                Some(Transition::Exit) => {
                    let payload = AircraftPayload {
                        reason: Some(ExitReason::OutOfRadius),
                        enrichment: self.enrichment.remove(&key),
                        ..live.clone()
                    };
                    events.push(aircraft_event(EventKind::Exit, &key, &label, payload));
                    self.stats.exited += 1;
                }
                None => {}
            }

            if self.detector.is_inside(&key)
                && distance_km * 1000.0 <= self.settings.overhead_radius_m
                && self.overhead_allowed(&key, now)
            {
                self.overhead_sent.insert(key.clone(), now);
                let payload = AircraftPayload {
                    enrichment: self.enrichment.get(&key).cloned(),
                    ..live.clone()
                };
                events.push(aircraft_event(EventKind::Overhead, &key, &label, payload));
                self.stats.overhead += 1;
            }

            self.last_seen.insert(key, LastSeen { label, payload: live });
        }

        for eviction in self.detector.sweep(self.settings.stale_after_cycles) {
            self.stats.evicted += 1;
            let last = self.last_seen.remove(&eviction.key);
            let record = self.enrichment.remove(&eviction.key);
            if !eviction.was_inside {
                continue;
            }
            if let Some(last) = last {
                let payload = AircraftPayload {
                    reason: Some(ExitReason::SignalLost),
                    enrichment: record,
                    ..last.payload
                };
                events.push(aircraft_event(EventKind::Exit, &eviction.key, &last.label, payload));
                self.stats.exited += 1;
            }
        }

        let cooldown = self.settings.overhead_cooldown;
        self.overhead_sent
            .retain(|_, sent| now.duration_since(*sent) < cooldown);

        events
    }

    fn overhead_allowed(&self, key: &str, now: Instant) -> bool {
        match self.overhead_sent.get(key) {
            Some(sent) => now.duration_since(*sent) >= self.settings.overhead_cooldown,
            None => true,
        }
    }
}

#[async_trait]
impl Track for AircraftTrack {
    fn name(&self) -> &'static str {
        "aircraft"
    }

    async fn cycle(&mut self) -> Vec<Event> {
        self.poll().await
    }
}

fn display_label(vector: &AircraftVector) -> String {
    vector
        .callsign
        .clone()
        .unwrap_or_else(|| "(no callsign)".to_string())
}

fn aircraft_event(kind: EventKind, key: &str, label: &str, payload: AircraftPayload) -> Event {
    Event::new(kind, TrackKind::Plane, key, label, Payload::Aircraft(payload))
}

pub(crate) fn fetch_warning(err: &FetchError) -> Option<Event> {
    let Some(label) = err.warn_label() else {
        log::debug!("Skipping cycle: {}", err);
        return None;
    };
    log::warn!("Aircraft fetch failed: {}", err);

    let mut event = Event::warn(TrackKind::Plane, "opensky", label).with("error", err.to_string());
    if let Some(status) = err.status() {
        event = event.with("status", status);
    }
    if let FetchError::RateLimited { retry_after_s } = err {
        event = event.with("retry_after_s", *retry_after_s);
    }
    Some(event)
}
