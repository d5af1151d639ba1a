use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::stats::TrackStats;
use super::worker::Track;
use crate::detector::{ThresholdRule, Transition, TransitionDetector};
use crate::event::{Event, EventKind, ExitReason, Payload, SatellitePayload, TrackKind};
use crate::geo::ObserverFix;
use crate::registry::EntityRegistry;
use crate::source::ElementSource;

#[derive(Debug, Clone)]
pub struct SatelliteSettings {
    pub min_elevation_deg: f64,
    pub stale_after_cycles: u64,
}

/// Satellite visibility track: ENTER/EXIT against a minimum elevation, for
/// every catalog entry the allowlist admits.
pub struct SatelliteTrack {
    source: Box<dyn ElementSource>,
    observer: ObserverFix,
    settings: SatelliteSettings,
    registry: EntityRegistry,
    detector: TransitionDetector<u32>,
    last_seen: HashMap<u32, (String, SatellitePayload)>,
    stats: TrackStats,
}

impl SatelliteTrack {
    pub fn new(
        source: Box<dyn ElementSource>,
        observer: ObserverFix,
        settings: SatelliteSettings,
        registry: EntityRegistry,
    ) -> Self {
        Self {
            source,
            observer,
            settings,
            registry,
            detector: TransitionDetector::new(),
            last_seen: HashMap::new(),
            stats: TrackStats::default(),
        }
    }

    pub fn stats(&self) -> &TrackStats {
        &self.stats
    }

    pub fn detector(&self) -> &TransitionDetector<u32> {
        &self.detector
    }

    /// One polling cycle with every satellite propagated to `now`.
    pub async fn cycle_at(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        self.stats.cycles += 1;

        let fetched = self.source.fetch().await;
        let mut events = self.source.drain_notices();
        let catalog = match fetched {
            Ok(catalog) => catalog,
            Err(e) => {
                self.stats.fetch_failures += 1;
                log::warn!("Element set fetch failed: {}", e);
                if let Some(label) = e.warn_label() {
                    events.push(
                        Event::warn(TrackKind::SpaceObject, "tle", label)
                            .with("error", e.to_string()),
                    );
                }
                return events;
            }
        };

        self.detector.begin_cycle();
        let allow = self.registry.current();
        let rule = ThresholdRule::AboveElevation {
            min_elevation_deg: self.settings.min_elevation_deg,
        };

        let mut tracked: Vec<_> = catalog
            .iter()
            .filter(|set| allow.contains(set.norad_id()))
            .collect();
        tracked.sort_by_key(|set| set.norad_id());

        for set in tracked {
            let norad_id = set.norad_id();
            let look = match set.look_angles(&self.observer, now) {
                Ok(look) => look,
                Err(e) => {
                    self.stats.propagation_failures += 1;
                    log::debug!("Skipping {}: {}", norad_id, e);
                    continue;
                }
            };

            let label = allow.label(norad_id).unwrap_or(set.name()).to_string();
            let payload = SatellitePayload::new(
                norad_id,
                look.elevation_deg,
                look.azimuth_deg,
                look.range_km,
            );

            match self.detector.observe(&norad_id, look.elevation_deg, rule) {
                Some(Transition::Enter) => {
                    let enter = payload.clone();
                    events.push(satellite_event(EventKind::Enter, norad_id, &label, enter, now));
                    self.stats.entered += 1;
                }
                Some(Transition::Exit) => {
                    let exit = SatellitePayload {
                        reason: Some(ExitReason::BelowElevation),
                        ..payload.clone()
                    };
                    events.push(satellite_event(EventKind::Exit, norad_id, &label, exit, now));
                    self.stats.exited += 1;
                }
                None => {}
            }

            self.last_seen.insert(norad_id, (label, payload));
        }

        for eviction in self.detector.sweep(self.settings.stale_after_cycles) {
            self.stats.evicted += 1;
            let last = self.last_seen.remove(&eviction.key);
            if !eviction.was_inside {
                continue;
            }
            if let Some((label, payload)) = last {
                let reason = if allow.contains(eviction.key) {
                    ExitReason::SignalLost
                } else {
                    ExitReason::NoLongerTracked
                };
                let exit = SatellitePayload {
                    reason: Some(reason),
                    ..payload
                };
                events.push(satellite_event(EventKind::Exit, eviction.key, &label, exit, now));
                self.stats.exited += 1;
            }
        }

        events
    }
}

#[async_trait]
impl Track for SatelliteTrack {
    fn name(&self) -> &'static str {
        "satellites"
    }

    async fn cycle(&mut self) -> Vec<Event> {
        self.cycle_at(Utc::now()).await
    }
}

fn satellite_event(
    kind: EventKind,
    norad_id: u32,
    label: &str,
    payload: SatellitePayload,
    at: DateTime<Utc>,
) -> Event {
    Event::new(
        kind,
        TrackKind::SpaceObject,
        norad_id.to_string(),
        label,
        Payload::Satellite(payload),
    )
    .at(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbit::Catalog;
    use crate::registry::{AllowList, SelectionPolicy};
    use crate::source::FetchError;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Arc;

    const ISS: &str = "ISS (ZARYA)
1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927
2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537
";

    struct Fixed {
        catalog: Arc<Catalog>,
        failures: VecDeque<bool>,
    }

    #[async_trait]
    impl ElementSource for Fixed {
        async fn fetch(&mut self) -> Result<Arc<Catalog>, FetchError> {
            if self.failures.pop_front().unwrap_or(false) {
                return Err(FetchError::NoData("offline".to_string()));
            }
            Ok(self.catalog.clone())
        }
    }

    /// Serves the ISS once, then an empty catalog.
    struct Vanishing {
        served: bool,
    }

    #[async_trait]
    impl ElementSource for Vanishing {
        async fn fetch(&mut self) -> Result<Arc<Catalog>, FetchError> {
            if std::mem::replace(&mut self.served, true) {
                return Ok(Arc::new(Catalog::from_tle_text("")));
            }
            Ok(Arc::new(Catalog::from_tle_text(ISS)))
        }
    }

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2008, 9, 20, 13, 0, 0).unwrap()
    }

    fn track(
        min_elevation_deg: f64,
        registry: EntityRegistry,
        failures: &[bool],
    ) -> SatelliteTrack {
        SatelliteTrack::new(
            Box::new(Fixed {
                catalog: Arc::new(Catalog::from_tle_text(ISS)),
                failures: failures.iter().copied().collect(),
            }),
            ObserverFix::new(40.758, -73.9855, None).unwrap(),
            SatelliteSettings {
                min_elevation_deg,
                stale_after_cycles: 3,
            },
            registry,
        )
    }

    fn satellite(event: &Event) -> &SatellitePayload {
        match &event.payload {
            Payload::Satellite(p) => p,
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn below_threshold_is_observed_silently() {
        let mut track = track(91.0, EntityRegistry::new(SelectionPolicy::default()), &[]);
        assert!(track.cycle_at(epoch()).await.is_empty());
        assert_eq!(track.detector().len(), 1);
        assert!(!track.detector().is_inside(&25544));
    }

    #[tokio::test]
    async fn enter_uses_curated_label() {
        let registry = EntityRegistry::new(SelectionPolicy::default());
        registry
            .reload_from_str(r#"{"objects": {"25544": {"short_name": "ISS"}}}"#)
            .unwrap();
        let mut track = track(-90.0, registry, &[]);

        let events = track.cycle_at(epoch()).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Enter);
        assert_eq!(events[0].key, "25544");
        assert_eq!(events[0].label, "ISS");
        assert_eq!(events[0].timestamp, epoch());
        assert_eq!(satellite(&events[0]).norad_id, 25544);

        assert!(track.cycle_at(epoch()).await.is_empty());
    }

    #[tokio::test]
    async fn dropped_from_allowlist_exits_after_staleness() {
        let registry = EntityRegistry::new(SelectionPolicy::default());
        let mut track = track(-90.0, registry.clone(), &[]);

        assert_eq!(track.cycle_at(epoch()).await[0].kind, EventKind::Enter);

        registry.reload(AllowList::only([1]));
        assert!(track.cycle_at(epoch()).await.is_empty());
        assert!(track.cycle_at(epoch()).await.is_empty());

        let events = track.cycle_at(epoch()).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Exit);
        assert_eq!(events[0].label, "ISS (ZARYA)");
        assert_eq!(satellite(&events[0]).reason, Some(ExitReason::NoLongerTracked));
        assert!(track.detector().is_empty());
    }

    #[tokio::test]
    async fn vanished_from_catalog_exits_with_signal_lost() {
        let registry = EntityRegistry::new(SelectionPolicy::default());
        let mut track = SatelliteTrack::new(
            Box::new(Vanishing { served: false }),
            ObserverFix::new(40.758, -73.9855, None).unwrap(),
            SatelliteSettings {
                min_elevation_deg: -90.0,
                stale_after_cycles: 3,
            },
            registry.clone(),
        );

        assert_eq!(track.cycle_at(epoch()).await[0].kind, EventKind::Enter);
        assert!(track.cycle_at(epoch()).await.is_empty());
        assert!(track.cycle_at(epoch()).await.is_empty());

        let events = track.cycle_at(epoch()).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Exit);
        assert_eq!(events[0].key, "25544");
        assert_eq!(satellite(&events[0]).reason, Some(ExitReason::SignalLost));
        assert!(registry.current().contains(25544));
        assert!(track.detector().is_empty());
        assert_eq!(track.stats().evicted, 1);
    }

    #[tokio::test]
    async fn fetch_failure_warns_and_keeps_state() {
        let registry = EntityRegistry::new(SelectionPolicy::default());
        let mut track = track(-90.0, registry, &[false, true, true, true, false]);

        assert_eq!(track.cycle_at(epoch()).await.len(), 1);
        for _ in 0..3 {
            let events = track.cycle_at(epoch()).await;
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].kind, EventKind::Warn);
            assert_eq!(events[0].label, "fetch_failed");
        }
        // Failed cycles do not count towards staleness.
        assert!(track.cycle_at(epoch()).await.is_empty());
        assert!(track.detector().is_inside(&25544));
        assert_eq!(track.stats().fetch_failures, 3);
    }
}
