//! Polling loops: one per track, each owning its detector.

mod aircraft;
mod satellite;
mod stats;
mod worker;

pub use aircraft::{AircraftSettings, AircraftTrack};
pub use satellite::{SatelliteSettings, SatelliteTrack};
pub use stats::TrackStats;
pub use worker::{spawn, Track, WorkerHandle, MIN_INTERVAL};
