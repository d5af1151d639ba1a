//! Observer-centred proximity tracking for aircraft and satellites.
//!
//! Each track polls its source on a fixed interval, turns per-entity
//! measurements into ENTER/EXIT transitions and hands ordered events to a
//! sink.

pub mod app;
pub mod config;
pub mod detector;
pub mod enrich;
pub mod event;
pub mod geo;
pub mod orbit;
pub mod registry;
pub mod scheduler;
pub mod source;
