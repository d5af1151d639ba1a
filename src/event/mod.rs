mod payload;
mod sink;

pub use payload::{AircraftPayload, ExitReason, Payload, SatellitePayload};
pub use sink::{run_sink, ConsoleSink, EventSink, JsonLinesSink, MultiSink};

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::detector::Transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Enter,
    Exit,
    Overhead,
    Info,
    Warn,
}

impl From<Transition> for EventKind {
    fn from(t: Transition) -> Self {
        match t {
            Transition::Enter => EventKind::Enter,
            Transition::Exit => EventKind::Exit,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Enter => "ENTER",
            EventKind::Exit => "EXIT",
            EventKind::Overhead => "OVERHEAD",
            EventKind::Info => "INFO",
            EventKind::Warn => "WARN",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Plane,
    SpaceObject,
    Home,
    System,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackKind::Plane => "plane",
            TrackKind::SpaceObject => "space_object",
            TrackKind::Home => "home",
            TrackKind::System => "system",
        };
        f.pad(s)
    }
}

/// Immutable record handed to the sink. Field names on the wire follow the
/// JSON-lines log layout (`event`, `kind`, `id`, `label`, `ts`, `meta`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "event")]
    pub kind: EventKind,
    #[serde(rename = "kind")]
    pub track: TrackKind,
    #[serde(rename = "id")]
    pub key: String,
    pub label: String,
    #[serde(rename = "ts", serialize_with = "serialize_ts")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "meta")]
    pub payload: Payload,
}

impl Event {
    pub fn new(
        kind: EventKind,
        track: TrackKind,
        key: impl Into<String>,
        label: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            kind,
            track,
            key: key.into(),
            label: label.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn info(track: TrackKind, key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(EventKind::Info, track, key, label, Payload::Notice(BTreeMap::new()))
    }

    pub fn warn(track: TrackKind, key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(EventKind::Warn, track, key, label, Payload::Notice(BTreeMap::new()))
    }

    /// Adds a field to a notice payload. No-op on measurement payloads.
    pub fn with(mut self, name: &str, value: impl Serialize) -> Self {
        if let Payload::Notice(meta) = &mut self.payload {
            let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            meta.insert(name.to_string(), value);
        }
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

fn serialize_ts<S: serde::Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<8} {:<12} {:<8} {}",
            self.timestamp.format("%H:%M:%S%.3fZ"),
            self.kind,
            self.track,
            self.key,
            self.label
        )?;
        let summary = self.payload.summary();
        if !summary.is_empty() {
            write!(f, "  {}", summary)?;
        }
        Ok(())
    }
}
