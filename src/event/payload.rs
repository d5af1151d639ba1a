use std::collections::BTreeMap;

use serde::Serialize;

use crate::enrich::EnrichedRecord;
use crate::source::AircraftVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    OutOfRadius,
    SignalLost,
    BelowElevation,
    NoLongerTracked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Aircraft(AircraftPayload),
    Satellite(SatellitePayload),
    Notice(BTreeMap<String, serde_json::Value>),
}

impl Payload {
    /// One-line `key=value` rendering for the console.
    pub fn summary(&self) -> String {
        match self {
            Payload::Aircraft(p) => p.summary(),
            Payload::Satellite(p) => p.summary(),
            Payload::Notice(meta) => meta
                .iter()
                .map(|(k, v)| match v {
                    serde_json::Value::String(s) => format!("{}={}", k, s),
                    other => format!("{}={}", k, other),
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Last known live fields of an aircraft plus whatever enrichment resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftPayload {
    pub callsign: Option<String>,
    pub country: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub alt_ft: Option<i64>,
    pub spd_kt: Option<i64>,
    pub trk_deg: Option<i64>,
    pub dist_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ExitReason>,
    #[serde(flatten)]
    pub enrichment: Option<EnrichedRecord>,
}

impl AircraftPayload {
    pub fn from_vector(vector: &AircraftVector, dist_km: f64) -> Self {
        Self {
            callsign: vector.callsign.clone(),
            country: vector.origin_country.clone(),
            lat: vector.lat,
            lon: vector.lon,
            alt_ft: vector.baro_altitude_m.map(|m| (m * 3.28084).round() as i64),
            spd_kt: vector.velocity_ms.map(|v| (v * 1.94384).round() as i64),
            trk_deg: vector.true_track_deg.map(|t| t.round() as i64),
            dist_km: round_to(dist_km, 3),
            reason: None,
            enrichment: None,
        }
    }

    fn summary(&self) -> String {
        let mut parts = vec![format!("dist={:.1}km", self.dist_km)];
        if let Some(alt) = self.alt_ft {
            parts.push(format!("alt={}ft", alt));
        }
        if let Some(spd) = self.spd_kt {
            parts.push(format!("spd={}kt", spd));
        }
        if let Some(trk) = self.trk_deg {
            parts.push(format!("trk={}", trk));
        }
        if let Some(record) = &self.enrichment {
            if let Some(route) = &record.fields.route {
                parts.push(format!("route={}", route));
            }
            let airline = record.fields.airline.as_ref().or(record.fields.airline_icao.as_ref());
            if let Some(airline) = airline {
                parts.push(format!("airline={}", airline));
            }
            if let Some(reg) = &record.fields.registration {
                parts.push(format!("reg={}", reg));
            }
        }
        if let Some(reason) = self.reason {
            parts.push(format!("reason={}", reason_str(reason)));
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatellitePayload {
    pub norad_id: u32,
    pub elev_deg: f64,
    pub az_deg: f64,
    pub range_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ExitReason>,
}

impl SatellitePayload {
    pub fn new(norad_id: u32, elevation_deg: f64, azimuth_deg: f64, range_km: f64) -> Self {
        Self {
            norad_id,
            elev_deg: round_to(elevation_deg, 1),
            az_deg: round_to(azimuth_deg, 1),
            range_km: round_to(range_km, 1),
            reason: None,
        }
    }

    fn summary(&self) -> String {
        let mut s = format!(
            "elev={:.1} az={:.1} range={:.1}km",
            self.elev_deg, self.az_deg, self.range_km
        );
        if let Some(reason) = self.reason {
            s.push_str(&format!(" reason={}", reason_str(reason)));
        }
        s
    }
}

fn reason_str(reason: ExitReason) -> &'static str {
    match reason {
        ExitReason::OutOfRadius => "out_of_radius",
        ExitReason::SignalLost => "signal_lost",
        ExitReason::BelowElevation => "below_elevation",
        ExitReason::NoLongerTracked => "no_longer_tracked",
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
