use serde::Serialize;

/// Proximity predicate applied to a scalar measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ThresholdRule {
    /// Aircraft: inside while `distance_km <= radius_km`.
    WithinRadius { radius_km: f64 },
    /// Satellites: inside while `elevation_deg >= min_elevation_deg`.
    AboveElevation { min_elevation_deg: f64 },
}

impl ThresholdRule {
    /// Non-finite measurements are never inside.
    pub fn is_inside(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match *self {
            ThresholdRule::WithinRadius { radius_km } => value <= radius_km,
            ThresholdRule::AboveElevation { min_elevation_deg } => value >= min_elevation_deg,
        }
    }
}
