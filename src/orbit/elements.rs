use chrono::{DateTime, Utc};
use sgp4::{Constants, Elements};

use super::error::PropagationError;
use crate::geo::{topocentric, LookAngles, ObserverFix};

/// One parsed orbital element set, ready for SGP4 propagation.
pub struct ElementSet {
    norad_id: u32,
    name: String,
    elements: Elements,
    constants: Constants,
}

impl ElementSet {
    pub fn from_tle(
        name: Option<String>,
        line1: &str,
        line2: &str,
    ) -> Result<Self, PropagationError> {
        let elements = Elements::from_tle(name, line1.as_bytes(), line2.as_bytes())?;
        let constants = Constants::from_elements(&elements)?;
        let norad_id = elements.norad_id as u32;
        let name = elements
            .object_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| format!("SAT {}", norad_id));

        Ok(Self {
            norad_id,
            name,
            elements,
            constants,
        })
    }

    pub fn norad_id(&self) -> u32 {
        self.norad_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// TEME position in km at `timestamp`.
    pub fn propagate(&self, timestamp: DateTime<Utc>) -> Result<[f64; 3], PropagationError> {
        let minutes = self
            .elements
            .datetime_to_minutes_since_epoch(&timestamp.naive_utc())
            .map_err(|e| self.failure(e.to_string()))?;

        let prediction = self
            .constants
            .propagate(minutes)
            .map_err(|e| self.failure(e.to_string()))?;

        if prediction.position.iter().any(|c| !c.is_finite()) {
            return Err(self.failure("non-finite position".to_string()));
        }
        Ok(prediction.position)
    }

    pub fn look_angles(
        &self,
        observer: &ObserverFix,
        timestamp: DateTime<Utc>,
    ) -> Result<LookAngles, PropagationError> {
        let position = self.propagate(timestamp)?;
        Ok(topocentric(observer, position, timestamp))
    }

    fn failure(&self, message: String) -> PropagationError {
        PropagationError::Propagation {
            norad_id: self.norad_id,
            message,
        }
    }
}

impl std::fmt::Debug for ElementSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementSet")
            .field("norad_id", &self.norad_id)
            .field("name", &self.name)
            .finish()
    }
}
