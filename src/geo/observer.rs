use serde::Serialize;

use super::error::GeoError;
use super::GeoPoint;

/// Fixed reference point of the process. Validated on construction and never
/// mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObserverFix {
    latitude_deg: f64,
    longitude_deg: f64,
    altitude_m: Option<f64>,
}

impl ObserverFix {
    pub fn new(
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_m: Option<f64>,
    ) -> Result<Self, GeoError> {
        let point = GeoPoint::new(latitude_deg, longitude_deg)?;
        if !point.lon.is_finite() || point.lon.abs() > 180.0 {
            return Err(GeoError::InvalidCoordinate {
                lat: latitude_deg,
                lon: longitude_deg,
            });
        }
        Ok(Self {
            latitude_deg,
            longitude_deg,
            altitude_m: altitude_m.filter(|a| a.is_finite()),
        })
    }

    /// Parses `"lat, lon"`.
    pub fn from_coordinates(coordinates: &str, altitude_m: Option<f64>) -> Result<Self, GeoError> {
        let invalid = GeoError::InvalidCoordinate {
            lat: f64::NAN,
            lon: f64::NAN,
        };
        let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
        if parts.len() != 2 {
            return Err(invalid);
        }
        let lat = parts[0].parse().map_err(|_| invalid.clone())?;
        let lon = parts[1].parse().map_err(|_| invalid)?;
        Self::new(lat, lon, altitude_m)
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude_deg
    }

    pub fn longitude_deg(&self) -> f64 {
        self.longitude_deg
    }

    pub fn altitude_m(&self) -> Option<f64> {
        self.altitude_m
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude_deg,
            lon: self.longitude_deg,
        }
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        // WGS-84 constants
        let a = 6378.137;
        let e2 = 0.00669437999014;
        let lat = self.lat_rad();
        let lon = self.lon_rad();
        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let alt_km = self.altitude_m.unwrap_or(0.0) / 1000.0;
        [
            (n + alt_km) * cos_lat * lon.cos(),
            (n + alt_km) * cos_lat * lon.sin(),
            (n * (1.0 - e2) + alt_km) * sin_lat,
        ]
    }
}
