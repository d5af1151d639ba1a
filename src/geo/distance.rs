use serde::Serialize;

use super::error::GeoError;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Geodetic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        let point = Self { lat, lon };
        point.validate()?;
        Ok(point)
    }

    fn validate(&self) -> Result<(), GeoError> {
        if !self.lat.is_finite() || !self.lon.is_finite() || self.lat.abs() > 90.0 {
            return Err(GeoError::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            });
        }
        Ok(())
    }
}

/// Great-circle distance in kilometres (haversine, spherical Earth).
pub fn surface_distance(p0: GeoPoint, p1: GeoPoint) -> Result<f64, GeoError> {
    p0.validate()?;
    p1.validate()?;

    let lat0 = p0.lat.to_radians();
    let lat1 = p1.lat.to_radians();
    let d_lat = (p1.lat - p0.lat).to_radians();
    let d_lon = (p1.lon - p0.lon).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat0.cos() * lat1.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    Ok(EARTH_RADIUS_KM * c)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

/// Rough lat/lon box enclosing a circle of `radius_km`. Callers still filter
/// with [`surface_distance`].
pub fn bounding_box(center: GeoPoint, radius_km: f64) -> BoundingBox {
    let d_lat = radius_km / 111.0;
    let d_lon = radius_km / (111.0 * center.lat.to_radians().cos().max(0.1));
    BoundingBox {
        lat_min: (center.lat - d_lat).max(-90.0),
        lat_max: (center.lat + d_lat).min(90.0),
        lon_min: center.lon - d_lon,
        lon_max: center.lon + d_lon,
    }
}
