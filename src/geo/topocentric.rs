use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ObserverFix;

/// Observer-centred look angles to a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LookAngles {
    pub elevation_deg: f64,
    pub azimuth_deg: f64,
    pub range_km: f64,
}

/// Elevation, azimuth and slant range from `observer` to a TEME position (km)
/// at `timestamp`.
pub fn topocentric(
    observer: &ObserverFix,
    teme_position_km: [f64; 3],
    timestamp: DateTime<Utc>,
) -> LookAngles {
    let target = teme_to_ecef_position(teme_position_km, gmst(timestamp));
    look_angles_ecef(observer, target)
}

pub(crate) fn gmst(timestamp: DateTime<Utc>) -> f64 {
    sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&timestamp.naive_utc()))
}

pub(crate) fn look_angles_ecef(observer: &ObserverFix, target_ecef_km: [f64; 3]) -> LookAngles {
    let station = observer.position_ecef_km();
    let dr = [
        target_ecef_km[0] - station[0],
        target_ecef_km[1] - station[1],
        target_ecef_km[2] - station[2],
    ];
    let range_km = (dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]).sqrt();

    let (east, north, up) = ecef_to_enu(dr, observer.lat_rad(), observer.lon_rad());
    let azimuth_deg = east.atan2(north).to_degrees().rem_euclid(360.0);
    let elevation_deg = if range_km > 0.0 {
        (up / range_km).clamp(-1.0, 1.0).asin().to_degrees()
    } else {
        90.0
    };

    LookAngles {
        elevation_deg,
        azimuth_deg,
        range_km,
    }
}

pub fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

pub fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let sin_lon = lon_rad.sin();
    let cos_lon = lon_rad.cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const A: f64 = 6378.137;

    fn equator() -> ObserverFix {
        ObserverFix::new(0.0, 0.0, None).unwrap()
    }

    #[test]
    fn zenith_target() {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let g = gmst(t);
        // Undo the TEME->ECEF rotation so the target sits straight above (0, 0).
        let r = A + 400.0;
        let teme = [r * g.cos(), r * g.sin(), 0.0];

        let look = topocentric(&equator(), teme, t);
        assert!((look.elevation_deg - 90.0).abs() < 1e-6);
        assert!((look.range_km - 400.0).abs() < 1e-6);
    }

    #[test]
    fn horizon_targets_have_compass_azimuths() {
        let north = look_angles_ecef(&equator(), [A, 0.0, 1000.0]);
        assert!(north.elevation_deg.abs() < 1e-9);
        assert!(north.azimuth_deg.abs() < 1e-9);

        let east = look_angles_ecef(&equator(), [A, 1000.0, 0.0]);
        assert!((east.azimuth_deg - 90.0).abs() < 1e-9);

        let west = look_angles_ecef(&equator(), [A, -1000.0, 0.0]);
        assert!((west.azimuth_deg - 270.0).abs() < 1e-9);
    }

    #[test]
    fn target_behind_the_earth_is_below_horizon() {
        let look = look_angles_ecef(&equator(), [-A - 500.0, 0.0, 0.0]);
        assert!((look.elevation_deg + 90.0).abs() < 1e-6);
    }

    #[test]
    fn deterministic_for_fixed_timestamp() {
        let t = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let obs = ObserverFix::new(40.758, -73.9855, Some(10.0)).unwrap();
        let teme = [-4000.0, 3000.0, 4500.0];
        assert_eq!(topocentric(&obs, teme, t), topocentric(&obs, teme, t));
    }
}
