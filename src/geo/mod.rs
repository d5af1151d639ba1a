mod distance;
mod error;
mod observer;
mod topocentric;

pub use distance::{bounding_box, surface_distance, BoundingBox, GeoPoint, EARTH_RADIUS_KM};
pub use error::GeoError;
pub use observer::ObserverFix;
pub use topocentric::{ecef_to_enu, teme_to_ecef_position, topocentric, LookAngles};
