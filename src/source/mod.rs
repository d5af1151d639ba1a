//! External snapshot sources: live aircraft vectors, orbital element sets and
//! the observer's own location.

mod aircraft;
mod error;
mod geolocate;
mod satellite;

pub use aircraft::{parse_states, AircraftSource, AircraftVector, OpenSkySource, OPENSKY_URL};
pub use error::FetchError;
pub use geolocate::{geolocate, parse_ipapi, parse_ipinfo, GeoFix};
pub use satellite::{ElementSource, TleSource, CELESTRAK_ACTIVE_URL};
