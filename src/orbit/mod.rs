mod catalog;
mod elements;
mod error;
mod tle;

pub use catalog::Catalog;
pub use elements::ElementSet;
pub use error::PropagationError;
pub use tle::parse_multi_tle;
