//! Per-entity inside/outside state and ENTER/EXIT transition detection.

mod detector;
mod rule;
mod state;

pub use detector::{Eviction, TransitionDetector};
pub use rule::ThresholdRule;
pub use state::{EntityState, Transition};
