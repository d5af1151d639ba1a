use serde::Serialize;

/// Counters for one track since start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackStats {
    pub cycles: u64,
    pub fetch_failures: u64,
    pub propagation_failures: u64,
    pub entered: u64,
    pub exited: u64,
    pub overhead: u64,
    pub evicted: u64,
}
