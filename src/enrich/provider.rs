use std::time::Duration;

use async_trait::async_trait;

use super::error::ProviderError;
use super::record::{AircraftQuery, EnrichedFields};

/// A single metadata lookup in the enrichment chain.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Short name used in status tags (`adsbdb:ok`).
    fn name(&self) -> &'static str;

    /// Upper bound for one lookup; the coordinator may grant less.
    fn timeout(&self) -> Duration;

    async fn lookup(&self, query: &AircraftQuery) -> Result<EnrichedFields, ProviderError>;
}
