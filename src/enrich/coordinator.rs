use std::collections::HashMap;
use std::time::Duration;

use tokio::time::{timeout, Instant};

use super::error::ProviderError;
use super::provider::EnrichmentProvider;
use super::record::{AircraftQuery, EnrichedRecord, ProviderStatus};

/// Walks the provider chain in priority order, merging fields left-biased.
///
/// Each provider gets at most its own timeout and never more than what is left
/// of `total_timeout`. Failures are recorded as status tags on the record and
/// counted; nothing is returned as an error. Only records where every provider
/// either answered or had nothing to do are cached, so a failed lookup is
/// attempted again on the next call.
pub struct EnrichmentCoordinator {
    providers: Vec<Box<dyn EnrichmentProvider>>,
    total_timeout: Duration,
    cache_ttl: Duration,
    cache: HashMap<AircraftQuery, (Instant, EnrichedRecord)>,
    failures: HashMap<&'static str, u64>,
}

impl EnrichmentCoordinator {
    pub fn new(
        providers: Vec<Box<dyn EnrichmentProvider>>,
        total_timeout: Duration,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            providers,
            total_timeout,
            cache_ttl,
            cache: HashMap::new(),
            failures: HashMap::new(),
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Failed lookups per provider since start.
    pub fn failure_count(&self, provider: &str) -> u64 {
        self.failures.get(provider).copied().unwrap_or(0)
    }

    pub async fn enrich(&mut self, query: &AircraftQuery) -> EnrichedRecord {
        let now = Instant::now();
        if let Some((stored_at, record)) = self.cache.get(query) {
            if now.duration_since(*stored_at) < self.cache_ttl {
                let mut record = record.clone();
                record.cached = true;
                return record;
            }
        }

        let (record, settled) = self.run_chain(query).await;
        self.evict_expired(now);
        if settled && !self.cache_ttl.is_zero() {
            self.cache.insert(query.clone(), (now, record.clone()));
        }
        record
    }

    /// Returns the record and whether it is worth caching: no provider failed
    /// and none was cut off by the ceiling.
    async fn run_chain(&mut self, query: &AircraftQuery) -> (EnrichedRecord, bool) {
        let deadline = Instant::now() + self.total_timeout;
        let mut record = EnrichedRecord::bare(query.clone());
        let mut settled = true;

        for provider in &self.providers {
            let name = provider.name();

            if record.fields.is_complete() {
                record.record(name, ProviderStatus::Skipped);
                continue;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::debug!("Enrichment ceiling reached before {}", name);
                record.record(name, ProviderStatus::Skipped);
                settled = false;
                continue;
            }

            let budget = provider.timeout().min(remaining);
            match timeout(budget, provider.lookup(query)).await {
                Ok(Ok(fields)) if !fields.is_empty() => record.absorb(name, fields),
                Ok(Ok(_)) => {
                    log::debug!("{} returned no fields for {}", name, query.icao24);
                    record.record(name, ProviderStatus::Fail);
                    *self.failures.entry(name).or_default() += 1;
                }
                Ok(Err(ProviderError::NotApplicable(why))) => {
                    log::debug!("{} skipped for {}: {}", name, query.icao24, why);
                    record.record(name, ProviderStatus::Skipped);
                }
                Ok(Err(e)) => {
                    log::debug!("{} failed for {}: {}", name, query.icao24, e);
                    record.record(name, ProviderStatus::Fail);
                    *self.failures.entry(name).or_default() += 1;
                }
                Err(_) => {
                    log::debug!("{} timed out after {:?} for {}", name, budget, query.icao24);
                    record.record(name, ProviderStatus::Fail);
                    *self.failures.entry(name).or_default() += 1;
                }
            }
        }

        if record.outcomes.iter().any(|o| o.status == ProviderStatus::Fail) {
            settled = false;
        }
        (record, settled)
    }

    fn evict_expired(&mut self, now: Instant) {
        let ttl = self.cache_ttl;
        self.cache.retain(|_, (stored_at, _)| now.duration_since(*stored_at) < ttl);
    }
}
