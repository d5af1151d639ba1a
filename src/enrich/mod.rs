//! Best-effort aircraft metadata from an ordered chain of providers.

mod adsbdb;
mod airlabs;
mod aviationstack;
mod coordinator;
mod error;
mod provider;
mod record;

pub use adsbdb::{AdsbdbProvider, ADSBDB_URL};
pub use airlabs::{AirLabsProvider, AIRLABS_URL};
pub use aviationstack::{AviationstackProvider, AVIATIONSTACK_URL};
pub use coordinator::EnrichmentCoordinator;
pub use error::ProviderError;
pub use provider::EnrichmentProvider;
pub use record::{
    normalize_callsign, AircraftQuery, EnrichedFields, EnrichedRecord, ProviderOutcome,
    ProviderStatus, Route,
};
