//! bpr-testkit
//!
//! In-memory stand-ins for the four source collections plus record
//! builders. Used by scenario tests here and by the daemon's router tests.

pub mod fixtures;
mod store;

use std::sync::Arc;

use bpr_engine::{EngineSettings, ReconciliationService, Sources};

pub use store::{InMemoryStore, WriteFault};

/// A service wired to `store` with default settings.
pub fn service_over(store: Arc<InMemoryStore>) -> ReconciliationService {
    ReconciliationService::new(Sources::from_store(store), EngineSettings::default())
}

/// Non-default `phone_width` needs a store built with
/// [`InMemoryStore::with_phone_width`] at the same width.
pub fn service_with(store: Arc<InMemoryStore>, settings: EngineSettings) -> ReconciliationService {
    ReconciliationService::new(Sources::from_store(store), settings)
}
