//! bpr-engine
//!
//! Async reconciliation service over the four collections: bid postings,
//! participations, seller identities and confirmations.
//!
//! - Reads fan out to every source concurrently and recompute from scratch
//! - An unreachable identity source degrades sellers to Unknown; any other
//!   failing source is a retryable error naming that source
//! - `decide()` is the only write, serialized per (bid, phone)
//!
//! The pure logic lives in bpr-reconcile; this crate owns IO ordering and
//! error classification.

mod error;
mod locks;
mod service;
mod settings;
mod sources;
mod views;

pub use error::EngineError;
pub use locks::PairLocks;
pub use service::ReconciliationService;
pub use settings::{EngineSettings, DEFAULT_LISTING_DAYS, DEFAULT_NOTIFICATION_DAYS, DEFAULT_TIMEZONE};
pub use sources::{
    BidSource, ConfirmationStore, IdentitySource, ParticipationSource, SourceFailure, SourceKind,
    Sources, WriteFailure,
};
pub use views::{
    AdminCaller, AdminOverview, BidOverview, DecisionOutcome, DecisionRequest, Roster,
    SellerCaller, SellerHistory, SellerNotifications, SellerParticipationView,
};
