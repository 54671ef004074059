//! Source boundary: the four collections this layer reads and the one it
//! writes.
//!
//! Stores are list-fetch only; all filtering, joining and windowing happens in
//! the engine. Implementations must be `Send + Sync` so one store can serve
//! concurrent handlers.

use std::fmt;
use std::sync::Arc;

use bpr_schemas::{BidPosting, Confirmation, NewConfirmation, Participation, SellerIdentity};
use serde::Serialize;

// ---------------------------------------------------------------------------
// SourceKind
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    BidPostings,
    Participations,
    SellerIdentities,
    Confirmations,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::BidPostings => "bid_postings",
            SourceKind::Participations => "participations",
            SourceKind::SellerIdentities => "seller_identities",
            SourceKind::Confirmations => "confirmations",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// A list fetch did not complete (network, storage, decode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub message: String,
}

impl SourceFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source fetch failed: {}", self.message)
    }
}

impl std::error::Error for SourceFailure {}

/// Outcome of a rejected confirmation write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteFailure {
    /// A confirmation for (bid_id, phone_normalized) already exists.
    Duplicate { bid_id: String, phone: String },
    /// The write may or may not have landed; safe to retry.
    Unavailable(String),
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteFailure::Duplicate { bid_id, phone } => {
                write!(f, "confirmation already exists for bid={bid_id} phone={phone}")
            }
            WriteFailure::Unavailable(msg) => write!(f, "confirmation write failed: {msg}"),
        }
    }
}

impl std::error::Error for WriteFailure {}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait BidSource: Send + Sync {
    async fn list_bids(&self) -> Result<Vec<BidPosting>, SourceFailure>;
}

#[async_trait::async_trait]
pub trait ParticipationSource: Send + Sync {
    /// Rows in arrival order.
    async fn list_participations(&self) -> Result<Vec<Participation>, SourceFailure>;
}

#[async_trait::async_trait]
pub trait IdentitySource: Send + Sync {
    async fn list_identities(&self) -> Result<Vec<SellerIdentity>, SourceFailure>;
}

/// Read + write side of confirmations.
///
/// # Contract
/// `create_confirmation` must refuse a second row for the same
/// `(bid_id, phone_normalized)` with [`WriteFailure::Duplicate`]. The engine
/// also checks before writing, but only the store can close the race between
/// separate processes.
#[async_trait::async_trait]
pub trait ConfirmationStore: Send + Sync {
    async fn list_confirmations(&self) -> Result<Vec<Confirmation>, SourceFailure>;

    async fn create_confirmation(&self, new: NewConfirmation) -> Result<Confirmation, WriteFailure>;
}

// ---------------------------------------------------------------------------
// Sources bundle
// ---------------------------------------------------------------------------

/// The four collaborators, each behind its own handle so a deployment can mix
/// backends (or fail them independently in tests).
#[derive(Clone)]
pub struct Sources {
    pub bids: Arc<dyn BidSource>,
    pub participations: Arc<dyn ParticipationSource>,
    pub identities: Arc<dyn IdentitySource>,
    pub confirmations: Arc<dyn ConfirmationStore>,
}

impl Sources {
    /// One store serving all four collections.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: BidSource + ParticipationSource + IdentitySource + ConfirmationStore + 'static,
    {
        Self {
            bids: store.clone(),
            participations: store.clone(),
            identities: store.clone(),
            confirmations: store,
        }
    }
}
