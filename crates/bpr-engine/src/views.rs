//! Request and response shapes of the engine's role projections.

use bpr_reconcile::{BidGroup, EffectiveStatus, Grouped, ResolvedIdentity, RosterCounts, RosterEntry};
use bpr_schemas::{BidPosting, Confirmation, DecisionSnapshot, DecisionStatus, Participation, RawId};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::sources::SourceKind;

// ---------------------------------------------------------------------------
// Callers
// ---------------------------------------------------------------------------

/// Authenticated admin. Authentication itself happens upstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminCaller {
    pub admin_id: String,
}

impl AdminCaller {
    pub fn new(admin_id: impl Into<String>) -> Self {
        Self {
            admin_id: admin_id.into(),
        }
    }
}

/// A seller, known only by the phone they signed in with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SellerCaller {
    pub phone: RawId,
}

// ---------------------------------------------------------------------------
// Admin views
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Roster {
    pub bid: BidPosting,
    pub entries: Vec<RosterEntry>,
    pub counts: RosterCounts,
    /// Sources that failed but were tolerated (identity lookups degrade to
    /// Unknown).
    pub degraded_sources: Vec<SourceKind>,
}

impl Roster {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_sources.is_empty()
    }

    pub fn entry_for_key(&self, phone_key: &str) -> Option<&RosterEntry> {
        self.entries
            .iter()
            .find(|e| e.phone_key.as_deref() == Some(phone_key))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BidOverview {
    pub bid: BidPosting,
    pub counts: RosterCounts,
}

impl Grouped for BidOverview {
    fn group_key(&self) -> &str {
        &self.bid.group
    }

    fn consignee(&self) -> &str {
        &self.bid.consignee
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdminOverview {
    pub reference: DateTime<Utc>,
    pub window_days: u32,
    pub groups: Vec<BidGroup<BidOverview>>,
}

impl AdminOverview {
    pub fn bid_count(&self) -> usize {
        self.groups.iter().map(|g| g.bids.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Seller views
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SellerParticipationView {
    pub participation: Participation,
    /// `None` when the bid has since disappeared from the bid source.
    pub bid: Option<BidPosting>,
    pub effective_status: EffectiveStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SellerHistory {
    pub phone_key: String,
    pub identity: ResolvedIdentity,
    pub window_days: u32,
    /// Newest first.
    pub participations: Vec<SellerParticipationView>,
    pub decided_count: usize,
    /// Non-empty when the identity source was down: only the caller's own
    /// phone was considered, so the history may be short.
    pub degraded_sources: Vec<SourceKind>,
}

impl SellerHistory {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_sources.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SellerNotifications {
    pub phone_key: String,
    pub decided_count: usize,
    pub window_days: u32,
    pub recent_matching_bids: Vec<BidPosting>,
    /// Non-empty when the identity source was down: the count covers only the
    /// caller's phone and no commodities could be matched.
    pub degraded_sources: Vec<SourceKind>,
}

impl SellerNotifications {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_sources.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct DecisionRequest {
    pub bid_id: String,
    pub phone: RawId,
    pub snapshot: DecisionSnapshot,
    pub decision: DecisionStatus,
    pub decided_by: AdminCaller,
    pub decided_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecisionOutcome {
    pub confirmation: Confirmation,
    /// Recomputed after the write.
    pub roster: Roster,
}
