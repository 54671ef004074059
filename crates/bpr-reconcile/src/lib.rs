//! bpr-reconcile
//!
//! Bid participation reconciliation: joins bid postings, participations,
//! seller identities and confirmations into per-bid rosters, and derives the
//! role-specific projections built on top of them.
//!
//! Rules:
//! - Every join key passes through one [`PhoneNormalizer`]
//! - One roster entry per participation row, source order, identity or not
//! - Status is derived: a confirmation for (bid, phone) or else Review
//! - Review -> Confirmed | Rejected is the only legal transition
//!
//! Deterministic, pure logic. No IO. No store calls.

mod decision;
mod grouping;
mod identity;
mod notify;
mod roster;
mod window;

pub use decision::{plan_decision, transition, DecisionError, DecisionInput, TransitionError};
pub use grouping::{group_by_bid_group, BidGroup, Grouped};
pub use identity::{
    identity_phone_keys, IdentityResolver, PhoneNormalizer, ResolvedIdentity, DEFAULT_PHONE_WIDTH,
};
pub use notify::{count_decided_for_identity, count_decided_for_keys, matching_recent_bids, NotificationPolicy};
pub use roster::{
    join_entries, reconcile_roster, ConfirmationIndex, EffectiveStatus, RosterCounts, RosterEntry,
};
pub use window::{day_within_trailing, within_trailing_days, WindowFilter};
