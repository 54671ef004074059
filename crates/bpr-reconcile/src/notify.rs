//! Seller-facing notification counts.

use std::collections::BTreeSet;

use bpr_schemas::{BidPosting, Confirmation, DecisionStatus, SellerIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{identity_phone_keys, PhoneNormalizer};
use crate::window::WindowFilter;

/// Which decisions count toward a seller's notification badge.
///
/// `AllDecisions` counts both outcomes and is the existing behavior.
/// `ConfirmedOnly` is available but has to be selected explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPolicy {
    #[default]
    AllDecisions,
    ConfirmedOnly,
}

impl NotificationPolicy {
    pub fn from_count_rejected(count_rejected: bool) -> Self {
        if count_rejected {
            NotificationPolicy::AllDecisions
        } else {
            NotificationPolicy::ConfirmedOnly
        }
    }

    pub fn counts(&self, status: DecisionStatus) -> bool {
        match self {
            NotificationPolicy::AllDecisions => true,
            NotificationPolicy::ConfirmedOnly => status == DecisionStatus::Confirmed,
        }
    }
}

/// Confirmation rows whose phone is one of `keys`, filtered by policy.
pub fn count_decided_for_keys(
    keys: &BTreeSet<String>,
    confirmations: &[Confirmation],
    normalizer: PhoneNormalizer,
    policy: NotificationPolicy,
) -> usize {
    confirmations
        .iter()
        .filter(|c| policy.counts(c.status))
        .filter(|c| {
            normalizer
                .normalize(&c.phone)
                .map(|k| keys.contains(&k))
                .unwrap_or(false)
        })
        .count()
}

pub fn count_decided_for_identity(
    identity: &SellerIdentity,
    confirmations: &[Confirmation],
    normalizer: PhoneNormalizer,
    policy: NotificationPolicy,
) -> usize {
    let keys = identity_phone_keys(identity, normalizer);
    count_decided_for_keys(&keys, confirmations, normalizer, policy)
}

/// Bids created inside `window` whose commodity the seller deals in.
///
/// Commodity names compare trimmed and case-insensitively.
pub fn matching_recent_bids<'a>(
    identity: &SellerIdentity,
    bids: &'a [BidPosting],
    window: &WindowFilter,
    reference: DateTime<Utc>,
) -> Vec<&'a BidPosting> {
    let wanted: BTreeSet<String> = identity
        .commodities
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    if wanted.is_empty() {
        return Vec::new();
    }

    bids.iter()
        .filter(|b| window.contains(b.created_at, reference))
        .filter(|b| wanted.contains(&b.commodity.trim().to_lowercase()))
        .collect()
}
