use std::collections::{BTreeSet, HashMap};

use bpr_reconcile::{
    count_decided_for_identity, count_decided_for_keys, group_by_bid_group, identity_phone_keys,
    matching_recent_bids, plan_decision, reconcile_roster, ConfirmationIndex, DecisionInput,
    EffectiveStatus, IdentityResolver, ResolvedIdentity, RosterCounts,
};
use bpr_schemas::{BidPosting, Confirmation, Participation, RawId, SellerIdentity};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::locks::PairLocks;
use crate::settings::EngineSettings;
use crate::sources::{SourceFailure, SourceKind, Sources, WriteFailure};
use crate::views::{
    AdminCaller, AdminOverview, BidOverview, DecisionOutcome, DecisionRequest, Roster,
    SellerCaller, SellerHistory, SellerNotifications, SellerParticipationView,
};

/// Every read recomputes from the current source state; nothing is cached.
pub struct ReconciliationService {
    sources: Sources,
    settings: EngineSettings,
    locks: PairLocks,
}

/// One consistent-enough read of all four collections.
struct SourceState {
    bids: Vec<BidPosting>,
    participations: Vec<Participation>,
    identities: Vec<SellerIdentity>,
    confirmations: Vec<Confirmation>,
    degraded: Vec<SourceKind>,
}

impl ReconciliationService {
    pub fn new(sources: Sources, settings: EngineSettings) -> Self {
        Self {
            sources,
            settings,
            locks: PairLocks::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Source fetches
    // -----------------------------------------------------------------------

    async fn fetch_bids(&self) -> Result<Vec<BidPosting>, EngineError> {
        self.sources
            .bids
            .list_bids()
            .await
            .map_err(|e| unavailable(SourceKind::BidPostings, e))
    }

    async fn fetch_participations(&self) -> Result<Vec<Participation>, EngineError> {
        self.sources
            .participations
            .list_participations()
            .await
            .map_err(|e| unavailable(SourceKind::Participations, e))
    }

    async fn fetch_confirmations(&self) -> Result<Vec<Confirmation>, EngineError> {
        self.sources
            .confirmations
            .list_confirmations()
            .await
            .map_err(|e| unavailable(SourceKind::Confirmations, e))
    }

    /// Identity failures degrade: callers render every seller as Unknown.
    async fn fetch_identities(&self) -> (Vec<SellerIdentity>, Option<SourceKind>) {
        match self.sources.identities.list_identities().await {
            Ok(v) => (v, None),
            Err(e) => {
                warn!(
                    source = SourceKind::SellerIdentities.as_str(),
                    error = %e,
                    "identity source unavailable; sellers resolve to Unknown"
                );
                (Vec::new(), Some(SourceKind::SellerIdentities))
            }
        }
    }

    async fn fetch_all(&self) -> Result<SourceState, EngineError> {
        let (bids, participations, (identities, degraded), confirmations) = tokio::join!(
            self.fetch_bids(),
            self.fetch_participations(),
            self.fetch_identities(),
            self.fetch_confirmations(),
        );

        Ok(SourceState {
            bids: bids?,
            participations: participations?,
            identities,
            confirmations: confirmations?,
            degraded: degraded.into_iter().collect(),
        })
    }

    // -----------------------------------------------------------------------
    // Rosters
    // -----------------------------------------------------------------------

    /// One entry per participation of `bid_id`, in source order.
    ///
    /// A bid absent from the bid source is `BidNotFound`; a bid nobody
    /// joined is an empty roster.
    pub async fn build_roster(&self, bid_id: &str) -> Result<Roster, EngineError> {
        let state = self.fetch_all().await?;
        let bid = state
            .bids
            .iter()
            .find(|b| b.id == bid_id)
            .cloned()
            .ok_or_else(|| EngineError::BidNotFound {
                bid_id: bid_id.to_string(),
            })?;

        let roster = state.roster_for(bid, &self.settings);
        debug!(
            bid_id,
            entries = roster.entries.len(),
            review = roster.counts.review,
            degraded = roster.is_degraded(),
            "roster built"
        );
        Ok(roster)
    }

    /// Bids dated inside the listing window, grouped for the admin home view.
    pub async fn admin_overview(
        &self,
        caller: &AdminCaller,
        reference: DateTime<Utc>,
    ) -> Result<AdminOverview, EngineError> {
        let (bids, participations, confirmations) = tokio::join!(
            self.fetch_bids(),
            self.fetch_participations(),
            self.fetch_confirmations(),
        );
        let (bids, participations, confirmations) = (bids?, participations?, confirmations?);

        let window = self.settings.listing_window();
        let normalizer = self.settings.normalizer();
        let resolver = IdentityResolver::empty(normalizer);
        let index = ConfirmationIndex::new(&confirmations, normalizer);

        let rows: Vec<BidOverview> = bids
            .into_iter()
            .filter(|b| window.contains_day(b.bid_date, reference))
            .map(|bid| {
                let entries = reconcile_roster(&bid.id, &participations, &resolver, &index);
                BidOverview {
                    counts: RosterCounts::tally(&entries),
                    bid,
                }
            })
            .collect();

        info!(admin_id = %caller.admin_id, bids = rows.len(), "admin overview");
        Ok(AdminOverview {
            reference,
            window_days: window.days(),
            groups: group_by_bid_group(rows),
        })
    }

    // -----------------------------------------------------------------------
    // Seller projections
    // -----------------------------------------------------------------------

    /// The caller's participations inside the listing window, newest first.
    ///
    /// A phone that resolves to an identity pulls in every phone listed on
    /// that identity.
    pub async fn seller_history(
        &self,
        caller: &SellerCaller,
        reference: DateTime<Utc>,
    ) -> Result<SellerHistory, EngineError> {
        let normalizer = self.settings.normalizer();
        let key = caller_key(&self.settings, &caller.phone)?;

        let state = self.fetch_all().await?;
        let resolver = IdentityResolver::new(&state.identities, normalizer);
        let index = ConfirmationIndex::new(&state.confirmations, normalizer);

        let identity = match resolver.resolve_key(&key) {
            Some(id) => ResolvedIdentity::Known(id.clone()),
            None => ResolvedIdentity::Unknown,
        };
        let keys = seller_keys(&identity, &key, &self.settings);

        let window = self.settings.listing_window();
        let bids: HashMap<&str, &BidPosting> =
            state.bids.iter().map(|b| (b.id.as_str(), b)).collect();

        let mut participations: Vec<SellerParticipationView> = state
            .participations
            .iter()
            .filter(|p| window.contains(p.participation_date, reference))
            .filter_map(|p| {
                let pk = normalizer.normalize(&p.mobile)?;
                if !keys.contains(&pk) {
                    return None;
                }
                let effective_status = index
                    .lookup(&p.bid_id, &pk)
                    .map(|c| EffectiveStatus::from(c.status))
                    .unwrap_or(EffectiveStatus::Review);
                Some(SellerParticipationView {
                    participation: p.clone(),
                    bid: bids.get(p.bid_id.as_str()).map(|b| (*b).clone()),
                    effective_status,
                })
            })
            .collect();
        participations.sort_by(|a, b| {
            b.participation
                .participation_date
                .cmp(&a.participation.participation_date)
        });

        let decided_count = count_decided_for_keys(
            &keys,
            &state.confirmations,
            normalizer,
            self.settings.notification_policy,
        );

        Ok(SellerHistory {
            phone_key: key,
            identity,
            window_days: window.days(),
            participations,
            decided_count,
            degraded_sources: state.degraded.clone(),
        })
    }

    /// Decision badge plus bids created inside the notification window whose
    /// commodity the seller trades.
    pub async fn seller_notifications(
        &self,
        caller: &SellerCaller,
        reference: DateTime<Utc>,
    ) -> Result<SellerNotifications, EngineError> {
        let normalizer = self.settings.normalizer();
        let key = caller_key(&self.settings, &caller.phone)?;

        let (bids, (identities, degraded), confirmations) = tokio::join!(
            self.fetch_bids(),
            self.fetch_identities(),
            self.fetch_confirmations(),
        );
        let (bids, confirmations) = (bids?, confirmations?);

        let resolver = IdentityResolver::new(&identities, normalizer);
        let window = self.settings.notification_window();

        let (keys, recent) = match resolver.resolve_key(&key) {
            Some(identity) => (
                identity_phone_keys(identity, normalizer),
                matching_recent_bids(identity, &bids, &window, reference)
                    .into_iter()
                    .cloned()
                    .collect(),
            ),
            None => (BTreeSet::from([key.clone()]), Vec::new()),
        };

        let decided_count = count_decided_for_keys(
            &keys,
            &confirmations,
            normalizer,
            self.settings.notification_policy,
        );

        Ok(SellerNotifications {
            phone_key: key,
            decided_count,
            window_days: window.days(),
            recent_matching_bids: recent,
            degraded_sources: degraded.into_iter().collect(),
        })
    }

    /// Decisions recorded against any phone of `identity`, per the configured
    /// notification policy.
    pub async fn count_decided_for_identity(
        &self,
        identity: &SellerIdentity,
    ) -> Result<usize, EngineError> {
        let confirmations = self.fetch_confirmations().await?;
        Ok(count_decided_for_identity(
            identity,
            &confirmations,
            self.settings.normalizer(),
            self.settings.notification_policy,
        ))
    }

    // -----------------------------------------------------------------------
    // Decide
    // -----------------------------------------------------------------------

    /// Record an admin decision for one participation.
    ///
    /// Serialized per (bid, normalized phone) inside this process; the store's
    /// uniqueness guarantee covers concurrent processes. Either path reports a
    /// second decision as a conflict.
    pub async fn decide(&self, req: DecisionRequest) -> Result<DecisionOutcome, EngineError> {
        let normalizer = self.settings.normalizer();
        let key = caller_key(&self.settings, &req.phone)?;

        let _guard = self.locks.lock(&req.bid_id, &key).await;

        let roster = self.build_roster(&req.bid_id).await?;
        let planned = plan_decision(
            &roster.entries,
            normalizer,
            DecisionInput {
                bid_id: &req.bid_id,
                phone: &req.phone,
                snapshot: &req.snapshot,
                decision: req.decision,
                decided_by: &req.decided_by.admin_id,
                decided_at: req.decided_at,
            },
        )?;

        let confirmation = match self.sources.confirmations.create_confirmation(planned).await {
            Ok(c) => c,
            Err(WriteFailure::Duplicate { bid_id, phone }) => {
                warn!(bid_id = %bid_id, phone = %phone, "confirmation write lost a race");
                return Err(self.conflict_after_duplicate(&req, &key).await);
            }
            Err(WriteFailure::Unavailable(detail)) => {
                warn!(bid_id = %req.bid_id, error = %detail, "confirmation write failed");
                return Err(EngineError::WriteFailed { detail });
            }
        };

        info!(
            bid_id = %req.bid_id,
            phone = %key,
            status = %confirmation.status,
            decided_by = %req.decided_by.admin_id,
            "decision recorded"
        );

        let roster = match self.build_roster(&req.bid_id).await {
            Ok(r) => r,
            Err(e) => {
                warn!(bid_id = %req.bid_id, error = %e, "roster recompute failed; patching prior roster");
                apply_confirmation(roster, &key, &confirmation)
            }
        };

        Ok(DecisionOutcome {
            confirmation,
            roster,
        })
    }

    /// The store refused the write. Report what the pair is now, if visible.
    async fn conflict_after_duplicate(&self, req: &DecisionRequest, key: &str) -> EngineError {
        let current = self
            .build_roster(&req.bid_id)
            .await
            .ok()
            .and_then(|r| r.entry_for_key(key).map(|e| e.effective_status))
            .filter(|s| s.is_decided());

        match current {
            Some(current) => EngineError::AlreadyDecided {
                bid_id: req.bid_id.clone(),
                phone: key.to_string(),
                current,
                attempted: req.decision,
            },
            None => EngineError::DuplicateDecision {
                bid_id: req.bid_id.clone(),
                phone: key.to_string(),
            },
        }
    }
}

impl SourceState {
    fn roster_for(&self, bid: BidPosting, settings: &EngineSettings) -> Roster {
        let normalizer = settings.normalizer();
        let resolver = IdentityResolver::new(&self.identities, normalizer);
        if !resolver.shadowed_keys().is_empty() {
            warn!(
                shared_phones = resolver.shadowed_keys().len(),
                "phone listed on more than one identity; first identity wins"
            );
        }
        let index = ConfirmationIndex::new(&self.confirmations, normalizer);
        if index.collisions() > 0 {
            warn!(
                collisions = index.collisions(),
                "duplicate confirmations for one pair; earliest decision wins"
            );
        }

        let entries = reconcile_roster(&bid.id, &self.participations, &resolver, &index);
        Roster {
            counts: RosterCounts::tally(&entries),
            bid,
            entries,
            degraded_sources: self.degraded.clone(),
        }
    }
}

fn unavailable(kind: SourceKind, failure: SourceFailure) -> EngineError {
    warn!(source = kind.as_str(), error = %failure, "source unavailable");
    EngineError::source(kind, failure)
}

fn caller_key(settings: &EngineSettings, phone: &RawId) -> Result<String, EngineError> {
    settings
        .normalizer()
        .normalize(phone)
        .ok_or_else(|| EngineError::InvalidPhone {
            raw: phone.as_text(),
        })
}

fn seller_keys(identity: &ResolvedIdentity, key: &str, settings: &EngineSettings) -> BTreeSet<String> {
    match identity.as_known() {
        Some(id) => {
            let mut keys = identity_phone_keys(id, settings.normalizer());
            keys.insert(key.to_string());
            keys
        }
        None => BTreeSet::from([key.to_string()]),
    }
}

/// Fold a freshly written confirmation into a roster built before the write.
fn apply_confirmation(mut roster: Roster, key: &str, confirmation: &Confirmation) -> Roster {
    for e in roster.entries.iter_mut() {
        if e.phone_key.as_deref() == Some(key) && e.confirmation.is_none() {
            e.effective_status = EffectiveStatus::from(confirmation.status);
            e.confirmation = Some(confirmation.clone());
        }
    }
    roster.counts = RosterCounts::tally(&roster.entries);
    roster
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpr_reconcile::RosterEntry;
    use bpr_schemas::DecisionStatus;
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn bid() -> BidPosting {
        BidPosting {
            id: "B1".to_string(),
            group: "G".to_string(),
            consignee: "C".to_string(),
            origin: "O".to_string(),
            commodity: "Maize".to_string(),
            quantity: 1.0,
            rate: 1.0,
            parameters: Default::default(),
            bid_date: NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            payment_terms: String::new(),
            delivery: String::new(),
            created_at: Utc.with_ymd_and_hms(2026, 10, 15, 3, 0, 0).unwrap(),
        }
    }

    #[test]
    fn apply_confirmation_updates_matching_entry_only() {
        let entry = |pos: usize, key: &str| RosterEntry {
            position: pos,
            bid_id: "B1".to_string(),
            participation: Participation {
                id: format!("P{pos}"),
                bid_id: "B1".to_string(),
                mobile: RawId::from(key),
                rate: 1.0,
                quantity: 1.0,
                participation_date: Utc.with_ymd_and_hms(2026, 10, 15, 4, 0, 0).unwrap(),
            },
            phone_key: Some(key.to_string()),
            identity: ResolvedIdentity::Unknown,
            confirmation: None,
            effective_status: EffectiveStatus::Review,
        };
        let entries = vec![entry(1, "1111111111"), entry(2, "2222222222")];
        let roster = Roster {
            bid: bid(),
            counts: RosterCounts::tally(&entries),
            entries,
            degraded_sources: vec![],
        };

        let c = Confirmation {
            id: "C1".to_string(),
            bid_id: "B1".to_string(),
            phone: RawId::from("2222222222"),
            seller_name: String::new(),
            email: String::new(),
            rate: 1.0,
            quantity: 1.0,
            company: String::new(),
            status: DecisionStatus::Rejected,
            decided_by: Some("admin".to_string()),
            decided_at: None,
        };

        let patched = apply_confirmation(roster, "2222222222", &c);
        assert_eq!(patched.entries[0].effective_status, EffectiveStatus::Review);
        assert_eq!(patched.entries[1].effective_status, EffectiveStatus::Rejected);
        assert_eq!(patched.counts.review, 1);
        assert_eq!(patched.counts.rejected, 1);
    }

    #[test]
    fn unknown_caller_keys_are_just_the_caller() {
        let keys = seller_keys(&ResolvedIdentity::Unknown, "9999999999", &EngineSettings::default());
        assert_eq!(keys.len(), 1);
        assert!(keys.contains("9999999999"));
    }
}
