use std::collections::HashMap;

use bpr_schemas::{Confirmation, DecisionStatus, Participation};
use serde::{Deserialize, Serialize};

use crate::identity::{IdentityResolver, PhoneNormalizer, ResolvedIdentity};

// ---------------------------------------------------------------------------
// EffectiveStatus
// ---------------------------------------------------------------------------

/// Derived status of one participation. Never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EffectiveStatus {
    Review,
    Confirmed,
    Rejected,
}

impl EffectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveStatus::Review => "Review",
            EffectiveStatus::Confirmed => "Confirmed",
            EffectiveStatus::Rejected => "Rejected",
        }
    }

    /// Confirmed and Rejected are terminal.
    pub fn is_decided(&self) -> bool {
        !matches!(self, EffectiveStatus::Review)
    }
}

impl From<DecisionStatus> for EffectiveStatus {
    fn from(s: DecisionStatus) -> Self {
        match s {
            DecisionStatus::Confirmed => EffectiveStatus::Confirmed,
            DecisionStatus::Rejected => EffectiveStatus::Rejected,
        }
    }
}

impl std::fmt::Display for EffectiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RosterEntry
// ---------------------------------------------------------------------------

/// One participation joined with its identity and decision.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RosterEntry {
    /// 1-based display number. Not a key.
    pub position: usize,
    pub bid_id: String,
    pub participation: Participation,
    /// Normalized join key; `None` when the mobile holds no digits.
    pub phone_key: Option<String>,
    pub identity: ResolvedIdentity,
    pub confirmation: Option<Confirmation>,
    pub effective_status: EffectiveStatus,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterCounts {
    pub review: usize,
    pub confirmed: usize,
    pub rejected: usize,
}

impl RosterCounts {
    pub fn tally<'a>(entries: impl IntoIterator<Item = &'a RosterEntry>) -> Self {
        let mut c = Self::default();
        for e in entries {
            match e.effective_status {
                EffectiveStatus::Review => c.review += 1,
                EffectiveStatus::Confirmed => c.confirmed += 1,
                EffectiveStatus::Rejected => c.rejected += 1,
            }
        }
        c
    }

    pub fn total(&self) -> usize {
        self.review + self.confirmed + self.rejected
    }
}

// ---------------------------------------------------------------------------
// ConfirmationIndex
// ---------------------------------------------------------------------------

/// Confirmations keyed by (bid_id, normalized phone).
///
/// Rows written before the pair was unique may collide; the earliest
/// `decided_at` wins (missing timestamps sort first), then source order.
#[derive(Debug, Clone)]
pub struct ConfirmationIndex<'a> {
    by_pair: HashMap<(String, String), &'a Confirmation>,
    collisions: usize,
}

impl<'a> ConfirmationIndex<'a> {
    pub fn new(confirmations: &'a [Confirmation], normalizer: PhoneNormalizer) -> Self {
        let mut by_pair: HashMap<(String, String), &'a Confirmation> = HashMap::new();
        let mut collisions = 0usize;

        for c in confirmations {
            let Some(key) = normalizer.normalize(&c.phone) else {
                continue;
            };
            let pair = (c.bid_id.clone(), key);
            match by_pair.get(&pair) {
                Some(existing) => {
                    collisions += 1;
                    if c.decided_at < existing.decided_at {
                        by_pair.insert(pair, c);
                    }
                }
                None => {
                    by_pair.insert(pair, c);
                }
            }
        }

        Self {
            by_pair,
            collisions,
        }
    }

    pub fn lookup(&self, bid_id: &str, phone_key: &str) -> Option<&'a Confirmation> {
        self.by_pair
            .get(&(bid_id.to_string(), phone_key.to_string()))
            .copied()
    }

    /// Number of rows that lost to an earlier decision on the same pair.
    pub fn collisions(&self) -> usize {
        self.collisions
    }
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Join an ordered participation stream into roster entries.
///
/// Emits exactly one entry per input row, numbered in input order.
pub fn join_entries<'p>(
    participations: impl IntoIterator<Item = &'p Participation>,
    identities: &IdentityResolver<'_>,
    confirmations: &ConfirmationIndex<'_>,
) -> Vec<RosterEntry> {
    let normalizer = identities.normalizer();

    participations
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let phone_key = normalizer.normalize(&p.mobile);

            let identity = match phone_key.as_deref().and_then(|k| identities.resolve_key(k)) {
                Some(id) => ResolvedIdentity::Known(id.clone()),
                None => ResolvedIdentity::Unknown,
            };

            let confirmation = phone_key
                .as_deref()
                .and_then(|k| confirmations.lookup(&p.bid_id, k))
                .cloned();

            let effective_status = confirmation
                .as_ref()
                .map(|c| EffectiveStatus::from(c.status))
                .unwrap_or(EffectiveStatus::Review);

            RosterEntry {
                position: i + 1,
                bid_id: p.bid_id.clone(),
                participation: p.clone(),
                phone_key,
                identity,
                confirmation,
                effective_status,
            }
        })
        .collect()
}

/// Roster for one bid: every participation whose `bid_id` matches, in
/// source order.
pub fn reconcile_roster(
    bid_id: &str,
    participations: &[Participation],
    identities: &IdentityResolver<'_>,
    confirmations: &ConfirmationIndex<'_>,
) -> Vec<RosterEntry> {
    join_entries(
        participations.iter().filter(|p| p.bid_id == bid_id),
        identities,
        confirmations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpr_schemas::{PhoneNumber, RawId, SellerIdentity};
    use chrono::{TimeZone, Utc};

    fn part(id: &str, bid: &str, mobile: RawId) -> Participation {
        Participation {
            id: id.to_string(),
            bid_id: bid.to_string(),
            mobile,
            rate: 100.0,
            quantity: 10.0,
            participation_date: Utc.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap(),
        }
    }

    fn conf(bid: &str, phone: RawId, status: DecisionStatus, minute: Option<u32>) -> Confirmation {
        Confirmation {
            id: format!("C-{bid}-{status}"),
            bid_id: bid.to_string(),
            phone,
            seller_name: "Acme".to_string(),
            email: String::new(),
            rate: 100.0,
            quantity: 10.0,
            company: String::new(),
            status,
            decided_by: None,
            decided_at: minute.map(|m| Utc.with_ymd_and_hms(2026, 10, 15, 10, m, 0).unwrap()),
        }
    }

    fn acme() -> SellerIdentity {
        SellerIdentity {
            id: "S1".to_string(),
            seller_name: "Acme".to_string(),
            phone_numbers: vec![PhoneNumber {
                value: RawId::from("9999999999"),
            }],
            emails: vec![],
            companies: vec![],
            commodities: vec![],
        }
    }

    #[test]
    fn one_entry_per_participation_in_source_order() {
        let parts = vec![
            part("P1", "B1", RawId::from("9999999999")),
            part("P2", "B2", RawId::from("8888888888")),
            part("P3", "B1", RawId::from("7777777777")),
            part("P4", "B1", RawId::from("9999999999")),
        ];
        let ids = vec![acme()];
        let n = PhoneNormalizer::default();
        let r = IdentityResolver::new(&ids, n);
        let c = ConfirmationIndex::new(&[], n);

        let roster = reconcile_roster("B1", &parts, &r, &c);
        let got: Vec<(&str, usize)> = roster
            .iter()
            .map(|e| (e.participation.id.as_str(), e.position))
            .collect();
        assert_eq!(got, vec![("P1", 1), ("P3", 2), ("P4", 3)]);
        assert_eq!(roster[1].identity, ResolvedIdentity::Unknown);
        assert!(roster.iter().all(|e| e.effective_status == EffectiveStatus::Review));
    }

    #[test]
    fn numeric_confirmation_phone_matches_string_mobile() {
        let parts = vec![part("P1", "B1", RawId::from("9999999999"))];
        let confs = vec![conf("B1", RawId::Number(9_999_999_999), DecisionStatus::Rejected, Some(1))];
        let n = PhoneNormalizer::default();
        let ids = vec![acme()];
        let r = IdentityResolver::new(&ids, n);
        let c = ConfirmationIndex::new(&confs, n);

        let roster = reconcile_roster("B1", &parts, &r, &c);
        assert_eq!(roster[0].effective_status, EffectiveStatus::Rejected);
        assert_eq!(roster[0].identity.display_name(), "Acme");
    }

    #[test]
    fn confirmation_on_other_bid_does_not_leak() {
        let parts = vec![part("P1", "B1", RawId::from("9999999999"))];
        let confs = vec![conf("B2", RawId::from("9999999999"), DecisionStatus::Confirmed, Some(1))];
        let n = PhoneNormalizer::default();
        let r = IdentityResolver::empty(n);
        let c = ConfirmationIndex::new(&confs, n);

        let roster = reconcile_roster("B1", &parts, &r, &c);
        assert_eq!(roster[0].effective_status, EffectiveStatus::Review);
    }

    #[test]
    fn earliest_decision_wins_on_legacy_duplicates() {
        let confs = vec![
            conf("B1", RawId::from("9999999999"), DecisionStatus::Rejected, Some(30)),
            conf("B1", RawId::from("9999999999"), DecisionStatus::Confirmed, Some(5)),
        ];
        let c = ConfirmationIndex::new(&confs, PhoneNormalizer::default());
        assert_eq!(c.lookup("B1", "9999999999").unwrap().status, DecisionStatus::Confirmed);
        assert_eq!(c.collisions(), 1);
    }

    #[test]
    fn digitless_mobile_still_gets_an_entry() {
        let parts = vec![part("P1", "B1", RawId::from("unknown"))];
        let n = PhoneNormalizer::default();
        let roster = reconcile_roster(
            "B1",
            &parts,
            &IdentityResolver::empty(n),
            &ConfirmationIndex::new(&[], n),
        );
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].phone_key, None);
        assert_eq!(roster[0].identity, ResolvedIdentity::Unknown);
    }

    #[test]
    fn counts_tally_by_status() {
        let parts = vec![
            part("P1", "B1", RawId::from("1111111111")),
            part("P2", "B1", RawId::from("2222222222")),
            part("P3", "B1", RawId::from("3333333333")),
        ];
        let confs = vec![
            conf("B1", RawId::from("1111111111"), DecisionStatus::Confirmed, None),
            conf("B1", RawId::from("2222222222"), DecisionStatus::Rejected, None),
        ];
        let n = PhoneNormalizer::default();
        let roster = reconcile_roster(
            "B1",
            &parts,
            &IdentityResolver::empty(n),
            &ConfirmationIndex::new(&confs, n),
        );
        let counts = RosterCounts::tally(&roster);
        assert_eq!(
            counts,
            RosterCounts {
                review: 1,
                confirmed: 1,
                rejected: 1
            }
        );
        assert_eq!(counts.total(), 3);
    }
}
