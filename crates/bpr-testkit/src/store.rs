use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

use bpr_engine::{
    BidSource, ConfirmationStore, IdentitySource, ParticipationSource, SourceFailure, SourceKind,
    WriteFailure,
};
use bpr_reconcile::PhoneNormalizer;
use bpr_schemas::{BidPosting, Confirmation, NewConfirmation, Participation, SellerIdentity};

/// Injected failure for the next confirmation writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteFault {
    /// Every write fails as if the connection dropped before commit.
    Unavailable(String),
    /// The row lands, but the caller sees a dropped connection.
    LandedThenUnavailable(String),
}

#[derive(Default)]
struct State {
    bids: Vec<BidPosting>,
    participations: Vec<Participation>,
    identities: Vec<SellerIdentity>,
    confirmations: Vec<Confirmation>,
    unique_pairs: HashSet<(String, String)>,
    failing: BTreeSet<SourceKind>,
    write_fault: Option<WriteFault>,
    writes: usize,
    next_id: u64,
}

/// All four collections in memory, with per-source fault injection.
///
/// Writes enforce the (bid_id, phone_normalized) uniqueness a real store
/// carries. Rows pushed with [`InMemoryStore::push_legacy_confirmation`]
/// bypass it, to model data written before the constraint existed.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    yield_on_read: bool,
    normalizer: PhoneNormalizer,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads yield to the scheduler once, widening race windows in
    /// concurrency tests.
    pub fn with_yielding_reads(mut self) -> Self {
        self.yield_on_read = true;
        self
    }

    /// Key seeded confirmations at `width` digits. Match the engine's
    /// `phone_width` so seeded pairs and engine writes collide.
    pub fn with_phone_width(mut self, width: usize) -> Self {
        self.normalizer = PhoneNormalizer::new(width);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn push_bid(&self, bid: BidPosting) {
        self.state().bids.push(bid);
    }

    pub fn push_participation(&self, p: Participation) {
        self.state().participations.push(p);
    }

    pub fn push_identity(&self, identity: SellerIdentity) {
        self.state().identities.push(identity);
    }

    /// Seed a confirmation and register its pair with the uniqueness guard.
    pub fn push_confirmation(&self, c: Confirmation) {
        let key = self.normalizer.normalize(&c.phone);
        let mut st = self.state();
        if let Some(key) = key {
            st.unique_pairs.insert((c.bid_id.clone(), key));
        }
        st.confirmations.push(c);
    }

    pub fn push_legacy_confirmation(&self, c: Confirmation) {
        self.state().confirmations.push(c);
    }

    pub fn fail_source(&self, kind: SourceKind) {
        self.state().failing.insert(kind);
    }

    pub fn heal_source(&self, kind: SourceKind) {
        self.state().failing.remove(&kind);
    }

    pub fn set_write_fault(&self, fault: Option<WriteFault>) {
        self.state().write_fault = fault;
    }

    pub fn confirmations(&self) -> Vec<Confirmation> {
        self.state().confirmations.clone()
    }

    /// Successful `create_confirmation` calls.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    async fn read<T: Clone>(
        &self,
        kind: SourceKind,
        pick: impl Fn(&State) -> &Vec<T>,
    ) -> Result<Vec<T>, SourceFailure> {
        if self.yield_on_read {
            tokio::task::yield_now().await;
        }
        let st = self.state();
        if st.failing.contains(&kind) {
            return Err(SourceFailure::new(format!("{kind} offline (injected)")));
        }
        Ok(pick(&st).clone())
    }
}

#[async_trait::async_trait]
impl BidSource for InMemoryStore {
    async fn list_bids(&self) -> Result<Vec<BidPosting>, SourceFailure> {
        self.read(SourceKind::BidPostings, |s| &s.bids).await
    }
}

#[async_trait::async_trait]
impl ParticipationSource for InMemoryStore {
    async fn list_participations(&self) -> Result<Vec<Participation>, SourceFailure> {
        self.read(SourceKind::Participations, |s| &s.participations).await
    }
}

#[async_trait::async_trait]
impl IdentitySource for InMemoryStore {
    async fn list_identities(&self) -> Result<Vec<SellerIdentity>, SourceFailure> {
        self.read(SourceKind::SellerIdentities, |s| &s.identities).await
    }
}

#[async_trait::async_trait]
impl ConfirmationStore for InMemoryStore {
    async fn list_confirmations(&self) -> Result<Vec<Confirmation>, SourceFailure> {
        self.read(SourceKind::Confirmations, |s| &s.confirmations).await
    }

    async fn create_confirmation(&self, new: NewConfirmation) -> Result<Confirmation, WriteFailure> {
        let mut st = self.state();

        if let Some(WriteFault::Unavailable(msg)) = &st.write_fault {
            return Err(WriteFailure::Unavailable(msg.clone()));
        }

        let pair = (new.bid_id.clone(), new.phone_normalized.clone());
        if st.unique_pairs.contains(&pair) {
            return Err(WriteFailure::Duplicate {
                bid_id: pair.0,
                phone: pair.1,
            });
        }

        st.next_id += 1;
        let row = new.into_confirmation(format!("conf-{}", st.next_id));
        st.unique_pairs.insert(pair);
        st.confirmations.push(row.clone());
        st.writes += 1;

        if let Some(WriteFault::LandedThenUnavailable(msg)) = &st.write_fault {
            return Err(WriteFailure::Unavailable(msg.clone()));
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{confirmation, reference_now, snapshot};
    use bpr_schemas::{DecisionStatus, RawId};

    fn new_confirmation(bid_id: &str, key: &str) -> NewConfirmation {
        NewConfirmation {
            bid_id: bid_id.to_string(),
            phone: RawId::from(key),
            phone_normalized: key.to_string(),
            snapshot: snapshot("Acme"),
            status: DecisionStatus::Rejected,
            decided_by: "admin-7".to_string(),
            decided_at: reference_now(),
        }
    }

    #[tokio::test]
    async fn seeded_pair_uses_the_configured_width() {
        let store = InMemoryStore::new().with_phone_width(8);
        store.push_confirmation(confirmation(
            "C1",
            "B1",
            "+91 9999 9999 99",
            DecisionStatus::Confirmed,
        ));

        let err = store
            .create_confirmation(new_confirmation("B1", "99999999"))
            .await
            .unwrap_err();
        assert!(matches!(err, WriteFailure::Duplicate { ref phone, .. } if phone == "99999999"));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn default_width_keys_on_ten_digits() {
        let store = InMemoryStore::new();
        store.push_confirmation(confirmation(
            "C1",
            "B1",
            "+91 99999 99999",
            DecisionStatus::Confirmed,
        ));

        assert!(store
            .create_confirmation(new_confirmation("B1", "9999999999"))
            .await
            .is_err());
        assert!(store
            .create_confirmation(new_confirmation("B2", "9999999999"))
            .await
            .is_ok());
    }
}
