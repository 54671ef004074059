use bpr_engine::{
    BidSource, ConfirmationStore, IdentitySource, ParticipationSource, SourceFailure, WriteFailure,
};
use bpr_schemas::{BidPosting, Confirmation, NewConfirmation, Participation, SellerIdentity};
use sqlx::PgPool;
use tracing::debug;

/// Postgres-backed source for all four collections.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn failure(e: anyhow::Error) -> SourceFailure {
    SourceFailure::new(format!("{e:#}"))
}

#[async_trait::async_trait]
impl BidSource for PgStore {
    async fn list_bids(&self) -> Result<Vec<BidPosting>, SourceFailure> {
        crate::fetch_bids(&self.pool).await.map_err(failure)
    }
}

#[async_trait::async_trait]
impl ParticipationSource for PgStore {
    async fn list_participations(&self) -> Result<Vec<Participation>, SourceFailure> {
        crate::fetch_participations(&self.pool).await.map_err(failure)
    }
}

#[async_trait::async_trait]
impl IdentitySource for PgStore {
    async fn list_identities(&self) -> Result<Vec<SellerIdentity>, SourceFailure> {
        crate::fetch_identities(&self.pool).await.map_err(failure)
    }
}

#[async_trait::async_trait]
impl ConfirmationStore for PgStore {
    async fn list_confirmations(&self) -> Result<Vec<Confirmation>, SourceFailure> {
        crate::fetch_confirmations(&self.pool).await.map_err(failure)
    }

    async fn create_confirmation(&self, new: NewConfirmation) -> Result<Confirmation, WriteFailure> {
        let row = crate::insert_confirmation(&self.pool, &new).await?;
        debug!(bid_id = %row.bid_id, id = %row.id, "confirmation inserted");
        Ok(row)
    }
}
