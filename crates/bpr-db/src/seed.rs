//! Loading source collections from a JSON bundle (dev + test databases).

use anyhow::{anyhow, Context, Result};
use bpr_reconcile::PhoneNormalizer;
use bpr_schemas::{BidPosting, Confirmation, Participation, SellerIdentity};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedBundle {
    #[serde(default)]
    pub bids: Vec<BidPosting>,
    #[serde(default)]
    pub participations: Vec<Participation>,
    #[serde(default)]
    pub identities: Vec<SellerIdentity>,
    #[serde(default)]
    pub confirmations: Vec<Confirmation>,
}

impl SeedBundle {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("parse seed bundle json")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub bids: u64,
    pub participations: u64,
    pub identities: u64,
    pub confirmations: u64,
}

/// Insert the bundle in one transaction. Rows whose id already exists are
/// skipped, so re-seeding is harmless.
pub async fn seed(pool: &PgPool, bundle: &SeedBundle, normalizer: PhoneNormalizer) -> Result<SeedReport> {
    let mut tx = pool.begin().await.context("seed: begin tx failed")?;
    let mut report = SeedReport::default();

    for b in &bundle.bids {
        let r = sqlx::query(
            r#"
            insert into bid_postings (
              id, bid_group, consignee, origin, commodity, quantity, rate, parameters,
              bid_date, start_time, end_time, payment_terms, delivery, created_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            on conflict (id) do nothing
            "#,
        )
        .bind(&b.id)
        .bind(&b.group)
        .bind(&b.consignee)
        .bind(&b.origin)
        .bind(&b.commodity)
        .bind(b.quantity)
        .bind(b.rate)
        .bind(Json(&b.parameters))
        .bind(b.bid_date)
        .bind(b.start_time)
        .bind(b.end_time)
        .bind(&b.payment_terms)
        .bind(&b.delivery)
        .bind(b.created_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("seed bid {}", b.id))?;
        report.bids += r.rows_affected();
    }

    for p in &bundle.participations {
        let r = sqlx::query(
            r#"
            insert into participations (id, bid_id, mobile, rate, quantity, participation_date)
            values ($1, $2, $3, $4, $5, $6)
            on conflict (id) do nothing
            "#,
        )
        .bind(&p.id)
        .bind(&p.bid_id)
        .bind(Json(&p.mobile))
        .bind(p.rate)
        .bind(p.quantity)
        .bind(p.participation_date)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("seed participation {}", p.id))?;
        report.participations += r.rows_affected();
    }

    for s in &bundle.identities {
        let r = sqlx::query(
            r#"
            insert into seller_identities (id, seller_name, phone_numbers, emails, companies, commodities)
            values ($1, $2, $3, $4, $5, $6)
            on conflict (id) do nothing
            "#,
        )
        .bind(&s.id)
        .bind(&s.seller_name)
        .bind(Json(&s.phone_numbers))
        .bind(Json(&s.emails))
        .bind(Json(&s.companies))
        .bind(Json(&s.commodities))
        .execute(&mut *tx)
        .await
        .with_context(|| format!("seed identity {}", s.id))?;
        report.identities += r.rows_affected();
    }

    for c in &bundle.confirmations {
        let key = normalizer
            .normalize(&c.phone)
            .ok_or_else(|| anyhow!("seed confirmation {}: phone {} has no digits", c.id, c.phone))?;
        let r = sqlx::query(
            r#"
            insert into confirmations (
              id, bid_id, phone, phone_normalized, seller_name, email, rate, quantity, company,
              status, decided_by, decided_at
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            on conflict do nothing
            "#,
        )
        .bind(&c.id)
        .bind(&c.bid_id)
        .bind(Json(&c.phone))
        .bind(&key)
        .bind(&c.seller_name)
        .bind(&c.email)
        .bind(c.rate)
        .bind(c.quantity)
        .bind(&c.company)
        .bind(c.status.as_str())
        .bind(&c.decided_by)
        .bind(c.decided_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("seed confirmation {}", c.id))?;
        report.confirmations += r.rows_affected();
    }

    tx.commit().await.context("seed: commit failed")?;

    info!(
        bids = report.bids,
        participations = report.participations,
        identities = report.identities,
        confirmations = report.confirmations,
        "seed applied"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_accepts_mixed_phone_types_and_missing_sections() {
        let b = SeedBundle::from_json_str(
            r#"{
                "participations": [
                    { "id": "P1", "bid_id": "B1", "mobile": 9999999999, "rate": 1.0,
                      "quantity": 2.0, "participation_date": "2026-10-16T06:30:00Z" },
                    { "id": "P2", "bid_id": "B1", "mobile": "+91 88888 88888", "rate": 1.0,
                      "quantity": 2.0, "participation_date": "2026-10-16T06:31:00Z" }
                ]
            }"#,
        )
        .unwrap();
        assert!(b.bids.is_empty());
        assert_eq!(b.participations.len(), 2);
        assert_eq!(b.participations[0].mobile.as_text(), "9999999999");
    }
}
