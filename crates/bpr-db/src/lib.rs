use anyhow::{Context, Result};
use bpr_engine::WriteFailure;
use bpr_schemas::{
    BidPosting, Confirmation, DecisionStatus, Email, NewConfirmation, Participation, PhoneNumber,
    RawId, SellerIdentity,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

mod seed;
mod store;

pub use seed::{seed, SeedBundle, SeedReport};
pub use store::PgStore;

pub const ENV_DB_URL: &str = "BPR_DATABASE_URL";

pub const UQ_CONFIRMATION_PAIR: &str = "uq_confirmation_bid_phone";

/// Connect to Postgres using BPR_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_confirmations_table: bool,
    /// The (bid_id, phone_normalized) constraint is installed.
    pub has_pair_guard: bool,
}

/// Connectivity + schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (has_table,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'confirmations'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    let (has_guard,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1
            from information_schema.table_constraints
            where table_schema = 'public'
              and table_name = 'confirmations'
              and constraint_name = $1
              and constraint_type = 'UNIQUE'
        )
        "#,
    )
    .bind(UQ_CONFIRMATION_PAIR)
    .fetch_one(pool)
    .await
    .context("status constraint query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_confirmations_table: has_table,
        has_pair_guard: has_guard,
    })
}

// ---------------------------------------------------------------------------
// Reads (full list, arrival order)
// ---------------------------------------------------------------------------

pub async fn fetch_bids(pool: &PgPool) -> Result<Vec<BidPosting>> {
    let rows = sqlx::query(
        r#"
        select id, bid_group, consignee, origin, commodity, quantity, rate, parameters,
               bid_date, start_time, end_time, payment_terms, delivery, created_at
        from bid_postings
        order by seq asc
        "#,
    )
    .fetch_all(pool)
    .await
    .context("fetch_bids failed")?;

    rows.iter().map(bid_from_row).collect()
}

fn bid_from_row(row: &PgRow) -> Result<BidPosting> {
    let Json(parameters) = row.try_get("parameters")?;
    Ok(BidPosting {
        id: row.try_get("id")?,
        group: row.try_get("bid_group")?,
        consignee: row.try_get("consignee")?,
        origin: row.try_get("origin")?,
        commodity: row.try_get("commodity")?,
        quantity: row.try_get("quantity")?,
        rate: row.try_get("rate")?,
        parameters,
        bid_date: row.try_get("bid_date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        payment_terms: row.try_get("payment_terms")?,
        delivery: row.try_get("delivery")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn fetch_participations(pool: &PgPool) -> Result<Vec<Participation>> {
    let rows = sqlx::query(
        r#"
        select id, bid_id, mobile, rate, quantity, participation_date
        from participations
        order by seq asc
        "#,
    )
    .fetch_all(pool)
    .await
    .context("fetch_participations failed")?;

    rows.iter()
        .map(|row| {
            let Json(mobile): Json<RawId> = row.try_get("mobile")?;
            Ok(Participation {
                id: row.try_get("id")?,
                bid_id: row.try_get("bid_id")?,
                mobile,
                rate: row.try_get("rate")?,
                quantity: row.try_get("quantity")?,
                participation_date: row.try_get("participation_date")?,
            })
        })
        .collect()
}

pub async fn fetch_identities(pool: &PgPool) -> Result<Vec<SellerIdentity>> {
    let rows = sqlx::query(
        r#"
        select id, seller_name, phone_numbers, emails, companies, commodities
        from seller_identities
        order by seq asc
        "#,
    )
    .fetch_all(pool)
    .await
    .context("fetch_identities failed")?;

    rows.iter()
        .map(|row| {
            let Json(phone_numbers): Json<Vec<PhoneNumber>> = row.try_get("phone_numbers")?;
            let Json(emails): Json<Vec<Email>> = row.try_get("emails")?;
            let Json(companies): Json<Vec<String>> = row.try_get("companies")?;
            let Json(commodities): Json<Vec<String>> = row.try_get("commodities")?;
            Ok(SellerIdentity {
                id: row.try_get("id")?,
                seller_name: row.try_get("seller_name")?,
                phone_numbers,
                emails,
                companies,
                commodities,
            })
        })
        .collect()
}

pub async fn fetch_confirmations(pool: &PgPool) -> Result<Vec<Confirmation>> {
    let rows = sqlx::query(
        r#"
        select id, bid_id, phone, seller_name, email, rate, quantity, company, status,
               decided_by, decided_at
        from confirmations
        order by seq asc
        "#,
    )
    .fetch_all(pool)
    .await
    .context("fetch_confirmations failed")?;

    rows.iter().map(confirmation_from_row).collect()
}

fn confirmation_from_row(row: &PgRow) -> Result<Confirmation> {
    let Json(phone): Json<RawId> = row.try_get("phone")?;
    let status: String = row.try_get("status")?;
    let status = DecisionStatus::parse(&status)
        .with_context(|| format!("confirmations.status has unexpected value {status:?}"))?;
    Ok(Confirmation {
        id: row.try_get("id")?,
        bid_id: row.try_get("bid_id")?,
        phone,
        seller_name: row.try_get("seller_name")?,
        email: row.try_get("email")?,
        rate: row.try_get("rate")?,
        quantity: row.try_get("quantity")?,
        company: row.try_get("company")?,
        status,
        decided_by: row.try_get("decided_by")?,
        decided_at: row.try_get("decided_at")?,
    })
}

// ---------------------------------------------------------------------------
// Confirmation write
// ---------------------------------------------------------------------------

/// Insert one confirmation. A second row for the same
/// (bid_id, phone_normalized) is refused by `uq_confirmation_bid_phone` and
/// reported as [`WriteFailure::Duplicate`].
pub async fn insert_confirmation(
    pool: &PgPool,
    new: &NewConfirmation,
) -> Result<Confirmation, WriteFailure> {
    let id = Uuid::new_v4().to_string();

    let res = sqlx::query(
        r#"
        insert into confirmations (
          id, bid_id, phone, phone_normalized, seller_name, email, rate, quantity, company,
          status, decided_by, decided_at
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12
        )
        "#,
    )
    .bind(&id)
    .bind(&new.bid_id)
    .bind(Json(&new.phone))
    .bind(&new.phone_normalized)
    .bind(&new.snapshot.seller_name)
    .bind(&new.snapshot.email)
    .bind(new.snapshot.rate)
    .bind(new.snapshot.quantity)
    .bind(&new.snapshot.company)
    .bind(new.status.as_str())
    .bind(&new.decided_by)
    .bind(new.decided_at)
    .execute(pool)
    .await;

    match res {
        Ok(_) => Ok(new.clone().into_confirmation(id)),
        Err(e) if is_unique_constraint_violation(&e, UQ_CONFIRMATION_PAIR) => {
            Err(WriteFailure::Duplicate {
                bid_id: new.bid_id.clone(),
                phone: new.phone_normalized.clone(),
            })
        }
        Err(e) => Err(WriteFailure::Unavailable(format!(
            "insert_confirmation failed: {e}"
        ))),
    }
}

/// Detect a Postgres unique constraint violation by name.
fn is_unique_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            // 23505 = unique_violation
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
