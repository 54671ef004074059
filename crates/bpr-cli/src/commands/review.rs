//! Read-side and decision commands: roster, overview, seller views, decide.
//!
//! Output is `key=value` lines so scripts can grep it.

use anyhow::Result;
use bpr_audit::{AuditSettings, DecisionEntry, DecisionTrail, TrailRecord};
use bpr_engine::{
    AdminCaller, DecisionRequest, EngineError, ReconciliationService, Roster, SellerCaller,
    SourceKind,
};
use bpr_schemas::{Confirmation, DecisionStatus, RawId};
use chrono::Utc;
use tracing::{error, info};

use super::snapshot_from_entry;

pub async fn roster(svc: &ReconciliationService, bid_id: &str) -> Result<()> {
    let r = svc.build_roster(bid_id).await?;
    print_roster(&r);
    Ok(())
}

fn print_roster(r: &Roster) {
    println!("bid_id={}", r.bid.id);
    println!("group={}", r.bid.group);
    println!("consignee={}", r.bid.consignee);
    println!("commodity={}", r.bid.commodity);
    println!("bid_date={}", r.bid.bid_date);
    for e in &r.entries {
        println!(
            "entry position={} phone_key={} seller={} status={} rate={} quantity={}",
            e.position,
            e.phone_key.as_deref().unwrap_or("-"),
            e.identity.display_name(),
            e.effective_status,
            e.participation.rate,
            e.participation.quantity
        );
    }
    println!(
        "counts review={} confirmed={} rejected={}",
        r.counts.review, r.counts.confirmed, r.counts.rejected
    );
    print_degraded(&r.degraded_sources);
}

fn print_degraded(sources: &[SourceKind]) {
    if !sources.is_empty() {
        let names: Vec<&str> = sources.iter().map(|k| k.as_str()).collect();
        println!("degraded_sources={}", names.join(","));
    }
}

pub async fn overview(svc: &ReconciliationService, admin: &AdminCaller) -> Result<()> {
    let o = svc.admin_overview(admin, Utc::now()).await?;
    println!("window_days={}", o.window_days);
    println!("bid_count={}", o.bid_count());
    for g in &o.groups {
        println!(
            "group={} bids={} consignees={}",
            g.group,
            g.bids.len(),
            g.distinct_consignees.join("|")
        );
        for b in &g.bids {
            println!(
                "  bid_id={} commodity={} review={} confirmed={} rejected={}",
                b.bid.id, b.bid.commodity, b.counts.review, b.counts.confirmed, b.counts.rejected
            );
        }
    }
    Ok(())
}

pub async fn history(svc: &ReconciliationService, phone: &str) -> Result<()> {
    let caller = SellerCaller {
        phone: RawId::from(phone),
    };
    let h = svc.seller_history(&caller, Utc::now()).await?;
    println!("phone_key={}", h.phone_key);
    println!("seller={}", h.identity.display_name());
    println!("window_days={}", h.window_days);
    println!("decided_count={}", h.decided_count);
    for v in &h.participations {
        let (consignee, commodity) = v
            .bid
            .as_ref()
            .map(|b| (b.consignee.as_str(), b.commodity.as_str()))
            .unwrap_or(("-", "-"));
        println!(
            "participation id={} bid_id={} consignee={} commodity={} status={} at={}",
            v.participation.id,
            v.participation.bid_id,
            consignee,
            commodity,
            v.effective_status,
            v.participation.participation_date.to_rfc3339()
        );
    }
    print_degraded(&h.degraded_sources);
    Ok(())
}

pub async fn notifications(svc: &ReconciliationService, phone: &str) -> Result<()> {
    let caller = SellerCaller {
        phone: RawId::from(phone),
    };
    let n = svc.seller_notifications(&caller, Utc::now()).await?;
    println!("phone_key={}", n.phone_key);
    println!("decided_count={}", n.decided_count);
    println!("window_days={}", n.window_days);
    for b in &n.recent_matching_bids {
        println!(
            "bid bid_id={} commodity={} consignee={} bid_date={}",
            b.id, b.commodity, b.consignee, b.bid_date
        );
    }
    print_degraded(&n.degraded_sources);
    Ok(())
}

pub struct DecideArgs<'a> {
    pub bid_id: &'a str,
    pub phone_key: &'a str,
    pub decision: DecisionStatus,
    pub admin: AdminCaller,
}

/// Record a decision. The confirmation phrase has already been checked.
pub async fn decide(
    svc: &ReconciliationService,
    audit: &AuditSettings,
    args: DecideArgs<'_>,
) -> Result<()> {
    let current = svc.build_roster(args.bid_id).await?;
    let entry = current
        .entry_for_key(args.phone_key)
        .ok_or_else(|| EngineError::ParticipationNotFound {
            bid_id: args.bid_id.to_string(),
            phone: args.phone_key.to_string(),
        })?;

    let req = DecisionRequest {
        bid_id: args.bid_id.to_string(),
        phone: entry.participation.mobile.clone(),
        snapshot: snapshot_from_entry(entry),
        decision: args.decision,
        decided_by: args.admin,
        decided_at: Utc::now(),
    };
    let outcome = svc.decide(req).await?;

    // The decision is committed; a trail failure is reported, not fatal.
    match append_trail(audit, &outcome.confirmation, args.phone_key) {
        Ok(Some(rec)) => println!("trail_appended=true trail_seq={}", rec.seq),
        Ok(None) => {}
        Err(e) => {
            error!(
                bid_id = args.bid_id,
                confirmation_id = %outcome.confirmation.id,
                error = %format!("{e:#}"),
                "decision trail append failed"
            );
            println!("trail_appended=false");
        }
    }

    println!("decided=true");
    println!("confirmation_id={}", outcome.confirmation.id);
    println!("status={}", outcome.confirmation.status);
    print_roster(&outcome.roster);
    Ok(())
}

/// Append one decision to the trail, if a trail is configured.
fn append_trail(
    audit: &AuditSettings,
    confirmation: &Confirmation,
    phone_key: &str,
) -> Result<Option<TrailRecord>> {
    let Some(path) = &audit.path else {
        return Ok(None);
    };
    let mut trail = DecisionTrail::open(path, audit.hash_chain)?;
    let rec = trail.record(DecisionEntry::from_confirmation(confirmation, phone_key))?;
    info!(seq = rec.seq, path = %path.display(), "decision trail appended");
    Ok(Some(rec))
}
