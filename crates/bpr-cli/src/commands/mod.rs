//! Command handler modules for bpr-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod review;

use std::sync::Arc;

use anyhow::{Context, Result};
use bpr_config::{report_unused_keys, ConfigMode, LoadedConfig, UnusedKeyPolicy};
use bpr_engine::{EngineSettings, ReconciliationService, Sources};
use bpr_reconcile::RosterEntry;
use bpr_schemas::{DecisionSnapshot, DecisionStatus};
use tracing::warn;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Explicit `--config` layers win; otherwise `BPR_CONFIG`; otherwise defaults.
pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let loaded = if paths.is_empty() {
        bpr_config::load_from_env()?
    } else {
        let refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        bpr_config::load_layered_yaml(&refs)?
    };

    let report = report_unused_keys(ConfigMode::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        warn!(keys = ?report.unused_leaf_pointers, "config keys not read by the cli");
    }
    Ok(loaded)
}

/// Postgres-backed service for one command invocation.
pub async fn open_service(settings: EngineSettings) -> Result<ReconciliationService> {
    let pool = bpr_db::connect_from_env().await?;
    let sources = Sources::from_store(Arc::new(bpr_db::PgStore::new(pool)));
    Ok(ReconciliationService::new(sources, settings))
}

/// Parse a CLI `--decision` string.
pub fn parse_decision(raw: &str) -> Result<DecisionStatus> {
    DecisionStatus::parse(raw).with_context(|| {
        format!("invalid --decision '{}'. expected one of: CONFIRMED | REJECTED", raw.trim())
    })
}

/// The phrase an operator must type to record a decision.
pub fn expected_confirmation(decision: DecisionStatus, bid_id: &str, phone_key: &str) -> String {
    format!("{} {} {}", decision.as_str().to_uppercase(), bid_id, phone_key)
}

/// Decisions are irreversible; the operator repeats them verbatim.
pub fn enforce_confirmation(expected: &str, confirm: Option<&str>) -> Result<()> {
    let confirm = confirm
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "manual confirmation required. expected: \"{}\" (use --confirm)",
                expected
            )
        })?;

    if confirm != expected {
        return Err(anyhow::anyhow!(
            "manual confirmation mismatch. expected: \"{}\" got: \"{}\"",
            expected,
            confirm
        ));
    }
    Ok(())
}

/// Freeze the seller as the roster currently shows them.
pub fn snapshot_from_entry(entry: &RosterEntry) -> DecisionSnapshot {
    let known = entry.identity.as_known();
    DecisionSnapshot {
        seller_name: entry.identity.display_name().to_string(),
        email: known
            .and_then(|i| i.primary_email())
            .unwrap_or_default()
            .to_string(),
        rate: entry.participation.rate,
        quantity: entry.participation.quantity,
        company: known
            .and_then(|i| i.companies.first().cloned())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_phrase_is_exact() {
        let expected = expected_confirmation(DecisionStatus::Rejected, "B1", "9999999999");
        assert_eq!(expected, "REJECTED B1 9999999999");

        assert!(enforce_confirmation(&expected, Some("  REJECTED B1 9999999999 ")).is_ok());
        assert!(enforce_confirmation(&expected, None).is_err());
        assert!(enforce_confirmation(&expected, Some("CONFIRMED B1 9999999999")).is_err());
    }

    #[test]
    fn decision_parsing_names_the_choices() {
        assert_eq!(parse_decision("confirmed").unwrap(), DecisionStatus::Confirmed);
        let err = parse_decision("maybe").unwrap_err().to_string();
        assert!(err.contains("CONFIRMED | REJECTED"));
    }
}
