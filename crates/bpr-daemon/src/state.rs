//! Shared runtime state for bpr-daemon.
//!
//! Handlers receive `State<Arc<AppState>>`; the reconciliation service holds
//! no per-request state, so the only mutable piece here is the decision
//! trail writer.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bpr_audit::DecisionTrail;
use bpr_config::read_str;
use bpr_engine::ReconciliationService;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

pub const ENV_DAEMON_ADDR: &str = "BPR_DAEMON_ADDR";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// DaemonSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    pub bind_addr: SocketAddr,
}

impl DaemonSettings {
    /// `/daemon/bind_addr`, overridden by BPR_DAEMON_ADDR when set.
    pub fn resolve(cfg: &Value, env_addr: Option<&str>) -> Result<Self> {
        let raw = match env_addr.map(str::trim).filter(|s| !s.is_empty()) {
            Some(a) => a.to_string(),
            None => read_str(cfg, "/daemon/bind_addr")?
                .unwrap_or(DEFAULT_BIND_ADDR)
                .to_string(),
        };
        let bind_addr = raw
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid bind address {raw:?}"))?;
        Ok(Self { bind_addr })
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub service: Arc<ReconciliationService>,
    /// Decision trail; `None` when `/audit/path` is unset.
    pub trail: Option<Arc<Mutex<DecisionTrail>>>,
    pub config_hash: String,
}

impl AppState {
    pub fn new(service: ReconciliationService) -> Self {
        Self {
            build: BuildInfo {
                service: "bpr-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            service: Arc::new(service),
            trail: None,
            config_hash: String::new(),
        }
    }

    pub fn with_trail(mut self, trail: DecisionTrail) -> Self {
        self.trail = Some(Arc::new(Mutex::new(trail)));
        self
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seconds since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn env_addr_overrides_config() {
        let cfg = json!({ "daemon": { "bind_addr": "127.0.0.1:9000" } });
        let s = DaemonSettings::resolve(&cfg, None).unwrap();
        assert_eq!(s.bind_addr.port(), 9000);

        let s = DaemonSettings::resolve(&cfg, Some("0.0.0.0:9100")).unwrap();
        assert_eq!(s.bind_addr.port(), 9100);

        let s = DaemonSettings::resolve(&json!({}), Some("  ")).unwrap();
        assert_eq!(s.bind_addr.to_string(), DEFAULT_BIND_ADDR);

        assert!(DaemonSettings::resolve(&json!({}), Some("not-an-addr")).is_err());
    }
}
