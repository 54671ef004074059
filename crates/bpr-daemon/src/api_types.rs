//! Request and response bodies for bpr-daemon endpoints that are not plain
//! engine views. Engine views (`Roster`, `AdminOverview`, `SellerHistory`,
//! `SellerNotifications`, `DecisionOutcome`) serialize as-is.

use bpr_schemas::{DecisionSnapshot, RawId};
use serde::{Deserialize, Serialize};

pub const HEADER_ADMIN_ID: &str = "x-admin-id";
pub const HEADER_SELLER_PHONE: &str = "x-seller-phone";

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable code, e.g. "ALREADY_DECIDED".
    pub code: String,
    pub retryable: bool,
    /// Failing collection for SOURCE_UNAVAILABLE.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
}

impl ErrorResponse {
    pub fn bad_request(code: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
            retryable: false,
            source: None,
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/bids/:bid_id/decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionBody {
    pub phone: RawId,
    /// "Confirmed" | "Rejected" (case-insensitive).
    pub decision: String,
    pub snapshot: DecisionSnapshot,
    /// The admin explicitly confirmed this action in the client.
    #[serde(default)]
    pub confirmed: bool,
}
