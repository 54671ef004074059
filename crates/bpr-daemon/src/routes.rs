//! Axum router and HTTP handlers for bpr-daemon.
//!
//! `build_router` is the single entry point; `main.rs` adds middleware so
//! tests can drive the bare router. Handlers only translate HTTP to engine
//! calls and engine errors to status codes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bpr_audit::DecisionEntry;
use bpr_engine::{AdminCaller, DecisionRequest, EngineError, SellerCaller};
use bpr_schemas::{DecisionStatus, RawId};
use chrono::Utc;
use tracing::{error, info};

use crate::{
    api_types::{DecisionBody, ErrorResponse, HealthResponse, HEADER_ADMIN_ID, HEADER_SELLER_PHONE},
    state::{uptime_secs, AppState},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/admin/overview", get(admin_overview))
        .route("/v1/bids/:bid_id/roster", get(bid_roster))
        .route("/v1/bids/:bid_id/decisions", post(bid_decide))
        .route("/v1/seller/participations", get(seller_participations))
        .route("/v1/seller/notifications", get(seller_notifications))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn engine_error(e: EngineError) -> Response {
    let status = match &e {
        EngineError::BidNotFound { .. } | EngineError::ParticipationNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        EngineError::AlreadyDecided { .. } | EngineError::DuplicateDecision { .. } => {
            StatusCode::CONFLICT
        }
        EngineError::SourceUnavailable { .. } | EngineError::WriteFailed { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        EngineError::InvalidPhone { .. } => StatusCode::BAD_REQUEST,
    };
    let source = match &e {
        EngineError::SourceUnavailable { kind, .. } => Some(kind.as_str().to_string()),
        _ => None,
    };
    let body = ErrorResponse {
        error: e.to_string(),
        code: e.code().to_string(),
        retryable: e.is_retryable(),
        source,
    };
    (status, Json(body)).into_response()
}

fn bad_request(code: &str, msg: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::bad_request(code, msg))).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn admin_caller(headers: &HeaderMap) -> Result<AdminCaller, Response> {
    header_str(headers, HEADER_ADMIN_ID)
        .map(AdminCaller::new)
        .ok_or_else(|| bad_request("MISSING_CALLER", format!("header {HEADER_ADMIN_ID} is required")))
}

fn seller_caller(headers: &HeaderMap) -> Result<SellerCaller, Response> {
    header_str(headers, HEADER_SELLER_PHONE)
        .map(|p| SellerCaller {
            phone: RawId::from(p),
        })
        .ok_or_else(|| {
            bad_request("MISSING_CALLER", format!("header {HEADER_SELLER_PHONE} is required"))
        })
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            uptime_secs: uptime_secs(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

pub(crate) async fn admin_overview(State(st): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let caller = match admin_caller(&headers) {
        Ok(c) => c,
        Err(r) => return r,
    };
    match st.service.admin_overview(&caller, Utc::now()).await {
        Ok(v) => (StatusCode::OK, Json(v)).into_response(),
        Err(e) => engine_error(e),
    }
}

pub(crate) async fn bid_roster(
    State(st): State<Arc<AppState>>,
    Path(bid_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(r) = admin_caller(&headers) {
        return r;
    }
    match st.service.build_roster(&bid_id).await {
        Ok(r) => (StatusCode::OK, Json(r)).into_response(),
        Err(e) => engine_error(e),
    }
}

/// Record a decision.
///
/// Refused with 400 unless the body carries `"confirmed": true`; the client
/// is expected to have asked the admin first.
pub(crate) async fn bid_decide(
    State(st): State<Arc<AppState>>,
    Path(bid_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<DecisionBody>,
) -> Response {
    let caller = match admin_caller(&headers) {
        Ok(c) => c,
        Err(r) => return r,
    };
    if !body.confirmed {
        return bad_request(
            "CONFIRMATION_REQUIRED",
            "decision must be explicitly confirmed (\"confirmed\": true)",
        );
    }
    let Some(decision) = DecisionStatus::parse(&body.decision) else {
        return bad_request(
            "INVALID_DECISION",
            format!("decision must be Confirmed or Rejected (got {:?})", body.decision),
        );
    };

    let req = DecisionRequest {
        bid_id: bid_id.clone(),
        phone: body.phone,
        snapshot: body.snapshot,
        decision,
        decided_by: caller.clone(),
        decided_at: Utc::now(),
    };

    let outcome = match st.service.decide(req).await {
        Ok(o) => o,
        Err(e) => return engine_error(e),
    };

    if let Some(trail) = &st.trail {
        let key = outcome
            .roster
            .entries
            .iter()
            .find(|e| {
                e.confirmation
                    .as_ref()
                    .is_some_and(|c| c.id == outcome.confirmation.id)
            })
            .and_then(|e| e.phone_key.clone())
            .unwrap_or_else(|| outcome.confirmation.phone.as_text());
        let entry = DecisionEntry::from_confirmation(&outcome.confirmation, key);
        if let Err(err) = trail.lock().await.record(entry) {
            // The decision is committed; a trail gap shows up in verification.
            error!(bid_id = %bid_id, error = %format!("{err:#}"), "decision trail append failed");
        }
    }

    info!(
        bid_id = %bid_id,
        status = %outcome.confirmation.status,
        admin_id = %caller.admin_id,
        "decision recorded via http"
    );

    (StatusCode::OK, Json(outcome)).into_response()
}

// ---------------------------------------------------------------------------
// Seller
// ---------------------------------------------------------------------------

pub(crate) async fn seller_participations(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let caller = match seller_caller(&headers) {
        Ok(c) => c,
        Err(r) => return r,
    };
    match st.service.seller_history(&caller, Utc::now()).await {
        Ok(v) => (StatusCode::OK, Json(v)).into_response(),
        Err(e) => engine_error(e),
    }
}

pub(crate) async fn seller_notifications(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let caller = match seller_caller(&headers) {
        Ok(c) => c,
        Err(r) => return r,
    };
    match st.service.seller_notifications(&caller, Utc::now()).await {
        Ok(v) => (StatusCode::OK, Json(v)).into_response(),
        Err(e) => engine_error(e),
    }
}
