//! Router scenarios, driven in-process with `oneshot` over an in-memory
//! store. No network, no Postgres.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bpr_audit::{verify_trail, ChainCheck, DecisionTrail};
use bpr_daemon::{api_types::ErrorResponse, routes, state::AppState};
use bpr_engine::SourceKind;
use bpr_schemas::RawId;
use bpr_testkit::fixtures::{bid, identity, participation};
use bpr_testkit::{service_over, InMemoryStore};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn seeded() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.push_bid(bid("B1", "North", "Mill A", "Soybean"));
    store.push_identity(identity("S1", "Acme", &["9999999999"], &["Soybean"]));
    store.push_participation(participation("P1", "B1", RawId::Number(9_999_999_999)));
    store.push_participation(participation("P2", "B1", "8888888888"));
    store
}

fn router(store: Arc<InMemoryStore>) -> Router {
    routes::build_router(Arc::new(AppState::new(service_over(store))))
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str, header: Option<(&str, &str)>) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some((k, v)) = header {
        b = b.header(k, v);
    }
    b.body(Body::empty()).unwrap()
}

fn decide(bid_id: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/v1/bids/{bid_id}/decisions"))
        .header("content-type", "application/json")
        .header("x-admin-id", "admin-7")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn decision_body(phone: &str, decision: &str, confirmed: bool) -> Value {
    json!({
        "phone": phone,
        "decision": decision,
        "confirmed": confirmed,
        "snapshot": {
            "seller_name": "Acme",
            "email": "acme@example.com",
            "rate": 4200.0,
            "quantity": 25.0,
            "company": "Acme Traders"
        }
    })
}

#[tokio::test]
async fn health_reports_service_and_config_hash() {
    let st = Arc::new(AppState::new(service_over(seeded())).with_config_hash("abc123"));
    let app = routes::build_router(st);

    let (status, body) = call(app, get("/v1/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "bpr-daemon");
    assert_eq!(body["config_hash"], "abc123");
}

#[tokio::test]
async fn roster_requires_admin_and_lists_every_participation() {
    let app = router(seeded());

    let (status, body) = call(app.clone(), get("/v1/bids/B1/roster", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_CALLER");

    let (status, body) = call(app, get("/v1/bids/B1/roster", Some(("x-admin-id", "admin-7")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);
    assert_eq!(body["counts"]["review"], 2);
}

#[tokio::test]
async fn unknown_bid_is_404() {
    let app = router(seeded());
    let (status, body) = call(app, get("/v1/bids/NOPE/roster", Some(("x-admin-id", "a")))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "BID_NOT_FOUND");
}

#[tokio::test]
async fn failing_source_is_503_retryable_and_named() {
    let store = seeded();
    store.fail_source(SourceKind::Confirmations);
    let app = router(store);

    let (status, body) = call(app, get("/v1/bids/B1/roster", Some(("x-admin-id", "a")))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let err: ErrorResponse = serde_json::from_value(body).unwrap();
    assert!(err.retryable);
    assert_eq!(err.code, "SOURCE_UNAVAILABLE");
    assert_eq!(err.source.as_deref(), Some("confirmations"));
}

#[tokio::test]
async fn decision_needs_explicit_confirmation_and_valid_status() {
    let store = seeded();
    let app = router(store.clone());

    let (status, body) = call(app.clone(), decide("B1", decision_body("9999999999", "Confirmed", false))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CONFIRMATION_REQUIRED");

    let (status, body) = call(app, decide("B1", decision_body("9999999999", "Maybe", true))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_DECISION");

    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn decide_then_repeat_is_409() {
    let store = seeded();
    let app = router(store.clone());

    let (status, body) = call(app.clone(), decide("B1", decision_body("+91 99999-99999", "confirmed", true))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confirmation"]["status"], "Confirmed");
    assert_eq!(body["roster"]["counts"]["confirmed"], 1);
    assert_eq!(body["roster"]["counts"]["review"], 1);

    let (status, body) = call(app, decide("B1", decision_body("9999999999", "Rejected", true))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_DECIDED");
    assert_eq!(body["retryable"], false);

    assert_eq!(store.confirmations().len(), 1);
}

#[tokio::test]
async fn decision_without_participation_is_404() {
    let app = router(seeded());
    let (status, body) = call(app, decide("B1", decision_body("7777777777", "Confirmed", true))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PARTICIPATION_NOT_FOUND");
}

#[tokio::test]
async fn decisions_land_in_the_trail_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("decisions.jsonl");
    let trail = DecisionTrail::open(&path, true).unwrap();

    let st = Arc::new(AppState::new(service_over(seeded())).with_trail(trail));
    let app = routes::build_router(st);

    let (status, _) = call(app.clone(), decide("B1", decision_body("9999999999", "Confirmed", true))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(app, decide("B1", decision_body("8888888888", "Rejected", true))).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(verify_trail(&path).unwrap(), ChainCheck::Intact { records: 2 });
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.lines().next().unwrap().contains("\"phone_key\":\"9999999999\""));
}

#[tokio::test]
async fn seller_routes_require_phone_header() {
    let app = router(seeded());

    let (status, _) = call(app.clone(), get("/v1/seller/participations", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        app.clone(),
        get("/v1/seller/participations", Some(("x-seller-phone", "099999 99999"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone_key"], "9999999999");

    let (status, body) = call(
        app,
        get("/v1/seller/notifications", Some(("x-seller-phone", "9999999999"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decided_count"], 0);
}

#[tokio::test]
async fn admin_overview_requires_admin() {
    let app = router(seeded());

    let (status, _) = call(app.clone(), get("/v1/admin/overview", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(app, get("/v1/admin/overview", Some(("x-admin-id", "admin-7")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window_days"], 7);
}

#[tokio::test]
async fn seller_notifications_flag_identity_outage() {
    let store = seeded();
    store.fail_source(SourceKind::SellerIdentities);
    let app = router(store);

    let (status, body) = call(
        app,
        get("/v1/seller/notifications", Some(("x-seller-phone", "9999999999"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decided_count"], 0);
    assert_eq!(body["degraded_sources"], json!(["seller_identities"]));
}

#[tokio::test]
async fn no_streaming_route_is_served() {
    let (status, _) = call(router(seeded()), get("/v1/stream", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
