//! bpr-daemon entry point: config, tracing, Postgres-backed sources, HTTP.

use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use bpr_audit::{AuditSettings, DecisionTrail};
use bpr_config::{report_unused_keys, ConfigMode, UnusedKeyPolicy};
use bpr_daemon::{routes, state};
use bpr_engine::{EngineSettings, ReconciliationService, Sources};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = bpr_config::load_from_env().context("load config")?;
    let unused = report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config keys not read by the daemon");
    }

    let engine_settings = EngineSettings::from_config_json(&loaded.config_json)?;
    let audit = AuditSettings::from_config_json(&loaded.config_json)?;
    let env_addr = std::env::var(state::ENV_DAEMON_ADDR).ok();
    let daemon = state::DaemonSettings::resolve(&loaded.config_json, env_addr.as_deref())?;

    let pool = bpr_db::connect_from_env().await?;
    let db_status = bpr_db::status(&pool).await?;
    if !db_status.has_pair_guard {
        warn!("confirmations uniqueness constraint missing; run `bpr db migrate`");
    }
    let sources = Sources::from_store(Arc::new(bpr_db::PgStore::new(pool)));

    let mut app_state = state::AppState::new(ReconciliationService::new(sources, engine_settings))
        .with_config_hash(loaded.config_hash.clone());
    if let Some(path) = &audit.path {
        let trail = DecisionTrail::open(path, audit.hash_chain)?;
        info!(path = %path.display(), next_seq = trail.next_seq(), "decision trail open");
        app_state = app_state.with_trail(trail);
    }
    let shared = Arc::new(app_state);

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    info!(
        config_hash = %loaded.config_hash,
        timezone = %engine_settings.timezone,
        "bpr-daemon listening on http://{}",
        daemon.bind_addr
    );

    axum::serve(tokio::net::TcpListener::bind(daemon.bind_addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
