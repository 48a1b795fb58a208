use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use agenda::config::AppConfig;
use agenda::db;
use agenda::handlers;
use agenda::services::clock::SystemClock;
use agenda::state::AppState;
use agenda::store::SqliteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let store = Arc::new(SqliteStore::new(Arc::new(Mutex::new(conn))));

    match config.owner()? {
        Some(owner) => {
            store.save_owner(&owner)?;
            tracing::info!(owner_id = %owner.id, timezone = %owner.timezone, "owner registered");
        }
        None => tracing::warn!("OWNER_PHONE not set, every sender will be unregistered"),
    }

    let expired = store.purge_expired_conversations()?;
    if expired > 0 {
        tracing::info!(expired, "removed stale conversations");
    }

    let state = Arc::new(AppState::with_store(
        store,
        config.clone(),
        Box::new(SystemClock),
    ));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/dev/message", post(handlers::dev::send_message))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
