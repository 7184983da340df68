//! EduNexus Auth Backend
//! Mission: Account, session, and role management for the school platform

use anyhow::{Context, Result};
use chrono::Utc;
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edunexus_backend::{
    api::create_router,
    auth::{AuthState, TokenIssuer, TokenLedger, UserStore},
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("🏫 EduNexus auth backend starting");

    let config = Config::from_env();

    let user_store = Arc::new(UserStore::new(&config.db_path)?);
    let ledger = Arc::new(TokenLedger::new(&config.db_path)?);
    let issuer = Arc::new(TokenIssuer::new(&config));

    info!("🔐 Auth database initialized at: {}", config.db_path);

    // Sweep stale refresh grants left over from previous runs
    let purged = ledger.purge_expired(Utc::now())?;
    if purged > 0 {
        info!("🧹 Purged {} expired refresh tokens", purged);
    }

    let state = AuthState::new(user_store, issuer, ledger);
    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edunexus_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // Also try the crate directory .env (common when running with
    // --manifest-path from elsewhere)
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidate = manifest_dir.join(".env");
    if candidate.exists() {
        let _ = dotenv::from_path(&candidate);
    }
}
