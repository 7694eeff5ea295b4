use std::{net::SocketAddr, sync::Arc, time::Duration};

mod app;
mod auth;
mod calculator;
mod config;
mod db;
#[cfg(test)]
mod memory;
mod metrics;
mod routes;
mod state;

use crate::{config::AppConfig, db::PgStore, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "waste_portal=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let metrics_every = Duration::from_secs(config.metrics_interval_secs.max(1));
    tracing::info!(
        debug = config.debug,
        secure_cookies = config.session.secure_cookies,
        "configuration loaded"
    );
    if config.admin_password_hash.is_none() {
        tracing::info!("ADMIN_PASSWORD_HASH not set; /admin/metrics disabled");
    }

    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    store.migrate().await;

    let state = AppState::from_store(config, store.clone());
    let metrics_task = metrics::scheduler::spawn(state.clone(), metrics_every);

    let result = app::serve(app::build_app(state), addr).await;

    metrics_task.abort();
    store.close().await;
    result
}
