use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::password,
    metrics::{collector::MetricsReport, scheduler},
    state::AppState,
};

pub const ADMIN_HEADER: &str = "x-admin-password";

pub fn metrics_routes() -> Router<AppState> {
    Router::new().route("/admin/metrics", get(latest))
}

/// Latest report, gated by the admin password hash from config.
#[instrument(skip(state, headers))]
pub async fn latest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MetricsReport>, (StatusCode, String)> {
    let Some(hash) = state.config.admin_password_hash.as_deref() else {
        return Err((StatusCode::NOT_FOUND, "Not found".into()));
    };
    let presented = headers
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !password::verify_password(presented, hash).unwrap_or(false) {
        warn!("admin metrics access denied");
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized".into()));
    }

    let cached = state.latest_metrics.read().await.clone();
    let report = match cached {
        Some(r) => Some(r),
        None => scheduler::collect_once(&state).await,
    };
    report
        .map(Json)
        .ok_or((StatusCode::SERVICE_UNAVAILABLE, "Metrics unavailable".into()))
}
