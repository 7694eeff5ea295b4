use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::metrics::collector::{self, MetricsReport};
use crate::state::AppState;

/// Runs [`collect_once`] every `every` until the handle is aborted.
pub fn spawn(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            collect_once(&state).await;
        }
    })
}

/// One tick: snapshot, aggregate, log, publish. Failures are logged and swallowed.
pub async fn collect_once(state: &AppState) -> Option<MetricsReport> {
    let now = OffsetDateTime::now_utc();
    let snapshot = match state.metrics.snapshot(now).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %format!("{e:#}"), "metrics collection failed");
            return None;
        }
    };
    let report = collector::aggregate(&snapshot, now);

    match serde_json::to_string(&report) {
        Ok(json) => info!(target: "minutely_metrics", metrics = %json, "metrics collected"),
        Err(e) => error!(target: "minutely_metrics", error = %e, "metrics serialization failed"),
    }
    info!(
        target: "minutely_metrics",
        minute = %report.current_minute,
        transactions = report.transactions_last_min,
        avg_price = report.avg_price_last_min,
        active_sessions = report.active_sessions,
        new_logins = report.new_logins,
        errors = report.errors_last_min,
        "minutely metrics"
    );

    *state.latest_metrics.write().await = Some(report.clone());
    Some(report)
}
