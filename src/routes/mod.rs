use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::state::AppState;

pub mod flash;
pub mod pages;
pub mod views;

/// Generic 500 for a failed persistence step. The cause is logged and kept in `error_logs`.
pub async fn operation_failed(state: &AppState, context: &str, err: anyhow::Error) -> Response {
    let message = format!("{err:#}");
    error!(error = %message, context, "operation failed");
    state.record_error(context, &message).await;
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        views::error_page("Операция не удалась, попробуйте позже"),
    )
        .into_response()
}
