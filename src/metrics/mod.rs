use crate::state::AppState;
use axum::Router;

pub mod collector;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod scheduler;

pub fn router() -> Router<AppState> {
    handlers::metrics_routes()
}
