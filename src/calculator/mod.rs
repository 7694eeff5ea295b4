use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod ledger;
pub mod rates;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::calculator_routes()
}
