use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::CookieJar;
use tracing::instrument;

use crate::{
    auth::extractors::CurrentUser,
    calculator::{
        dto::CalculationForm,
        services::{self, CalcError},
    },
    routes::{
        flash::{redirect_with, Flash},
        operation_failed, views,
    },
    state::AppState,
};

pub fn calculator_routes() -> Router<AppState> {
    Router::new()
        .route("/waste-calculator", get(show).post(calculate))
        .route("/waste-calculator/export", get(export))
}

#[instrument(skip(state, jar))]
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> Response {
    let entries = match services::history(state.ledger.as_ref(), user.id).await {
        Ok(e) => e,
        Err(e) => return operation_failed(&state, "history", e).await,
    };
    let (jar, flash) = Flash::take(jar);
    (jar, views::calculator_page(&user, flash.as_ref(), &entries)).into_response()
}

#[instrument(skip(state, jar))]
pub async fn calculate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
    Form(form): Form<CalculationForm>,
) -> Response {
    match services::calculate(state.ledger.as_ref(), user.id, &form.waste_class, &form.volume).await {
        Ok(calc) => redirect_with(
            jar,
            "/waste-calculator",
            Flash::success(format!(
                "Стоимость утилизации: {:.2} руб. (без НДС)",
                calc.price
            )),
        ),
        Err(CalcError::Storage(e)) => operation_failed(&state, "calculate", e).await,
        Err(CalcError::Validation(msg)) => {
            let entries = match services::history(state.ledger.as_ref(), user.id).await {
                Ok(e) => e,
                Err(e) => return operation_failed(&state, "history", e).await,
            };
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                views::calculator_page(&user, Some(&Flash::error(msg)), &entries),
            )
                .into_response()
        }
    }
}

#[instrument(skip(state))]
pub async fn export(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> Response {
    match services::export_history(state.ledger.as_ref(), user.id).await {
        Ok(blob) => (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"price_history.txt\"",
                ),
            ],
            blob,
        )
            .into_response(),
        Err(e) => operation_failed(&state, "export", e).await,
    }
}
