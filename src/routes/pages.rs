use axum::{response::IntoResponse, routing::get, Router};
use axum_extra::extract::CookieJar;

use crate::auth::extractors::MaybeUser;
use crate::routes::{flash::Flash, views};
use crate::state::AppState;

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "ok" }))
}

pub async fn index(MaybeUser(user): MaybeUser, jar: CookieJar) -> impl IntoResponse {
    let (jar, flash) = Flash::take(jar);
    (jar, views::index_page(user.as_ref(), flash.as_ref()))
}
