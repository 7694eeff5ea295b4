use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::CookieJar;
use tracing::{debug, error, instrument};

use crate::{
    auth::{
        dto::{LoginForm, RegisterForm},
        extractors::{CurrentSession, MaybeUser},
        repo_types::TokenKind,
        services::{self, AuthError},
        tokens,
    },
    routes::{
        flash::{redirect_with, Flash},
        operation_failed, views,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_form).post(register))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
}

pub async fn register_form(jar: CookieJar) -> impl IntoResponse {
    let (jar, flash) = Flash::take(jar);
    (jar, views::register_page(flash.as_ref()))
}

pub async fn login_form(jar: CookieJar) -> impl IntoResponse {
    let (jar, flash) = Flash::take(jar);
    (jar, views::login_page(flash.as_ref()))
}

#[instrument(skip(state, jar, form))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Response {
    match services::register(&state, form).await {
        Ok(_) => redirect_with(
            jar,
            "/login",
            Flash::success("Регистрация прошла успешно! Теперь вы можете войти."),
        ),
        Err(AuthError::Storage(e)) => operation_failed(&state, "register", e).await,
        Err(e) => (jar, views::register_page(Some(&Flash::error(e.user_message())))).into_response(),
    }
}

#[instrument(skip(state, jar, form))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let remember = form.remember();
    let outcome = match services::login(&state, &form.email, &form.password, remember).await {
        Ok(o) => o,
        Err(AuthError::Storage(e)) => return operation_failed(&state, "login", e).await,
        Err(e) => {
            return (jar, views::login_page(Some(&Flash::error(e.user_message())))).into_response()
        }
    };

    let cfg = &state.config.session;
    let mut jar = jar.add(tokens::session_cookie(
        TokenKind::Auth,
        &outcome.auth_token.token,
        cfg.auth_ttl(),
        cfg.secure_cookies,
    ));
    if let Some(remember) = &outcome.remember_token {
        jar = jar.add(tokens::session_cookie(
            TokenKind::Remember,
            &remember.token,
            cfg.remember_ttl(),
            cfg.secure_cookies,
        ));
    }
    debug!(
        user_id = %outcome.user.id,
        remember = outcome.remember_token.is_some(),
        "session cookies issued"
    );
    (jar, Redirect::to("/")).into_response()
}

/// Always clears both cookies, whatever the store had.
#[instrument(skip(state, jar, session))]
pub async fn logout(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    CurrentSession(session): CurrentSession,
    jar: CookieJar,
) -> Response {
    // After a silent refresh the presented cookie is stale and the live token is the one
    // just minted; both rows go.
    let mut auth: Vec<String> = jar
        .get(TokenKind::Auth.cookie_name())
        .map(|c| c.value().to_owned())
        .into_iter()
        .collect();
    auth.extend(session.refreshed_token().map(|t| t.token.clone()));
    let remember = jar
        .get(TokenKind::Remember.cookie_name())
        .map(|c| c.value().to_owned());

    if let Some(user) = user {
        let auth: Vec<&str> = auth.iter().map(String::as_str).collect();
        if let Err(e) = services::logout(&state, user.id, &auth, remember.as_deref()).await {
            error!(error = %e, user_id = %user.id, "logout cleanup failed");
            state.record_error("logout", &format!("{e:#}")).await;
        }
    }

    let jar = jar
        .add(tokens::removal_cookie(TokenKind::Auth))
        .add(tokens::removal_cookie(TokenKind::Remember));
    (jar, Redirect::to("/")).into_response()
}
