use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use time::OffsetDateTime;
use tracing::debug;

use crate::auth::repo_types::{SessionUser, TokenKind};
use crate::auth::session::Session;
use crate::auth::tokens;
use crate::routes::operation_failed;
use crate::state::AppState;

/// Resolves the request's [`Session`] from its cookies and stores it in the request
/// extensions. A session refreshed from a remember token gets its new auth cookie
/// appended to the response, unless the handler already set that cookie itself.
pub async fn resolve_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let auth = jar.get(TokenKind::Auth.cookie_name()).map(|c| c.value().to_owned());
    let remember = jar
        .get(TokenKind::Remember.cookie_name())
        .map(|c| c.value().to_owned());

    let session = match Session::resolve(
        state.auth.as_ref(),
        &state.config.session,
        auth.as_deref(),
        remember.as_deref(),
        OffsetDateTime::now_utc(),
    )
    .await
    {
        Ok(s) => s,
        Err(e) => return operation_failed(&state, "session", e).await,
    };

    let refreshed = session.refreshed_token().cloned();
    req.extensions_mut().insert(session);
    let response = next.run(req).await;

    match refreshed {
        Some(token) if !sets_cookie(&response, TokenKind::Auth.cookie_name()) => {
            let cfg = &state.config.session;
            let cookie = tokens::session_cookie(
                TokenKind::Auth,
                &token.token,
                cfg.auth_ttl(),
                cfg.secure_cookies,
            );
            (CookieJar::new().add(cookie), response).into_response()
        }
        _ => response,
    }
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

fn session_of(parts: &Parts) -> Session {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .unwrap_or(Session::Anonymous)
}

/// Signed-in user; anonymous requests are sent to `/login`.
pub struct CurrentUser(pub SessionUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match session_of(parts).user() {
            Some(user) => Ok(CurrentUser(user.clone())),
            None => {
                debug!(uri = %parts.uri, "anonymous request redirected to login");
                Err(Redirect::to("/login"))
            }
        }
    }
}

/// Signed-in user when there is one.
pub struct MaybeUser(pub Option<SessionUser>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(session_of(parts).user().cloned()))
    }
}

/// The full session, for handlers that need to see a refresh (logout).
pub struct CurrentSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentSession(session_of(parts)))
    }
}
