use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo_types::{NewToken, TokenKind};

/// Bytes of OS randomness behind every token value.
pub const TOKEN_BYTES: usize = 64;

pub fn generate_token() -> String {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

pub fn mint(kind: TokenKind, user_id: Uuid, now: OffsetDateTime, ttl: Duration) -> NewToken {
    debug!(user_id = %user_id, kind = ?kind, "token minted");
    NewToken {
        kind,
        token: generate_token(),
        user_id,
        created_at: now,
        expires_at: now + ttl,
    }
}

pub fn session_cookie(kind: TokenKind, value: &str, ttl: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((kind.cookie_name(), value.to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(ttl)
        .build()
}

/// Expired, empty cookie that makes the browser drop `kind`.
pub fn removal_cookie(kind: TokenKind) -> Cookie<'static> {
    let mut cookie = Cookie::build((kind.cookie_name(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}
