use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use time::Duration;

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(self).unwrap_or_default())
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn into_cookie(self) -> Cookie<'static> {
        Cookie::build((FLASH_COOKIE, self.encode()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(Duration::minutes(1))
            .build()
    }

    /// Pops the pending flash, if any, and schedules its cookie for removal.
    pub fn take(jar: CookieJar) -> (CookieJar, Option<Flash>) {
        let Some(raw) = jar.get(FLASH_COOKIE).map(|c| c.value().to_owned()) else {
            return (jar, None);
        };
        let mut gone = Cookie::build((FLASH_COOKIE, "")).path("/").build();
        gone.make_removal();
        (jar.add(gone), Flash::decode(&raw))
    }
}

/// 303 to `to` carrying `flash` for the next page.
pub fn redirect_with(jar: CookieJar, to: &str, flash: Flash) -> Response {
    (jar.add(flash.into_cookie()), Redirect::to(to)).into_response()
}
