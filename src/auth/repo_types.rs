use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,        // Argon2 hash, not exposed in JSON
    pub login_time: Option<OffsetDateTime>,
    pub logout_time: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub price_history: Option<String>, // legacy delimited ledger
    pub created_at: OffsetDateTime,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
}

impl From<&User> for SessionUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
        }
    }
}

/// The two opaque credentials a browser can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Auth,
    Remember,
}

impl TokenKind {
    pub const fn cookie_name(self) -> &'static str {
        match self {
            TokenKind::Auth => "auth_token",
            TokenKind::Remember => "remember_token",
        }
    }

    pub(crate) const fn table(self) -> &'static str {
        match self {
            TokenKind::Auth => "auth_tokens",
            TokenKind::Remember => "remember_tokens",
        }
    }
}

/// A freshly minted token row, persisted before its cookie is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToken {
    pub kind: TokenKind,
    pub token: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

#[cfg(test)]
impl NewToken {
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }
}
