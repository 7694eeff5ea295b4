use time::OffsetDateTime;
use tracing::{debug, info};

use crate::auth::repo::AuthRepo;
use crate::auth::repo_types::{NewToken, SessionUser, TokenKind};
use crate::auth::tokens;
use crate::config::SessionConfig;

/// Where a request stands after its cookies were checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Anonymous,
    /// A live auth token was presented.
    Fresh(SessionUser),
    /// The auth token was missing or expired; a remember token minted `auth_token`,
    /// which must reach the client as a new cookie.
    Refreshed {
        user: SessionUser,
        auth_token: NewToken,
    },
}

impl Session {
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Session::Anonymous => None,
            Session::Fresh(user) | Session::Refreshed { user, .. } => Some(user),
        }
    }

    pub fn refreshed_token(&self) -> Option<&NewToken> {
        match self {
            Session::Refreshed { auth_token, .. } => Some(auth_token),
            _ => None,
        }
    }

    /// Auth cookie first, remember cookie second, anonymous otherwise.
    pub async fn resolve(
        repo: &dyn AuthRepo,
        cfg: &SessionConfig,
        auth_cookie: Option<&str>,
        remember_cookie: Option<&str>,
        now: OffsetDateTime,
    ) -> anyhow::Result<Session> {
        if let Some(token) = non_empty(auth_cookie) {
            if let Some(user) = repo.find_token_owner(TokenKind::Auth, token, now).await? {
                return Ok(Session::Fresh(user));
            }
            debug!("auth cookie unknown or expired");
        }

        if let Some(token) = non_empty(remember_cookie) {
            if let Some(user) = repo
                .find_token_owner(TokenKind::Remember, token, now)
                .await?
            {
                let auth_token = tokens::mint(TokenKind::Auth, user.id, now, cfg.auth_ttl());
                repo.insert_token(&auth_token).await?;
                info!(user_id = %user.id, "session refreshed from remember token");
                return Ok(Session::Refreshed { user, auth_token });
            }
            debug!("remember cookie unknown or expired");
        }

        Ok(Session::Anonymous)
    }
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::Duration;

    use super::*;
    use crate::memory::MemoryStore;

    fn cfg() -> SessionConfig {
        SessionConfig {
            auth_ttl_hours: 24,
            remember_ttl_days: 30,
            secure_cookies: false,
        }
    }

    fn seeded() -> (Arc<MemoryStore>, SessionUser) {
        let store = Arc::new(MemoryStore::default());
        let user = store.seed_user("user@example.com", "secret1");
        (store, SessionUser::from(&user))
    }

    #[tokio::test]
    async fn no_cookies_is_anonymous() {
        let (store, _) = seeded();
        let now = OffsetDateTime::now_utc();
        let s = Session::resolve(store.as_ref(), &cfg(), None, None, now)
            .await
            .unwrap();
        assert_eq!(s, Session::Anonymous);
        assert!(s.user().is_none());
    }

    #[tokio::test]
    async fn live_auth_token_resolves_without_refresh() {
        let (store, user) = seeded();
        let now = OffsetDateTime::now_utc();
        let auth = tokens::mint(TokenKind::Auth, user.id, now, Duration::days(1));
        store.put_token(auth.clone());
        let remember = tokens::mint(TokenKind::Remember, user.id, now, Duration::days(30));
        store.put_token(remember.clone());

        let s = Session::resolve(
            store.as_ref(),
            &cfg(),
            Some(&auth.token),
            Some(&remember.token),
            now,
        )
        .await
        .unwrap();
        assert_eq!(s, Session::Fresh(user));
        assert_eq!(store.token_count(TokenKind::Auth), 1);
    }

    #[tokio::test]
    async fn expired_auth_with_live_remember_mints_new_auth_token() {
        let (store, user) = seeded();
        let now = OffsetDateTime::now_utc();
        let stale = tokens::mint(TokenKind::Auth, user.id, now - Duration::days(2), Duration::days(1));
        store.put_token(stale.clone());
        let remember = tokens::mint(TokenKind::Remember, user.id, now, Duration::days(30));
        store.put_token(remember.clone());

        let s = Session::resolve(
            store.as_ref(),
            &cfg(),
            Some(&stale.token),
            Some(&remember.token),
            now,
        )
        .await
        .unwrap();

        let fresh = s.refreshed_token().expect("refreshed").clone();
        assert_eq!(s.user(), Some(&user));
        assert_ne!(fresh.token, stale.token);
        assert_eq!(fresh.expires_at, now + Duration::days(1));
        // expired row is not pruned at lookup; the remember token is reusable
        assert_eq!(store.token_count(TokenKind::Auth), 2);
        assert_eq!(store.token_count(TokenKind::Remember), 1);

        let again = Session::resolve(store.as_ref(), &cfg(), Some(&fresh.token), None, now)
            .await
            .unwrap();
        assert_eq!(again, Session::Fresh(user));
    }

    #[tokio::test]
    async fn both_tokens_expired_is_anonymous() {
        let (store, user) = seeded();
        let now = OffsetDateTime::now_utc();
        let auth = tokens::mint(TokenKind::Auth, user.id, now - Duration::days(3), Duration::days(1));
        let remember = tokens::mint(
            TokenKind::Remember,
            user.id,
            now - Duration::days(31),
            Duration::days(30),
        );
        store.put_token(auth.clone());
        store.put_token(remember.clone());

        let s = Session::resolve(
            store.as_ref(),
            &cfg(),
            Some(&auth.token),
            Some(&remember.token),
            now,
        )
        .await
        .unwrap();
        assert_eq!(s, Session::Anonymous);
    }

    #[tokio::test]
    async fn remember_value_is_not_accepted_as_auth_token() {
        let (store, user) = seeded();
        let now = OffsetDateTime::now_utc();
        let remember = tokens::mint(TokenKind::Remember, user.id, now, Duration::days(30));
        store.put_token(remember.clone());

        let s = Session::resolve(store.as_ref(), &cfg(), Some(&remember.token), None, now)
            .await
            .unwrap();
        assert_eq!(s, Session::Anonymous);
    }
}
