use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::dto::RegisterForm;
use crate::auth::password::{self, MIN_PASSWORD_LEN};
use crate::auth::repo_types::{NewToken, SessionUser, TokenKind, User};
use crate::auth::tokens;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email and wrong password are deliberately the same variant.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailTaken,
    #[error("{0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Неправильный логин или пароль".into(),
            AuthError::EmailTaken => "Пользователь с таким email уже существует".into(),
            AuthError::Validation(msg) => msg.clone(),
            AuthError::Storage(_) => "Операция не удалась, попробуйте позже".into(),
        }
    }
}

/// Tokens minted by a successful login, already persisted.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: SessionUser,
    pub auth_token: NewToken,
    pub remember_token: Option<NewToken>,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn register(state: &AppState, form: RegisterForm) -> Result<User, AuthError> {
    let email = normalize_email(&form.email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::Validation("Некорректный email".into()));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Пароль должен содержать не менее {MIN_PASSWORD_LEN} символов"
        )));
    }
    if form.password != form.password_again {
        return Err(AuthError::Validation("Пароли не совпадают".into()));
    }
    if state.auth.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::EmailTaken);
    }

    let hash = password::hash_password(&form.password)?;
    let name = form.name.trim();
    let name = (!name.is_empty()).then_some(name);
    let Some(user) = state.auth.create_user(&email, name, &hash).await? else {
        warn!(email = %email, "email registered concurrently");
        return Err(AuthError::EmailTaken);
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Verifies credentials and persists the new auth token (plus a remember token
/// when asked) before returning, so the very next request can present them.
pub async fn login(
    state: &AppState,
    email: &str,
    plain_password: &str,
    remember: bool,
) -> Result<LoginOutcome, AuthError> {
    let email = normalize_email(email);

    let user = match state.auth.find_user_by_email(&email).await? {
        Some(u) => u,
        None => {
            password::verify_against_dummy(plain_password);
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    // A corrupt stored hash is a failed login, not a server error.
    let ok = password::verify_password(plain_password, &user.password_hash).unwrap_or(false);
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let cfg = &state.config.session;
    let now = OffsetDateTime::now_utc();
    let auth_token = tokens::mint(TokenKind::Auth, user.id, now, cfg.auth_ttl());
    let remember_token =
        remember.then(|| tokens::mint(TokenKind::Remember, user.id, now, cfg.remember_ttl()));

    let mut minted = vec![auth_token.clone()];
    minted.extend(remember_token.iter().cloned());
    state.auth.open_session(user.id, now, &minted).await?;

    if user.price_history.as_deref().is_some_and(|b| !b.trim().is_empty()) {
        match state.ledger.import_legacy_history(user.id).await {
            Ok(n) => info!(user_id = %user.id, imported = n, "legacy price history imported"),
            Err(e) => error!(error = %e, user_id = %user.id, "legacy price history import failed"),
        }
    }

    info!(user_id = %user.id, remember, "user logged in");
    Ok(LoginOutcome {
        user: SessionUser::from(&user),
        auth_token,
        remember_token,
    })
}

/// Deletes the presented tokens owned by `user_id`. Missing or stale tokens are a no-op.
pub async fn logout(
    state: &AppState,
    user_id: Uuid,
    auth_tokens: &[&str],
    remember_token: Option<&str>,
) -> anyhow::Result<()> {
    let auth_tokens: Vec<&str> = auth_tokens
        .iter()
        .copied()
        .filter(|t| !t.is_empty())
        .collect();
    let remember_token = remember_token.filter(|t| !t.is_empty());
    state
        .auth
        .close_session(user_id, OffsetDateTime::now_utc(), &auth_tokens, remember_token)
        .await?;
    info!(user_id = %user_id, "user logged out");
    Ok(())
}
