//! In-process store used by unit and route tests in place of Postgres.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex, MutexGuard,
};

use anyhow::bail;
use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::auth::password;
use crate::auth::repo::AuthRepo;
use crate::auth::repo_types::{NewToken, SessionUser, TokenKind, User};
use crate::calculator::repo::{legacy_entries, LedgerRepo};
use crate::calculator::repo_types::{Calculation, NewCalculation};
use crate::metrics::repo::{start_of_day, window_start, MetricsRepo};
use crate::metrics::repo_types::{ActivitySnapshot, CalculationSample, UserActivity};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tokens: Vec<NewToken>,
    calculations: Vec<Calculation>,
    error_logs: Vec<OffsetDateTime>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_snapshots: AtomicBool,
    snapshot_calls: AtomicUsize,
    blind_lookups: AtomicBool,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn seed_user(&self, email: &str, plain_password: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            name: None,
            password_hash: password::hash_password(plain_password).unwrap(),
            login_time: None,
            logout_time: None,
            price_history: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.tables().users.push(user.clone());
        user
    }

    pub fn put_token(&self, token: NewToken) {
        self.tables().tokens.push(token);
    }

    pub fn token_count(&self, kind: TokenKind) -> usize {
        self.tables().tokens.iter().filter(|t| t.kind == kind).count()
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.tables().users.iter().find(|u| u.email == email).cloned()
    }

    pub fn set_price_history(&self, user_id: Uuid, blob: &str) {
        if let Some(u) = self.tables().users.iter_mut().find(|u| u.id == user_id) {
            u.price_history = Some(blob.to_owned());
        }
    }

    pub fn fail_snapshots(&self) {
        self.fail_snapshots.store(true, Ordering::SeqCst);
    }

    pub fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    /// Email lookups report no user, as if a concurrent registration had not committed yet.
    pub fn blind_lookups(&self) {
        self.blind_lookups.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthRepo for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        if self.blind_lookups.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.user_by_email(email))
    }

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let mut t = self.tables();
        if t.users.iter().any(|u| u.email == email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            name: name.map(str::to_owned),
            password_hash: password_hash.to_owned(),
            login_time: None,
            logout_time: None,
            price_history: None,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.push(user.clone());
        Ok(Some(user))
    }

    async fn open_session(
        &self,
        user_id: Uuid,
        at: OffsetDateTime,
        tokens: &[NewToken],
    ) -> anyhow::Result<()> {
        let mut t = self.tables();
        if let Some(u) = t.users.iter_mut().find(|u| u.id == user_id) {
            u.login_time = Some(at);
        }
        t.tokens.extend(tokens.iter().cloned());
        Ok(())
    }

    async fn insert_token(&self, token: &NewToken) -> anyhow::Result<()> {
        self.put_token(token.clone());
        Ok(())
    }

    async fn find_token_owner(
        &self,
        kind: TokenKind,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<SessionUser>> {
        let t = self.tables();
        let owner = t
            .tokens
            .iter()
            .find(|row| row.kind == kind && row.token == token && row.is_live_at(now))
            .and_then(|row| t.users.iter().find(|u| u.id == row.user_id))
            .map(SessionUser::from);
        Ok(owner)
    }

    async fn close_session(
        &self,
        user_id: Uuid,
        at: OffsetDateTime,
        auth_tokens: &[&str],
        remember_token: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut t = self.tables();
        if let Some(u) = t.users.iter_mut().find(|u| u.id == user_id) {
            u.logout_time = Some(at);
        }
        t.tokens.retain(|row| {
            let presented = match row.kind {
                TokenKind::Auth => auth_tokens.iter().any(|t| *t == row.token),
                TokenKind::Remember => remember_token == Some(row.token.as_str()),
            };
            !(row.user_id == user_id && presented)
        });
        Ok(())
    }
}

#[async_trait]
impl LedgerRepo for MemoryStore {
    async fn append(&self, entry: &NewCalculation) -> anyhow::Result<Calculation> {
        let mut t = self.tables();
        let row = Calculation {
            id: t.calculations.len() as i64 + 1,
            user_id: entry.user_id,
            created_at: entry.created_at,
            price: entry.price,
            waste_class: entry.waste_class.clone(),
            volume: entry.volume,
        };
        t.calculations.push(row.clone());
        Ok(row)
    }

    async fn recent(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<Calculation>> {
        let mut rows: Vec<Calculation> = self
            .tables()
            .calculations
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn import_legacy_history(&self, user_id: Uuid) -> anyhow::Result<usize> {
        let blob = {
            let mut t = self.tables();
            match t.users.iter_mut().find(|u| u.id == user_id) {
                Some(u) => u.price_history.take(),
                None => None,
            }
        };
        let Some(blob) = blob.filter(|b| !b.trim().is_empty()) else {
            return Ok(0);
        };
        let entries = legacy_entries(user_id, &blob);
        for e in &entries {
            self.append(e).await?;
        }
        Ok(entries.len())
    }
}

#[async_trait]
impl MetricsRepo for MemoryStore {
    async fn snapshot(&self, now: OffsetDateTime) -> anyhow::Result<ActivitySnapshot> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_snapshots.load(Ordering::SeqCst) {
            bail!("snapshot unavailable");
        }
        let t = self.tables();
        let since = window_start(now);
        let minute_ago = now - Duration::minutes(1);
        let today = start_of_day(now);
        Ok(ActivitySnapshot {
            users: t
                .users
                .iter()
                .filter(|u| u.login_time.is_some())
                .map(|u| UserActivity {
                    login_time: u.login_time,
                    logout_time: u.logout_time,
                })
                .collect(),
            calculations: t
                .calculations
                .iter()
                .filter(|c| c.created_at >= since)
                .map(|c| CalculationSample {
                    created_at: c.created_at,
                    price: c.price,
                    waste_class: c.waste_class.clone(),
                    volume: c.volume,
                })
                .collect(),
            errors_last_min: t.error_logs.iter().filter(|at| **at >= minute_ago).count() as i64,
            errors_today: t.error_logs.iter().filter(|at| **at >= today).count() as i64,
        })
    }

    async fn record_error(&self, _context: &str, _message: &str) -> anyhow::Result<()> {
        self.tables().error_logs.push(OffsetDateTime::now_utc());
        Ok(())
    }
}
