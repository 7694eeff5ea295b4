use anyhow::Context;
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewToken, SessionUser, TokenKind, User};
use crate::db::PgStore;

/// Users and their auth/remember tokens.
#[async_trait]
pub trait AuthRepo: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// `None` when the email is already taken, including by a concurrent insert.
    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>>;

    /// Records the login time and stores every token in one transaction.
    async fn open_session(
        &self,
        user_id: Uuid,
        at: OffsetDateTime,
        tokens: &[NewToken],
    ) -> anyhow::Result<()>;

    async fn insert_token(&self, token: &NewToken) -> anyhow::Result<()>;

    /// Owner of a token that has not expired at `now`. Expired rows are left in place.
    async fn find_token_owner(
        &self,
        kind: TokenKind,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<SessionUser>>;

    /// Records the logout time and deletes the given tokens, only where owned by `user_id`.
    /// `auth_tokens` may hold both the presented cookie and a token minted by a refresh.
    async fn close_session(
        &self,
        user_id: Uuid,
        at: OffsetDateTime,
        auth_tokens: &[&str],
        remember_token: Option<&str>,
    ) -> anyhow::Result<()>;
}

const USER_COLUMNS: &str =
    "id, email, name, password_hash, login_time, logout_time, price_history, created_at";

#[async_trait]
impl AuthRepo for PgStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("find user by email")?;
        Ok(user)
    }

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            r#"
            INSERT INTO users (email, name, password_hash) VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(name)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await
            .context("insert user")?;
        Ok(user)
    }

    async fn open_session(
        &self,
        user_id: Uuid,
        at: OffsetDateTime,
        tokens: &[NewToken],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        sqlx::query("UPDATE users SET login_time = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&mut *tx)
            .await
            .context("record login time")?;
        for t in tokens {
            insert_token_tx(&mut tx, t).await?;
        }
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn insert_token(&self, token: &NewToken) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        insert_token_tx(&mut tx, token).await?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn find_token_owner(
        &self,
        kind: TokenKind,
        token: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<SessionUser>> {
        let sql = format!(
            r#"
            SELECT u.id, u.email
              FROM {} t
              JOIN users u ON u.id = t.user_id
             WHERE t.token = $1 AND t.expires_at > $2
            "#,
            kind.table()
        );
        let owner = sqlx::query_as::<_, SessionUser>(&sql)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("lookup {}", kind.table()))?;
        Ok(owner)
    }

    async fn close_session(
        &self,
        user_id: Uuid,
        at: OffsetDateTime,
        auth_tokens: &[&str],
        remember_token: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        sqlx::query("UPDATE users SET logout_time = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&mut *tx)
            .await
            .context("record logout time")?;

        let doomed = auth_tokens
            .iter()
            .map(|t| (TokenKind::Auth, *t))
            .chain(remember_token.map(|t| (TokenKind::Remember, t)));
        for (kind, token) in doomed {
            let sql = format!(
                "DELETE FROM {} WHERE token = $1 AND user_id = $2",
                kind.table()
            );
            sqlx::query(&sql)
                .bind(token)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("delete from {}", kind.table()))?;
        }

        tx.commit().await.context("commit tx")?;
        Ok(())
    }
}

async fn insert_token_tx(tx: &mut Transaction<'_, Postgres>, t: &NewToken) -> anyhow::Result<()> {
    let sql = format!(
        "INSERT INTO {} (token, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        t.kind.table()
    );
    sqlx::query(&sql)
        .bind(&t.token)
        .bind(t.user_id)
        .bind(t.created_at)
        .bind(t.expires_at)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("insert into {}", t.kind.table()))?;
    Ok(())
}
