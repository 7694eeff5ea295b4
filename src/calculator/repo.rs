use anyhow::Context;
use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::calculator::ledger;
use crate::calculator::repo_types::{Calculation, NewCalculation};
use crate::db::PgStore;

/// Append-only per-user calculation history.
#[async_trait]
pub trait LedgerRepo: Send + Sync {
    async fn append(&self, entry: &NewCalculation) -> anyhow::Result<Calculation>;

    /// Newest first, at most `limit` rows.
    async fn recent(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<Calculation>>;

    /// Moves entries from the legacy `users.price_history` blob into `calculations`
    /// and clears the blob. Returns how many entries were imported.
    async fn import_legacy_history(&self, user_id: Uuid) -> anyhow::Result<usize>;
}

/// Legacy blob entries that survive conversion, oldest first.
pub(crate) fn legacy_entries(user_id: Uuid, blob: &str) -> Vec<NewCalculation> {
    let mut out: Vec<NewCalculation> = ledger::parse_history(blob)
        .filter_map(|entry| {
            let calc = NewCalculation::from_history(user_id, &entry);
            if calc.is_none() {
                warn!(%user_id, timestamp = %entry.timestamp, "legacy history entry dropped");
            }
            calc
        })
        .collect();
    out.reverse();
    out
}

const CALC_COLUMNS: &str = "id, user_id, created_at, price, waste_class, volume";

#[async_trait]
impl LedgerRepo for PgStore {
    async fn append(&self, entry: &NewCalculation) -> anyhow::Result<Calculation> {
        let sql = format!(
            r#"
            INSERT INTO calculations (user_id, created_at, price, waste_class, volume)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CALC_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Calculation>(&sql)
            .bind(entry.user_id)
            .bind(entry.created_at)
            .bind(entry.price)
            .bind(&entry.waste_class)
            .bind(entry.volume)
            .fetch_one(&self.pool)
            .await
            .context("insert calculation")?;
        Ok(row)
    }

    async fn recent(&self, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<Calculation>> {
        let sql = format!(
            r#"
            SELECT {CALC_COLUMNS}
              FROM calculations
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, Calculation>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("list calculations")?;
        Ok(rows)
    }

    async fn import_legacy_history(&self, user_id: Uuid) -> anyhow::Result<usize> {
        let mut tx = self.pool.begin().await.context("begin tx")?;
        let blob: Option<String> = sqlx::query_scalar::<_, Option<String>>(
            "SELECT price_history FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("read legacy price history")?
        .flatten();

        let Some(blob) = blob.filter(|b| !b.trim().is_empty()) else {
            return Ok(0);
        };

        let entries = legacy_entries(user_id, &blob);
        for e in &entries {
            sqlx::query(
                r#"
                INSERT INTO calculations (user_id, created_at, price, waste_class, volume)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(e.user_id)
            .bind(e.created_at)
            .bind(e.price)
            .bind(&e.waste_class)
            .bind(e.volume)
            .execute(&mut *tx)
            .await
            .context("import legacy calculation")?;
        }
        sqlx::query("UPDATE users SET price_history = NULL WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("clear legacy price history")?;
        tx.commit().await.context("commit tx")?;
        Ok(entries.len())
    }
}
