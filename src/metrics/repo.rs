use anyhow::Context;
use async_trait::async_trait;
use time::{Duration, OffsetDateTime, Time};

use crate::db::PgStore;
use crate::metrics::repo_types::{ActivitySnapshot, CalculationSample, UserActivity};

#[async_trait]
pub trait MetricsRepo: Send + Sync {
    async fn snapshot(&self, now: OffsetDateTime) -> anyhow::Result<ActivitySnapshot>;

    async fn record_error(&self, context: &str, message: &str) -> anyhow::Result<()>;
}

pub fn start_of_day(now: OffsetDateTime) -> OffsetDateTime {
    now.replace_time(Time::MIDNIGHT)
}

/// Oldest calculation timestamp a tick at `now` looks at.
pub fn window_start(now: OffsetDateTime) -> OffsetDateTime {
    start_of_day(now).min(now - Duration::hours(1))
}

#[async_trait]
impl MetricsRepo for PgStore {
    async fn snapshot(&self, now: OffsetDateTime) -> anyhow::Result<ActivitySnapshot> {
        // Own connection, separate from request traffic.
        let mut conn = self.pool.acquire().await.context("acquire metrics connection")?;

        let users = sqlx::query_as::<_, UserActivity>(
            "SELECT login_time, logout_time FROM users WHERE login_time IS NOT NULL",
        )
        .fetch_all(&mut *conn)
        .await
        .context("load user activity")?;

        let calculations = sqlx::query_as::<_, CalculationSample>(
            r#"
            SELECT created_at, price, waste_class, volume
              FROM calculations
             WHERE created_at >= $1
             ORDER BY created_at
            "#,
        )
        .bind(window_start(now))
        .fetch_all(&mut *conn)
        .await
        .context("load recent calculations")?;

        let errors_last_min =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM error_logs WHERE created_at >= $1")
                .bind(now - Duration::minutes(1))
                .fetch_one(&mut *conn)
                .await
                .context("count recent errors")?;
        let errors_today =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM error_logs WHERE created_at >= $1")
                .bind(start_of_day(now))
                .fetch_one(&mut *conn)
                .await
                .context("count today's errors")?;

        Ok(ActivitySnapshot {
            users,
            calculations,
            errors_last_min,
            errors_today,
        })
    }

    async fn record_error(&self, context: &str, message: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO error_logs (context, message) VALUES ($1, $2)")
            .bind(context)
            .bind(message)
            .execute(&self.pool)
            .await
            .context("insert error log")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn window_covers_last_hour_across_midnight() {
        let early = datetime!(2024-05-02 00:20:00 UTC);
        assert_eq!(window_start(early), datetime!(2024-05-01 23:20:00 UTC));

        let noon = datetime!(2024-05-02 12:00:00 UTC);
        assert_eq!(window_start(noon), datetime!(2024-05-02 00:00:00 UTC));
    }
}
