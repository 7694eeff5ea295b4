use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, FromRow)]
pub struct UserActivity {
    pub login_time: Option<OffsetDateTime>,
    pub logout_time: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CalculationSample {
    pub created_at: OffsetDateTime,
    pub price: f64,
    pub waste_class: String,
    pub volume: f64,
}

/// Everything one metrics tick needs, read in a single pass.
#[derive(Debug, Clone, Default)]
pub struct ActivitySnapshot {
    pub users: Vec<UserActivity>,
    /// Calculations since the earlier of midnight UTC and one hour ago.
    pub calculations: Vec<CalculationSample>,
    pub errors_last_min: i64,
    pub errors_today: i64,
}
