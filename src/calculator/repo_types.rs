use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::calculator::ledger::{self, PriceHistoryEntry};

/// One priced calculation, as stored in `calculations`.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Calculation {
    pub id: i64,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub price: f64,
    pub waste_class: String,
    pub volume: f64,
}

impl Calculation {
    pub fn volume_display(&self) -> String {
        format_volume(self.volume)
    }

    pub fn to_history_line(&self) -> String {
        ledger::format_entry(
            &ledger::format_timestamp(self.created_at),
            self.price,
            &self.waste_class,
            self.volume_display(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCalculation {
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub price: f64,
    pub waste_class: String,
    pub volume: f64,
}

impl NewCalculation {
    /// `None` when the legacy line carries an unreadable timestamp or volume.
    pub fn from_history(user_id: Uuid, entry: &PriceHistoryEntry) -> Option<Self> {
        let created_at = ledger::parse_timestamp(&entry.timestamp)?;
        let volume = entry
            .volume
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())?;
        Some(Self {
            user_id,
            created_at,
            price: entry.price,
            waste_class: entry.waste_class.clone(),
            volume,
        })
    }
}

/// Whole tonnages keep one decimal (`2.0`), the rest print as-is.
pub fn format_volume(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}
