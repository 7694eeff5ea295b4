//! Newline-delimited price history encoding.
//!
//! One entry per line, newest first: `{timestamp}:{price:.2}:{waste_class}:{volume}`.
//! Lines are split from the right, so the timestamp itself may contain `:`.
//! This is the format of the legacy `users.price_history` column and of the
//! history export; live history is kept in the `calculations` table.

use std::fmt::Display;

use serde::Serialize;
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, PrimitiveDateTime};
use tracing::debug;

/// Entries kept per user.
pub const HISTORY_LIMIT: usize = 100;

pub const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceHistoryEntry {
    pub timestamp: String,
    pub price: f64,
    pub waste_class: String,
    pub volume: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerLineError {
    #[error("expected 4 fields, found {0}")]
    MissingFields(usize),
    #[error("invalid price {0:?}")]
    InvalidPrice(String),
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).unwrap_or_default()
}

/// Reads a history timestamp as UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(raw.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

pub fn format_entry(timestamp: &str, price: f64, waste_class: &str, volume: impl Display) -> String {
    format!("{timestamp}:{price:.2}:{waste_class}:{volume}")
}

/// Puts `line` in front of `blob`, drops blank lines and keeps the newest [`HISTORY_LIMIT`].
pub fn prepend_capped(blob: Option<&str>, line: &str) -> String {
    std::iter::once(line)
        .chain(blob.unwrap_or_default().lines())
        .filter(|l| !l.trim().is_empty())
        .take(HISTORY_LIMIT)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse_line(line: &str) -> Result<PriceHistoryEntry, LedgerLineError> {
    let fields: Vec<&str> = line.rsplitn(4, ':').collect();
    let &[volume, waste_class, price, timestamp] = fields.as_slice() else {
        return Err(LedgerLineError::MissingFields(fields.len()));
    };
    let price = price
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .ok_or_else(|| LedgerLineError::InvalidPrice(price.to_string()))?;
    Ok(PriceHistoryEntry {
        timestamp: timestamp.to_string(),
        price,
        waste_class: waste_class.to_string(),
        volume: volume.to_string(),
    })
}

/// Entries in stored order. Malformed lines are skipped, never fatal.
/// Calling it again on the same blob replays the same sequence.
pub fn parse_history(blob: &str) -> impl Iterator<Item = PriceHistoryEntry> + '_ {
    blob.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match parse_line(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "skipping malformed history line");
                None
            }
        })
}
