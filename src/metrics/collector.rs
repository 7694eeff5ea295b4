use std::collections::BTreeMap;

use serde::Serialize;
use time::{format_description::FormatItem, macros::format_description, Duration, OffsetDateTime};

use crate::calculator::rates::round2;
use crate::metrics::repo_types::ActivitySnapshot;

const MINUTE_KEY: &[FormatItem<'static>] = format_description!("[year]-[month]-[day] [hour]:[minute]");
const HOUR_KEY: &[FormatItem<'static>] = format_description!("[year]-[month]-[day] [hour]:00");
const DAY_KEY: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bucket {
    pub avg_price: f64,
    pub transactions: usize,
}

impl Bucket {
    fn of(prices: &[f64]) -> Self {
        Self {
            avg_price: round2(mean(prices)),
            transactions: prices.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub current_minute: String,
    pub transactions_last_min: usize,
    pub avg_price_last_min: f64,
    pub avg_volume_last_min: f64,
    pub active_sessions: usize,
    pub new_logins: usize,
    pub errors_last_min: i64,
    pub errors_today: i64,
    pub waste_class_metrics: BTreeMap<String, Bucket>,
    pub hourly_metrics: BTreeMap<String, Bucket>,
    pub daily_metrics: BTreeMap<String, Bucket>,
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn key(now: OffsetDateTime, fmt: &[FormatItem<'_>]) -> String {
    now.format(fmt).unwrap_or_default()
}

/// Folds one snapshot into the per-minute report. Pure in `snapshot` and `now`.
pub fn aggregate(snapshot: &ActivitySnapshot, now: OffsetDateTime) -> MetricsReport {
    let minute_ago = now - Duration::minutes(1);
    let hour_ago = now - Duration::hours(1);

    let mut new_logins = 0;
    let mut active_sessions = 0;
    for u in &snapshot.users {
        let Some(login) = u.login_time else { continue };
        if login >= minute_ago && login <= now {
            new_logins += 1;
        }
        if u.logout_time.map_or(true, |logout| login > logout) {
            active_sessions += 1;
        }
    }

    let mut minute_prices = Vec::new();
    let mut minute_volumes = Vec::new();
    let mut per_class: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut hour_prices = Vec::new();
    let mut day_prices = Vec::new();
    for c in &snapshot.calculations {
        if c.created_at > now {
            continue;
        }
        if c.created_at >= minute_ago {
            minute_prices.push(c.price);
            minute_volumes.push(c.volume);
            per_class
                .entry(c.waste_class.clone())
                .or_default()
                .push(c.price);
        }
        if c.created_at >= hour_ago {
            hour_prices.push(c.price);
        }
        if c.created_at.date() == now.date() {
            day_prices.push(c.price);
        }
    }

    let mut hourly_metrics = BTreeMap::new();
    if !hour_prices.is_empty() {
        hourly_metrics.insert(key(now, HOUR_KEY), Bucket::of(&hour_prices));
    }
    let mut daily_metrics = BTreeMap::new();
    if !day_prices.is_empty() {
        daily_metrics.insert(key(now, DAY_KEY), Bucket::of(&day_prices));
    }

    MetricsReport {
        timestamp: now,
        current_minute: key(now, MINUTE_KEY),
        transactions_last_min: minute_prices.len(),
        avg_price_last_min: round2(mean(&minute_prices)),
        avg_volume_last_min: round2(mean(&minute_volumes)),
        active_sessions,
        new_logins,
        errors_last_min: snapshot.errors_last_min,
        errors_today: snapshot.errors_today,
        waste_class_metrics: per_class
            .into_iter()
            .map(|(class, prices)| (class, Bucket::of(&prices)))
            .collect(),
        hourly_metrics,
        daily_metrics,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::metrics::repo_types::{CalculationSample, UserActivity};

    fn sample(at: OffsetDateTime, price: f64, class: &str, volume: f64) -> CalculationSample {
        CalculationSample {
            created_at: at,
            price,
            waste_class: class.into(),
            volume,
        }
    }

    #[test]
    fn empty_snapshot_reports_zeroes() {
        let now = datetime!(2024-05-01 12:30:15 UTC);
        let r = aggregate(&ActivitySnapshot::default(), now);
        assert_eq!(r.current_minute, "2024-05-01 12:30");
        assert_eq!(r.transactions_last_min, 0);
        assert_eq!(r.avg_price_last_min, 0.0);
        assert!(r.waste_class_metrics.is_empty());
        assert!(r.hourly_metrics.is_empty());
        assert!(r.daily_metrics.is_empty());
    }

    #[test]
    fn sessions_and_logins() {
        let now = datetime!(2024-05-01 12:30:00 UTC);
        let snapshot = ActivitySnapshot {
            users: vec![
                // logged in just now, never logged out
                UserActivity {
                    login_time: Some(now - Duration::seconds(10)),
                    logout_time: None,
                },
                // logged in again after an earlier logout
                UserActivity {
                    login_time: Some(now - Duration::hours(2)),
                    logout_time: Some(now - Duration::hours(3)),
                },
                // logged out
                UserActivity {
                    login_time: Some(now - Duration::hours(2)),
                    logout_time: Some(now - Duration::hours(1)),
                },
                UserActivity {
                    login_time: None,
                    logout_time: None,
                },
            ],
            ..Default::default()
        };
        let r = aggregate(&snapshot, now);
        assert_eq!(r.new_logins, 1);
        assert_eq!(r.active_sessions, 2);
    }

    #[test]
    fn buckets_by_minute_hour_and_day() {
        let now = datetime!(2024-05-01 12:30:00 UTC);
        let snapshot = ActivitySnapshot {
            calculations: vec![
                sample(now - Duration::hours(5), 100.0, "II", 1.0),
                sample(now - Duration::minutes(30), 200.0, "II", 1.0),
                sample(now - Duration::seconds(30), 222_907.36, "I", 1.0),
                sample(now - Duration::seconds(5), 124_936.52, "II", 2.0),
            ],
            errors_last_min: 1,
            errors_today: 4,
            ..Default::default()
        };
        let r = aggregate(&snapshot, now);

        assert_eq!(r.transactions_last_min, 2);
        assert_eq!(r.avg_price_last_min, round2((222_907.36 + 124_936.52) / 2.0));
        assert_eq!(r.avg_volume_last_min, 1.5);
        assert_eq!(r.waste_class_metrics["I"].transactions, 1);
        assert_eq!(r.waste_class_metrics["II"].avg_price, 124_936.52);

        assert_eq!(r.hourly_metrics["2024-05-01 12:00"].transactions, 3);
        assert_eq!(r.daily_metrics["2024-05-01"].transactions, 4);
        assert_eq!(r.errors_last_min, 1);
        assert_eq!(r.errors_today, 4);
    }

    #[test]
    fn yesterday_counts_for_the_hour_but_not_the_day() {
        let now = datetime!(2024-05-02 00:10:00 UTC);
        let snapshot = ActivitySnapshot {
            calculations: vec![sample(now - Duration::minutes(20), 10.0, "I", 1.0)],
            ..Default::default()
        };
        let r = aggregate(&snapshot, now);
        assert_eq!(r.hourly_metrics["2024-05-02 00:00"].transactions, 1);
        assert!(r.daily_metrics.is_empty());
    }

    #[test]
    fn report_serializes_to_json() {
        let now = datetime!(2024-05-01 12:30:00 UTC);
        let r = aggregate(&ActivitySnapshot::default(), now);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["current_minute"], "2024-05-01 12:30");
        assert_eq!(json["timestamp"], "2024-05-01T12:30:00Z");
    }
}
