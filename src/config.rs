use std::str::FromStr;

use serde::Deserialize;
use time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub auth_ttl_hours: i64,
    pub remember_ttl_days: i64,
    /// Adds the `Secure` attribute to session cookies. Off in local/debug runs.
    pub secure_cookies: bool,
}

impl SessionConfig {
    pub fn auth_ttl(&self) -> Duration {
        Duration::hours(self.auth_ttl_hours)
    }

    pub fn remember_ttl(&self) -> Duration {
        Duration::days(self.remember_ttl_days)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub session: SessionConfig,
    pub metrics_interval_secs: u64,
    /// Argon2 PHC string; `/admin/metrics` is disabled when unset.
    pub admin_password_hash: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let debug = std::env::var("APP_DEBUG")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let session = SessionConfig {
            auth_ttl_hours: env_or("AUTH_TOKEN_TTL_HOURS", 24),
            remember_ttl_days: env_or("REMEMBER_TOKEN_TTL_DAYS", 30),
            secure_cookies: !debug,
        };
        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            debug,
            session,
            metrics_interval_secs: env_or("METRICS_INTERVAL_SECS", 60),
            admin_password_hash: std::env::var("ADMIN_PASSWORD_HASH")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flag_accepts_common_truthy_values() {
        for v in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(parse_flag(v), "{v:?} should be truthy");
        }
        for v in ["0", "false", "", "off", "nope"] {
            assert!(!parse_flag(v), "{v:?} should be falsy");
        }
    }

    #[test]
    fn session_ttls_are_hours_and_days() {
        let cfg = SessionConfig {
            auth_ttl_hours: 24,
            remember_ttl_days: 30,
            secure_cookies: true,
        };
        assert_eq!(cfg.auth_ttl(), Duration::days(1));
        assert_eq!(cfg.remember_ttl().whole_days(), 30);
    }

    #[test]
    fn env_or_falls_back_on_missing_key() {
        let v: u64 = env_or("WASTE_PORTAL_TEST_SURELY_UNSET_KEY", 42);
        assert_eq!(v, 42);
    }
}
