use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub database_max_connections: u32,
    pub app_base_url: String,
    pub cookie_secure: bool,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub session_refresh_ttl_hours: i64,
    pub invitation_ttl_days: i64,
    pub mail_from: String,
    pub email_queue_interval_secs: u64,
    pub email_batch_size: i64,
    pub email_max_attempts: i32,
    pub email_retry_base_secs: i64,
    pub reminder_interval_secs: u64,
    pub run_migrations: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".into()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            app_base_url: lookup("APP_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:5173".into()),
            cookie_secure: parse_or(&lookup, "COOKIE_SECURE", false)?,
            access_token_ttl_minutes: parse_or(&lookup, "ACCESS_TOKEN_TTL_MINUTES", 30)?,
            refresh_token_ttl_days: parse_or(&lookup, "REFRESH_TOKEN_TTL_DAYS", 10)?,
            session_refresh_ttl_hours: parse_or(&lookup, "SESSION_REFRESH_TTL_HOURS", 24)?,
            invitation_ttl_days: parse_or(&lookup, "INVITATION_TTL_DAYS", 7)?,
            mail_from: lookup("MAIL_FROM")
                .unwrap_or_else(|| "Taskflow <no-reply@taskflow.local>".into()),
            email_queue_interval_secs: parse_or(&lookup, "EMAIL_QUEUE_INTERVAL_SECS", 30)?,
            email_batch_size: parse_or(&lookup, "EMAIL_BATCH_SIZE", 20)?,
            email_max_attempts: parse_or(&lookup, "EMAIL_MAX_ATTEMPTS", 5)?,
            email_retry_base_secs: parse_or(&lookup, "EMAIL_RETRY_BASE_SECS", 60)?,
            reminder_interval_secs: parse_or(&lookup, "REMINDER_INTERVAL_SECS", 3600)?,
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", true)?,
        })
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_ttl_minutes)
    }

    /// Refresh lifetime: long when the user asked to be remembered.
    pub fn refresh_token_ttl(&self, remember_me: bool) -> Duration {
        if remember_me {
            Duration::days(self.refresh_token_ttl_days)
        } else {
            Duration::hours(self.session_refresh_ttl_hours)
        }
    }

    pub fn invitation_ttl(&self) -> Duration {
        Duration::days(self.invitation_ttl_days)
    }

    pub fn invitation_url(&self, token: &str) -> String {
        format!("{}/invitations/{}", self.app_base_url, token)
    }

    pub fn task_url(&self, workspace_id: i64, task_id: i64) -> String {
        format!("{}/workspaces/{}/tasks/{}", self.app_base_url, workspace_id, task_id)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "mysql://localhost/tf")])).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.access_token_ttl_minutes, 30);
        assert_eq!(config.email_max_attempts, 5);
        assert!(config.run_migrations);
        assert!(!config.cookie_secure);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn malformed_numbers_name_the_key() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://localhost/tf"),
            ("EMAIL_MAX_ATTEMPTS", "many"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "EMAIL_MAX_ATTEMPTS",
                value: "many".into()
            }
        );
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://localhost/tf"),
            ("APP_BASE_URL", "https://app.example.com/"),
        ]))
        .unwrap();
        assert_eq!(
            config.invitation_url("abc"),
            "https://app.example.com/invitations/abc"
        );
    }

    #[test]
    fn refresh_ttl_depends_on_remember_me() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "mysql://localhost/tf")])).unwrap();
        assert_eq!(config.refresh_token_ttl(true), Duration::days(10));
        assert_eq!(config.refresh_token_ttl(false), Duration::hours(24));
    }
}
