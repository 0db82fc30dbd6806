//! Configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use storefront_pipeline::application::retry::RetryPolicy;
use storefront_pipeline::application::router::{DEFAULT_EVENT_TTL_SECS, RouterSettings};
use storefront_pipeline::application::transaction_handlers::DEFAULT_TRANSACTION_TTL_SECS;

use crate::error::AppError;

/// Upper bound accepted for any configured lifetime: ten years.
const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 3600;

/// Default retention of delivered-notification ledger keys.
pub const DEFAULT_LEDGER_RETENTION_SECS: i64 = 24 * 3600;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Base URL of the socket gateway's connection-management API.
    pub channel_gateway_url: String,
    /// Endpoint accepting audit records.
    pub audit_bus_url: String,
    /// Router settings.
    pub router: RouterSettings,
    /// Retry settings for delivered batches.
    pub retry: RetryPolicy,
    /// Lifetime of an open transaction.
    pub transaction_ttl: chrono::Duration,
    /// How long delivered-notification keys are kept.
    pub ledger_retention: chrono::Duration,
    /// Interval of the expiry sweeper. `None` disables it.
    pub sweep_interval: Option<Duration>,
    /// OTLP collector endpoint. Trace export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let event_ttl = ttl_or(&lookup, "EVENT_TTL_SECS", DEFAULT_EVENT_TTL_SECS)?;
        let transaction_ttl = ttl_or(&lookup, "TRANSACTION_TTL_SECS", DEFAULT_TRANSACTION_TTL_SECS)?;
        let ledger_retention =
            ttl_or(&lookup, "LEDGER_RETENTION_SECS", DEFAULT_LEDGER_RETENTION_SECS)?;
        let sweep_interval_secs: u64 = parse_or(&lookup, "SWEEP_INTERVAL_SECS", 30)?;
        let defaults = RetryPolicy::default();

        let batch_size: usize = parse_or(&lookup, "BATCH_SIZE", defaults.batch_size)?;
        if batch_size == 0 {
            return Err(AppError::Config("BATCH_SIZE must be at least 1".into()));
        }

        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(&lookup, "PORT", 3000)?,
            channel_gateway_url: required(&lookup, "CHANNEL_GATEWAY_URL")?,
            audit_bus_url: required(&lookup, "AUDIT_BUS_URL")?,
            router: RouterSettings {
                event_ttl,
                audit_bus_name: lookup("AUDIT_BUS_NAME").unwrap_or_else(|| "audit".to_owned()),
            },
            retry: RetryPolicy {
                max_retries: parse_or(&lookup, "RETRY_ATTEMPTS", defaults.max_retries)?,
                bisect_on_error: parse_or(&lookup, "BISECT_ON_ERROR", defaults.bisect_on_error)?,
                batch_size,
                base_backoff: Duration::from_millis(parse_or(&lookup, "RETRY_BACKOFF_MS", 100)?),
            },
            transaction_ttl,
            ledger_retention,
            sweep_interval: (sweep_interval_secs > 0)
                .then(|| Duration::from_secs(sweep_interval_secs)),
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.is_empty()),
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, AppError> {
    lookup(key).ok_or_else(|| AppError::Config(format!("{key} environment variable must be set")))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}

/// Reads a lifetime in whole seconds, bounded to `1..=MAX_TTL_SECS`.
fn ttl_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default_secs: i64,
) -> Result<chrono::Duration, AppError> {
    let secs: i64 = parse_or(lookup, key, default_secs)?;
    if !(1..=MAX_TTL_SECS).contains(&secs) {
        return Err(AppError::Config(format!(
            "{key} must be between 1 and {MAX_TTL_SECS} seconds"
        )));
    }
    chrono::Duration::try_seconds(secs)
        .ok_or_else(|| AppError::Config(format!("{key} is out of range")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/storefront"),
        ("CHANNEL_GATEWAY_URL", "http://gateway/prod"),
        ("AUDIT_BUS_URL", "http://bus/events"),
    ];

    #[test]
    fn test_defaults_apply_when_only_required_vars_set() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.router.event_ttl, chrono::Duration::seconds(3600));
        assert_eq!(config.router.audit_bus_name, "audit");
        assert_eq!(config.transaction_ttl, chrono::Duration::seconds(120));
        assert_eq!(config.ledger_retention, chrono::Duration::seconds(86_400));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(30)));
        assert!(config.otlp_endpoint.is_none());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("PORT", "8080"),
            ("BATCH_SIZE", "10"),
            ("BISECT_ON_ERROR", "false"),
            ("RETRY_ATTEMPTS", "5"),
            ("SWEEP_INTERVAL_SECS", "0"),
        ]);

        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.retry.batch_size, 10);
        assert!(!config.retry.bisect_on_error);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.sweep_interval, None);
    }

    #[test]
    fn test_missing_database_url_is_config_error() {
        let result = AppConfig::from_lookup(lookup(&REQUIRED[1..]));

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("DATABASE_URL")));
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "not-a-port"));

        let result = AppConfig::from_lookup(lookup(&pairs));

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("PORT")));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BATCH_SIZE", "0"));

        assert!(matches!(
            AppConfig::from_lookup(lookup(&pairs)),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_out_of_range_ttls_are_rejected() {
        for (key, value) in [
            ("EVENT_TTL_SECS", "-5"),
            ("EVENT_TTL_SECS", "0"),
            ("TRANSACTION_TTL_SECS", "9223372036854775807"),
            ("LEDGER_RETENTION_SECS", "-1"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, value));

            let result = AppConfig::from_lookup(lookup(&pairs));

            assert!(
                matches!(&result, Err(AppError::Config(msg)) if msg.contains(key)),
                "{key}={value} should be rejected"
            );
        }
    }
}
