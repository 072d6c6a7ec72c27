//! Application configuration loaded from environment variables.

use domain::{DEFAULT_CART_EXPIRATION_DAYS, Currency};
use notifications::DEFAULT_LOW_STOCK_THRESHOLD;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Plain
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `plain` or `json` (default: `plain`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs in memory
/// - `LOW_STOCK_THRESHOLD`: stock level that raises an alert (default: `5`)
/// - `CART_EXPIRATION_DAYS`: lifetime of new carts (default: `30`)
/// - `RETRY_MAX_ATTEMPTS`: attempts per use case on write conflicts (default: `3`)
/// - `DEFAULT_CURRENCY`: currency for prices given without one (default: `BHD`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub low_stock_threshold: u32,
    pub cart_expiration_days: u32,
    pub retry_max_attempts: u32,
    pub default_currency: Currency,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key lookup. Unparseable values fall
    /// back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            low_stock_threshold: parsed("LOW_STOCK_THRESHOLD", defaults.low_stock_threshold),
            cart_expiration_days: parsed("CART_EXPIRATION_DAYS", defaults.cart_expiration_days)
                .max(1),
            retry_max_attempts: parsed("RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts).max(1),
            default_currency: lookup("DEFAULT_CURRENCY")
                .and_then(|code| Currency::new(&code).ok())
                .unwrap_or(defaults.default_currency),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Plain,
            database_url: None,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            cart_expiration_days: DEFAULT_CART_EXPIRATION_DAYS,
            retry_max_attempts: 3,
            default_currency: Currency::BHD,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Plain);
        assert!(config.database_url.is_none());
        assert_eq!(config.low_stock_threshold, 5);
        assert_eq!(config.cart_expiration_days, 30);
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.default_currency.as_str(), "BHD");
    }

    #[test]
    fn test_values_from_environment() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("LOW_STOCK_THRESHOLD", "12"),
            ("RETRY_MAX_ATTEMPTS", "0"),
            ("DEFAULT_CURRENCY", "usd"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/orders"));
        assert_eq!(config.low_stock_threshold, 12);
        assert_eq!(config.retry_max_attempts, 1);
        assert_eq!(config.default_currency.as_str(), "USD");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("CART_EXPIRATION_DAYS", "-4"),
            ("DEFAULT_CURRENCY", "dollars"),
            ("DATABASE_URL", "  "),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.cart_expiration_days, 30);
        assert_eq!(config.default_currency.as_str(), "BHD");
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
