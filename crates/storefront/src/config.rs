//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (OAuth redirects)
//! - `PAYMENT_UPI_ID` - Payee address encoded into payment QR codes
//! - `BACKEND_URL`, `BACKEND_ANON_KEY` - see [`numisma_backend::config`]
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_CONTENT_DIR` - Course markdown root (default: crates/storefront/content)
//! - `PAYMENT_PAYEE_NAME` - Name shown in the payment app (default: Numisma)
//! - `BACKEND_MODE` - `rest` (default) or `memory` for a self-contained local run
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use numisma_backend::config::{get_env_or_default, get_optional_env, get_required_env};
use numisma_backend::{BackendConfig, ConfigError};

/// Which backend binding to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendMode {
    /// Hosted backend over REST.
    #[default]
    Rest,
    /// Everything in process; nothing persists across restarts.
    Memory,
}

impl FromStr for BackendMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidEnvVar(
                "BACKEND_MODE".to_string(),
                format!("expected `rest` or `memory`, got `{other}`"),
            )),
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Directory holding `courses/*.md`
    pub content_dir: PathBuf,
    /// Backend binding
    pub backend_mode: BackendMode,
    /// Hosted backend connection; `None` in memory mode
    pub backend: Option<BackendConfig>,
    /// QR payment settings
    pub payment: PaymentConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production", "staging")
    pub sentry_environment: Option<String>,
    /// Error event sample rate
    pub sentry_sample_rate: f32,
    /// Performance trace sample rate
    pub sentry_traces_sample_rate: f32,
}

/// QR payment settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfig {
    /// Payee virtual payment address
    pub upi_id: String,
    /// Payee display name
    pub payee_name: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            upi_id: "numisma@upi".to_string(),
            payee_name: "Numisma".to_string(),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if backend keys fail validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;
        let content_dir = PathBuf::from(get_env_or_default(
            "STOREFRONT_CONTENT_DIR",
            "crates/storefront/content",
        ));

        let backend_mode = get_env_or_default("BACKEND_MODE", "rest").parse::<BackendMode>()?;
        let backend = match backend_mode {
            BackendMode::Rest => Some(BackendConfig::from_env()?),
            BackendMode::Memory => None,
        };

        let payment = match backend_mode {
            BackendMode::Rest => PaymentConfig {
                upi_id: get_required_env("PAYMENT_UPI_ID")?,
                payee_name: get_env_or_default("PAYMENT_PAYEE_NAME", "Numisma"),
            },
            BackendMode::Memory => PaymentConfig {
                upi_id: get_env_or_default("PAYMENT_UPI_ID", "numisma@upi"),
                payee_name: get_env_or_default("PAYMENT_PAYEE_NAME", "Numisma"),
            },
        };

        Ok(Self {
            host,
            port,
            base_url,
            content_dir,
            backend_mode,
            backend,
            payment,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parse_rate("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    /// Configuration for tests and in-memory runs: no backend, no Sentry.
    #[must_use]
    pub fn for_memory(base_url: &str, content_dir: PathBuf) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: base_url.to_string(),
            content_dir,
            backend_mode: BackendMode::Memory,
            backend: None,
            payment: PaymentConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Absolute URL for a path on this site.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Parse a sample rate in `0.0..=1.0`.
fn parse_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    raw.parse::<f32>()
        .ok()
        .filter(|rate| (0.0..=1.0).contains(rate))
        .ok_or_else(|| ConfigError::InvalidEnvVar(key.to_string(), format!("`{raw}` is not in 0.0..=1.0")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_mode_parse() {
        assert_eq!("memory".parse::<BackendMode>().unwrap(), BackendMode::Memory);
        assert_eq!(" REST ".parse::<BackendMode>().unwrap(), BackendMode::Rest);
        assert!("postgres".parse::<BackendMode>().is_err());
    }

    #[test]
    fn test_absolute_url() {
        let config = StorefrontConfig::for_memory("http://localhost:3000/", PathBuf::from("content"));
        assert_eq!(
            config.absolute_url("/auth/callback"),
            "http://localhost:3000/auth/callback"
        );
        assert!(!config.is_secure());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig::for_memory("https://numisma.test", PathBuf::from("content"));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert!(config.is_secure());
    }
}
