//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_BASE_URL` - Public URL for the admin panel
//! - `BACKEND_URL`, `BACKEND_ANON_KEY` - see [`numisma_backend::config`]
//! - `BACKEND_SERVICE_KEY` - Privileged key; the admin reads and writes every
//!   user's rows, so row-level policies must be bypassed (HIGH PRIVILEGE)
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `BACKEND_MODE` - `rest` (default) or `memory` for a self-contained local run
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use numisma_backend::config::{get_env_or_default, get_optional_env, get_required_env};
use numisma_backend::{BackendConfig, ConfigError};

/// Which backend binding to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendMode {
    #[default]
    Rest,
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

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the admin panel
    pub base_url: String,
    /// Backend binding
    pub backend_mode: BackendMode,
    /// Hosted backend connection with the service key; `None` in memory mode
    pub backend: Option<BackendConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production", "staging")
    pub sentry_environment: Option<String>,
    /// Error event sample rate
    pub sentry_sample_rate: f32,
    /// Performance trace sample rate
    pub sentry_traces_sample_rate: f32,
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the service key is absent in REST mode.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("ADMIN_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ADMIN_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("ADMIN_BASE_URL")?;
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_BASE_URL".to_string(), e.to_string()))?;

        let backend_mode = get_env_or_default("BACKEND_MODE", "rest").parse::<BackendMode>()?;
        let backend = match backend_mode {
            BackendMode::Rest => Some(require_service_key(BackendConfig::from_env()?)?),
            BackendMode::Memory => None,
        };

        Ok(Self {
            host,
            port,
            base_url,
            backend_mode,
            backend,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parse_rate("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    /// Configuration for tests and in-memory runs: no backend, no Sentry.
    #[must_use]
    pub fn for_memory(base_url: &str) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3001,
            base_url: base_url.to_string(),
            backend_mode: BackendMode::Memory,
            backend: None,
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
}

/// The anon key would leave every admin query scoped to the admin's own rows.
fn require_service_key(config: BackendConfig) -> Result<BackendConfig, ConfigError> {
    if config.service_key.is_none() {
        return Err(ConfigError::MissingEnvVar("BACKEND_SERVICE_KEY".to_string()));
    }
    Ok(config)
}

/// Parse a sample rate in `0.0..=1.0`.
fn parse_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    raw.parse::<f32>()
        .ok()
        .filter(|rate| (0.0..=1.0).contains(rate))
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(key.to_string(), format!("`{raw}` is not in 0.0..=1.0"))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;

    fn backend(service_key: Option<&str>) -> BackendConfig {
        BackendConfig {
            url: url::Url::parse("https://abc.backend.test").unwrap(),
            anon_key: SecretString::from("anon"),
            service_key: service_key.map(SecretString::from),
            storage_bucket: "images".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_service_key_required() {
        assert!(matches!(
            require_service_key(backend(None)),
            Err(ConfigError::MissingEnvVar(var)) if var == "BACKEND_SERVICE_KEY"
        ));
        assert!(require_service_key(backend(Some("k3y-Qz9"))).is_ok());
    }

    #[test]
    fn test_memory_config() {
        let config = AdminConfig::for_memory("http://localhost:3001");
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3001");
        assert!(!config.is_secure());
        assert!(config.backend.is_none());
    }
}
