//! CLI subcommands.

pub mod admin;
pub mod quote;
pub mod search;
pub mod seed;

use numisma_backend::{BackendClient, BackendConfig, BackendError, ConfigError, Repositories};
use thiserror::Error;

/// Errors shared by the commands that talk to the backend.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("backend: {0}")]
    Backend(#[from] BackendError),

    #[error("BACKEND_SERVICE_KEY must be set; operator commands write other users' rows")]
    MissingServiceKey,
}

/// Repositories bound to the hosted backend with the service key.
///
/// # Errors
///
/// Returns an error if the backend environment is incomplete.
pub fn connect() -> Result<Repositories, CliError> {
    dotenvy::dotenv().ok();
    let config = BackendConfig::from_env()?;
    if config.service_key.is_none() {
        return Err(CliError::MissingServiceKey);
    }
    tracing::info!(url = %config.url, "Connecting to backend");
    let client = BackendClient::new(&config)?;
    Ok(Repositories::rest(&client))
}
