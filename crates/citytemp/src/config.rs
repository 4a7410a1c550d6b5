//! Environment-sourced service configuration.

use std::path::PathBuf;

/// Configuration errors. Any of these is fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("WEATHER_API_KEY not set")]
    MissingApiKey,
    #[error("WEATHER_API_URL not set")]
    MissingApiUrl,
}

/// Weather provider endpoint/credentials plus the database location.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key passed as the `key` query parameter.
    pub weather_api_key: String,
    /// Base URL of the current-conditions endpoint.
    pub weather_api_url: String,
    /// SQLite database path.
    pub db_path: PathBuf,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// `WEATHER_API_KEY` and `WEATHER_API_URL` are both required; the
    /// process refuses to start without them. `CITYTEMP_DB` overrides
    /// the default database path of `citytemp.db`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let weather_api_key =
            std::env::var("WEATHER_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;
        let weather_api_url =
            std::env::var("WEATHER_API_URL").map_err(|_| ConfigError::MissingApiUrl)?;
        let db_path = std::env::var("CITYTEMP_DB")
            .unwrap_or_else(|_| "citytemp.db".to_string())
            .into();

        Ok(Self {
            weather_api_key,
            weather_api_url,
            db_path,
        })
    }
}
