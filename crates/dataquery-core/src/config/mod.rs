//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod logging;
pub mod query;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::database::{DatabaseConfig, StoreBackend};
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::query::QueryConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (base file + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// Store connection settings.
    #[serde(default)]
    #[validate(nested)]
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Query resolution and paging settings.
    #[serde(default)]
    #[validate(nested)]
    pub query: QueryConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Merges the base file with an optional `<dir>/<env>.toml` overlay
    /// (env taken from `DATAQUERY_ENV`) and environment variables prefixed
    /// with `DATAQUERY__`.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let env = std::env::var("DATAQUERY_ENV").unwrap_or_else(|_| "development".to_string());
        let overlay = std::path::Path::new(path)
            .with_file_name(format!("{env}.toml"))
            .to_string_lossy()
            .into_owned();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::File::with_name(&overlay).required(false))
            .add_source(
                config::Environment::with_prefix("DATAQUERY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let app: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        app.validate()?;
        Ok(app)
    }
}
