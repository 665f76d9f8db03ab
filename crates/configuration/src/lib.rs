use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;
pub mod telemetry;

// Re-export the core types to provide a clean public API.
pub use settings::{
    ApiEnvironment, ApiSettings, AuthSettings, ClientSettings, LoggingSettings, Settings,
};

/// The file read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "richacle.toml";

/// Prefix for environment overrides, e.g. `RICHACLE_API__BASE_URL`.
pub const ENV_PREFIX: &str = "RICHACLE";

/// Loads the application configuration from `path` and the environment.
///
/// This function is the primary entry point for this crate. The file is optional;
/// every setting has a default, and `RICHACLE_*` variables win over the file.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    build_settings(path, None)
}

fn build_settings(
    path: &Path,
    env_override: Option<config::Map<String, String>>,
) -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env_override),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Settings` struct
    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;

    Ok(settings)
}
