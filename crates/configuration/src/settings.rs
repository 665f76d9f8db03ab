use crate::error::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub auth: AuthSettings,
    pub client: ClientSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Rejects values the client cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.api.resolved_base_url();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url must be an http(s) URL, got '{base_url}'"
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.client.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "client.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.client.autocomplete_debounce_ms == 0 {
            return Err(ConfigError::ValidationError(
                "client.autocomplete_debounce_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Named API hosts. The whole client talks to exactly one of them per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ApiEnvironment {
    #[default]
    Production,
    Local,
}

impl ApiEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            ApiEnvironment::Production => "https://api.richacle.com",
            ApiEnvironment::Local => "http://127.0.0.1:8000",
        }
    }
}

/// Where the platform API lives and how long to wait for it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Preset host, used when `base_url` is not set.
    pub environment: ApiEnvironment,
    /// Explicit host; overrides `environment`.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            environment: ApiEnvironment::default(),
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl ApiSettings {
    /// The single base URL every request is built from, without a trailing slash.
    pub fn resolved_base_url(&self) -> String {
        match self.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => self.environment.base_url().to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The hosted identity provider that issues sessions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Project URL of the identity provider, e.g. `https://<project>.supabase.co`.
    pub url: String,
    /// Public (anon) key sent as the `apikey` header.
    pub anon_key: String,
    /// Where the signed-in session is persisted between runs.
    pub session_file: Option<PathBuf>,
}

impl AuthSettings {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }

    pub fn session_path(&self) -> PathBuf {
        match &self.session_file {
            Some(path) => path.clone(),
            None => dirs::config_dir()
                .map(|dir| dir.join("richacle").join("session.json"))
                .unwrap_or_else(|| PathBuf::from(".richacle-session.json")),
        }
    }
}

/// Timings for the interactive views.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// How often the account snapshot is re-fetched.
    pub poll_interval_secs: u64,
    /// Quiet period after the last edit before the copilot is asked for a suggestion.
    pub autocomplete_debounce_ms: u64,
    /// The copilot only runs once the trimmed description is longer than this.
    pub autocomplete_min_chars: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            autocomplete_debounce_ms: 800,
            autocomplete_min_chars: 8,
        }
    }
}

impl ClientSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn autocomplete_debounce(&self) -> Duration {
        Duration::from_millis(self.autocomplete_debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is not set.
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}
