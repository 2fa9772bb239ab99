//! File-based settings
//!
//! Settings are stored in TOML. Values may reference environment variables
//! with `${VAR}` or `${VAR:-default}`; unset variables are left untouched.
//!
//! ```toml
//! client_name = "workspace-manager"
//!
//! [cleanup]
//! tracking_endpoint = "https://janitor.example.com"
//! access_token = "${JANITOR_TOKEN}"
//! topic = "crl-janitor"
//! cleanup_id = "${CLEANUP_ID:-local}"
//! time_to_live_secs = 3600
//!
//! [polling]
//! interval_secs = 5
//! timeout_secs = 300
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::client::{
    CleanupConfig, ClientConfig, DEFAULT_TIME_TO_LIVE, TrackerCredentials,
};
use super::error::{ConfigError, Result};
use super::resilience::{PollingConfig, RetryConfig};
use crate::telemetry::{NoopSink, TelemetrySink};

/// Top-level settings file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Identifies the caller in telemetry
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Cleanup tracking; absent disables cleanup recording
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupSettings>,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_name: default_client_name(),
            cleanup: None,
            polling: PollingConfig::default(),
            retry: RetryConfig::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

/// `[cleanup]` table
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CleanupSettings {
    pub tracking_endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub topic: String,
    pub cleanup_id: String,
    #[serde(default = "default_time_to_live_secs")]
    pub time_to_live_secs: u64,
}

impl CleanupSettings {
    /// Validate and convert into the runtime form
    pub fn to_cleanup_config(&self) -> Result<CleanupConfig> {
        let endpoint = Url::parse(&self.tracking_endpoint)
            .map_err(|e| ConfigError::invalid("cleanup.tracking_endpoint", e.to_string()))?;
        if self.topic.trim().is_empty() {
            return Err(ConfigError::invalid("cleanup.topic", "must not be empty"));
        }
        if self.cleanup_id.trim().is_empty() {
            return Err(ConfigError::invalid("cleanup.cleanup_id", "must not be empty"));
        }
        if self.time_to_live_secs == 0 {
            return Err(ConfigError::invalid(
                "cleanup.time_to_live_secs",
                "must be greater than zero",
            ));
        }

        let credentials = match &self.access_token {
            Some(token) if !token.is_empty() => TrackerCredentials::BearerToken(token.clone()),
            _ => TrackerCredentials::None,
        };

        Ok(
            CleanupConfig::new(endpoint, self.topic.clone(), self.cleanup_id.clone())
                .time_to_live(Duration::from_secs(self.time_to_live_secs))
                .credentials(credentials),
        )
    }
}

/// `[telemetry]` table
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TelemetrySettings {
    /// When false, records go to a no-op sink
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Settings {
    /// Load settings from a specific path
    ///
    /// A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML content, expanding environment variables first
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let settings: Settings = toml::from_str(&expanded)?;
        Ok(settings)
    }

    /// Save settings to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::SaveError {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        fs::write(path, content).map_err(|e| ConfigError::SaveError {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    /// Build the runtime config, sending records to `sink` when telemetry is enabled
    pub fn client_config(&self, sink: Arc<dyn TelemetrySink>) -> Result<ClientConfig> {
        let sink: Arc<dyn TelemetrySink> = if self.telemetry.enabled {
            sink
        } else {
            Arc::new(NoopSink)
        };

        let mut builder = ClientConfig::builder(self.client_name.clone()).sink(sink);
        if let Some(cleanup) = &self.cleanup {
            builder = builder.cleanup(cleanup.to_cleanup_config()?);
        }
        Ok(builder.build())
    }

    /// Expand environment variables in settings content
    ///
    /// Supports ${VAR} and ${VAR:-default} syntax.
    fn expand_env_vars(content: &str) -> String {
        // Unset variables stay as-is instead of failing the whole file
        let expanded =
            shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok());
        expanded.to_string()
    }
}

fn default_client_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_true() -> bool {
    true
}

fn default_time_to_live_secs() -> u64 {
    DEFAULT_TIME_TO_LIVE.as_secs()
}
