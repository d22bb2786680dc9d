//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use dora_core::adapters::story_client::DEFAULT_SHORTCUT_API_URL;
use dora_core::webhook::ShortcutSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Metrics query settings
    pub metrics: MetricsConfig,

    /// Shortcut integration; Shortcut webhooks are rejected when absent
    pub shortcut: Option<ShortcutConfig>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check the loaded configuration for values the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range values and
    /// [`ConfigError::Shortcut`] when the Shortcut block is incomplete.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }

        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be non-zero".to_string(),
            });
        }

        if self.metrics.max_date_range_days < 1 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "metrics.max_date_range_days must be at least 1, got {}",
                    self.metrics.max_date_range_days
                ),
            });
        }

        if let Some(shortcut) = &self.shortcut {
            shortcut.settings()?;
            if shortcut.timeout_seconds == 0 {
                return Err(ConfigError::Invalid {
                    message: "shortcut.timeout_seconds must be non-zero".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB
            enable_cors: true,
        }
    }
}

/// Metrics query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Longest queryable span in days
    pub max_date_range_days: i64,

    /// Keep full metric results per repo and range until new events arrive
    pub cache_results: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_date_range_days: 365,
            cache_results: true,
        }
    }
}

/// Shortcut integration settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    /// API token sent as a bearer token to the story API
    pub api_token: String,

    /// Repository every Shortcut event is attributed to
    pub repo_name: String,

    /// Numeric id of the label marking incident stories
    pub incident_label_id: String,

    /// Story API base URL
    pub api_base_url: String,

    /// Story request timeout in seconds
    pub timeout_seconds: u64,
}

impl ShortcutConfig {
    /// Validate into the settings the Shortcut parser consumes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Shortcut`] naming the blank or invalid setting.
    pub fn settings(&self) -> Result<ShortcutSettings, ConfigError> {
        Ok(ShortcutSettings::new(
            self.api_token.clone(),
            self.repo_name.clone(),
            &self.incident_label_id,
        )?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            repo_name: String::new(),
            incident_label_id: String::new(),
            api_base_url: DEFAULT_SHORTCUT_API_URL.to_string(),
            timeout_seconds: 10,
        }
    }
}

impl fmt::Debug for ShortcutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortcutConfig")
            .field("api_token", &"<REDACTED>")
            .field("repo_name", &self.repo_name)
            .field("incident_label_id", &self.incident_label_id)
            .field("api_base_url", &self.api_base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
