//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::SecretString;
use crate::providers::adapter::ProviderType;
use crate::providers::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Supported schema version
pub const SCHEMA_VERSION: &str = "0.1";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CodeweaveConfig {
    /// Schema version (required - no default)
    pub version: String,

    /// Providers in failover priority order
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Rate-limit retry bounds applied to every provider
    #[serde(default)]
    pub retry: RetryConfig,

    /// Global connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Global generation defaults
    #[serde(default)]
    pub defaults: DefaultConfig,
}

/// One completion backend
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Unique provider name
    pub name: String,

    /// Wire format (gemini, openai)
    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// API key (supports environment variable interpolation)
    pub api_key: SecretString,

    /// Base URL; defaults per provider type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model requested from this provider
    pub model: String,

    /// Whether tool declarations may be sent
    #[serde(default = "default_true")]
    pub supports_tools: bool,

    /// Whether to invoke the provider in streaming mode
    #[serde(default = "default_true")]
    pub supports_streaming: bool,

    /// Whether this provider takes part in the chain
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProviderConfig {
    /// Configured base URL or the provider type's default
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider_type.default_base_url())
    }
}

/// Retry bounds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            jitter_ms: default_jitter(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::new(config.max_retries)
            .with_delays(config.initial_delay_ms, config.max_delay_ms)
            .with_jitter(config.jitter_ms)
    }
}

/// Connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Whole-request timeout in milliseconds; covers streamed bodies too
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_idle_per_host: default_max_idle(),
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Default generation parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: None,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool { true }
fn default_temperature() -> f32 { 0.7 }
fn default_max_retries() -> u32 { 3 }
fn default_initial_delay() -> u64 { 2000 }
fn default_max_delay() -> u64 { 10000 }
fn default_jitter() -> u64 { 1000 }
fn default_connect_timeout() -> u64 { 10000 }
fn default_request_timeout() -> u64 { 120000 }
fn default_max_idle() -> usize { 10 }

impl CodeweaveConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != SCHEMA_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: SCHEMA_VERSION.to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        if self.providers.is_empty() {
            return Err(ValidationError::required("providers")
                .with_context("At least one provider must be configured"));
        }

        let mut seen_names = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if !seen_names.insert(&provider.name) {
                return Err(ValidationError::new(
                    format!("providers[{}].name", i),
                    ValidationErrorKind::DuplicateValue {
                        value: provider.name.clone(),
                    },
                ));
            }

            provider.validate(&format!("providers[{}]", i))?;
        }

        self.retry.validate("retry")?;
        self.connection.validate("connection")?;
        self.defaults.validate("defaults")?;

        Ok(())
    }
}

impl ProviderConfig {
    /// Validate provider configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::required(format!("{}.name", path)));
        }

        if self.api_key.is_empty() {
            return Err(ValidationError::required(format!("{}.api_key", path)));
        }

        if self.model.trim().is_empty() {
            return Err(ValidationError::required(format!("{}.model", path)));
        }

        if let Some(base_url) = &self.base_url {
            match url::Url::parse(base_url) {
                Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
                Ok(url) => {
                    return Err(ValidationError::new(
                        format!("{}.base_url", path),
                        ValidationErrorKind::InvalidUrl {
                            message: format!("unsupported scheme '{}'", url.scheme()),
                        },
                    ));
                }
                Err(e) => {
                    return Err(ValidationError::new(
                        format!("{}.base_url", path),
                        ValidationErrorKind::InvalidUrl {
                            message: e.to_string(),
                        },
                    ));
                }
            }
        }

        Ok(())
    }
}

impl RetryConfig {
    /// Validate retry bounds
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.initial_delay_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.initial_delay_ms", path),
                "Initial delay must be greater than 0",
            ));
        }

        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ValidationError::out_of_range(
                format!("{}.max_delay_ms", path),
                "Max delay must be greater than or equal to initial delay",
            ));
        }

        Ok(())
    }
}

impl ConnectionConfig {
    /// Validate timeouts and pool size
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.connect_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.connect_timeout_ms", path),
                "Connect timeout must be greater than 0",
            ));
        }

        if self.request_timeout_ms < self.connect_timeout_ms {
            return Err(ValidationError::out_of_range(
                format!("{}.request_timeout_ms", path),
                "Request timeout must be at least the connect timeout",
            ));
        }

        Ok(())
    }
}

impl DefaultConfig {
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::out_of_range(
                format!("{}.temperature", path),
                "Temperature must be between 0.0 and 2.0",
            ));
        }

        if self.max_output_tokens == Some(0) {
            return Err(ValidationError::out_of_range(
                format!("{}.max_output_tokens", path),
                "Max output tokens must be greater than 0",
            ));
        }

        Ok(())
    }
}
