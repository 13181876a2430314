//! Configuration loading and resolution
//!
//! This module parses the provider priority list, retry bounds and
//! connection settings from YAML or JSON, interpolates `${VAR}` references
//! from the environment, validates the result and resolves it into the
//! read-only provider descriptors the orchestrator runs on.

mod env;
mod error;
mod schema;
pub mod secrets;
mod validator;

pub use env::interpolate_env_vars;
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    CodeweaveConfig, ConnectionConfig, DefaultConfig, ProviderConfig, RetryConfig, SCHEMA_VERSION,
};
pub use secrets::SecretString;
pub use validator::ConfigValidator;

use crate::http::HttpClient;
use crate::providers::adapter::{Provider, ProviderDescriptor, ProviderType};
use crate::providers::gemini::GeminiProvider;
use crate::providers::openai::OpenAIProvider;
use crate::providers::retry::RetryPolicy;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<CodeweaveConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_yaml(&content, &path.to_string_lossy())
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<CodeweaveConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_json(&content, &path.to_string_lossy())
}

/// Load a configuration, choosing the format from the file extension
pub fn load_from_path<P: AsRef<Path>>(path: P) -> ConfigResult<CodeweaveConfig> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => load_from_yaml(path),
        Some("json") => load_from_json(path),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_string_lossy().to_string(),
        }),
    }
}

/// Parse YAML text; `origin` names the source in error messages
pub fn parse_yaml(content: &str, origin: &str) -> ConfigResult<CodeweaveConfig> {
    // Interpolate environment variables before parsing
    let interpolated = env::interpolate_env_vars(content)?;

    let config: CodeweaveConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: origin.to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Parse JSON text; `origin` names the source in error messages
pub fn parse_json(content: &str, origin: &str) -> ConfigResult<CodeweaveConfig> {
    let interpolated = env::interpolate_env_vars(content)?;

    let config: CodeweaveConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: origin.to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

impl CodeweaveConfig {
    /// Retry policy shared by every provider
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    /// Build the pooled HTTP client from the connection settings
    pub fn http_client(&self) -> ConfigResult<HttpClient> {
        Ok(HttpClient::with_config(
            self.connection.connect_timeout(),
            self.connection.request_timeout(),
            self.connection.max_idle_per_host,
        )?)
    }

    /// Resolve enabled providers, in priority order, into descriptors
    pub fn resolve_descriptors(&self, http: &HttpClient) -> Vec<ProviderDescriptor> {
        let descriptors: Vec<ProviderDescriptor> = self
            .providers
            .iter()
            .filter(|p| {
                if !p.enabled {
                    debug!(provider = %p.name, "Skipping disabled provider");
                }
                p.enabled
            })
            .map(|p| {
                ProviderDescriptor::new(p.name.clone(), create_provider(p, http.clone()), p.model.clone())
                    .with_tools(p.supports_tools)
                    .with_streaming(p.supports_streaming)
            })
            .collect();

        info!(
            providers = ?descriptors.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            "Resolved provider chain"
        );
        descriptors
    }
}

/// Construct the adapter for one configured provider
pub fn create_provider(config: &ProviderConfig, http: HttpClient) -> Arc<dyn Provider> {
    let base_url = config.effective_base_url().to_string();
    match config.provider_type {
        ProviderType::Gemini => Arc::new(GeminiProvider::new(
            config.name.clone(),
            base_url,
            config.api_key.clone(),
            http,
        )),
        ProviderType::OpenAI => Arc::new(OpenAIProvider::new(
            config.name.clone(),
            base_url,
            config.api_key.clone(),
            http,
        )),
    }
}
