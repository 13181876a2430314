//! Configuration validation utilities

use super::env::find_placeholder;
use super::error::{ValidationError, ValidationErrorKind};
use super::schema::CodeweaveConfig;
use tracing::warn;

/// Configuration validator with rules that span the whole document
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &CodeweaveConfig) -> Result<(), ValidationError> {
        config.validate()?;

        self.validate_placeholders(config)?;
        self.validate_enabled(config)?;
        self.warn_on_capabilities(config);

        Ok(())
    }

    /// Reject `${VAR}` placeholders that survived interpolation
    fn validate_placeholders(&self, config: &CodeweaveConfig) -> Result<(), ValidationError> {
        for (i, provider) in config.providers.iter().enumerate() {
            if let Some(placeholder) = find_placeholder(provider.api_key.expose_secret()) {
                return Err(ValidationError::new(
                    format!("providers[{}].api_key", i),
                    ValidationErrorKind::UnresolvedPlaceholder {
                        placeholder: placeholder.to_string(),
                    },
                ));
            }

            if let Some(placeholder) = provider.base_url.as_deref().and_then(find_placeholder) {
                return Err(ValidationError::new(
                    format!("providers[{}].base_url", i),
                    ValidationErrorKind::UnresolvedPlaceholder {
                        placeholder: placeholder.to_string(),
                    },
                ));
            }
        }

        Ok(())
    }

    /// The chain needs at least one enabled provider
    fn validate_enabled(&self, config: &CodeweaveConfig) -> Result<(), ValidationError> {
        let enabled_count = config.providers.iter().filter(|p| p.enabled).count();
        if enabled_count == 0 {
            return Err(ValidationError::new(
                "providers",
                ValidationErrorKind::Custom {
                    message: "At least one provider must be enabled".to_string(),
                },
            ));
        }
        Ok(())
    }

    fn warn_on_capabilities(&self, config: &CodeweaveConfig) {
        let enabled = config.providers.iter().filter(|p| p.enabled);
        if enabled.clone().all(|p| !p.supports_tools) {
            warn!("No enabled provider supports tools; tool declarations will never be sent");
        }
        if enabled.clone().all(|p| !p.supports_streaming) {
            warn!("No enabled provider streams; output arrives only after each response completes");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ConnectionConfig, DefaultConfig, ProviderConfig, RetryConfig};
    use crate::config::secrets::SecretString;
    use crate::providers::adapter::ProviderType;

    fn config_with_key(key: &str, enabled: bool) -> CodeweaveConfig {
        CodeweaveConfig {
            version: "0.1".into(),
            providers: vec![ProviderConfig {
                name: "gemini".into(),
                provider_type: ProviderType::Gemini,
                api_key: SecretString::new(key),
                base_url: None,
                model: "gemini-2.0-flash".into(),
                supports_tools: true,
                supports_streaming: true,
                enabled,
            }],
            retry: RetryConfig::default(),
            connection: ConnectionConfig::default(),
            defaults: DefaultConfig::default(),
        }
    }

    #[test]
    fn test_unresolved_placeholder_is_rejected() {
        let err = ConfigValidator::new()
            .validate(&config_with_key("${GEMINI_API_KEY}", true))
            .unwrap_err();
        assert_eq!(err.field_path, "providers[0].api_key");
        assert!(matches!(err.kind, ValidationErrorKind::UnresolvedPlaceholder { .. }));
    }

    #[test]
    fn test_all_disabled_is_rejected() {
        let err = ConfigValidator::new()
            .validate(&config_with_key("real-key", false))
            .unwrap_err();
        assert_eq!(err.field_path, "providers");
    }

    #[test]
    fn test_valid() {
        assert!(ConfigValidator::new()
            .validate(&config_with_key("real-key", true))
            .is_ok());
    }
}
