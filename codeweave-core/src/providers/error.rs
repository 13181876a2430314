//! Provider error types

use thiserror::Error;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors that can occur when invoking a provider or consuming its stream
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Rate limit or quota exhausted
    #[error("Rate limit exceeded: {message}")]
    RateLimit { message: String },

    /// Provider refused the content on safety grounds
    #[error("Content blocked by safety filter: {reason}")]
    SafetyBlocked { reason: String },

    /// Credentials rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Connection or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Syntactically successful call with an unusable payload
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Non-success HTTP status not covered by a more specific variant
    #[error("Provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Provider could not be constructed or invoked as configured
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rate-limit retries ran out; wraps the last underlying error
    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ProviderError>,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }

    pub fn safety(reason: impl Into<String>) -> Self {
        Self::SafetyBlocked {
            reason: reason.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// The innermost error, looking through `RetriesExhausted`
    pub fn root(&self) -> &ProviderError {
        match self {
            Self::RetriesExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ProviderError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            ProviderError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                401 | 403 => ProviderError::Authentication(err.to_string()),
                429 => ProviderError::RateLimit {
                    message: err.to_string(),
                },
                code => ProviderError::Api {
                    status: code,
                    message: err.to_string(),
                },
            }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::MalformedResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_keeps_source_message() {
        let err = ProviderError::RetriesExhausted {
            attempts: 4,
            source: Box::new(ProviderError::rate_limit("429 Too Many Requests")),
        };

        let message = err.to_string();
        assert!(message.contains("4 attempts"));
        assert!(message.contains("429 Too Many Requests"));
        assert!(matches!(err.root(), ProviderError::RateLimit { .. }));
    }

    #[test]
    fn test_serde_error_is_malformed() {
        let err: ProviderError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }
}
