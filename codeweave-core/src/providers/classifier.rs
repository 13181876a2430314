//! Response and error classification
//!
//! Maps raw provider errors and payloads onto the caller-facing error
//! taxonomy. Detection runs in a fixed priority order: safety, rate
//! limiting, malformed output, authentication, network, unknown.

use crate::providers::error::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Substrings that mark a capacity-class failure
const RATE_LIMIT_MARKERS: &[&str] = &["rate limit", "429", "resource has been exhausted"];

/// Structured safety error codes returned in payloads
const SAFETY_CODES: &[&str] = &["SAFETY_VIOLATION", "PLATFORM_SECURITY_VIOLATION"];

const SAFETY_MARKERS: &[&str] = &[
    "safety_violation",
    "platform_security_violation",
    "blocked by safety",
];

const AUTH_MARKERS: &[&str] = &[
    "api key not valid",
    "invalid api key",
    "invalid_api_key",
    "unauthorized",
    "unauthenticated",
    "permission denied",
    "permission_denied",
];

const NETWORK_MARKERS: &[&str] = &[
    "connection",
    "timed out",
    "timeout",
    "dns error",
    "network",
];

const MALFORMED_MARKERS: &[&str] = &["malformed", "invalid json", "failed to parse"];

/// Caller-facing error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SafetyBlocked,
    RateLimited,
    MalformedResponse,
    AuthError,
    NetworkError,
    AllProvidersExhausted,
    Unknown,
}

impl ErrorKind {
    /// Only rate limiting is retried locally
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorKind::RateLimited)
    }

    /// Whether the provider chain may advance to the next provider
    pub fn triggers_failover(&self) -> bool {
        matches!(self, ErrorKind::RateLimited)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SafetyBlocked => "SafetyBlocked",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::MalformedResponse => "MalformedResponse",
            ErrorKind::AuthError => "AuthError",
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::AllProvidersExhausted => "AllProvidersExhausted",
            ErrorKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Result of classifying an error or payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub retriable: bool,
}

impl From<ErrorKind> for Classification {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            retriable: kind.is_retriable(),
        }
    }
}

/// The single error surfaced to the caller of an orchestrated request
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub retriable: bool,

    /// Provider whose failure produced this error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retriable: kind.is_retriable(),
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Classify a provider error, keeping its message
    pub fn from_provider_error(error: &ProviderError) -> Self {
        let classification = ResponseClassifier::classify(error);
        Self {
            kind: classification.kind,
            message: error.to_string(),
            retriable: classification.retriable,
            provider: None,
        }
    }

    /// Aggregated error after every provider failed on capacity
    pub fn all_providers_exhausted(
        providers_tried: usize,
        last_provider: &str,
        last_message: &str,
    ) -> Self {
        Self {
            kind: ErrorKind::AllProvidersExhausted,
            message: format!(
                "All {} providers are rate limited; last error from '{}': {}",
                providers_tried, last_provider, last_message
            ),
            retriable: false,
            provider: Some(last_provider.to_string()),
        }
    }
}

/// Pure classification functions
pub struct ResponseClassifier;

impl ResponseClassifier {
    /// Classify a provider error
    pub fn classify(error: &ProviderError) -> Classification {
        let kind = match error.root() {
            ProviderError::SafetyBlocked { .. } => ErrorKind::SafetyBlocked,
            ProviderError::RateLimit { .. } => ErrorKind::RateLimited,
            ProviderError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            ProviderError::Authentication(_) => ErrorKind::AuthError,
            ProviderError::Network(_) => ErrorKind::NetworkError,
            ProviderError::Api { status: 429, .. } => ErrorKind::RateLimited,
            ProviderError::Api {
                status: 401 | 403, ..
            } => ErrorKind::AuthError,
            // The correlation suffix is random hex and may contain "429"
            ProviderError::Api { message, .. } => {
                let detail = message.split(" [request_id:").next().unwrap_or_default();
                Self::classify_message(detail).kind
            }
            other => Self::classify_message(&other.to_string()).kind,
        };
        kind.into()
    }

    /// Classify a free-form error message
    pub fn classify_message(message: &str) -> Classification {
        let lower = message.to_lowercase();
        let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

        let kind = if contains_any(SAFETY_MARKERS) {
            ErrorKind::SafetyBlocked
        } else if contains_any(RATE_LIMIT_MARKERS) {
            ErrorKind::RateLimited
        } else if contains_any(MALFORMED_MARKERS) {
            ErrorKind::MalformedResponse
        } else if contains_any(AUTH_MARKERS) {
            ErrorKind::AuthError
        } else if contains_any(NETWORK_MARKERS) {
            ErrorKind::NetworkError
        } else {
            ErrorKind::Unknown
        };
        kind.into()
    }

    /// Inspect a completed payload for an error it carries
    ///
    /// Returns `None` when the payload does not describe a failure.
    pub fn classify_payload(payload: &Value) -> Option<Classification> {
        if let Some(code) = payload.get("error").and_then(Value::as_str) {
            if SAFETY_CODES.contains(&code) {
                return Some(ErrorKind::SafetyBlocked.into());
            }
            return Some(Self::classify_message(code));
        }

        if payload
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
            .is_some()
        {
            return Some(ErrorKind::SafetyBlocked.into());
        }

        if let Some(error) = payload.get("error").filter(|e| e.is_object()) {
            if error.get("code").and_then(Value::as_u64) == Some(429)
                || error.get("status").and_then(Value::as_str) == Some("RESOURCE_EXHAUSTED")
            {
                return Some(ErrorKind::RateLimited.into());
            }
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Some(Self::classify_message(message));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("Rate limit reached for model", ErrorKind::RateLimited ; "rate limit phrase")]
    #[test_case("HTTP 429 Too Many Requests", ErrorKind::RateLimited ; "status code")]
    #[test_case("Resource has been exhausted (e.g. check quota).", ErrorKind::RateLimited ; "gemini quota")]
    #[test_case("API key not valid. Please pass a valid API key.", ErrorKind::AuthError ; "bad key")]
    #[test_case("error sending request: connection refused", ErrorKind::NetworkError ; "connect")]
    #[test_case("SAFETY_VIOLATION", ErrorKind::SafetyBlocked ; "safety code")]
    #[test_case("something odd happened", ErrorKind::Unknown ; "fallback")]
    fn test_classify_message(message: &str, expected: ErrorKind) {
        assert_eq!(ResponseClassifier::classify_message(message).kind, expected);
    }

    #[test]
    fn test_safety_takes_priority_over_rate_limit() {
        let c = ResponseClassifier::classify_message("429 PLATFORM_SECURITY_VIOLATION");
        assert_eq!(c.kind, ErrorKind::SafetyBlocked);
        assert!(!c.retriable);
    }

    #[test]
    fn test_variant_wins_over_message_scan() {
        let err = ProviderError::malformed("expected value at line 429 column 3");
        assert_eq!(
            ResponseClassifier::classify(&err).kind,
            ErrorKind::MalformedResponse
        );
    }

    #[test]
    fn test_retries_exhausted_classifies_as_source() {
        let err = ProviderError::RetriesExhausted {
            attempts: 4,
            source: Box::new(ProviderError::rate_limit("quota")),
        };
        let c = ResponseClassifier::classify(&err);
        assert_eq!(c.kind, ErrorKind::RateLimited);
        assert!(c.retriable);
    }

    #[test]
    fn test_api_status_codes() {
        let err = ProviderError::Api {
            status: 429,
            message: "slow down".into(),
        };
        assert_eq!(ResponseClassifier::classify(&err).kind, ErrorKind::RateLimited);

        let err = ProviderError::Api {
            status: 403,
            message: "forbidden".into(),
        };
        assert_eq!(ResponseClassifier::classify(&err).kind, ErrorKind::AuthError);

        let err = ProviderError::Api {
            status: 400,
            message: "context too long [request_id: 4290a1b2-0000-4000-8000-000000000429]".into(),
        };
        assert_eq!(ResponseClassifier::classify(&err).kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_classify_payload() {
        let safety = json!({"error": "PLATFORM_SECURITY_VIOLATION"});
        assert_eq!(
            ResponseClassifier::classify_payload(&safety).map(|c| c.kind),
            Some(ErrorKind::SafetyBlocked)
        );

        let blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert_eq!(
            ResponseClassifier::classify_payload(&blocked).map(|c| c.kind),
            Some(ErrorKind::SafetyBlocked)
        );

        let quota = json!({"error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}});
        assert_eq!(
            ResponseClassifier::classify_payload(&quota).map(|c| c.kind),
            Some(ErrorKind::RateLimited)
        );

        let ok = json!({"files": []});
        assert!(ResponseClassifier::classify_payload(&ok).is_none());
    }

    #[test]
    fn test_exhausted_error_references_last_provider() {
        let err = ClassifiedError::all_providers_exhausted(3, "groq-b", "Rate limit exceeded: tpm");
        assert_eq!(err.kind, ErrorKind::AllProvidersExhausted);
        assert_eq!(err.provider.as_deref(), Some("groq-b"));
        assert!(err.message.contains("Rate limit exceeded: tpm"));
        assert!(!err.retriable);
    }
}
