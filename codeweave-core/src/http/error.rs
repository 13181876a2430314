//! HTTP error mapping utilities

use crate::providers::error::ProviderError;
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

/// Map HTTP status code and response body to a ProviderError
pub fn map_http_error(status: StatusCode, body: Option<String>, request_id: Uuid) -> ProviderError {
    let details = body
        .as_deref()
        .and_then(|b| serde_json::from_str::<Value>(b).ok())
        .and_then(|v| extract_error_details(&v));

    let message = details
        .as_ref()
        .map(|d| d.message.clone())
        .or_else(|| body.clone().filter(|b| !b.trim().is_empty()))
        .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));
    let message = format!("{} [request_id: {}]", message, request_id);

    let resource_exhausted = details
        .as_ref()
        .and_then(|d| d.status.as_deref())
        .is_some_and(|s| s == "RESOURCE_EXHAUSTED");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(message),

        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimit { message },

        // Gemini reports a bad key as 400 INVALID_ARGUMENT
        StatusCode::BAD_REQUEST if mentions_invalid_key(&message) => {
            ProviderError::Authentication(message)
        }

        _ if resource_exhausted => ProviderError::RateLimit { message },

        status => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

fn mentions_invalid_key(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("api key not valid") || lower.contains("invalid api key")
}

/// Error details extracted from response body
struct ErrorDetails {
    message: String,
    status: Option<String>,
}

/// Extract error details from JSON response
fn extract_error_details(json: &Value) -> Option<ErrorDetails> {
    // OpenAI and Gemini: { "error": { "message": "...", ... } }
    if let Some(error) = json.get("error") {
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            return Some(ErrorDetails {
                message: message.to_string(),
                status: error
                    .get("status")
                    .and_then(Value::as_str)
                    .map(String::from),
            });
        }
        if let Some(message) = error.as_str() {
            return Some(ErrorDetails {
                message: message.to_string(),
                status: None,
            });
        }
    }

    json.get("message")
        .and_then(Value::as_str)
        .map(|message| ErrorDetails {
            message: message.to_string(),
            status: None,
        })
}
