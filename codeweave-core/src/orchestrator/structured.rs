//! Parsing of structured file-edit documents
//!
//! The whole buffered reply is parsed once the stream has ended. The
//! expected shape is `{"files":[{"path": "...", "content": "..."}]}`.

use crate::protocol::types::FileEdit;
use crate::providers::classifier::{ErrorKind, ResponseClassifier};
use crate::providers::error::ProviderError;
use serde_json::Value;

/// Parse a buffered structured reply into file edits
pub fn parse_files(raw: &str) -> Result<Vec<FileEdit>, ProviderError> {
    let body = strip_code_fence(raw.trim());
    if body.is_empty() {
        return Err(ProviderError::malformed("Empty structured response"));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::malformed(format!("Structured response is not valid JSON: {}", e)))?;

    if let Some(classification) = ResponseClassifier::classify_payload(&value) {
        return Err(payload_error(classification.kind, &value));
    }

    let entries = value
        .get("files")
        .ok_or_else(|| ProviderError::malformed("Structured response is missing 'files'"))?
        .as_array()
        .ok_or_else(|| ProviderError::malformed("'files' must be an array"))?;

    if entries.is_empty() {
        return Err(ProviderError::malformed("Structured response contains no files"));
    }

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let field = |name: &str| {
                entry
                    .get(name)
                    .and_then(Value::as_str)
                    .map(String::from)
                    .ok_or_else(|| {
                        ProviderError::malformed(format!("files[{}] has no string '{}'", i, name))
                    })
            };
            Ok(FileEdit {
                path: field("path")?,
                content: field("content")?,
            })
        })
        .collect()
}

/// Remove one surrounding Markdown code fence, if present
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

fn payload_error(kind: ErrorKind, payload: &Value) -> ProviderError {
    let message = payload
        .get("error")
        .map(|e| match e {
            Value::String(s) => s.clone(),
            other => other
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| other.to_string()),
        })
        .or_else(|| {
            payload
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| payload.to_string());

    match kind {
        ErrorKind::SafetyBlocked => ProviderError::safety(message),
        ErrorKind::RateLimited => ProviderError::rate_limit(message),
        ErrorKind::AuthError => ProviderError::Authentication(message),
        ErrorKind::NetworkError => ProviderError::Network(message),
        ErrorKind::MalformedResponse => ProviderError::malformed(message),
        ErrorKind::AllProvidersExhausted | ErrorKind::Unknown => ProviderError::Other(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_file() {
        let files = parse_files("{\"files\":[{\"path\":\"A.java\",\"content\":\"x\"}]}").unwrap();
        assert_eq!(files, vec![FileEdit::new("A.java", "x")]);
    }

    #[test]
    fn test_missing_files_key_is_malformed() {
        let err = parse_files("{\"changes\":[]}").unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[test]
    fn test_code_fence_and_whitespace_are_stripped() {
        let raw = "\n```json\n{\"files\":[{\"path\":\"src/Main.java\",\"content\":\"class Main {}\\n\"}]}\n```\n";
        let files = parse_files(raw).unwrap();
        assert_eq!(files[0].path, "src/Main.java");
        assert_eq!(files[0].content, "class Main {}\n");
    }

    #[test]
    fn test_safety_payload() {
        let err = parse_files("{\"error\":\"SAFETY_VIOLATION\"}").unwrap_err();
        assert!(matches!(err, ProviderError::SafetyBlocked { ref reason } if reason == "SAFETY_VIOLATION"));
    }

    #[test]
    fn test_empty_and_invalid_inputs() {
        assert!(matches!(parse_files("   "), Err(ProviderError::MalformedResponse(_))));
        assert!(matches!(parse_files("{\"files\":[]}"), Err(ProviderError::MalformedResponse(_))));
        assert!(matches!(parse_files("{\"files\":{}}"), Err(ProviderError::MalformedResponse(_))));
        assert!(matches!(
            parse_files("{\"files\":[{\"path\":\"A.java\"}]}"),
            Err(ProviderError::MalformedResponse(ref m)) if m.contains("content")
        ));
        assert!(matches!(parse_files("{\"files\":["), Err(ProviderError::MalformedResponse(_))));
    }
}
