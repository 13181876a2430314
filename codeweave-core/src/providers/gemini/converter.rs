//! Conversion between the orchestrator's invocation shape and Gemini format

use super::types::*;
use crate::protocol::types::{FinishReason, MessageRole, ToolDeclaration};
use crate::providers::adapter::{CompletedResponse, CompletedToolCall, Invocation};
use crate::providers::error::ProviderError;
use serde_json::Value;

/// Schema keys the Gemini function declaration endpoint rejects
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties"];

/// Convert an invocation to a Gemini request
pub fn to_gemini_request(invocation: &Invocation) -> GeminiRequest {
    let contents = invocation
        .messages
        .iter()
        .map(|m| GeminiContent {
            role: Some(
                match m.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "model",
                }
                .to_string(),
            ),
            parts: vec![GeminiPart::text(m.content.clone())],
        })
        .collect();

    let system_instruction = invocation
        .system_instruction
        .as_ref()
        .map(|s| GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(s.clone())],
        });

    let generation_config = GeminiGenerationConfig {
        temperature: invocation.temperature,
        max_output_tokens: invocation.max_output_tokens,
        response_mime_type: invocation
            .json_output
            .then(|| "application/json".to_string()),
    };

    let tools = invocation.tools.as_ref().filter(|t| !t.is_empty()).map(|tools| {
        vec![GeminiTool {
            function_declarations: tools.iter().map(to_function_declaration).collect(),
        }]
    });

    GeminiRequest {
        contents,
        system_instruction,
        generation_config: Some(generation_config),
        tools,
    }
}

fn to_function_declaration(tool: &ToolDeclaration) -> GeminiFunctionDeclaration {
    GeminiFunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: Some(sanitize_schema(&tool.parameters)),
    }
}

/// Strip JSON Schema keys Gemini does not accept, recursively
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), sanitize_schema(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

/// Map a Gemini finish reason onto the normalized one
///
/// Gemini reports `STOP` even when the turn ended in function calls, so the
/// caller says whether one was seen.
pub fn map_finish_reason(reason: &str, saw_function_call: bool) -> FinishReason {
    match reason {
        "STOP" if saw_function_call => FinishReason::ToolCalls,
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => FinishReason::Safety,
        other => FinishReason::Other(other.to_string()),
    }
}

/// Convert an error object carried in a response body or stream event
pub fn error_from_detail(detail: &GeminiErrorDetail) -> ProviderError {
    if detail.code == Some(429) || detail.status.as_deref() == Some("RESOURCE_EXHAUSTED") {
        ProviderError::rate_limit(detail.message.clone())
    } else if matches!(detail.code, Some(401 | 403)) {
        ProviderError::Authentication(detail.message.clone())
    } else {
        ProviderError::Other(detail.message.clone())
    }
}

/// Fail when the prompt itself was blocked
pub fn check_prompt_feedback(response: &GeminiResponse) -> Result<(), ProviderError> {
    match response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        Some(reason) => Err(ProviderError::safety(reason)),
        None => Ok(()),
    }
}

/// Convert a non-streaming Gemini response
pub fn from_gemini_response(response: GeminiResponse) -> Result<CompletedResponse, ProviderError> {
    check_prompt_feedback(&response)?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::malformed("Response contained no candidates"))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(call) = part.function_call {
            tool_calls.push(CompletedToolCall {
                id: None,
                name: call.name.clone(),
                arguments: call.args_json()?,
            });
        }
    }

    let finish_reason = candidate
        .finish_reason
        .as_deref()
        .map(|r| map_finish_reason(r, !tool_calls.is_empty()))
        .unwrap_or(FinishReason::Stop);

    Ok(CompletedResponse {
        text,
        tool_calls,
        finish_reason,
    })
}
