//! Conversion between the orchestrator's invocation shape and OpenAI format

use super::types::*;
use crate::protocol::types::{FinishReason, MessageRole, ToolDeclaration};
use crate::providers::adapter::{CompletedResponse, CompletedToolCall, Invocation};
use crate::providers::error::ProviderError;

/// Convert an invocation to an OpenAI chat completion request
pub fn to_openai_request(invocation: &Invocation) -> OpenAIRequest {
    let mut messages = Vec::with_capacity(invocation.messages.len() + 1);
    if let Some(system) = &invocation.system_instruction {
        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: Some(system.clone()),
            tool_calls: None,
        });
    }
    messages.extend(invocation.messages.iter().map(|m| OpenAIMessage {
        role: match m.role {
            MessageRole::User => "user".to_string(),
            MessageRole::Assistant => "assistant".to_string(),
        },
        content: Some(m.content.clone()),
        tool_calls: None,
    }));

    OpenAIRequest {
        model: invocation.model.clone(),
        messages,
        temperature: invocation.temperature,
        max_tokens: invocation.max_output_tokens,
        stream: invocation.stream,
        response_format: invocation.json_output.then(|| OpenAIResponseFormat {
            format_type: "json_object".to_string(),
        }),
        tools: invocation
            .tools
            .as_ref()
            .map(|tools| tools.iter().map(to_openai_tool).collect()),
    }
}

fn to_openai_tool(tool: &ToolDeclaration) -> OpenAITool {
    OpenAITool {
        tool_type: "function".to_string(),
        function: OpenAIFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

/// Map an OpenAI finish reason onto the normalized one
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::Safety,
        other => FinishReason::Other(other.to_string()),
    }
}

/// Convert an error object carried inside a successful response
pub fn error_from_detail(detail: &OpenAIErrorDetail) -> ProviderError {
    let code = detail
        .code
        .as_ref()
        .map(|c| match c {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    let kind = detail.error_type.as_deref().unwrap_or_default();

    if code == "rate_limit_exceeded" || code == "429" || kind == "rate_limit_exceeded" {
        ProviderError::rate_limit(detail.message.clone())
    } else if code == "invalid_api_key" || kind == "invalid_api_key" {
        ProviderError::Authentication(detail.message.clone())
    } else {
        ProviderError::Other(detail.message.clone())
    }
}

/// Convert a non-streaming OpenAI response
pub fn from_openai_response(response: OpenAIResponse) -> Result<CompletedResponse, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::malformed("Response contained no choices"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| CompletedToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();

    Ok(CompletedResponse {
        text: choice.message.content.unwrap_or_default(),
        tool_calls,
        finish_reason: choice
            .finish_reason
            .as_deref()
            .map(map_finish_reason)
            .unwrap_or(FinishReason::Stop),
    })
}
