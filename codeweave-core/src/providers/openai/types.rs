//! OpenAI API types
//!
//! These types match the chat completions wire format shared by OpenAI and
//! compatible endpoints such as Groq.

use serde::{Deserialize, Serialize};

/// OpenAI chat completion request
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<OpenAIResponseFormat>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAITool>>,
}

/// OpenAI message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
}

/// OpenAI function call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunctionCall {
    pub name: String,

    #[serde(default)]
    pub arguments: String,
}

/// OpenAI tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "type", default = "default_tool_type")]
    pub tool_type: String,

    pub function: OpenAIFunctionCall,
}

fn default_tool_type() -> String {
    "function".to_string()
}

/// OpenAI tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAITool {
    #[serde(rename = "type")]
    pub tool_type: String,

    pub function: OpenAIFunction,
}

/// OpenAI function definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunction {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub parameters: serde_json::Value,
}

/// OpenAI response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    pub choices: Vec<OpenAIChoice>,
}

/// OpenAI choice
#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    #[serde(default)]
    pub index: usize,

    pub message: OpenAIMessage,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// OpenAI streaming chunk
#[derive(Debug, Deserialize)]
pub struct OpenAIStreamChunk {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub choices: Vec<OpenAIStreamChoice>,
}

/// OpenAI streaming choice
#[derive(Debug, Deserialize)]
pub struct OpenAIStreamChoice {
    #[serde(default)]
    pub index: usize,

    #[serde(default)]
    pub delta: OpenAIDelta,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// OpenAI delta for streaming
#[derive(Debug, Deserialize, Default)]
pub struct OpenAIDelta {
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

/// OpenAI function call delta
#[derive(Debug, Deserialize)]
pub struct OpenAIFunctionCallDelta {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub arguments: Option<String>,
}

/// OpenAI tool call delta
#[derive(Debug, Deserialize)]
pub struct OpenAIToolCallDelta {
    pub index: usize,

    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub function: Option<OpenAIFunctionCallDelta>,
}

/// OpenAI error detail
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAIErrorDetail {
    pub message: String,

    #[serde(rename = "type", default)]
    pub error_type: Option<String>,

    #[serde(default)]
    pub code: Option<serde_json::Value>,
}
