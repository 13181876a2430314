//! Core protocol types for orchestrated completions
//!
//! This module contains the provider-agnostic data structures that flow
//! through the orchestrator:
//! - `CompletionRequest` describes one logical user action
//! - `StreamEvent` is the normalized unit every provider stream is turned into
//! - `Outcome` is the final result handed back to the caller

use serde::{Deserialize, Serialize};

/// Desired shape of the final output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Conversational reply, optionally with tool calls
    #[default]
    Chat,
    /// A single JSON document describing file edits
    StructuredJson,
}

/// Role of a prior conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Input written by the user
    User,
    /// Reply produced by the model
    Assistant,
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A function the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Function name
    pub name: String,

    /// Human readable description shown to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Parameters schema (JSON Schema)
    pub parameters: serde_json::Value,
}

impl ToolDeclaration {
    pub fn new(name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Sampling parameters shared by every provider
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Force greedy decoding regardless of `temperature`
    #[serde(default)]
    pub deterministic: bool,

    /// Upper bound on generated tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationParams {
    /// Temperature actually sent to providers
    pub fn effective_temperature(&self) -> Option<f32> {
        if self.deterministic {
            Some(0.0)
        } else {
            self.temperature
        }
    }
}

/// One logical "generate a response" request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Current user prompt
    pub prompt: String,

    /// System instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,

    /// Prior turns threaded in by the caller
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Message>,

    /// Ordered tool declarations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclaration>,

    #[serde(default)]
    pub params: GenerationParams,

    #[serde(default)]
    pub mode: OutputMode,
}

impl CompletionRequest {
    /// Create a conversational request
    pub fn chat(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Create a request expecting a structured file-edit document
    pub fn structured(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            mode: OutputMode::StructuredJson,
            ..Default::default()
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_tool(mut self, tool: ToolDeclaration) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.params.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.params.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Request greedy decoding
    pub fn deterministic(mut self) -> Self {
        self.params.deterministic = true;
        self
    }

    /// Prior turns followed by the current prompt
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = self.history.clone();
        messages.push(Message::user(self.prompt.clone()));
        messages
    }
}

/// Why a provider stream ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of output
    Stop,
    /// The model requested one or more tool calls
    ToolCalls,
    /// Output was truncated by a token limit
    Length,
    /// Output was withheld by a content-safety filter
    Safety,
    /// Provider specific reason passed through verbatim
    Other(String),
}

/// A partial tool call addressed by its call index
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_part: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args_fragment: Option<String>,
}

/// Normalized unit of a provider stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A text fragment, byte-for-byte as the provider sent it
    TextDelta(String),
    /// A fragment of a tool call
    ToolCallDelta(ToolCallDelta),
    /// Terminal event of a provider stream
    StreamEnd(FinishReason),
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta(text.into())
    }

    pub fn end(reason: FinishReason) -> Self {
        Self::StreamEnd(reason)
    }

    /// Returns true for `StreamEnd`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StreamEnd(_))
    }
}

/// A fully reassembled tool invocation with parsed arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Call index within the stream
    pub index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    pub arguments: serde_json::Value,
}

/// One file produced by a structured result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEdit {
    pub path: String,
    pub content: String,
}

impl FileEdit {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Successful result of one orchestrated call
///
/// Failures are reported through `ClassifiedError` on the `Err` side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// Conversational reply
    ChatMessage {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolInvocation>,
    },
    /// File edits to be applied by the project store
    StructuredResult { files: Vec<FileEdit> },
}

impl Outcome {
    /// Reply text for chat outcomes
    pub fn text(&self) -> Option<&str> {
        match self {
            Outcome::ChatMessage { text, .. } => Some(text),
            Outcome::StructuredResult { .. } => None,
        }
    }

    /// File edits for structured outcomes
    pub fn files(&self) -> Option<&[FileEdit]> {
        match self {
            Outcome::StructuredResult { files } => Some(files),
            Outcome::ChatMessage { .. } => None,
        }
    }
}
