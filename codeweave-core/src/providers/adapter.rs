//! Provider adapter trait and descriptors
//!
//! Defines the uniform invocation contract every completion backend
//! implements, and the immutable descriptor the provider chain iterates.

use crate::protocol::types::{
    CompletionRequest, FinishReason, Message, OutputMode, StreamEvent, ToolCallDelta,
    ToolDeclaration,
};
use crate::providers::error::ProviderError;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

/// Forward-only, non-restartable sequence of normalized events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send>>;

/// Core provider trait that all completion backends must implement
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider's name
    fn name(&self) -> &str;

    /// Wire format spoken by this provider
    fn provider_type(&self) -> ProviderType;

    /// Invoke the provider once; no retries happen at this level
    async fn invoke(&self, invocation: Invocation) -> Result<ProviderReply, ProviderError>;
}

/// Supported wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Google Generative Language API
    Gemini,
    /// OpenAI chat completions and compatible endpoints (Groq, etc.)
    OpenAI,
}

impl ProviderType {
    /// Base URL used when none is configured
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderType::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderType::OpenAI => "https://api.openai.com/v1",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderType::Gemini => write!(f, "gemini"),
            ProviderType::OpenAI => write!(f, "openai"),
        }
    }
}

/// Immutable, startup-configured entry in the provider priority list
#[derive(Clone)]
pub struct ProviderDescriptor {
    /// Identifier used in logs and errors
    pub id: String,

    /// Invocation handle
    pub provider: Arc<dyn Provider>,

    /// Model requested from this provider
    pub model: String,

    /// Whether tool declarations may be sent
    pub supports_tools: bool,

    /// Whether the provider is invoked in streaming mode
    pub supports_streaming: bool,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<String>, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider,
            model: model.into(),
            supports_tools: true,
            supports_streaming: true,
        }
    }

    pub fn with_tools(mut self, supported: bool) -> Self {
        self.supports_tools = supported;
        self
    }

    pub fn with_streaming(mut self, supported: bool) -> Self {
        self.supports_streaming = supported;
        self
    }

    /// Build the provider-facing invocation for a request
    pub fn invocation_for(&self, request: &CompletionRequest) -> Invocation {
        let tools = if self.supports_tools && !request.tools.is_empty() {
            Some(request.tools.clone())
        } else {
            None
        };

        Invocation {
            model: self.model.clone(),
            system_instruction: request.system_instruction.clone(),
            messages: request.messages(),
            tools,
            temperature: request.params.effective_temperature(),
            max_output_tokens: request.params.max_output_tokens,
            json_output: request.mode == OutputMode::StructuredJson,
            stream: self.supports_streaming,
            request_id: Uuid::new_v4(),
        }
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("supports_tools", &self.supports_tools)
            .field("supports_streaming", &self.supports_streaming)
            .finish()
    }
}

/// Uniform outbound call shape
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub model: String,
    pub system_instruction: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Option<Vec<ToolDeclaration>>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,

    /// Ask the provider for a JSON document instead of prose
    pub json_output: bool,

    pub stream: bool,

    /// Correlation id sent as `X-Request-ID`
    pub request_id: Uuid,
}

/// What a provider returns for one invocation
pub enum ProviderReply {
    /// Native stream already normalized into events
    Stream(EventStream),
    /// Non-streaming response
    Complete(CompletedResponse),
}

impl ProviderReply {
    /// View either reply shape as an event stream
    pub fn into_events(self) -> EventStream {
        match self {
            ProviderReply::Stream(stream) => stream,
            ProviderReply::Complete(response) => {
                Box::pin(futures::stream::iter(response.into_events().into_iter().map(Ok)))
            }
        }
    }
}

impl fmt::Debug for ProviderReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderReply::Stream(_) => f.write_str("ProviderReply::Stream(..)"),
            ProviderReply::Complete(response) => {
                f.debug_tuple("ProviderReply::Complete").field(response).finish()
            }
        }
    }
}

/// A tool call from a non-streaming response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedToolCall {
    pub id: Option<String>,
    pub name: String,

    /// Raw JSON arguments as the provider returned them
    pub arguments: String,
}

/// Provider-agnostic view of a non-streaming response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedResponse {
    pub text: String,
    pub tool_calls: Vec<CompletedToolCall>,
    pub finish_reason: FinishReason,
}

impl CompletedResponse {
    /// Replay the response as the event sequence a stream would have produced
    pub fn into_events(self) -> Vec<StreamEvent> {
        let mut events = Vec::with_capacity(self.tool_calls.len() + 2);
        if !self.text.is_empty() {
            events.push(StreamEvent::TextDelta(self.text));
        }
        for (index, call) in self.tool_calls.into_iter().enumerate() {
            events.push(StreamEvent::ToolCallDelta(ToolCallDelta {
                index,
                id: call.id,
                name_part: Some(call.name),
                args_fragment: Some(call.arguments),
            }));
        }
        events.push(StreamEvent::StreamEnd(self.finish_reason));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct NoopProvider;

    #[async_trait]
    impl Provider for NoopProvider {
        fn name(&self) -> &str {
            "noop"
        }

        fn provider_type(&self) -> ProviderType {
            ProviderType::OpenAI
        }

        async fn invoke(&self, _invocation: Invocation) -> Result<ProviderReply, ProviderError> {
            Err(ProviderError::Other("unused".into()))
        }
    }

    #[test]
    fn test_invocation_drops_tools_when_unsupported() {
        let request = CompletionRequest::chat("list files")
            .with_tool(ToolDeclaration::new("list_files", json!({"type": "object"})));

        let descriptor = ProviderDescriptor::new("groq", Arc::new(NoopProvider), "llama")
            .with_tools(false)
            .with_streaming(false);
        let invocation = descriptor.invocation_for(&request);

        assert!(invocation.tools.is_none());
        assert!(!invocation.stream);
        assert_eq!(invocation.model, "llama");
    }

    #[test]
    fn test_invocation_for_structured_request() {
        let request = CompletionRequest::structured("make A.java").deterministic();
        let descriptor = ProviderDescriptor::new("gemini", Arc::new(NoopProvider), "gemini-2.0-flash");
        let invocation = descriptor.invocation_for(&request);

        assert!(invocation.json_output);
        assert!(invocation.stream);
        assert_eq!(invocation.temperature, Some(0.0));
        assert_eq!(invocation.messages.len(), 1);
    }

    #[test]
    fn test_completed_response_replays_as_events() {
        let response = CompletedResponse {
            text: "Working on it".into(),
            tool_calls: vec![CompletedToolCall {
                id: Some("call_1".into()),
                name: "write_file".into(),
                arguments: "{\"path\":\"A.java\"}".into(),
            }],
            finish_reason: FinishReason::ToolCalls,
        };

        let events = response.into_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::text("Working on it"));
        assert!(matches!(&events[1], StreamEvent::ToolCallDelta(d) if d.index == 0));
        assert_eq!(events[2], StreamEvent::end(FinishReason::ToolCalls));
    }
}
