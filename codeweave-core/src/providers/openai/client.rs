//! OpenAI-compatible client implementation

use super::converter::{from_openai_response, to_openai_request};
use super::streaming::parse_stream;
use super::types::OpenAIResponse;
use crate::config::secrets::SecretString;
use crate::http::{HttpClient, RequestOptions};
use crate::providers::adapter::{Invocation, Provider, ProviderReply, ProviderType};
use crate::providers::error::ProviderResult;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Provider speaking the chat completions wire format
pub struct OpenAIProvider {
    name: String,
    base_url: String,
    api_key: SecretString,
    http: HttpClient,
    timeout: Option<Duration>,
}

impl OpenAIProvider {
    /// Create a new OpenAI-compatible provider
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: SecretString,
        http: HttpClient,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key,
            http,
            timeout: None,
        }
    }

    /// Override the client-wide request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request_options(&self, invocation: &Invocation) -> RequestOptions {
        let mut options = RequestOptions::new(invocation.request_id).with_header(
            "Authorization",
            format!("Bearer {}", self.api_key.expose_secret()),
        );
        options.timeout = self.timeout;
        options
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }

    async fn invoke(&self, invocation: Invocation) -> ProviderResult<ProviderReply> {
        let body = to_openai_request(&invocation);
        let options = self.request_options(&invocation);
        let response = self.http.post_json(&self.endpoint(), &body, &options).await?;

        if invocation.stream {
            debug!(provider = %self.name, request_id = %invocation.request_id, "Streaming response");
            return Ok(ProviderReply::Stream(parse_stream(response.bytes_stream())));
        }

        let parsed: OpenAIResponse = self.http.read_json(response, &options).await?;
        Ok(ProviderReply::Complete(from_openai_response(parsed)?))
    }
}
