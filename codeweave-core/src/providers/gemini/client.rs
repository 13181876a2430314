//! Gemini client implementation

use super::converter::{from_gemini_response, to_gemini_request};
use super::streaming::parse_stream;
use super::types::GeminiResponse;
use crate::config::secrets::SecretString;
use crate::http::{HttpClient, RequestOptions};
use crate::providers::adapter::{Invocation, Provider, ProviderReply, ProviderType};
use crate::providers::error::ProviderResult;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Google Generative Language API provider
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: SecretString,
    http: HttpClient,
    timeout: Option<Duration>,
}

impl GeminiProvider {
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

    /// Build the endpoint URL for a model
    fn endpoint(&self, model: &str, stream: bool) -> String {
        let base = self.base_url.trim_end_matches('/');
        if stream {
            format!("{}/models/{}:streamGenerateContent?alt=sse", base, model)
        } else {
            format!("{}/models/{}:generateContent", base, model)
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Gemini
    }

    async fn invoke(&self, invocation: Invocation) -> ProviderResult<ProviderReply> {
        let body = to_gemini_request(&invocation);
        let mut options = RequestOptions::new(invocation.request_id)
            .with_header("x-goog-api-key", self.api_key.expose_secret());
        options.timeout = self.timeout;

        let url = self.endpoint(&invocation.model, invocation.stream);
        let response = self.http.post_json(&url, &body, &options).await?;

        if invocation.stream {
            debug!(provider = %self.name, request_id = %invocation.request_id, "Streaming response");
            return Ok(ProviderReply::Stream(parse_stream(response.bytes_stream())));
        }

        let parsed: GeminiResponse = self.http.read_json(response, &options).await?;
        Ok(ProviderReply::Complete(from_gemini_response(parsed)?))
    }
}
