//! HTTP-level tests of the Gemini adapter, plus failover across real adapters

use codeweave_core::config::SecretString;
use codeweave_core::http::HttpClient;
use codeweave_core::orchestrator::CompletionOrchestrator;
use codeweave_core::protocol::{CompletionRequest, FinishReason, Outcome, StreamEvent, ToolDeclaration};
use codeweave_core::providers::{
    ErrorKind, GeminiProvider, OpenAIProvider, Provider, ProviderDescriptor, ProviderError, RetryPolicy,
};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-2.0-flash";

fn gemini(server: &MockServer) -> Arc<GeminiProvider> {
    Arc::new(GeminiProvider::new(
        "gemini",
        format!("{}/v1beta", server.uri()),
        SecretString::new("gemini-key"),
        HttpClient::new().unwrap(),
    ))
}

fn sse(chunks: &[serde_json::Value]) -> String {
    chunks.iter().map(|c| format!("data: {}\r\n\r\n", c)).collect()
}

fn stream_path() -> String {
    format!("/v1beta/models/{}:streamGenerateContent", MODEL)
}

async fn collect(
    provider: Arc<GeminiProvider>,
    request: &CompletionRequest,
) -> Result<Vec<StreamEvent>, ProviderError> {
    let descriptor = ProviderDescriptor::new("gemini", provider.clone(), MODEL);
    let reply = provider.invoke(descriptor.invocation_for(request)).await?;
    let mut events = reply.into_events();
    let mut out = Vec::new();
    while let Some(event) = events.next().await {
        out.push(event?);
    }
    Ok(out)
}

#[tokio::test]
async fn test_streamed_text_and_finish() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Hel"}]}, "index": 0}]}),
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "lo"}]}, "finishReason": "STOP", "index": 0}]}),
    ]);

    Mock::given(method("POST"))
        .and(path(stream_path()))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "gemini-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
            "systemInstruction": {"parts": [{"text": "be brief"}]}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = CompletionRequest::chat("hi").with_system_instruction("be brief");
    let events = collect(gemini(&server), &request).await.unwrap();

    assert_eq!(
        events,
        vec![
            StreamEvent::text("Hel"),
            StreamEvent::text("lo"),
            StreamEvent::end(FinishReason::Stop),
        ]
    );
}

#[tokio::test]
async fn test_function_call_becomes_tool_calls_finish() {
    let server = MockServer::start().await;
    let body = sse(&[json!({"candidates": [{
        "content": {"role": "model", "parts": [
            {"functionCall": {"name": "get_weather", "args": {"city": "Paris"}}}
        ]},
        "finishReason": "STOP"
    }]})]);

    Mock::given(method("POST"))
        .and(path(stream_path()))
        .and(body_partial_json(json!({
            "tools": [{"functionDeclarations": [{"name": "get_weather"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let request = CompletionRequest::chat("Weather?")
        .with_tool(ToolDeclaration::new("get_weather", json!({"type": "object"})));
    let events = collect(gemini(&server), &request).await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[1], StreamEvent::end(FinishReason::ToolCalls));
}

#[tokio::test]
async fn test_structured_mode_sets_json_mime_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse(&[json!({
            "candidates": [{"content": {"parts": [{"text": "{}"}]}, "finishReason": "STOP"}]
        })])))
        .expect(1)
        .mount(&server)
        .await;

    collect(gemini(&server), &CompletionRequest::structured("edit"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_blocked_prompt_is_safety_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sse(&[json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        })])))
        .mount(&server)
        .await;

    let err = collect(gemini(&server), &CompletionRequest::chat("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::SafetyBlocked { .. }));
}

#[tokio::test]
async fn test_resource_exhausted_status_is_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
        })))
        .mount(&server)
        .await;

    let err = collect(gemini(&server), &CompletionRequest::chat("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::RateLimit { .. }));
}

#[tokio::test]
async fn test_invalid_key_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}
        })))
        .mount(&server)
        .await;

    let err = collect(gemini(&server), &CompletionRequest::chat("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Authentication(_)));
}

#[tokio::test]
async fn test_rate_limited_gemini_fails_over_to_openai_compatible() {
    let gemini_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED"}
        })))
        .expect(2)
        .mount(&gemini_server)
        .await;

    let groq_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "data: {}\n\ndata: [DONE]\n\n",
            json!({"choices": [{"index": 0, "delta": {"content": "from groq"}, "finish_reason": "stop"}]})
        )))
        .expect(1)
        .mount(&groq_server)
        .await;

    let groq = Arc::new(OpenAIProvider::new(
        "groq",
        format!("{}/openai/v1", groq_server.uri()),
        SecretString::new("groq-key"),
        HttpClient::new().unwrap(),
    ));
    let orchestrator = CompletionOrchestrator::new(
        vec![
            ProviderDescriptor::new("gemini", gemini(&gemini_server), MODEL),
            ProviderDescriptor::new("groq", groq, "llama-3.3-70b-versatile"),
        ],
        RetryPolicy::new(1).with_delays(10, 10).with_jitter(0),
    );

    let outcome = orchestrator.complete(CompletionRequest::chat("hi")).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::ChatMessage {
            text: "from groq".into(),
            tool_calls: vec![]
        }
    );
}

#[tokio::test]
async fn test_both_providers_rate_limited_is_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .mount(&server)
        .await;

    let orchestrator = CompletionOrchestrator::new(
        vec![
            ProviderDescriptor::new("gemini-a", gemini(&server), MODEL),
            ProviderDescriptor::new("gemini-b", gemini(&server), MODEL),
        ],
        RetryPolicy::no_retry(),
    );

    let err = orchestrator
        .complete(CompletionRequest::chat("hi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AllProvidersExhausted);
    assert_eq!(err.provider.as_deref(), Some("gemini-b"));
}
