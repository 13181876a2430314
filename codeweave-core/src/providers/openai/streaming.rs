//! Streaming support for OpenAI responses

use super::converter::{error_from_detail, map_finish_reason};
use super::types::{OpenAIErrorDetail, OpenAIStreamChunk};
use crate::protocol::types::{StreamEvent, ToolCallDelta};
use crate::providers::adapter::EventStream;
use crate::providers::error::ProviderError;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::fmt;

/// Per-stream normalization state for the chat completions SSE format
#[derive(Debug, Default)]
pub struct OpenAIStreamState {
    finished: bool,
}

impl OpenAIStreamState {
    /// Whether a finish reason has been emitted
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Normalize the data field of one SSE event
    ///
    /// Unparseable chunks are skipped with a warning; an error payload ends
    /// the stream with a provider error.
    pub fn process_data(&mut self, data: &str) -> Result<Vec<StreamEvent>, ProviderError> {
        let value: Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse stream chunk");
                return Ok(Vec::new());
            }
        };

        if let Some(error) = value.get("error") {
            let detail = serde_json::from_value::<OpenAIErrorDetail>(error.clone())
                .unwrap_or_else(|_| OpenAIErrorDetail {
                    message: error
                        .as_str()
                        .map(String::from)
                        .unwrap_or_else(|| error.to_string()),
                    error_type: None,
                    code: None,
                });
            return Err(error_from_detail(&detail));
        }

        let chunk: OpenAIStreamChunk = match serde_json::from_value(value) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping stream chunk with unexpected shape");
                return Ok(Vec::new());
            }
        };

        let mut events = Vec::new();
        if self.finished {
            return Ok(events);
        }

        for choice in chunk.choices.into_iter().filter(|c| c.index == 0) {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                events.push(StreamEvent::TextDelta(text));
            }

            for call in choice.delta.tool_calls.unwrap_or_default() {
                let (name_part, args_fragment) = match call.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                events.push(StreamEvent::ToolCallDelta(ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name_part,
                    args_fragment,
                }));
            }

            if let Some(reason) = choice.finish_reason.as_deref() {
                events.push(StreamEvent::StreamEnd(map_finish_reason(reason)));
                self.finished = true;
            }
        }

        Ok(events)
    }
}

/// Parse a Server-Sent Events byte stream into normalized events
pub fn parse_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut state = OpenAIStreamState::default();
        let events = bytes.eventsource();
        futures::pin_mut!(events);

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    yield Err(ProviderError::Network(format!("Stream error: {}", e)));
                    return;
                }
            };

            // The last message is "data: [DONE]"
            if event.data == "[DONE]" {
                break;
            }

            match state.process_data(&event.data) {
                Ok(normalized) => {
                    for e in normalized {
                        yield Ok(e);
                    }
                }
                Err(err) => {
                    yield Err(err);
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::FinishReason;
    use bytes::Bytes;

    fn sse(lines: &[&str]) -> Vec<Result<Bytes, std::io::Error>> {
        lines
            .iter()
            .map(|l| Ok(Bytes::from(format!("data: {}\n\n", l))))
            .collect()
    }

    #[tokio::test]
    async fn test_text_stream_preserves_order() {
        let body = sse(&[
            r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"content":"lo"}}]}"#,
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ]);

        let events: Vec<_> = parse_stream(futures::stream::iter(body))
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                StreamEvent::text("Hel"),
                StreamEvent::text("lo"),
                StreamEvent::end(FinishReason::Stop),
            ]
        );
    }

    #[test]
    fn test_tool_call_fragments_pass_through() {
        let mut state = OpenAIStreamState::default();
        let first = state
            .process_data(r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get","arguments":""}}]}}]}"#)
            .unwrap();
        let second = state
            .process_data(r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"a\":"}}]}}]}"#)
            .unwrap();
        let end = state
            .process_data(r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#)
            .unwrap();

        assert!(matches!(&first[0], StreamEvent::ToolCallDelta(d) if d.id.as_deref() == Some("call_1")));
        assert!(matches!(&second[0], StreamEvent::ToolCallDelta(d) if d.args_fragment.as_deref() == Some("{\"a\":")));
        assert_eq!(end, vec![StreamEvent::end(FinishReason::ToolCalls)]);
        assert!(state.is_finished());
    }

    #[test]
    fn test_garbage_chunk_is_skipped() {
        let mut state = OpenAIStreamState::default();
        assert!(state.process_data("not json").unwrap().is_empty());
    }

    #[test]
    fn test_error_payload_is_classified() {
        let mut state = OpenAIStreamState::default();
        let err = state
            .process_data(r#"{"error":{"message":"Rate limit reached","type":"tokens","code":"rate_limit_exceeded"}}"#)
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimit { .. }));
    }
}
