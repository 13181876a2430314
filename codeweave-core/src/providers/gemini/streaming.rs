//! Streaming support for Gemini responses

use super::converter::{check_prompt_feedback, error_from_detail, map_finish_reason};
use super::types::{GeminiErrorDetail, GeminiResponse};
use crate::protocol::types::{StreamEvent, ToolCallDelta};
use crate::providers::adapter::EventStream;
use crate::providers::error::ProviderError;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::fmt;

/// Per-stream normalization state for `streamGenerateContent?alt=sse`
///
/// Gemini delivers each function call whole, so every call becomes one
/// complete delta with the next free index.
#[derive(Debug, Default)]
pub struct GeminiStreamState {
    next_tool_index: usize,
    finished: bool,
}

impl GeminiStreamState {
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Normalize the data field of one SSE event
    pub fn process_data(&mut self, data: &str) -> Result<Vec<StreamEvent>, ProviderError> {
        let data = data.trim();
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let value: Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse stream chunk");
                return Ok(Vec::new());
            }
        };

        if let Some(error) = value.get("error") {
            let detail = serde_json::from_value::<GeminiErrorDetail>(error.clone())
                .unwrap_or_else(|_| GeminiErrorDetail {
                    code: None,
                    message: error.to_string(),
                    status: None,
                });
            return Err(error_from_detail(&detail));
        }

        let chunk: GeminiResponse = match serde_json::from_value(value) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping stream chunk with unexpected shape");
                return Ok(Vec::new());
            }
        };
        check_prompt_feedback(&chunk)?;

        let mut events = Vec::new();
        if self.finished {
            return Ok(events);
        }

        let Some(candidate) = chunk.candidates.into_iter().next() else {
            return Ok(events);
        };

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                events.push(StreamEvent::TextDelta(text));
            }
            if let Some(call) = part.function_call {
                events.push(StreamEvent::ToolCallDelta(ToolCallDelta {
                    index: self.next_tool_index,
                    id: None,
                    name_part: Some(call.name.clone()),
                    args_fragment: Some(call.args_json()?),
                }));
                self.next_tool_index += 1;
            }
        }

        if let Some(reason) = candidate
            .finish_reason
            .as_deref()
            .filter(|r| *r != "FINISH_REASON_UNSPECIFIED")
        {
            let saw_function_call = self.next_tool_index > 0;
            events.push(StreamEvent::StreamEnd(map_finish_reason(reason, saw_function_call)));
            self.finished = true;
        }

        Ok(events)
    }
}

/// Parse a Gemini SSE byte stream into normalized events
pub fn parse_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut state = GeminiStreamState::default();
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
