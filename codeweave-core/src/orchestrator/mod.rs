//! Completion orchestrator
//!
//! The façade that turns one logical request into provider attempts. For
//! each provider picked by the chain, the reply is normalized into events,
//! forwarded to the caller's sink as it arrives, fed to a fresh tool-call
//! accumulator and finally shaped into an [`Outcome`].

pub mod sink;
pub mod structured;

pub use sink::{ChannelStreamSink, CollectingStreamSink, NullStreamSink, SinkEvent, StreamSink};
pub use structured::parse_files;

use crate::config::{CodeweaveConfig, ConfigResult};
use crate::protocol::types::{CompletionRequest, FinishReason, GenerationParams, Outcome, OutputMode, StreamEvent};
use crate::providers::accumulator::ToolCallAccumulator;
use crate::providers::adapter::{ProviderDescriptor, ProviderReply};
use crate::providers::classifier::ClassifiedError;
use crate::providers::error::ProviderError;
use crate::providers::retry::RetryPolicy;
use crate::providers::routing::ProviderChain;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

/// Buffered events between a spawned request and its receiver
const STREAM_BUFFER: usize = 256;

/// Entry point for orchestrated completions
#[derive(Debug, Clone)]
pub struct CompletionOrchestrator {
    chain: ProviderChain,
    defaults: GenerationParams,
}

impl CompletionOrchestrator {
    /// Create an orchestrator over already-resolved providers
    pub fn new(providers: Vec<ProviderDescriptor>, policy: RetryPolicy) -> Self {
        Self {
            chain: ProviderChain::new(providers, policy),
            defaults: GenerationParams::default(),
        }
    }

    /// Build from a validated configuration
    pub fn from_config(config: &CodeweaveConfig) -> ConfigResult<Self> {
        let http = config.http_client()?;
        let descriptors = config.resolve_descriptors(&http);
        Ok(Self::new(descriptors, config.retry_policy()).with_defaults(GenerationParams {
            temperature: Some(config.defaults.temperature),
            deterministic: false,
            max_output_tokens: config.defaults.max_output_tokens,
        }))
    }

    /// Parameters used where a request leaves them unset
    pub fn with_defaults(mut self, defaults: GenerationParams) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    /// Run a request, pushing events to `sink` as they arrive
    pub async fn orchestrate(
        &self,
        request: CompletionRequest,
        sink: &dyn StreamSink,
    ) -> Result<Outcome, ClassifiedError> {
        let request = self.apply_defaults(request);
        let mode = request.mode;
        let span = info_span!("orchestrate", mode = ?mode, tools = request.tools.len());

        async move {
            let success = self
                .chain
                .run(&request, move |descriptor, position, reply| async move {
                    sink.on_provider_start(&descriptor.id, position).await;
                    consume_reply(&descriptor.id, reply, mode, sink).await
                })
                .await?;

            info!(provider = %success.provider, position = success.position, "Request completed");
            Ok(success.value)
        }
        .instrument(span)
        .await
    }

    /// Run a request without observing intermediate events
    pub async fn complete(&self, request: CompletionRequest) -> Result<Outcome, ClassifiedError> {
        self.orchestrate(request, &NullStreamSink).await
    }

    /// Run a request on a spawned task
    ///
    /// Events arrive on the receiver while the task runs; the join handle
    /// resolves to the final result.
    pub fn orchestrate_stream(
        self: Arc<Self>,
        request: CompletionRequest,
    ) -> (
        mpsc::Receiver<SinkEvent>,
        JoinHandle<Result<Outcome, ClassifiedError>>,
    ) {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let handle = tokio::spawn(async move {
            let sink = ChannelStreamSink::new(tx);
            self.orchestrate(request, &sink).await
        });
        (rx, handle)
    }

    fn apply_defaults(&self, mut request: CompletionRequest) -> CompletionRequest {
        if request.params.temperature.is_none() {
            request.params.temperature = self.defaults.temperature;
        }
        if request.params.max_output_tokens.is_none() {
            request.params.max_output_tokens = self.defaults.max_output_tokens;
        }
        request
    }
}

/// Drain one provider's reply into an outcome
async fn consume_reply(
    provider: &str,
    reply: ProviderReply,
    mode: OutputMode,
    sink: &dyn StreamSink,
) -> Result<Outcome, ProviderError> {
    let mut events = reply.into_events();
    let mut text = String::new();
    let mut accumulator = ToolCallAccumulator::new();
    let mut finish = None;

    while let Some(item) = events.next().await {
        if sink.is_closed() {
            return Err(abandoned(provider));
        }
        let event = item?;
        sink.on_event(&event).await;
        if sink.is_closed() {
            return Err(abandoned(provider));
        }

        match event {
            StreamEvent::TextDelta(delta) => text.push_str(&delta),
            StreamEvent::ToolCallDelta(ref delta) => accumulator.push(delta),
            StreamEvent::StreamEnd(reason) => {
                finish = Some(reason);
                break;
            }
        }
    }

    let finish = finish.ok_or_else(|| ProviderError::malformed("Stream ended without a finish reason"))?;
    match finish {
        FinishReason::Safety => {
            return Err(ProviderError::safety("Output withheld by content filter"));
        }
        FinishReason::Length => {
            warn!(provider, "Output truncated by token limit");
        }
        _ => {}
    }

    if mode == OutputMode::StructuredJson {
        if !accumulator.is_empty() {
            warn!(provider, calls = accumulator.len(), "Ignoring tool calls in structured mode");
        }
        let files = structured::parse_files(&text)?;
        return Ok(Outcome::StructuredResult { files });
    }

    let tool_calls = if finish == FinishReason::ToolCalls {
        accumulator.finalize()
    } else {
        if !accumulator.is_empty() {
            warn!(
                provider,
                calls = accumulator.len(),
                finish = ?finish,
                "Discarding tool call fragments from a stream that did not request tool calls"
            );
        }
        Vec::new()
    };

    if text.is_empty() && tool_calls.is_empty() {
        return Err(ProviderError::malformed("Response contained no text and no tool calls"));
    }

    Ok(Outcome::ChatMessage { text, tool_calls })
}

/// The caller stopped listening; never a failover trigger
fn abandoned(provider: &str) -> ProviderError {
    info!(provider, "Stream receiver dropped, abandoning request");
    ProviderError::Other("Request abandoned: stream receiver was dropped".to_string())
}
