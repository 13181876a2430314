//! Receivers for events surfaced during an orchestrated call

use crate::protocol::types::StreamEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Everything a caller can observe while a request is in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkEvent {
    /// A provider's pipeline is starting; text from earlier providers is stale
    ProviderStart { provider: String, position: usize },
    /// A normalized event from the active provider
    Event { event: StreamEvent },
}

/// Consumer of streamed events
///
/// Events arrive in exactly the order the active provider emitted them.
#[async_trait]
pub trait StreamSink: Send + Sync {
    async fn on_event(&self, event: &StreamEvent);

    /// Called before each provider's events begin
    async fn on_provider_start(&self, _provider: &str, _position: usize) {}

    /// Whether the consumer has gone away; the request is abandoned once true
    fn is_closed(&self) -> bool {
        false
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStreamSink;

#[async_trait]
impl StreamSink for NullStreamSink {
    async fn on_event(&self, _event: &StreamEvent) {}
}

/// Sink forwarding into a bounded channel
///
/// Once the receiver is dropped the sink reports itself closed and the
/// orchestrator abandons the request.
#[derive(Debug, Clone)]
pub struct ChannelStreamSink {
    tx: mpsc::Sender<SinkEvent>,
}

impl ChannelStreamSink {
    pub fn new(tx: mpsc::Sender<SinkEvent>) -> Self {
        Self { tx }
    }

    async fn forward(&self, event: SinkEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("Stream receiver dropped, discarding event");
        }
    }
}

#[async_trait]
impl StreamSink for ChannelStreamSink {
    async fn on_event(&self, event: &StreamEvent) {
        self.forward(SinkEvent::Event {
            event: event.clone(),
        })
        .await;
    }

    async fn on_provider_start(&self, provider: &str, position: usize) {
        self.forward(SinkEvent::ProviderStart {
            provider: provider.to_string(),
            position,
        })
        .await;
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Sink that buffers every event
#[derive(Debug, Default)]
pub struct CollectingStreamSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl CollectingStreamSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: SinkEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    /// Snapshot of everything received so far
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Stream events only, across every provider
    pub fn stream_events(&self) -> Vec<StreamEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Event { event } => Some(event),
                SinkEvent::ProviderStart { .. } => None,
            })
            .collect()
    }

    /// Providers started, in order
    pub fn providers(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::ProviderStart { provider, .. } => Some(provider),
                SinkEvent::Event { .. } => None,
            })
            .collect()
    }

    /// Concatenated text of the most recent provider
    pub fn text(&self) -> String {
        let mut text = String::new();
        for event in self.events() {
            match event {
                SinkEvent::ProviderStart { .. } => text.clear(),
                SinkEvent::Event {
                    event: StreamEvent::TextDelta(delta),
                } => text.push_str(&delta),
                SinkEvent::Event { .. } => {}
            }
        }
        text
    }
}

#[async_trait]
impl StreamSink for CollectingStreamSink {
    async fn on_event(&self, event: &StreamEvent) {
        self.push(SinkEvent::Event {
            event: event.clone(),
        });
    }

    async fn on_provider_start(&self, provider: &str, position: usize) {
        self.push(SinkEvent::ProviderStart {
            provider: provider.to_string(),
            position,
        });
    }
}
