//! Tool-call reassembly from streamed deltas
//!
//! Providers split a function call into fragments addressed by a call
//! index. The accumulator concatenates fragments per index in arrival order
//! and parses the argument buffer only once the stream reports that tool
//! calls were requested.

use crate::protocol::types::{StreamEvent, ToolCallDelta, ToolInvocation};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Partially received tool call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccumulatedToolCall {
    pub id: Option<String>,
    pub name: String,
    pub arguments: String,
}

/// Why a call was left out of a finalized result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Concatenated arguments are empty, not valid JSON or not an object
    InvalidArguments(String),
    /// No name fragment ever arrived
    MissingName,
}

/// A call that `finalize` discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedToolCall {
    pub index: usize,
    pub name: String,
    pub reason: DropReason,
}

/// Outcome of a finalize pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalizedCalls {
    pub invocations: Vec<ToolInvocation>,
    pub dropped: Vec<DroppedToolCall>,
}

/// Per-stream tool-call buffer
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, AccumulatedToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one stream event; anything but a tool-call delta is ignored
    pub fn consume(&mut self, event: &StreamEvent) {
        if let StreamEvent::ToolCallDelta(delta) = event {
            self.push(delta);
        }
    }

    /// Append one delta to the call at its index
    pub fn push(&mut self, delta: &ToolCallDelta) {
        let entry = self.calls.entry(delta.index).or_default();
        if entry.id.is_none() {
            entry.id = delta.id.clone();
        }
        if let Some(part) = &delta.name_part {
            entry.name.push_str(part);
        }
        if let Some(fragment) = &delta.args_fragment {
            entry.arguments.push_str(fragment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Current buffer for an index
    pub fn get(&self, index: usize) -> Option<&AccumulatedToolCall> {
        self.calls.get(&index)
    }

    /// Parse every accumulated call, dropping the ones that cannot be used
    pub fn finalize(self) -> Vec<ToolInvocation> {
        self.finalize_detailed().invocations
    }

    /// Like `finalize`, also reporting which calls were dropped and why
    ///
    /// Arguments must parse to a JSON object; an empty buffer does not.
    /// Results are ordered by call index.
    pub fn finalize_detailed(self) -> FinalizedCalls {
        let mut finalized = FinalizedCalls::default();

        for (index, call) in self.calls {
            if call.name.is_empty() {
                warn!(index, "Dropping tool call without a name");
                finalized.dropped.push(DroppedToolCall {
                    index,
                    name: call.name,
                    reason: DropReason::MissingName,
                });
                continue;
            }

            match parse_arguments(&call.arguments) {
                Ok(arguments) => finalized.invocations.push(ToolInvocation {
                    index,
                    id: call.id,
                    name: call.name,
                    arguments,
                }),
                Err(reason) => {
                    warn!(
                        index,
                        name = %call.name,
                        error = %reason,
                        "Dropping tool call with unusable arguments"
                    );
                    finalized.dropped.push(DroppedToolCall {
                        index,
                        name: call.name,
                        reason: DropReason::InvalidArguments(reason),
                    });
                }
            }
        }

        finalized
    }
}

fn parse_arguments(raw: &str) -> Result<Value, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty argument buffer".to_string());
    }
    match serde_json::from_str::<Value>(raw).map_err(|e| e.to_string())? {
        object @ Value::Object(_) => Ok(object),
        other => Err(format!("arguments must be a JSON object, got {}", other)),
    }
}
