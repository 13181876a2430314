//! Protocol module for orchestrated completion structures
//!
//! This module defines the canonical data models shared by every provider:
//! - Provider-agnostic requests and outcomes
//! - The normalized stream event vocabulary
//! - The project snapshot used as prompt context

pub mod snapshot;
pub mod types;

pub use snapshot::{ApplyReport, ProjectSnapshot};
pub use types::{
    CompletionRequest, FileEdit, FinishReason, GenerationParams, Message, MessageRole, Outcome,
    OutputMode, StreamEvent, ToolCallDelta, ToolDeclaration, ToolInvocation,
};
