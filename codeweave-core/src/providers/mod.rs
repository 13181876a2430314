//! Provider abstraction, classification and failover
//!
//! This module implements everything between the orchestrator and the
//! network: the uniform provider trait, one adapter per wire format, the
//! error taxonomy, rate-limit retries and the ordered failover chain.

pub mod accumulator;
pub mod adapter;
pub mod classifier;
pub mod error;
pub mod gemini;
pub mod openai;
pub mod retry;
pub mod routing;

pub use accumulator::{AccumulatedToolCall, DropReason, DroppedToolCall, FinalizedCalls, ToolCallAccumulator};
pub use adapter::{
    CompletedResponse, CompletedToolCall, EventStream, Invocation, Provider, ProviderDescriptor,
    ProviderReply, ProviderType,
};
pub use classifier::{Classification, ClassifiedError, ErrorKind, ResponseClassifier};
pub use error::{ProviderError, ProviderResult};
pub use retry::{RetryExecutor, RetryPolicy, RetryResult, RetryState};
pub use routing::{ChainState, ChainSuccess, ProviderChain, ProviderFailure, RoutingReport};

// Re-export concrete providers
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
