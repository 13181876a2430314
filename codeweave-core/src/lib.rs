//! Codeweave Core Library
//!
//! Resilient streaming completions over several LLM providers. A request is
//! sent to the highest-priority provider; rate limits are retried with
//! backoff and then failed over to the next provider, while every other
//! failure is reported immediately. Provider streams are normalized into one
//! event vocabulary, tool calls are reassembled from fragments, and the
//! caller receives either a chat message or a set of structured file edits.
//!
//! ```no_run
//! use codeweave_core::{config, CompletionOrchestrator, CompletionRequest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = config::load_from_path("codeweave.yaml")?;
//! let orchestrator = CompletionOrchestrator::from_config(&config)?;
//! let outcome = orchestrator.complete(CompletionRequest::chat("Hello")).await?;
//! println!("{:?}", outcome.text());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;
pub mod orchestrator;
pub mod protocol;
pub mod providers;

pub use orchestrator::{CompletionOrchestrator, SinkEvent, StreamSink};
pub use protocol::{CompletionRequest, FileEdit, Outcome, StreamEvent, ToolInvocation};
pub use providers::{ClassifiedError, ErrorKind, ProviderError};

/// Returns the version of the Codeweave Core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
