//! OpenAI provider implementation
//!
//! Adapter for the chat completions API, used for OpenAI itself and for
//! compatible endpoints such as Groq.

mod client;
pub mod converter;
pub mod streaming;
pub mod types;

pub use client::OpenAIProvider;
pub use streaming::{parse_stream, OpenAIStreamState};
