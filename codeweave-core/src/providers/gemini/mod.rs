//! Gemini provider implementation
//!
//! Adapter for the Google Generative Language API, translating the
//! orchestrator's invocation into `generateContent` requests and
//! normalizing its SSE stream.

mod client;
pub mod converter;
pub mod streaming;
pub mod types;

pub use client::GeminiProvider;
pub use streaming::{parse_stream, GeminiStreamState};
