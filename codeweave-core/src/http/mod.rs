//! HTTP layer shared by every provider
//!
//! This module handles:
//! - Connection pooling and client management
//! - Request ID generation and correlation
//! - Mapping non-success responses onto provider errors

pub mod client;
pub mod error;

pub use client::HttpClient;
pub use error::map_http_error;

use std::time::Duration;
use uuid::Uuid;

/// Options for an HTTP request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Unique request ID for correlation
    pub request_id: Uuid,

    /// Per-request timeout; the client default applies when `None`
    pub timeout: Option<Duration>,

    /// Provider specific headers (authentication and the like)
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            timeout: None,
            headers: Vec::new(),
        }
    }
}

impl RequestOptions {
    /// Options correlated with an existing request id
    pub fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            ..Default::default()
        }
    }

    /// Set the timeout for this request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}
