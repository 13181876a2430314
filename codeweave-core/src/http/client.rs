//! HTTP client implementation using reqwest

use crate::http::error::map_http_error;
use crate::http::RequestOptions;
use crate::providers::error::ProviderError;
use reqwest::{Client, ClientBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Maximum non-streaming response size
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Default user agent
const USER_AGENT: &str = concat!("codeweave/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with connection pooling
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: Arc<Client>,

    /// Maximum response size to prevent OOM
    max_response_size: usize,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_config(Duration::from_secs(10), Duration::from_secs(120), 10)
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(
        connect_timeout: Duration,
        request_timeout: Duration,
        max_idle_per_host: usize,
    ) -> Result<Self, ProviderError> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            max_response_size: MAX_RESPONSE_SIZE,
        })
    }

    /// POST a JSON body and return the response once its status is a success
    ///
    /// The body is left unread so callers can consume it as a stream.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        options: &RequestOptions,
    ) -> Result<Response, ProviderError> {
        let request_id = options.request_id;
        info!(%request_id, url, "Sending provider request");

        let mut builder = self
            .client
            .post(url)
            .json(body)
            .header("X-Request-ID", request_id.to_string());
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            error!(%request_id, error = %e, "Provider request failed");
            ProviderError::from(e)
        })?;

        let status = response.status();
        debug!(%request_id, status = status.as_u16(), "Response status");

        if !status.is_success() {
            let body = response.text().await.ok();
            warn!(%request_id, status = status.as_u16(), "Provider returned an error status");
            return Err(map_http_error(status, body, request_id));
        }

        Ok(response)
    }

    /// Read a complete JSON response body
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        response: Response,
        options: &RequestOptions,
    ) -> Result<T, ProviderError> {
        let request_id = options.request_id;
        self.check_content_length(&response)?;

        let text = response.text().await.map_err(|e| {
            ProviderError::Network(format!(
                "Failed to read response body: {} [request_id: {}]",
                e, request_id
            ))
        })?;

        if text.len() > self.max_response_size {
            return Err(ProviderError::malformed(format!(
                "Response size {} exceeds maximum {} [request_id: {}]",
                text.len(),
                self.max_response_size,
                request_id
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            error!(%request_id, error = %e, "Failed to parse provider response");
            ProviderError::malformed(format!(
                "Invalid response format: {} [request_id: {}]",
                e, request_id
            ))
        })
    }

    /// Check response size to prevent OOM
    fn check_content_length(&self, response: &Response) -> Result<(), ProviderError> {
        if let Some(content_length) = response.content_length() {
            if content_length as usize > self.max_response_size {
                return Err(ProviderError::malformed(format!(
                    "Response size {} exceeds maximum {}",
                    content_length, self.max_response_size
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_response_size", &self.max_response_size)
            .finish_non_exhaustive()
    }
}
