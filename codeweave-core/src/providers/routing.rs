//! Provider chain with capacity-only failover
//!
//! Providers are tried strictly in configured priority order. The chain
//! only advances when the current provider fails with a rate-limit class
//! error after its retries are spent; every other failure ends the request.

use crate::protocol::types::CompletionRequest;
use crate::providers::adapter::{ProviderDescriptor, ProviderReply};
use crate::providers::classifier::{ClassifiedError, ErrorKind, ResponseClassifier};
use crate::providers::error::ProviderError;
use crate::providers::retry::{RetryExecutor, RetryPolicy};
use std::fmt;
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Position of the chain for one logical request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainState {
    /// Running the pipeline for the provider at this position
    Attempting(usize),
    /// Moving on to the provider at this position after a capacity failure
    Advancing(usize),
    Succeeded,
    Exhausted,
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainState::Attempting(i) => write!(f, "attempting({})", i),
            ChainState::Advancing(i) => write!(f, "advancing({})", i),
            ChainState::Succeeded => write!(f, "succeeded"),
            ChainState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// A provider that was abandoned during a request
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: ProviderError,
}

/// Diagnostics for one routed request; logged, never returned to callers
#[derive(Debug, Clone, Default)]
pub struct RoutingReport {
    pub provider_used: Option<String>,
    pub failures: Vec<ProviderFailure>,
}

impl RoutingReport {
    pub fn used_fallback(&self) -> bool {
        !self.failures.is_empty()
    }

    fn log(&self) {
        let failed: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.provider, f.error))
            .collect();
        info!(
            provider = self.provider_used.as_deref().unwrap_or("none"),
            used_fallback = self.used_fallback(),
            failed = ?failed,
            "Routing finished"
        );
    }
}

/// Value produced by the provider that succeeded
#[derive(Debug)]
pub struct ChainSuccess<T> {
    pub value: T,
    pub provider: String,
    pub position: usize,
    pub report: RoutingReport,
}

/// Ordered provider list plus the retry policy applied to each invocation
#[derive(Debug, Clone)]
pub struct ProviderChain {
    providers: Vec<ProviderDescriptor>,
    retry: RetryExecutor,
}

impl ProviderChain {
    pub fn new(providers: Vec<ProviderDescriptor>, policy: RetryPolicy) -> Self {
        Self {
            providers,
            retry: RetryExecutor::new(policy),
        }
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// Provider ids in priority order
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id.clone()).collect()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.retry.policy()
    }

    /// Drive one logical request across the chain
    ///
    /// For each provider the invocation is wrapped in the retry executor,
    /// then `consume` turns the reply into a value. Errors raised by
    /// `consume` go through the same failover decision as invocation errors
    /// but are never retried, since a half-read stream cannot be resumed.
    pub async fn run<T, F, Fut>(
        &self,
        request: &CompletionRequest,
        mut consume: F,
    ) -> Result<ChainSuccess<T>, ClassifiedError>
    where
        F: FnMut(ProviderDescriptor, usize, ProviderReply) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        if self.providers.is_empty() {
            return Err(ClassifiedError::new(
                ErrorKind::Unknown,
                "No providers configured",
            ));
        }

        let mut report = RoutingReport::default();
        let mut state = ChainState::Attempting(0);

        for (position, descriptor) in self.providers.iter().enumerate() {
            debug!(provider = %descriptor.id, state = %state, "Provider chain step");

            let result = match self.invoke(descriptor, request).await {
                Ok(reply) => consume(descriptor.clone(), position, reply).await,
                Err(e) => Err(e),
            };

            let err = match result {
                Ok(value) => {
                    state = ChainState::Succeeded;
                    debug!(provider = %descriptor.id, state = %state, "Provider chain step");
                    report.provider_used = Some(descriptor.id.clone());
                    report.log();
                    return Ok(ChainSuccess {
                        value,
                        provider: descriptor.id.clone(),
                        position,
                        report,
                    });
                }
                Err(err) => err,
            };

            let classification = ResponseClassifier::classify(&err);
            if !classification.kind.triggers_failover() {
                warn!(
                    provider = %descriptor.id,
                    kind = %classification.kind,
                    error = %err,
                    "Provider failed without failover"
                );
                report.failures.push(ProviderFailure {
                    provider: descriptor.id.clone(),
                    error: err.clone(),
                });
                report.log();
                return Err(ClassifiedError::from_provider_error(&err).with_provider(&descriptor.id));
            }

            warn!(
                provider = %descriptor.id,
                kind = %classification.kind,
                error = %err,
                "Provider out of capacity, failing over"
            );
            report.failures.push(ProviderFailure {
                provider: descriptor.id.clone(),
                error: err,
            });
            state = ChainState::Advancing(position + 1);
        }

        state = ChainState::Exhausted;
        report.log();

        // The loop ran at least once, so there is a last failure
        let (last_provider, last_message) = report
            .failures
            .last()
            .map(|f| (f.provider.clone(), f.error.root().to_string()))
            .unwrap_or_default();
        error!(
            providers = self.providers.len(),
            last_provider = %last_provider,
            state = %state,
            "All providers exhausted"
        );

        Err(ClassifiedError::all_providers_exhausted(
            self.providers.len(),
            &last_provider,
            &last_message,
        ))
    }

    async fn invoke(
        &self,
        descriptor: &ProviderDescriptor,
        request: &CompletionRequest,
    ) -> Result<ProviderReply, ProviderError> {
        let invocation = descriptor.invocation_for(request);
        info!(
            provider = %descriptor.id,
            model = %descriptor.model,
            request_id = %invocation.request_id,
            stream = invocation.stream,
            "Invoking provider"
        );

        self.retry
            .execute(|| {
                let provider = descriptor.provider.clone();
                let invocation = invocation.clone();
                async move { provider.invoke(invocation).await }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::adapter::{
        CompletedResponse, Invocation, Provider, ProviderType,
    };
    use crate::protocol::types::FinishReason;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FixedProvider {
        name: String,
        error: Option<ProviderError>,
        calls: AtomicU32,
    }

    impl FixedProvider {
        fn failing(name: &str, error: ProviderError) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                error: Some(error),
                calls: AtomicU32::new(0),
            })
        }

        fn ok(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                error: None,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn provider_type(&self) -> ProviderType {
            ProviderType::OpenAI
        }

        async fn invoke(&self, _invocation: Invocation) -> Result<ProviderReply, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.error {
                Some(e) => Err(e.clone()),
                None => Ok(ProviderReply::Complete(CompletedResponse {
                    text: format!("from {}", self.name),
                    tool_calls: vec![],
                    finish_reason: FinishReason::Stop,
                })),
            }
        }
    }

    fn descriptor(provider: Arc<FixedProvider>) -> ProviderDescriptor {
        ProviderDescriptor::new(provider.name.clone(), provider, "model")
    }

    async fn provider_name(
        d: ProviderDescriptor,
        _position: usize,
        _reply: ProviderReply,
    ) -> Result<String, ProviderError> {
        Ok(d.id)
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallbacks() {
        let primary = FixedProvider::ok("primary");
        let fallback = FixedProvider::ok("fallback");
        let chain = ProviderChain::new(
            vec![descriptor(primary.clone()), descriptor(fallback.clone())],
            RetryPolicy::no_retry(),
        );

        let success = chain
            .run(&CompletionRequest::chat("hi"), provider_name)
            .await
            .unwrap();

        assert_eq!(success.value, "primary");
        assert_eq!(success.position, 0);
        assert!(!success.report.used_fallback());
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auth_error_does_not_fail_over() {
        let primary = FixedProvider::failing("primary", ProviderError::Authentication("bad key".into()));
        let fallback = FixedProvider::ok("fallback");
        let chain = ProviderChain::new(
            vec![descriptor(primary), descriptor(fallback.clone())],
            RetryPolicy::no_retry(),
        );

        let err = chain
            .run(&CompletionRequest::chat("hi"), provider_name)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::AuthError);
        assert_eq!(err.provider.as_deref(), Some("primary"));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_consumer_rate_limit_fails_over_without_retry() {
        let primary = FixedProvider::ok("primary");
        let fallback = FixedProvider::ok("fallback");
        let chain = ProviderChain::new(
            vec![descriptor(primary.clone()), descriptor(fallback)],
            RetryPolicy::default(),
        );

        let success = chain
            .run(&CompletionRequest::chat("hi"), |d, position, _reply| async move {
                if position == 0 {
                    Err(ProviderError::rate_limit("quota exceeded mid-stream"))
                } else {
                    Ok(d.id)
                }
            })
            .await
            .unwrap();

        assert_eq!(success.value, "fallback");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(success.report.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_is_an_error() {
        let chain = ProviderChain::new(vec![], RetryPolicy::no_retry());
        let err = chain
            .run(&CompletionRequest::chat("hi"), provider_name)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
    }
}
