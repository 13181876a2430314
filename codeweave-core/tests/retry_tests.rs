//! Tests for rate-limit retries

use codeweave_core::providers::{ProviderError, RetryExecutor, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_rate_limit_retried_until_success() {
    let executor = RetryExecutor::new(RetryPolicy::default());
    let calls = AtomicU32::new(0);

    let outcome = executor
        .execute_traced(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::rate_limit("429 Too Many Requests"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

    assert_eq!(outcome.result.unwrap(), "done");
    assert_eq!(outcome.calls, 3);
    assert_eq!(outcome.delays.len(), 2);

    // Each sleep is the doubling base plus at most one jitter window
    for (i, delay) in outcome.delays.iter().enumerate() {
        let base = RetryPolicy::default().base_delay(i as u32 + 1);
        assert!(*delay >= base, "delay {:?} below base {:?}", delay, base);
        assert!(*delay < base + Duration::from_millis(1_000));
    }
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted_after_max_retries() {
    let executor = RetryExecutor::new(RetryPolicy::new(3).with_jitter(0));
    let calls = AtomicU32::new(0);

    let outcome = executor
        .execute_traced(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ProviderError::rate_limit("quota")) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(
        outcome.delays,
        vec![
            Duration::from_millis(2_000),
            Duration::from_millis(4_000),
            Duration::from_millis(8_000),
        ]
    );
    match outcome.result {
        Err(ProviderError::RetriesExhausted { attempts, source }) => {
            assert_eq!(attempts, 4);
            assert!(matches!(*source, ProviderError::RateLimit { .. }));
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_non_rate_limit_errors_are_not_retried() {
    let executor = RetryExecutor::new(RetryPolicy::default());

    for error in [
        ProviderError::safety("SAFETY"),
        ProviderError::Authentication("invalid api key".into()),
        ProviderError::Network("connection reset".into()),
        ProviderError::malformed("429 appeared in a broken body"),
    ] {
        let calls = AtomicU32::new(0);
        let outcome = executor
            .execute_traced(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                let error = error.clone();
                async move { Err::<(), _>(error) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1, "{} was retried", error);
        assert!(outcome.delays.is_empty());
        assert!(!matches!(outcome.result, Err(ProviderError::RetriesExhausted { .. })));
    }
}

#[tokio::test(start_paused = true)]
async fn test_delay_is_capped() {
    let policy = RetryPolicy::new(5).with_delays(2_000, 5_000).with_jitter(0);
    let executor = RetryExecutor::new(policy);

    let outcome = executor
        .execute_traced(|| async { Err::<(), _>(ProviderError::rate_limit("slow down")) })
        .await;

    let millis: Vec<u128> = outcome.delays.iter().map(Duration::as_millis).collect();
    assert_eq!(millis, vec![2_000, 4_000, 5_000, 5_000, 5_000]);
}

#[tokio::test]
async fn test_no_retry_policy_returns_exhausted_after_one_call() {
    let executor = RetryExecutor::new(RetryPolicy::no_retry());
    let calls = AtomicU32::new(0);

    let result = executor
        .execute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ProviderError::rate_limit("quota")) }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(result, Err(ProviderError::RetriesExhausted { attempts: 1, .. })));
}
