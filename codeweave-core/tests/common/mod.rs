//! Scripted providers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use codeweave_core::protocol::{FinishReason, StreamEvent, ToolCallDelta};
use codeweave_core::providers::{
    CompletedResponse, EventStream, Invocation, Provider, ProviderDescriptor, ProviderError,
    ProviderReply, ProviderType, RetryPolicy,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted answer to an `invoke` call
pub enum Step {
    /// Invocation fails before any reply
    Fail(ProviderError),
    /// Reply is a stream of these items
    Stream(Vec<Result<StreamEvent, ProviderError>>),
    /// Reply is a complete response
    Complete(CompletedResponse),
}

/// Provider names in the order they were invoked, shared across providers
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Provider that replays a fixed script; the last step repeats forever
pub struct ScriptedProvider {
    name: String,
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    invocations: Mutex<Vec<Invocation>>,
    log: CallLog,
}

impl ScriptedProvider {
    pub fn new(name: &str, steps: Vec<Step>) -> Arc<Self> {
        Self::with_log(name, steps, CallLog::default())
    }

    /// Like `new`, recording each invocation in `log`
    pub fn with_log(name: &str, steps: Vec<Step>, log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            steps: Mutex::new(steps.into()),
            calls: AtomicU32::new(0),
            invocations: Mutex::new(Vec::new()),
            log,
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn descriptor(self: &Arc<Self>) -> ProviderDescriptor {
        ProviderDescriptor::new(self.name.clone(), self.clone(), "test-model")
    }
}

fn replay(step: &Step) -> Result<ProviderReply, ProviderError> {
    match step {
        Step::Fail(e) => Err(e.clone()),
        Step::Stream(items) => {
            let stream: EventStream = Box::pin(futures::stream::iter(items.clone()));
            Ok(ProviderReply::Stream(stream))
        }
        Step::Complete(response) => Ok(ProviderReply::Complete(response.clone())),
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::OpenAI
    }

    async fn invoke(&self, invocation: Invocation) -> Result<ProviderReply, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.invocations.lock().unwrap().push(invocation);
        self.log.lock().unwrap().push(self.name.clone());

        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            let step = steps.pop_front().unwrap();
            replay(&step)
        } else {
            replay(steps.front().expect("script must not be empty"))
        }
    }
}

pub fn text_stream(parts: &[&str]) -> Step {
    let mut items: Vec<_> = parts.iter().map(|p| Ok(StreamEvent::text(*p))).collect();
    items.push(Ok(StreamEvent::end(FinishReason::Stop)));
    Step::Stream(items)
}

pub fn rate_limited() -> Step {
    Step::Fail(ProviderError::rate_limit("429 Too Many Requests"))
}

pub fn tool_delta(index: usize, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> StreamEvent {
    StreamEvent::ToolCallDelta(ToolCallDelta {
        index,
        id: id.map(String::from),
        name_part: name.map(String::from),
        args_fragment: args.map(String::from),
    })
}

/// Route library logs to the test harness; `RUST_LOG` filters them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Short delays so paused-clock tests stay readable
pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(max_retries).with_delays(100, 1_000).with_jitter(0)
}
