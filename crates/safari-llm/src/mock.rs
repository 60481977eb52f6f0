use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use safari_core::errors::GatewayError;
use safari_core::provider::{ReasoningRequest, ReasoningResponse, ReasoningService};
use safari_core::tools::ToolCall;

/// Pre-programmed replies for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Answer with these tool calls.
    Calls(Vec<ToolCall>),
    /// Answer with text only, no tool calls.
    Text(String),
    /// Answer with a fully built response.
    Response(ReasoningResponse),
    /// Fail the call.
    Error(GatewayError),
    /// Wait a duration, then resolve the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn call(name: &str, args: Value) -> Self {
        Self::Calls(vec![ToolCall::new(name, args)])
    }

    pub fn done() -> Self {
        Self::call("declare_done", json!({}))
    }

    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock reasoner that returns pre-programmed replies in sequence.
pub struct MockReasoner {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: Option<MockReply>,
    requests: Mutex<Vec<ReasoningRequest>>,
    call_count: AtomicUsize,
}

impl MockReasoner {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Serve `reply` once the scripted replies run out.
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ReasoningService for MockReasoner {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn invoke(&self, request: &ReasoningRequest) -> Result<ReasoningResponse, GatewayError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().push(request.clone());

        let next = self.replies.lock().pop_front().or_else(|| self.fallback.clone());
        let Some(reply) = next else {
            return Err(GatewayError::InvalidRequest(format!(
                "MockReasoner: no reply configured for call {idx}"
            )));
        };

        resolve_reply(reply).await
    }
}

/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_reply(reply: MockReply) -> Result<ReasoningResponse, GatewayError> {
    let mut current = reply;
    loop {
        match current {
            MockReply::Calls(tool_calls) => {
                return Ok(ReasoningResponse {
                    raw: json!({"mock": true, "toolCalls": tool_calls.len()}),
                    tool_calls,
                    ..Default::default()
                });
            }
            MockReply::Text(text) => {
                return Ok(ReasoningResponse {
                    raw: json!({"mock": true}),
                    text,
                    ..Default::default()
                });
            }
            MockReply::Response(response) => return Ok(response),
            MockReply::Error(e) => return Err(e),
            MockReply::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}
