use async_trait::async_trait;
use serde_json::{json, Value};

use crate::capture::ViewportImage;
use crate::errors::GatewayError;
use crate::tools::{ArgRepair, ToolCall, ToolDefinition};

/// Everything a reasoning service sees for one turn.
#[derive(Clone, Debug)]
pub struct ReasoningRequest {
    pub system: String,
    pub context: String,
    pub image: ViewportImage,
    pub tools: Vec<ToolDefinition>,
}

impl ReasoningRequest {
    /// Request summary safe to stream to observers (image elided).
    pub fn debug_payload(&self) -> Value {
        json!({
            "messages": [
                {"type": "system", "content": self.system},
                {"type": "human", "content": "[multimodal]", "text": self.context},
            ],
            "tools": self.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReasoningResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    /// Argument fix-ups applied while parsing, keyed by tool name.
    pub repairs: Vec<(String, ArgRepair)>,
    pub thought: Option<String>,
    pub raw: Value,
    pub duration_ms: u64,
}

impl ReasoningResponse {
    pub fn debug_payload(&self) -> Value {
        json!({
            "content": self.text,
            "toolCalls": self.tool_calls,
            "thought": self.thought,
            "raw": self.raw,
            "durationMs": self.duration_ms,
        })
    }
}

/// Vision-language model behind a single call interface.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn invoke(&self, request: &ReasoningRequest) -> Result<ReasoningResponse, GatewayError>;
}
