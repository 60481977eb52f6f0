//! Gemini `generateContent` adapter with thought summaries enabled.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use safari_core::errors::GatewayError;
use safari_core::provider::{ReasoningRequest, ReasoningResponse, ReasoningService};
use safari_core::tools::ToolCall;

use crate::http;
use crate::repair::repair_args;

pub struct GeminiReasoner {
    client: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    timeout: Duration,
}

impl GeminiReasoner {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Self {
        Self {
            client: http::build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    pub fn build_body(&self, request: &ReasoningRequest) -> Value {
        let declarations: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect();

        json!({
            "systemInstruction": {"parts": [{"text": request.system}]},
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": request.context},
                    {"inlineData": {"mimeType": request.image.mime, "data": request.image.base64()}},
                ],
            }],
            "tools": [{"functionDeclarations": declarations}],
            "generationConfig": {
                "temperature": 0,
                "thinkingConfig": {"includeThoughts": true},
            },
        })
    }
}

#[async_trait]
impl ReasoningService for GeminiReasoner {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn invoke(&self, request: &ReasoningRequest) -> Result<ReasoningResponse, GatewayError> {
        let body = self.build_body(request);
        let started = Instant::now();
        let req = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body);
        let raw = http::send_json(req, self.timeout).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut response = parse_generate_content(raw)?;
        response.duration_ms = duration_ms;
        debug!(
            duration_ms,
            tool_calls = response.tool_calls.len(),
            "gemini response received"
        );
        Ok(response)
    }
}

/// Split candidate parts into thought, text and function calls.
pub fn parse_generate_content(raw: Value) -> Result<ReasoningResponse, GatewayError> {
    if let Some(reason) = raw.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
        return Err(GatewayError::InvalidResponse(format!("prompt blocked: {reason}")));
    }
    let parts = raw
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::InvalidResponse("no candidate parts".into()))?;

    let mut thoughts = Vec::new();
    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut repairs = Vec::new();

    for part in parts {
        if let Some(call) = part.get("functionCall") {
            let Some(name) = call.get("name").and_then(Value::as_str) else {
                continue;
            };
            let raw_args = call.get("args").cloned().unwrap_or(Value::Null);
            let (args, applied) = repair_args(name, raw_args);
            repairs.extend(applied.into_iter().map(|r| (name.to_string(), r)));
            tool_calls.push(ToolCall::new(name, args));
        } else if let Some(text) = part.get("text").and_then(Value::as_str) {
            if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
                thoughts.push(text.to_string());
            } else {
                texts.push(text.to_string());
            }
        }
    }

    Ok(ReasoningResponse {
        text: texts.join("\n"),
        tool_calls,
        repairs,
        thought: (!thoughts.is_empty()).then(|| thoughts.join("\n")),
        raw,
        duration_ms: 0,
    })
}
