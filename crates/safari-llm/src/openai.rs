//! OpenAI-compatible chat completions (vLLM, RunPod, local servers).

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

pub struct OpenAiReasoner {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiReasoner {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client: http::build_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            max_tokens,
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    pub fn build_body(&self, request: &ReasoningRequest) -> Value {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": [
                    {"type": "text", "text": request.context},
                    {"type": "image_url", "image_url": {"url": request.image.to_data_url()}},
                ]},
            ],
            "tools": tools,
            "temperature": 0,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl ReasoningService for OpenAiReasoner {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn invoke(&self, request: &ReasoningRequest) -> Result<ReasoningResponse, GatewayError> {
        let body = self.build_body(request);
        let key = self
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .unwrap_or_else(|| "EMPTY".to_string());

        let started = Instant::now();
        let req = self
            .client
            .post(self.endpoint())
            .bearer_auth(key)
            .header("content-type", "application/json")
            .json(&body);
        let raw = http::send_json(req, self.timeout).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut response = parse_completion(raw)?;
        response.duration_ms = duration_ms;
        debug!(
            duration_ms,
            tool_calls = response.tool_calls.len(),
            "chat completion received"
        );
        Ok(response)
    }
}

/// Extract text, thought and tool calls from a chat-completions body.
pub fn parse_completion(raw: Value) -> Result<ReasoningResponse, GatewayError> {
    let message = raw
        .pointer("/choices/0/message")
        .ok_or_else(|| GatewayError::InvalidResponse("no choices in completion".into()))?;

    let content = message.get("content").and_then(Value::as_str).unwrap_or_default();
    let (think, text) = split_think(content);
    let thought = message
        .get("reasoning_content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or(think);

    let mut tool_calls = Vec::new();
    let mut repairs = Vec::new();
    let calls = message.get("tool_calls").and_then(Value::as_array);
    for function in calls.into_iter().flatten().filter_map(|c| c.get("function")) {
        let Some(name) = function.get("name").and_then(Value::as_str) else {
            continue;
        };
        let (args, applied) = repair_args(name, decode_arguments(function.get("arguments")));
        repairs.extend(applied.into_iter().map(|r| (name.to_string(), r)));
        tool_calls.push(ToolCall::new(name, args));
    }

    Ok(ReasoningResponse {
        text,
        tool_calls,
        repairs,
        thought,
        raw,
        duration_ms: 0,
    })
}

/// Chat completions carry arguments as a JSON string; only a string that
/// still holds a string after decoding is left for `repair_args`.
fn decode_arguments(raw: Option<&Value>) -> Value {
    match raw {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

/// Thinking models inline their reasoning as `<think>...</think>`.
fn split_think(content: &str) -> (Option<String>, String) {
    if let Some(end) = content.find("</think>") {
        let head = &content[..end];
        let thought = head.trim_start().trim_start_matches("<think>").trim().to_string();
        let rest = content[end + "</think>".len()..].trim().to_string();
        let thought = (!thought.is_empty()).then_some(thought);
        (thought, rest)
    } else {
        (None, content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safari_core::capture::ViewportImage;
    use safari_core::tools::{ArgRepair, ToolDefinition};

    fn request() -> ReasoningRequest {
        ReasoningRequest {
            system: "be a safari agent".into(),
            context: "Mission: Find the red tiger".into(),
            image: ViewportImage::png(vec![1, 2, 3]),
            tools: vec![ToolDefinition {
                name: "move".into(),
                description: "move".into(),
                parameters: json!({"type": "object"}),
            }],
        }
    }

    fn reasoner(base: &str) -> OpenAiReasoner {
        OpenAiReasoner::new(base, "qwen-vl", None, 4096, Duration::from_secs(5))
    }

    #[test]
    fn body_carries_image_and_tools() {
        let body = reasoner("http://h/v1/").build_body(&request());
        assert_eq!(body["model"], "qwen-vl");
        assert_eq!(body["temperature"], 0);
        assert_eq!(body["max_tokens"], 4096);
        let url = body["messages"][1]["content"][1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(body["tools"][0]["function"]["name"], "move");
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(reasoner("http://h/v1/").endpoint(), "http://h/v1/chat/completions");
    }

    #[test]
    fn parse_repairs_list_arguments() {
        let raw = json!({
            "choices": [{"message": {
                "content": "",
                "tool_calls": [{"id": "c1", "function": {
                    "name": "move",
                    "arguments": "[{\"direction\":\"RIGHT\",\"steps\":2}]"
                }}]
            }}]
        });
        let resp = parse_completion(raw).unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].args["actions"][0]["steps"], 2);
        assert_eq!(resp.repairs, vec![("move".to_string(), ArgRepair::WrappedList)]);
    }

    #[test]
    fn string_arguments_are_not_a_repair() {
        let raw = json!({
            "choices": [{"message": {
                "tool_calls": [{"id": "c1", "function": {
                    "name": "catch",
                    "arguments": "{\"direction\":\"UP\"}"
                }}]
            }}]
        });
        let resp = parse_completion(raw).unwrap();
        assert_eq!(resp.tool_calls[0].args, json!({"direction": "UP"}));
        assert!(resp.repairs.is_empty());
    }

    #[test]
    fn parse_reads_reasoning_content() {
        let raw = json!({"choices": [{"message": {
            "content": "moving on",
            "reasoning_content": "tiger is to the right"
        }}]});
        let resp = parse_completion(raw).unwrap();
        assert_eq!(resp.text, "moving on");
        assert_eq!(resp.thought.as_deref(), Some("tiger is to the right"));
        assert!(resp.tool_calls.is_empty());
    }

    #[test]
    fn parse_splits_inline_think() {
        let raw = json!({"choices": [{"message": {
            "content": "<think>scan left</think>\nok"
        }}]});
        let resp = parse_completion(raw).unwrap();
        assert_eq!(resp.thought.as_deref(), Some("scan left"));
        assert_eq!(resp.text, "ok");
    }

    #[test]
    fn parse_without_choices_is_invalid() {
        let err = parse_completion(json!({"error": "x"})).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn invoke_against_mock_server() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/v1/chat/completions"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": null, "tool_calls": [
                    {"function": {"name": "declare_done", "arguments": "{}"}}
                ]}}]
            })))
            .mount(&server)
            .await;

        let r = reasoner(&format!("{}/v1", server.uri()));
        let resp = r.invoke(&request()).await.unwrap();
        assert_eq!(resp.tool_calls[0].name, "declare_done");
        assert_eq!(resp.tool_calls[0].args, json!({}));
    }

    #[tokio::test]
    async fn invoke_maps_http_status() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let err = reasoner(&server.uri()).invoke(&request()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
