use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use safari_core::errors::GatewayError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client(request_timeout: Duration) -> Client {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default HTTP client");
            Client::new()
        })
}

pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(timeout)
    } else {
        GatewayError::Network(e.to_string())
    }
}

/// Send a JSON request and decode a JSON body, mapping HTTP failures.
pub(crate) async fn send_json(
    req: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<Value, GatewayError> {
    let resp = req.send().await.map_err(|e| transport_error(e, timeout))?;
    let status = resp.status();
    if !status.is_success() {
        let header_hint = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = resp.text().await.unwrap_or_default();
        let retry_after = header_hint.or_else(|| body_retry_delay(&body));
        return Err(GatewayError::from_status(status.as_u16(), body, retry_after));
    }
    resp.json::<Value>()
        .await
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

/// Gemini reports quota waits as a `google.rpc.RetryInfo` detail, e.g. `"retryDelay": "23s"`.
fn body_retry_delay(body: &str) -> Option<Duration> {
    let value: Value = serde_json::from_str(body).ok()?;
    let details = value.pointer("/error/details")?.as_array()?;
    details
        .iter()
        .filter(|d| {
            d.get("@type")
                .and_then(Value::as_str)
                .is_some_and(|t| t.ends_with("RetryInfo"))
        })
        .find_map(|d| d.get("retryDelay")?.as_str()?.strip_suffix('s')?.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn reads_gemini_retry_info() {
        let body = json!({"error": {"code": 429, "status": "RESOURCE_EXHAUSTED", "details": [
            {"@type": "type.googleapis.com/google.rpc.QuotaFailure"},
            {"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "23s"}
        ]}});
        assert_eq!(body_retry_delay(&body.to_string()), Some(Duration::from_secs(23)));
        assert_eq!(body_retry_delay("rate limited"), None);
    }

    #[tokio::test]
    async fn retry_after_header_wins() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5));
        let err = send_json(client.post(server.uri()).json(&json!({})), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }
}
