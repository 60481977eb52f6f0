use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use safari_core::capture::{CaptureError, CaptureService, ViewportImage};
use safari_core::ids::SessionId;
use safari_settings::CaptureSettings;

/// Fetches PNG viewport renders from the capture sidecar.
pub struct HttpCaptureService {
    client: Client,
    base_url: String,
}

impl HttpCaptureService {
    pub fn new(settings: &CaptureSettings) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                Client::new()
            });
        Self {
            client,
            base_url: settings.base_url.clone(),
        }
    }
}

#[async_trait]
impl CaptureService for HttpCaptureService {
    async fn capture(&self, session_id: &SessionId) -> Result<ViewportImage, CaptureError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("sessionId", session_id.as_str())])
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CaptureError::Status(status.as_u16()));
        }
        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = resp.bytes().await.map_err(transport_error)?;
        if bytes.is_empty() {
            return Err(CaptureError::InvalidImage("empty body".into()));
        }
        tracing::debug!(session_id = %session_id, bytes = bytes.len(), "viewport captured");
        Ok(ViewportImage { mime, bytes })
    }
}

fn transport_error(e: reqwest::Error) -> CaptureError {
    if e.is_timeout() {
        CaptureError::Timeout
    } else {
        CaptureError::Unavailable(e.to_string())
    }
}
