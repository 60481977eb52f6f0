use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;

use crate::ids::SessionId;

/// A rendered image of the agent's viewport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewportImage {
    pub mime: String,
    pub bytes: Bytes,
}

impl ViewportImage {
    pub fn png(bytes: impl Into<Bytes>) -> Self {
        Self {
            mime: "image/png".into(),
            bytes: bytes.into(),
        }
    }

    pub fn base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64())
    }

    pub fn from_data_url(url: &str) -> Result<Self, CaptureError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| CaptureError::InvalidImage("missing data: prefix".into()))?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| CaptureError::InvalidImage("not a base64 data url".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| CaptureError::InvalidImage(e.to_string()))?;
        Ok(Self {
            mime: mime.to_owned(),
            bytes: bytes.into(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture backend unavailable: {0}")]
    Unavailable(String),
    #[error("capture backend returned status {0}")]
    Status(u16),
    #[error("capture timed out")]
    Timeout,
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Renders the current viewport of a session into an image.
#[async_trait]
pub trait CaptureService: Send + Sync {
    async fn capture(&self, session_id: &SessionId) -> Result<ViewportImage, CaptureError>;
}
