use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capture::ViewportImage;
use crate::ids::EpisodeId;
use crate::tools::{ToolCall, ToolResultRecord};

/// One supervised example: what the agent saw and what it did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub episode_id: EpisodeId,
    pub mission: String,
    pub turn: u32,
    pub system_prompt: String,
    pub context_text: String,
    pub image_file: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResultRecord>,
    pub thought_text: Option<String>,
    pub raw_request: Value,
    pub raw_response: Value,
}

impl TrainingRecord {
    /// Image path relative to the dataset root.
    pub fn image_file_name(episode_id: &EpisodeId, turn: u32) -> String {
        format!("images/ep_{episode_id}_turn_{turn:03}.png")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset encode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persists training records together with the turn's image.
#[async_trait]
pub trait DatasetSink: Send + Sync {
    async fn record(&self, record: &TrainingRecord, image: &ViewportImage) -> Result<(), DatasetError>;
}
