//! Training data capture: one record plus one PNG per agent turn.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use safari_core::capture::ViewportImage;
use safari_core::dataset::{DatasetError, DatasetSink, TrainingRecord};
use safari_core::ids::EpisodeId;
use safari_core::provider::ReasoningResponse;
use safari_core::tools::{ToolCall, ToolResultRecord};

use crate::prompt::SYSTEM_PROMPT;

pub const DATASET_FILE: &str = "dataset.jsonl";

/// What one turn contributes to its record.
pub struct RecordedTurn<'a> {
    pub turn: u32,
    pub context: &'a str,
    pub image: &'a ViewportImage,
    pub tool_calls: &'a [ToolCall],
    pub tool_results: &'a [ToolResultRecord],
    pub request_payload: Value,
    pub response: &'a ReasoningResponse,
}

/// Binds an episode id and mission to a sink for the length of one run.
pub struct DatasetRecorder {
    sink: Arc<dyn DatasetSink>,
    episode_id: EpisodeId,
    mission: String,
}

impl DatasetRecorder {
    pub fn start(sink: Arc<dyn DatasetSink>, mission: impl Into<String>) -> Self {
        Self {
            sink,
            episode_id: EpisodeId::new(),
            mission: mission.into(),
        }
    }

    pub fn episode_id(&self) -> &EpisodeId {
        &self.episode_id
    }

    pub async fn record_turn(&self, turn: RecordedTurn<'_>) -> Result<(), DatasetError> {
        let record = TrainingRecord {
            episode_id: self.episode_id.clone(),
            mission: self.mission.clone(),
            turn: turn.turn,
            system_prompt: SYSTEM_PROMPT.to_string(),
            context_text: turn.context.to_string(),
            image_file: TrainingRecord::image_file_name(&self.episode_id, turn.turn),
            tool_calls: turn.tool_calls.to_vec(),
            tool_results: turn.tool_results.to_vec(),
            thought_text: turn.response.thought.clone(),
            raw_request: turn.request_payload,
            raw_response: turn.response.debug_payload(),
        };
        self.sink.record(&record, turn.image).await
    }
}

#[derive(Serialize)]
struct JsonlLine<'a> {
    #[serde(flatten)]
    record: &'a TrainingRecord,
    recorded_at: DateTime<Utc>,
}

/// Appends records to `<dir>/dataset.jsonl` and writes images under `<dir>/images/`.
pub struct JsonlDatasetSink {
    dir: PathBuf,
    append_lock: tokio::sync::Mutex<()>,
}

impl JsonlDatasetSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            append_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl DatasetSink for JsonlDatasetSink {
    async fn record(&self, record: &TrainingRecord, image: &ViewportImage) -> Result<(), DatasetError> {
        let image_path = self.dir.join(&record.image_file);
        if let Some(parent) = image_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !image.is_empty() {
            tokio::fs::write(&image_path, &image.bytes).await?;
        }

        let mut line = serde_json::to_vec(&JsonlLine {
            record,
            recorded_at: Utc::now(),
        })?;
        line.push(b'\n');

        let _guard = self.append_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(DATASET_FILE))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        debug!(episode = %record.episode_id, turn = record.turn, "dataset turn saved");
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Default)]
pub struct MemoryDatasetSink {
    records: parking_lot::Mutex<Vec<TrainingRecord>>,
}

impl MemoryDatasetSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TrainingRecord> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl DatasetSink for MemoryDatasetSink {
    async fn record(&self, record: &TrainingRecord, _image: &ViewportImage) -> Result<(), DatasetError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
