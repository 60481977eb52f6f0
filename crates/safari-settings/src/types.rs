//! Settings sections. Every section is `#[serde(default)]` so partial files
//! merge cleanly over the compiled defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SafariSettings {
    pub server: ServerSettings,
    pub world: WorldSettings,
    pub agent: AgentSettings,
    pub autoplay: AutoplaySettings,
    pub models: ModelSettings,
    pub capture: CaptureSettings,
    pub dataset: DatasetSettings,
    pub logging: LoggingSettings,
}

impl SafariSettings {
    /// Reject combinations the runtime cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.world.obstacle_count + self.world.animal_count >= 50 * 50 {
            return Err(SettingsError::InvalidValue(format!(
                "world cannot hold {} obstacles and {} animals",
                self.world.obstacle_count, self.world.animal_count
            )));
        }
        if self.agent.max_steps == 0 {
            return Err(SettingsError::InvalidValue("agent.maxSteps must be > 0".into()));
        }
        if self.autoplay.max_rounds == 0 || self.autoplay.default_rounds == 0 {
            return Err(SettingsError::InvalidValue("autoplay rounds must be > 0".into()));
        }
        if self.server.max_send_queue == 0 {
            return Err(SettingsError::InvalidValue("server.maxSendQueue must be > 0".into()));
        }
        Ok(())
    }
}

/// Network listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Bounded per-observer outbound queue.
    pub max_send_queue: usize,
    pub heartbeat_interval_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_send_queue: 256,
            heartbeat_interval_ms: 30_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldSettings {
    pub obstacle_count: usize,
    pub animal_count: usize,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            obstacle_count: 300,
            animal_count: 60,
        }
    }
}

/// Turn-cycle limits and pacing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSettings {
    pub max_steps: u32,
    /// Wait before each capture so the renderer catches up.
    pub settle_delay_ms: u64,
    /// Pause between unblocked sub-moves of one `move` call.
    pub move_pacing_ms: u64,
    pub notepad_limit: usize,
    pub max_move_actions: usize,
    pub default_model: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 180,
            settle_delay_ms: 500,
            move_pacing_ms: 400,
            notepad_limit: 2000,
            max_move_actions: 4,
            default_model: "gemini".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoplaySettings {
    pub default_rounds: u32,
    pub max_rounds: u32,
}

impl Default for AutoplaySettings {
    fn default() -> Self {
        Self {
            default_rounds: 10,
            max_rounds: 100,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    pub gemini: GeminiSettings,
    pub openai_compatible: Vec<OpenAiEndpointSettings>,
    pub retry: RetrySettings,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeminiSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub collect_data: bool,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-3-flash-preview".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            collect_data: true,
        }
    }
}

/// One chat-completions endpoint (vLLM and friends).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenAiEndpointSettings {
    pub id: String,
    pub label: String,
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub collect_data: bool,
}

impl Default for OpenAiEndpointSettings {
    fn default() -> Self {
        Self {
            id: "vllm-Qwen3-VL-2B-Thinking-FP8".to_string(),
            label: "vLLM (Qwen/Qwen3-VL-2B-Thinking-FP8)".to_string(),
            base_url: "http://127.0.0.1:8000/v1".to_string(),
            model: "Qwen3-VL-2B-Thinking-FP8".to_string(),
            api_key: None,
            max_tokens: 4096,
            collect_data: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            request_timeout_ms: 120_000,
        }
    }
}

/// Viewport capture sidecar.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureSettings {
    /// GET `{baseUrl}?sessionId=<id>` must answer with PNG bytes.
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/safari/capture".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetSettings {
    pub enabled: bool,
    /// Relative paths resolve against `~/.safari`.
    pub dir: String,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "dataset".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
    /// Per-module overrides, e.g. `{"safari_llm": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
            modules: BTreeMap::new(),
        }
    }
}
