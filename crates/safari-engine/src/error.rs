use safari_core::capture::CaptureError;
use safari_core::dataset::DatasetError;
use safari_core::errors::GatewayError;

use crate::tools::ToolArgsError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolArgsError),

    #[error("agent already running")]
    AgentBusy,

    #[error("autoplay already running")]
    AutoplayBusy,

    #[error("unknown model: {0}")]
    UnknownModel(String),
}
