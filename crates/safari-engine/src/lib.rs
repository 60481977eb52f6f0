pub mod autoplay;
pub mod controller;
pub mod dataset;
pub mod error;
pub mod prompt;
pub mod session;
pub mod tools;
pub mod world;

pub use autoplay::{clamp_rounds, AutoplayOrchestrator, AutoplayOutcome};
pub use controller::{AgentController, AgentDeps, RunOutcome};
pub use dataset::{DatasetRecorder, JsonlDatasetSink, MemoryDatasetSink};
pub use error::EngineError;
pub use session::{AgentRunGuard, AutoplayGuard, SessionState};
pub use world::GridWorld;
