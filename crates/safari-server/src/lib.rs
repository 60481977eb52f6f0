pub mod capture;
pub mod client;
pub mod handlers;
pub mod hub;
pub mod orchestrator;
pub mod protocol;
pub mod registry;
pub mod server;

pub use capture::HttpCaptureService;
pub use hub::BroadcastHub;
pub use orchestrator::RunOrchestrator;
pub use registry::{Session, SessionRegistry};
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
