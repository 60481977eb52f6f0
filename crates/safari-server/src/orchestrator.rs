//! Spawns agent and autoplay runs for sessions.
//!
//! The run slot is claimed before the task is spawned, so two commands racing
//! on the same session see exactly one winner. When a task ends it releases
//! the slot and asks the registry to drop the session if it is now idle.

use std::sync::Arc;

use tokio_util::task::TaskTracker;

use safari_core::events::{EventSink, SessionEvent};
use safari_engine::{clamp_rounds, AgentController, AgentDeps, AutoplayOrchestrator, EngineError};
use safari_settings::AutoplaySettings;

use crate::registry::{Session, SessionRegistry};

pub struct RunOrchestrator {
    deps: Arc<AgentDeps>,
    registry: Arc<SessionRegistry>,
    autoplay: AutoplaySettings,
    tasks: TaskTracker,
}

impl RunOrchestrator {
    pub fn new(deps: Arc<AgentDeps>, registry: Arc<SessionRegistry>, autoplay: AutoplaySettings) -> Self {
        Self {
            deps,
            registry,
            autoplay,
            tasks: TaskTracker::new(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.deps.settings.default_model
    }

    /// Start one mission in the background. Refused while an agent or autoplay run owns the session.
    pub fn start_mission(
        &self,
        session: &Arc<Session>,
        mission: String,
        model_id: String,
    ) -> Result<(), EngineError> {
        let guard = match session.state.try_start_mission() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "mission rejected");
                session.hub.emit(SessionEvent::error(e.to_string()));
                return Err(e);
            }
        };

        let controller = AgentController::new(
            Arc::clone(&self.deps),
            session.id.clone(),
            Arc::clone(&session.state),
            Arc::clone(&session.hub) as Arc<dyn EventSink>,
        );
        let registry = Arc::clone(&self.registry);
        let session_id = session.id.clone();

        self.tasks.spawn(async move {
            let outcome = controller.run(&guard, &model_id, &mission).await;
            drop(guard);
            if let Some(outcome) = outcome {
                tracing::info!(
                    session_id = %session_id,
                    reason = %outcome.reason,
                    steps = outcome.steps,
                    "mission finished"
                );
            }
            registry.cleanup(&session_id);
        });
        Ok(())
    }

    /// Start autoplay in the background. `rounds` is clamped to the configured range.
    /// Refused while a mission is running.
    pub fn start_autoplay(
        &self,
        session: &Arc<Session>,
        rounds: Option<i64>,
        model_id: String,
    ) -> Result<u32, EngineError> {
        let total = clamp_rounds(rounds, &self.autoplay);
        let guard = match session.state.try_start_autoplay(total) {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "autoplay rejected");
                session.hub.emit(SessionEvent::error(e.to_string()));
                return Err(e);
            }
        };

        let autoplay = AutoplayOrchestrator::new(
            Arc::clone(&self.deps),
            session.id.clone(),
            Arc::clone(&session.state),
            Arc::clone(&session.hub) as Arc<dyn EventSink>,
        );
        let registry = Arc::clone(&self.registry);
        let session_id = session.id.clone();

        self.tasks.spawn(async move {
            let outcome = autoplay.run(&guard, &model_id, total).await;
            drop(guard);
            tracing::info!(
                session_id = %session_id,
                total = outcome.total,
                completed = outcome.completed,
                "autoplay finished"
            );
            registry.cleanup(&session_id);
        });
        Ok(total)
    }

    /// Cancel every run and wait for the tasks to wind down.
    pub async fn shutdown(&self) {
        let stopped = self.registry.stop_all();
        self.tasks.close();
        tracing::info!(stopped, "waiting for runs to finish");
        self.tasks.wait().await;
    }

    pub fn active_runs(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use safari_core::capture::{CaptureError, CaptureService, ViewportImage};
    use safari_core::ids::{ObserverId, SessionId};
    use safari_llm::{MockReasoner, MockReply, ModelEntry, ModelRegistry, ProviderKind};
    use safari_settings::{AgentSettings, WorldSettings};
    use tokio::sync::mpsc;

    struct OkCapture;

    #[async_trait]
    impl CaptureService for OkCapture {
        async fn capture(&self, _session_id: &SessionId) -> Result<ViewportImage, CaptureError> {
            Ok(ViewportImage::png(vec![1]))
        }
    }

    fn setup(fallback: MockReply) -> (RunOrchestrator, Arc<SessionRegistry>) {
        let mut models = ModelRegistry::new();
        models.register(ModelEntry {
            id: "mock".into(),
            label: "Mock".into(),
            provider: ProviderKind::Mock,
            collect_data: false,
            service: Arc::new(MockReasoner::new(vec![]).with_fallback(fallback)),
        });
        let deps = Arc::new(AgentDeps {
            models: Arc::new(models),
            capture: Arc::new(OkCapture),
            dataset: None,
            settings: AgentSettings {
                max_steps: 5,
                ..AgentSettings::default()
            },
        });
        let registry = Arc::new(SessionRegistry::new(WorldSettings {
            obstacle_count: 10,
            animal_count: 5,
        }));
        let orchestrator =
            RunOrchestrator::new(deps, Arc::clone(&registry), AutoplaySettings::default());
        (orchestrator, registry)
    }

    fn received(rx: &mut mpsc::Receiver<String>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(text) = rx.try_recv() {
            out.push(serde_json::from_str(&text).unwrap());
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn mission_runs_to_done() {
        let (orchestrator, registry) = setup(MockReply::done());
        let (tx, mut rx) = mpsc::channel(256);
        let session = registry.attach(&SessionId::from_raw("s1"), ObserverId::new(), tx);

        orchestrator
            .start_mission(&session, "Find the red tiger".into(), "mock".into())
            .unwrap();
        orchestrator.tasks.close();
        orchestrator.tasks.wait().await;

        let events = received(&mut rx);
        assert_eq!(events.first().unwrap()["status"], "running");
        assert!(events
            .iter()
            .any(|e| e["type"] == "agentLog" && e["msg"] == "agent finished: declare_done"));
        assert_eq!(events.last().unwrap()["status"], "done");
        assert!(!session.state.is_agent_running());
    }

    #[tokio::test(start_paused = true)]
    async fn second_mission_is_rejected() {
        let (orchestrator, registry) = setup(MockReply::done());
        let (tx, mut rx) = mpsc::channel(1024);
        let session = registry.attach(&SessionId::from_raw("s1"), ObserverId::new(), tx);

        orchestrator
            .start_mission(&session, "Find the red tiger".into(), "mock".into())
            .unwrap();
        let world_before = session.state.world().lock().state();
        let notepad_before = session.state.notepad();

        let second = orchestrator.start_mission(&session, "Find the blue koala".into(), "mock".into());
        assert!(matches!(second, Err(EngineError::AgentBusy)));
        assert_eq!(session.state.world().lock().state(), world_before);
        assert_eq!(session.state.notepad(), notepad_before);
        assert!(session.state.is_agent_running());

        orchestrator.tasks.close();
        orchestrator.tasks.wait().await;

        let events = received(&mut rx);
        assert!(events
            .iter()
            .any(|e| e["logType"] == "error" && e["msg"] == "agent already running"));
        let starts = events
            .iter()
            .filter(|e| e["type"] == "agentStatus" && e["status"] == "running")
            .count();
        assert_eq!(starts, 1);
        // The first run was neither cancelled nor replaced.
        assert!(events
            .iter()
            .any(|e| e["type"] == "agentLog" && e["msg"] == "agent finished: declare_done"));
        let contexts: Vec<&str> = events
            .iter()
            .filter(|e| e["type"] == "agentChat" && e["role"] == "human")
            .filter_map(|e| e["content"].as_str())
            .collect();
        assert!(contexts.iter().any(|c| c.contains("red tiger")));
        assert!(!contexts.iter().any(|c| c.contains("blue koala")));
    }

    #[tokio::test(start_paused = true)]
    async fn mission_is_rejected_while_autoplay_runs() {
        let (orchestrator, registry) = setup(MockReply::done());
        let (tx, mut rx) = mpsc::channel(4096);
        let session = registry.attach(&SessionId::from_raw("s1"), ObserverId::new(), tx);

        orchestrator.start_autoplay(&session, Some(2), "mock".into()).unwrap();
        let world_before = session.state.world().lock().state();
        let mission = orchestrator.start_mission(&session, "Find the red tiger".into(), "mock".into());
        assert!(matches!(mission, Err(EngineError::AutoplayBusy)));
        assert_eq!(session.state.world().lock().state(), world_before);
        assert!(!session.state.is_agent_running());

        orchestrator.tasks.close();
        orchestrator.tasks.wait().await;

        let events = received(&mut rx);
        assert!(events
            .iter()
            .any(|e| e["logType"] == "error" && e["msg"] == "autoplay already running"));
        let complete = events.iter().find(|e| e["type"] == "autoComplete").unwrap();
        assert_eq!(complete["completed"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn autoplay_is_rejected_while_mission_runs() {
        let (orchestrator, registry) = setup(MockReply::done());
        let (tx, mut rx) = mpsc::channel(4096);
        let session = registry.attach(&SessionId::from_raw("s1"), ObserverId::new(), tx);

        orchestrator
            .start_mission(&session, "Find the red tiger".into(), "mock".into())
            .unwrap();
        session.state.world().lock().move_player(safari_core::grid::Direction::Up, 1);
        let world_before = session.state.world().lock().state();

        let autoplay = orchestrator.start_autoplay(&session, Some(3), "mock".into());
        assert!(matches!(autoplay, Err(EngineError::AgentBusy)));
        assert_eq!(session.state.world().lock().state(), world_before);
        assert!(!session.state.is_autoplay_running());

        orchestrator.tasks.close();
        orchestrator.tasks.wait().await;

        let events = received(&mut rx);
        assert!(events.iter().all(|e| e["type"] != "autoProgress" && e["type"] != "gameState"));
        assert!(events
            .iter()
            .any(|e| e["logType"] == "error" && e["msg"] == "agent already running"));
        assert_eq!(events.last().unwrap()["status"], "done");
    }

    #[tokio::test(start_paused = true)]
    async fn finished_run_cleans_up_unwatched_session() {
        let (orchestrator, registry) = setup(MockReply::done());
        let session = registry.get_or_create(&SessionId::from_raw("headless"));

        orchestrator
            .start_mission(&session, "Explore the map".into(), "mock".into())
            .unwrap();
        assert_eq!(registry.count(), 1);
        orchestrator.shutdown().await;
        assert_eq!(registry.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn autoplay_is_single_flight() {
        let (orchestrator, registry) = setup(MockReply::done());
        let (tx, mut rx) = mpsc::channel(4096);
        let session = registry.attach(&SessionId::from_raw("s1"), ObserverId::new(), tx);

        let total = orchestrator.start_autoplay(&session, Some(2), "mock".into()).unwrap();
        assert_eq!(total, 2);
        assert!(matches!(
            orchestrator.start_autoplay(&session, Some(2), "mock".into()),
            Err(EngineError::AutoplayBusy)
        ));
        orchestrator.tasks.close();
        orchestrator.tasks.wait().await;

        let events = received(&mut rx);
        let complete = events.iter().find(|e| e["type"] == "autoComplete").unwrap();
        assert_eq!(complete["total"], 2);
        assert_eq!(complete["completed"], 2);
    }
}
