//! Unattended missions: reset the world, pick targets, run the agent, repeat.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use safari_core::events::{EventSink, LogType, SessionEvent};
use safari_core::ids::SessionId;
use safari_settings::AutoplaySettings;

use crate::controller::{AgentController, AgentDeps};
use crate::session::{AutoplayGuard, SessionState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoplayOutcome {
    pub total: u32,
    pub completed: u32,
}

/// Requested round count clamped to `[1, max_rounds]`; absent or zero falls back to the default.
pub fn clamp_rounds(requested: Option<i64>, settings: &AutoplaySettings) -> u32 {
    let max = settings.max_rounds.max(1) as i64;
    match requested {
        None | Some(0) => (settings.default_rounds as i64).clamp(1, max) as u32,
        Some(n) => n.clamp(1, max) as u32,
    }
}

pub struct AutoplayOrchestrator {
    deps: Arc<AgentDeps>,
    session_id: SessionId,
    session: Arc<SessionState>,
    events: Arc<dyn EventSink>,
}

impl AutoplayOrchestrator {
    pub fn new(
        deps: Arc<AgentDeps>,
        session_id: SessionId,
        session: Arc<SessionState>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            deps,
            session_id,
            session,
            events,
        }
    }

    fn log(&self, msg: impl Into<String>, log_type: LogType) {
        self.events.emit(SessionEvent::log(msg, log_type));
    }

    /// Run `total` rounds. The caller holds the autoplay slot.
    #[instrument(skip_all, fields(session_id = %self.session_id, model = model_id, total))]
    pub async fn run(&self, guard: &AutoplayGuard, model_id: &str, total: u32) -> AutoplayOutcome {
        let cancel = guard.token();
        let mut completed = 0;
        self.events.emit(SessionEvent::AutoProgress {
            current: 0,
            total,
            mission: String::new(),
        });

        if self.deps.models.get(model_id).is_none() {
            warn!(model = model_id, "autoplay requested with unknown model");
            self.events
                .emit(SessionEvent::error(format!("unknown model: {model_id}")));
        } else {
            let controller = AgentController::new(
                Arc::clone(&self.deps),
                self.session_id.clone(),
                Arc::clone(&self.session),
                Arc::clone(&self.events),
            );

            for round in 1..=total {
                if cancel.is_cancelled() {
                    self.log("[AutoPlay] stopped", LogType::System);
                    break;
                }

                // The world is only reset by whoever holds the agent slot.
                let agent = match self.session.try_start_agent() {
                    Ok(agent) => agent,
                    Err(e) => {
                        warn!(round, error = %e, "autoplay round skipped");
                        self.events.emit(SessionEvent::error(format!(
                            "[AutoPlay {round}/{total}] skipped: {e}"
                        )));
                        continue;
                    }
                };

                let (snapshot, mission) = {
                    let mut world = self.session.world().lock();
                    world.init_game();
                    (world.state(), world.generate_random_mission())
                };
                guard.begin_round(round, &mission);
                self.events.emit(SessionEvent::game_state(snapshot));
                self.events.emit(SessionEvent::AutoProgress {
                    current: round,
                    total,
                    mission: mission.clone(),
                });
                self.log(
                    format!("[AutoPlay {round}/{total}] mission: {mission}"),
                    LogType::System,
                );

                let outcome = controller.run(&agent, model_id, &mission).await;
                drop(agent);

                if let Some(outcome) = outcome {
                    info!(round, reason = %outcome.reason, steps = outcome.steps, "autoplay round finished");
                    completed += 1;
                }
            }
        }

        self.events
            .emit(SessionEvent::AutoComplete { total, completed });
        AutoplayOutcome { total, completed }
    }
}
