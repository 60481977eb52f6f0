use std::sync::Arc;

use safari_core::events::{EventSink, SessionEvent};
use safari_core::grid::{CatchOutcome, Direction};
use safari_engine::EngineError;

use crate::orchestrator::RunOrchestrator;
use crate::protocol::ObserverCommand;
use crate::registry::Session;

/// Apply one observer command to its session.
pub fn dispatch(session: &Arc<Session>, orchestrator: &RunOrchestrator, command: ObserverCommand) {
    tracing::debug!(session_id = %session.id, ?command, "observer command");
    match command {
        ObserverCommand::Init => {
            let reset = session.state.with_idle_world(|world| {
                world.init_game();
                world.state()
            });
            if let Some(snapshot) = accept(session, "init", reset) {
                session.hub.emit(SessionEvent::game_state(snapshot));
            }
        }
        ObserverCommand::Move(action) => {
            let moved = session
                .state
                .with_idle_world(|world| world.move_player(action.direction, action.steps));
            if let Some(outcome) = accept(session, "move", moved) {
                session
                    .hub
                    .emit(SessionEvent::player_moved(outcome, action.direction));
            }
        }
        ObserverCommand::Catch { direction } => handle_catch(session, direction),
        ObserverCommand::Mission { mission, model_id } => {
            let mission = mission.trim();
            if mission.is_empty() {
                return;
            }
            let model_id = model_or_default(model_id, orchestrator);
            // Rejections are already reported to the observers.
            let _ = orchestrator.start_mission(session, mission.to_string(), model_id);
        }
        ObserverCommand::Stop => {
            if !session.state.stop_agent() {
                tracing::debug!(session_id = %session.id, "stop with no agent running");
            }
        }
        ObserverCommand::StartAuto { rounds, model_id } => {
            let model_id = model_or_default(model_id, orchestrator);
            let _ = orchestrator.start_autoplay(session, rounds, model_id);
        }
        ObserverCommand::StopAuto => {
            session.state.stop_autoplay();
        }
    }
}

/// Direct world commands are refused while a run owns the session.
fn accept<T>(session: &Session, command: &str, result: Result<T, EngineError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(session_id = %session.id, command, error = %e, "world command refused");
            session
                .hub
                .emit(SessionEvent::error(format!("{command} ignored: {e}")));
            None
        }
    }
}

fn model_or_default(model_id: Option<String>, orchestrator: &RunOrchestrator) -> String {
    model_id
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| orchestrator.default_model().to_string())
}

/// With a direction the outcome is always reported. Without one, each
/// direction is tried in turn and only a catch is reported.
fn handle_catch(session: &Arc<Session>, direction: Option<Direction>) {
    let attempt = session.state.with_idle_world(|world| {
        let outcome = match direction {
            Some(dir) => Some(world.catch_animal(dir)),
            None => Direction::ALL
                .iter()
                .map(|&dir| world.catch_animal(dir))
                .find(|o| o.success),
        };
        let snapshot = match &outcome {
            Some(CatchOutcome { success: true, .. }) => Some(world.state()),
            _ => None,
        };
        (outcome, snapshot)
    });
    let Some((outcome, snapshot)) = accept(session, "catch", attempt) else {
        return;
    };

    if let Some(outcome) = outcome {
        session.hub.emit(SessionEvent::animal_caught(&outcome));
    }
    if let Some(snapshot) = snapshot {
        session.hub.emit(SessionEvent::game_state(snapshot));
    }
}
