use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use safari_core::events::{ChatRole, EventSink, LogType, SessionEvent};
use safari_core::grid::{Direction, MoveOutcome};
use safari_core::tools::{ToolCall, ToolResultRecord};
use safari_settings::AgentSettings;

use super::{AgentTool, MoveAction};
use crate::world::GridWorld;

pub const DECLARE_DONE_REASON: &str = "declare_done";

#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    pub move_pacing: Duration,
    pub max_move_actions: usize,
    pub notepad_limit: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&AgentSettings::default())
    }
}

impl From<&AgentSettings> for DispatcherConfig {
    fn from(s: &AgentSettings) -> Self {
        Self {
            move_pacing: Duration::from_millis(s.move_pacing_ms),
            max_move_actions: s.max_move_actions,
            notepad_limit: s.notepad_limit,
        }
    }
}

/// Agent memory the tools write to during a mission.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnMemory {
    pub notepad: String,
    pub found_targets: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutcome {
    pub results: Vec<ToolResultRecord>,
    pub last_result: Value,
    /// Set when a call ended the mission.
    pub terminal: Option<String>,
}

pub struct ToolDispatcher {
    config: DispatcherConfig,
}

impl ToolDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self { config }
    }

    /// Run calls in order. Failures are recorded as results and the batch continues;
    /// `declare_done` ends it.
    pub async fn execute_batch(
        &self,
        calls: &[ToolCall],
        world: &Mutex<GridWorld>,
        events: &dyn EventSink,
        memory: &mut TurnMemory,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            results: Vec::with_capacity(calls.len()),
            last_result: json!({"status": "ok"}),
            terminal: None,
        };

        for call in calls {
            let tool = match AgentTool::parse(call) {
                Ok(tool) => tool,
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "tool call rejected");
                    let result = e.to_result();
                    let chat = match &e {
                        super::ToolArgsError::UnknownTool(name) => format!("❌ unknown tool: {name}"),
                        super::ToolArgsError::InvalidArgs { .. } => {
                            format!("{} → {result}", call.name)
                        }
                    };
                    events.emit(SessionEvent::chat(ChatRole::Tool, chat));
                    outcome.results.push(ToolResultRecord {
                        name: call.name.clone(),
                        result: result.clone(),
                    });
                    outcome.last_result = result;
                    continue;
                }
            };

            debug!(tool = tool.name(), "executing tool");
            let (result, terminal) = self.execute(tool, world, events, memory).await;
            events.emit(SessionEvent::chat(
                ChatRole::Tool,
                format!("{} → {result}", call.name),
            ));
            outcome.results.push(ToolResultRecord {
                name: call.name.clone(),
                result: result.clone(),
            });
            outcome.last_result = result;

            if terminal {
                outcome.terminal = Some(DECLARE_DONE_REASON.to_string());
                break;
            }
        }

        outcome
    }

    async fn execute(
        &self,
        tool: AgentTool,
        world: &Mutex<GridWorld>,
        events: &dyn EventSink,
        memory: &mut TurnMemory,
    ) -> (Value, bool) {
        match tool {
            AgentTool::Move { actions } => (self.run_moves(actions, world, events).await, false),
            AgentTool::Catch { direction } => (run_catch(direction, world, events), false),
            AgentTool::UpdateNotepad { content } => {
                let total = content.chars().count();
                memory.notepad = content.chars().take(self.config.notepad_limit).collect();
                events.emit(SessionEvent::log(
                    format!("notepad updated ({total} chars)"),
                    LogType::Memory,
                ));
                (json!({"status": "updated"}), false)
            }
            AgentTool::DeclareFound { target } => {
                let target = target.trim().to_string();
                if !target.is_empty() && !memory.found_targets.contains(&target) {
                    memory.found_targets.push(target.clone());
                }
                let total = memory.found_targets.len();
                events.emit(SessionEvent::log(
                    format!("declare_found: {target} (total {total})"),
                    LogType::Tool,
                ));
                (json!({"status": "found", "target": target, "total": total}), false)
            }
            AgentTool::DeclareDone { reason } => {
                let msg = match reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
                    Some(r) => format!("declare_done called: {r}"),
                    None => "declare_done called".to_string(),
                };
                events.emit(SessionEvent::log(msg, LogType::System));
                (json!({"status": "done"}), true)
            }
        }
    }

    async fn run_moves(
        &self,
        mut actions: Vec<MoveAction>,
        world: &Mutex<GridWorld>,
        events: &dyn EventSink,
    ) -> Value {
        if actions.len() > self.config.max_move_actions {
            events.emit(SessionEvent::log(
                format!(
                    "move: {} actions requested, running the first {}",
                    actions.len(),
                    self.config.max_move_actions
                ),
                LogType::System,
            ));
            actions.truncate(self.config.max_move_actions);
        }

        let mut last: Option<MoveOutcome> = None;
        for action in actions {
            let outcome = world.lock().move_player(action.direction, action.steps);
            events.emit(SessionEvent::log(
                format!(
                    "move {} x{}/{} -> {}",
                    action.direction, outcome.actual_steps, action.steps, outcome.pos
                ),
                if outcome.blocked { LogType::Error } else { LogType::Tool },
            ));
            events.emit(SessionEvent::player_moved(outcome, action.direction));
            last = Some(outcome);
            if outcome.blocked {
                break;
            }
            tokio::time::sleep(self.config.move_pacing).await;
        }

        match last {
            Some(outcome) => serde_json::to_value(outcome).unwrap_or_else(|_| json!({"status": "ok"})),
            None => json!({"status": "ok"}),
        }
    }
}

fn run_catch(direction: Direction, world: &Mutex<GridWorld>, events: &dyn EventSink) -> Value {
    let (outcome, snapshot) = {
        let mut world = world.lock();
        let outcome = world.catch_animal(direction);
        let snapshot = outcome.success.then(|| world.state());
        (outcome, snapshot)
    };

    events.emit(SessionEvent::animal_caught(&outcome));
    match (&outcome.animal, outcome.reason) {
        (Some(animal), _) => events.emit(SessionEvent::log(
            format!(
                "catch {direction} -> caught {} {}",
                animal.bg_color.name(),
                animal.emoji.name()
            ),
            LogType::Tool,
        )),
        (None, Some(reason)) => events.emit(SessionEvent::log(
            format!("catch {direction} -> {}", reason.as_str()),
            LogType::Error,
        )),
        (None, None) => {}
    }
    if let Some(snapshot) = snapshot {
        events.emit(SessionEvent::game_state(snapshot));
    }

    serde_json::to_value(&outcome).unwrap_or_else(|_| json!({"success": outcome.success}))
}
