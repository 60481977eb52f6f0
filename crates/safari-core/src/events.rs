use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::grid::{AnimalDescriptor, CatchOutcome, Direction, GameSnapshot, MoveOutcome, Position};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    System,
    Tool,
    Memory,
    Response,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Human,
    Ai,
    Tool,
    System,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DebugPhase {
    Request,
    RequestPayload,
    ResponsePayload,
    ToolResults,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Stopped,
    Done,
}

/// Everything a session streams to its observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    GameState {
        state: GameSnapshot,
    },
    PlayerMoved {
        pos: Position,
        moved: bool,
        blocked: bool,
        actual_steps: u32,
        direction: Direction,
    },
    AnimalCaught {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        animal: Option<AnimalDescriptor>,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<Position>,
    },
    AgentLog {
        msg: String,
        log_type: LogType,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    AgentChat {
        role: ChatRole,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
    },
    AgentDebug {
        phase: DebugPhase,
        data: Value,
    },
    AgentStatus {
        status: AgentStatus,
    },
    AutoProgress {
        current: u32,
        total: u32,
        mission: String,
    },
    AutoComplete {
        total: u32,
        completed: u32,
    },
}

impl SessionEvent {
    pub fn game_state(state: GameSnapshot) -> Self {
        Self::GameState { state }
    }

    pub fn player_moved(outcome: MoveOutcome, direction: Direction) -> Self {
        Self::PlayerMoved {
            pos: outcome.pos,
            moved: outcome.moved,
            blocked: outcome.blocked,
            actual_steps: outcome.actual_steps,
            direction,
        }
    }

    pub fn animal_caught(outcome: &CatchOutcome) -> Self {
        Self::AnimalCaught {
            success: outcome.success,
            animal: outcome.animal,
            position: outcome.position,
        }
    }

    pub fn log(msg: impl Into<String>, log_type: LogType) -> Self {
        Self::AgentLog {
            msg: msg.into(),
            log_type,
            detail: None,
        }
    }

    pub fn log_detail(msg: impl Into<String>, log_type: LogType, detail: impl Into<String>) -> Self {
        Self::AgentLog {
            msg: msg.into(),
            log_type,
            detail: Some(detail.into()),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self::log(msg, LogType::Error)
    }

    pub fn chat(role: ChatRole, content: impl Into<String>) -> Self {
        Self::AgentChat {
            role,
            content: content.into(),
            image: None,
        }
    }

    pub fn chat_image(role: ChatRole, content: impl Into<String>, image: String) -> Self {
        Self::AgentChat {
            role,
            content: content.into(),
            image: Some(image),
        }
    }

    pub fn debug(phase: DebugPhase, data: Value) -> Self {
        Self::AgentDebug { phase, data }
    }

    pub fn status(status: AgentStatus) -> Self {
        Self::AgentStatus { status }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::GameState { .. } => "gameState",
            Self::PlayerMoved { .. } => "playerMoved",
            Self::AnimalCaught { .. } => "animalCaught",
            Self::AgentLog { .. } => "agentLog",
            Self::AgentChat { .. } => "agentChat",
            Self::AgentDebug { .. } => "agentDebug",
            Self::AgentStatus { .. } => "agentStatus",
            Self::AutoProgress { .. } => "autoProgress",
            Self::AutoComplete { .. } => "autoComplete",
        }
    }
}

/// Destination for session events. Emitting never blocks and never fails.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent);
}

/// Sink that keeps every event in memory.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(SessionEvent::event_type).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn player_moved_wire_shape() {
        let ev = SessionEvent::player_moved(
            MoveOutcome {
                moved: true,
                actual_steps: 2,
                blocked: false,
                pos: Position::new(27, 25),
            },
            Direction::Right,
        );
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "playerMoved",
                "pos": {"x": 27, "y": 25},
                "moved": true,
                "blocked": false,
                "actualSteps": 2,
                "direction": "RIGHT"
            })
        );
    }

    #[test]
    fn agent_log_uses_log_type_key() {
        let v = serde_json::to_value(SessionEvent::error("boom")).unwrap();
        assert_eq!(v, json!({"type": "agentLog", "msg": "boom", "logType": "error"}));

        let v = serde_json::to_value(SessionEvent::log_detail("x", LogType::Response, "d")).unwrap();
        assert_eq!(v["detail"], "d");
    }

    #[test]
    fn debug_phase_is_kebab_case() {
        let v = serde_json::to_value(SessionEvent::debug(DebugPhase::ToolResults, json!({}))).unwrap();
        assert_eq!(v["phase"], "tool-results");
        let v = serde_json::to_value(SessionEvent::debug(DebugPhase::RequestPayload, json!(1))).unwrap();
        assert_eq!(v["phase"], "request-payload");
    }

    #[test]
    fn game_state_nests_snapshot() {
        let v = serde_json::to_value(SessionEvent::game_state(GameSnapshot::default())).unwrap();
        assert_eq!(v["type"], "gameState");
        assert_eq!(v["state"]["player"], json!({"x": 0, "y": 0}));
        assert!(v["state"]["animals"].as_array().unwrap().is_empty());
    }

    #[test]
    fn auto_events_round_trip() {
        let ev = SessionEvent::AutoComplete { total: 3, completed: 2 };
        let s = serde_json::to_string(&ev).unwrap();
        assert!(s.contains("\"type\":\"autoComplete\""));
        let back: SessionEvent = serde_json::from_str(&s).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn event_type_matches_tag() {
        let events = [
            SessionEvent::status(AgentStatus::Running),
            SessionEvent::chat(ChatRole::Ai, "hi"),
            SessionEvent::AutoProgress {
                current: 0,
                total: 1,
                mission: String::new(),
            },
        ];
        for ev in events {
            let v = serde_json::to_value(&ev).unwrap();
            assert_eq!(v["type"], ev.event_type());
        }
    }

    #[test]
    fn collecting_sink_records_in_order() {
        let sink = CollectingSink::new();
        assert!(sink.is_empty());
        sink.emit(SessionEvent::status(AgentStatus::Running));
        sink.emit(SessionEvent::status(AgentStatus::Done));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.event_types(), vec!["agentStatus", "agentStatus"]);
    }
}
