//! Agent tools: the closed set the model may call, their schemas and execution.

pub mod definitions;
pub mod dispatcher;

use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use safari_core::grid::Direction;
use safari_core::tools::ToolCall;

pub use definitions::tool_definitions;
pub use dispatcher::{BatchOutcome, DispatcherConfig, ToolDispatcher, TurnMemory};

pub const MOVE: &str = "move";
pub const CATCH: &str = "catch";
pub const UPDATE_NOTEPAD: &str = "update_notepad";
pub const DECLARE_FOUND: &str = "declare_found";
pub const DECLARE_DONE: &str = "declare_done";

pub const TOOL_NAMES: [&str; 5] = [MOVE, CATCH, UPDATE_NOTEPAD, DECLARE_FOUND, DECLARE_DONE];

pub const MIN_STEPS: u32 = 1;
pub const MAX_STEPS: u32 = 3;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolArgsError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {name}: {error}")]
    InvalidArgs { name: String, error: String },
}

impl ToolArgsError {
    /// Result object reported back for the failed call.
    pub fn to_result(&self) -> Value {
        match self {
            Self::UnknownTool(name) => json!({"status": "unknown_tool", "name": name}),
            Self::InvalidArgs { name, error } => {
                json!({"status": "invalid_args", "name": name, "error": error})
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct MoveAction {
    pub direction: Direction,
    #[serde(default = "default_steps", deserialize_with = "lenient_steps")]
    pub steps: u32,
}

fn default_steps() -> u32 {
    MIN_STEPS
}

/// Numbers, numeric strings and floats are accepted; the result is clamped to `[1, 3]`.
fn lenient_steps<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    let n = match &raw {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(clamp_steps(n as i64))
}

pub fn clamp_steps(steps: i64) -> u32 {
    if steps < MIN_STEPS as i64 {
        MIN_STEPS
    } else {
        steps.min(MAX_STEPS as i64) as u32
    }
}

fn default_actions() -> Vec<MoveAction> {
    vec![MoveAction {
        direction: Direction::Right,
        steps: MIN_STEPS,
    }]
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum AgentTool {
    Move {
        #[serde(default = "default_actions")]
        actions: Vec<MoveAction>,
    },
    Catch {
        direction: Direction,
    },
    UpdateNotepad {
        content: String,
    },
    DeclareFound {
        target: String,
    },
    DeclareDone {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl AgentTool {
    pub fn parse(call: &ToolCall) -> Result<Self, ToolArgsError> {
        if !TOOL_NAMES.contains(&call.name.as_str()) {
            return Err(ToolArgsError::UnknownTool(call.name.clone()));
        }
        let args = match &call.args {
            Value::Null => json!({}),
            other => other.clone(),
        };
        serde_json::from_value(json!({"name": call.name, "args": args})).map_err(|e| {
            ToolArgsError::InvalidArgs {
                name: call.name.clone(),
                error: e.to_string(),
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Move { .. } => MOVE,
            Self::Catch { .. } => CATCH,
            Self::UpdateNotepad { .. } => UPDATE_NOTEPAD,
            Self::DeclareFound { .. } => DECLARE_FOUND,
            Self::DeclareDone { .. } => DECLARE_DONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str, args: Value) -> Result<AgentTool, ToolArgsError> {
        AgentTool::parse(&ToolCall::new(name, args))
    }

    #[test]
    fn parses_move_and_clamps_steps() {
        let tool = parse(
            MOVE,
            json!({"actions": [
                {"direction": "right", "steps": 7},
                {"direction": "UP", "steps": 0},
                {"direction": "LEFT", "steps": "2"},
                {"direction": "DOWN"}
            ]}),
        )
        .unwrap();
        let AgentTool::Move { actions } = tool else {
            panic!("expected move");
        };
        let steps: Vec<u32> = actions.iter().map(|a| a.steps).collect();
        assert_eq!(steps, vec![3, 1, 2, 1]);
        assert_eq!(actions[0].direction, Direction::Right);
    }

    #[test]
    fn move_without_actions_defaults_right() {
        let tool = parse(MOVE, json!({})).unwrap();
        assert_eq!(tool, AgentTool::Move { actions: default_actions() });
    }

    #[test]
    fn bad_direction_is_invalid_args() {
        let err = parse(MOVE, json!({"actions": [{"direction": "NORTH"}]})).unwrap_err();
        assert!(matches!(err, ToolArgsError::InvalidArgs { ref name, .. } if name == "move"));
        assert_eq!(err.to_result()["status"], "invalid_args");
    }

    #[test]
    fn unknown_tool() {
        let err = parse("teleport", json!({})).unwrap_err();
        assert_eq!(err, ToolArgsError::UnknownTool("teleport".into()));
        assert_eq!(err.to_result(), json!({"status": "unknown_tool", "name": "teleport"}));
    }

    #[test]
    fn declare_done_accepts_null_args() {
        assert_eq!(
            parse(DECLARE_DONE, Value::Null).unwrap(),
            AgentTool::DeclareDone { reason: None }
        );
    }

    #[test]
    fn notepad_requires_content() {
        assert!(parse(UPDATE_NOTEPAD, json!({})).is_err());
        let tool = parse(UPDATE_NOTEPAD, json!({"content": "tree at (3,4)"})).unwrap();
        assert_eq!(tool.name(), UPDATE_NOTEPAD);
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_steps(-4), 1);
        assert_eq!(clamp_steps(2), 2);
        assert_eq!(clamp_steps(99), 3);
    }
}
