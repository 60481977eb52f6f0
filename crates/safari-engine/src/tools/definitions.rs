use serde_json::json;

use safari_core::tools::ToolDefinition;

use super::{CATCH, DECLARE_DONE, DECLARE_FOUND, MOVE, UPDATE_NOTEPAD};

/// Schemas advertised to the reasoning service.
pub fn tool_definitions(max_move_actions: usize, notepad_limit: usize) -> Vec<ToolDefinition> {
    let direction = json!({
        "type": "string",
        "enum": ["UP", "DOWN", "LEFT", "RIGHT"]
    });

    vec![
        ToolDefinition {
            name: MOVE.into(),
            description: format!(
                "Move the player. Runs up to {max_move_actions} actions in order, each with a \
                 direction (UP/DOWN/LEFT/RIGHT) and a step count (1-3). Stops at the first \
                 blocked action."
            ),
            parameters: json!({
                "type": "object",
                "required": ["actions"],
                "properties": {
                    "actions": {
                        "type": "array",
                        "minItems": 1,
                        "maxItems": max_move_actions,
                        "items": {
                            "type": "object",
                            "required": ["direction", "steps"],
                            "properties": {
                                "direction": direction,
                                "steps": {"type": "integer", "minimum": 1, "maximum": 3}
                            }
                        }
                    }
                }
            }),
        },
        ToolDefinition {
            name: CATCH.into(),
            description: "Catch the animal in the adjacent cell in the given direction.".into(),
            parameters: json!({
                "type": "object",
                "required": ["direction"],
                "properties": {"direction": direction}
            }),
        },
        ToolDefinition {
            name: UPDATE_NOTEPAD.into(),
            description: format!(
                "Overwrite the whole notepad. Include everything worth keeping. \
                 At most {notepad_limit} characters."
            ),
            parameters: json!({
                "type": "object",
                "required": ["content"],
                "properties": {
                    "content": {"type": "string", "minLength": 1, "maxLength": notepad_limit}
                }
            }),
        },
        ToolDefinition {
            name: DECLARE_FOUND.into(),
            description: "Declare that one target was found and reached. The mission continues \
                          for the remaining targets."
                .into(),
            parameters: json!({
                "type": "object",
                "required": ["target"],
                "properties": {
                    "target": {"type": "string", "minLength": 1, "maxLength": 200}
                }
            }),
        },
        ToolDefinition {
            name: DECLARE_DONE.into(),
            description: "Declare the whole mission complete. Call only after every target \
                          has been found."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string", "maxLength": 240}
                }
            }),
        },
    ]
}
