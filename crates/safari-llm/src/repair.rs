//! Normalization of tool-call arguments as returned by model APIs.
//!
//! Small vision models regularly emit the `move` action list directly
//! instead of `{"actions": [...]}`, or hand back arguments as a JSON string.
//! Both shapes are fixed up here, before the calls reach the dispatcher.

use serde_json::{json, Map, Value};
use tracing::warn;

pub use safari_core::tools::ArgRepair;

/// Normalize raw arguments for `tool`. Missing or blank arguments become `{}`
/// silently. Anything still malformed is passed through untouched so the
/// dispatcher can report it.
pub fn repair_args(tool: &str, raw: Value) -> (Value, Vec<ArgRepair>) {
    let mut applied = Vec::new();

    let decoded = match raw {
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(v) => {
                applied.push(ArgRepair::DecodedString);
                v
            }
            Err(_) if s.trim().is_empty() => Value::Object(Map::new()),
            Err(_) => Value::String(s),
        },
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    let repaired = match decoded {
        Value::Array(items) => {
            warn!(tool, count = items.len(), "tool args arrived as a list, wrapping as actions");
            applied.push(ArgRepair::WrappedList);
            json!({ "actions": items })
        }
        other => other,
    };

    (repaired, applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_bare_action_list() {
        let raw = json!([{"direction": "RIGHT", "steps": 2}]);
        let (args, applied) = repair_args("move", raw);
        assert_eq!(args, json!({"actions": [{"direction": "RIGHT", "steps": 2}]}));
        assert_eq!(applied, vec![ArgRepair::WrappedList]);
    }

    #[test]
    fn decodes_string_then_wraps() {
        let raw = Value::String(r#"[{"direction":"UP","steps":1}]"#.into());
        let (args, applied) = repair_args("move", raw);
        assert_eq!(args["actions"][0]["direction"], "UP");
        assert_eq!(applied, vec![ArgRepair::DecodedString, ArgRepair::WrappedList]);
    }

    #[test]
    fn object_passes_through() {
        let raw = json!({"content": "notes"});
        let (args, applied) = repair_args("update_notepad", raw.clone());
        assert_eq!(args, raw);
        assert!(applied.is_empty());
    }

    #[test]
    fn null_and_blank_become_empty_object() {
        let (args, applied) = repair_args("declare_done", Value::Null);
        assert_eq!(args, json!({}));
        assert!(applied.is_empty());
        let (args, _) = repair_args("declare_done", Value::String("  ".into()));
        assert_eq!(args, json!({}));
    }

    #[test]
    fn undecodable_string_is_left_alone() {
        let (args, applied) = repair_args("move", Value::String("go right".into()));
        assert_eq!(args, Value::String("go right".into()));
        assert!(applied.is_empty());
    }
}
