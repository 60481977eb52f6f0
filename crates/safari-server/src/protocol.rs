//! Commands observers send over the socket.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use safari_core::grid::Direction;
use safari_engine::tools::MoveAction;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ObserverCommand {
    Init,
    Move(MoveAction),
    Catch {
        #[serde(default)]
        direction: Option<Direction>,
    },
    Mission {
        #[serde(default)]
        mission: String,
        #[serde(default)]
        model_id: Option<String>,
    },
    Stop,
    StartAuto {
        #[serde(default, deserialize_with = "lenient_count")]
        rounds: Option<i64>,
        #[serde(default)]
        model_id: Option<String>,
    },
    StopAuto,
}

impl ObserverCommand {
    /// `None` for anything that is not a well-formed command.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                tracing::debug!(error = %e, len = raw.len(), "ignoring unparseable command");
                None
            }
        }
    }
}

/// Numbers and numeric strings; anything else reads as absent.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_f64().map(|f| f as i64),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        assert_eq!(ObserverCommand::parse(r#"{"type":"init"}"#), Some(ObserverCommand::Init));
        assert_eq!(ObserverCommand::parse(r#"{"type":"stop"}"#), Some(ObserverCommand::Stop));
        assert_eq!(
            ObserverCommand::parse(r#"{"type":"stop-auto"}"#),
            Some(ObserverCommand::StopAuto)
        );
        assert_eq!(
            ObserverCommand::parse(r#"{"type":"mission","mission":"Find the red tiger","modelId":"mock"}"#),
            Some(ObserverCommand::Mission {
                mission: "Find the red tiger".into(),
                model_id: Some("mock".into()),
            })
        );
        assert_eq!(
            ObserverCommand::parse(r#"{"type":"start-auto","rounds":"5"}"#),
            Some(ObserverCommand::StartAuto {
                rounds: Some(5),
                model_id: None,
            })
        );
    }

    #[test]
    fn move_steps_are_clamped() {
        let Some(ObserverCommand::Move(action)) =
            ObserverCommand::parse(r#"{"type":"move","direction":"left","steps":9}"#)
        else {
            panic!("expected move");
        };
        assert_eq!(action.direction, Direction::Left);
        assert_eq!(action.steps, 3);

        let Some(ObserverCommand::Move(action)) =
            ObserverCommand::parse(r#"{"type":"move","direction":"UP"}"#)
        else {
            panic!("expected move");
        };
        assert_eq!(action.steps, 1);
    }

    #[test]
    fn catch_direction_is_optional() {
        assert_eq!(
            ObserverCommand::parse(r#"{"type":"catch"}"#),
            Some(ObserverCommand::Catch { direction: None })
        );
        assert_eq!(
            ObserverCommand::parse(r#"{"type":"catch","direction":"DOWN"}"#),
            Some(ObserverCommand::Catch {
                direction: Some(Direction::Down)
            })
        );
    }

    #[test]
    fn garbage_is_ignored() {
        assert_eq!(ObserverCommand::parse("not json"), None);
        assert_eq!(ObserverCommand::parse(r#"{"type":"dance"}"#), None);
        assert_eq!(ObserverCommand::parse(r#"{"type":"move","direction":"NORTH"}"#), None);
    }

    #[test]
    fn odd_round_counts_read_as_absent() {
        assert_eq!(
            ObserverCommand::parse(r#"{"type":"start-auto","rounds":"lots"}"#),
            Some(ObserverCommand::StartAuto {
                rounds: None,
                model_id: None,
            })
        );
    }
}
