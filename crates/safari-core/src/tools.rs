use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool invocation requested by the reasoning service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Compact `name({...})` rendering for logs and chat.
    pub fn render(&self) -> String {
        format!("{}({})", self.name, self.args)
    }
}

/// Tool schema advertised to the reasoning service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Fix-up applied to malformed call arguments before they reach the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgRepair {
    /// Arguments arrived as a JSON-encoded string.
    DecodedString,
    /// A bare list was wrapped as `{"actions": [...]}`.
    WrappedList,
}

impl fmt::Display for ArgRepair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DecodedString => f.write_str("decoded string args"),
            Self::WrappedList => f.write_str("args list wrapped as actions"),
        }
    }
}

/// Outcome of one executed tool call, as recorded per turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResultRecord {
    pub name: String,
    pub result: Value,
}
