use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `logsNotification` from the program log subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEvent {
    pub signature: String,
    #[serde(default)]
    pub logs: Vec<String>,
    /// Transaction error as reported by the node; `null` when it succeeded
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u64>,
}

impl LogEvent {
    pub fn new(signature: &str, logs: Vec<String>) -> Self {
        Self {
            signature: signature.to_string(),
            logs,
            err: None,
            slot: None,
        }
    }

    pub fn with_error(mut self, err: Value) -> Self {
        self.err = Some(err);
        self
    }

    pub fn with_slot(mut self, slot: u64) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn has_error(&self) -> bool {
        matches!(&self.err, Some(err) if !err.is_null())
    }

    /// True when any log line contains `marker` as a substring
    pub fn contains_marker(&self, marker: &str) -> bool {
        self.logs.iter().any(|line| line.contains(marker))
    }
}
