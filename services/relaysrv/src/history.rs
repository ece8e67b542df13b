//! Bounded log of executed commands, oldest first. Not persisted.

use std::collections::VecDeque;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    /// Unix seconds
    #[serde(rename = "time")]
    pub timestamp: i64,
    pub point: String,
    #[serde(rename = "cmd")]
    pub command: String,
    /// Seconds, 0 when latched
    #[serde(skip_serializing_if = "is_zero")]
    pub pulse: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

fn is_zero(pulse: &i32) -> bool {
    *pulse == 0
}

#[derive(Debug, Clone)]
pub struct CommandHistory {
    depth: usize,
    records: VecDeque<CommandRecord>,
}

impl CommandHistory {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            depth,
            records: VecDeque::with_capacity(depth),
        }
    }

    /// Append, evicting the oldest record when full
    pub fn push(&mut self, record: CommandRecord) {
        if self.records.len() == self.depth {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn record(timestamp: i64) -> CommandRecord {
        CommandRecord {
            timestamp,
            point: "pump".to_string(),
            command: "on".to_string(),
            pulse: 0,
            cause: None,
        }
    }

    #[test]
    fn test_evicts_oldest() {
        let mut history = CommandHistory::new(3);
        for t in 1..=5 {
            history.push(record(t));
        }
        let times: Vec<i64> = history.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![3, 4, 5]);
        assert_eq!(history.len(), history.depth());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(record(7)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"time": 7, "point": "pump", "cmd": "on"})
        );

        let pulsed = CommandRecord {
            pulse: 10,
            cause: Some("test".to_string()),
            ..record(8)
        };
        let json = serde_json::to_value(pulsed).unwrap();
        assert_eq!(json["pulse"], 10);
        assert_eq!(json["cause"], "test");
    }
}
