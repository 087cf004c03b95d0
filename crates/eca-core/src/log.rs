//! Action execution logging.
//!
//! The log is diagnostic: it records what each action node did during one
//! dispatch and never feeds back into execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one action node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Rule the node belongs to
    pub rule_id: String,
    /// Action node id
    pub node_id: String,
    /// Plugin id of the action
    pub plugin: String,
    /// Execution status
    pub status: ExecutionStatus,
}

/// Status of action execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Action executed successfully
    Success,
    /// Action raised an error
    Failed {
        /// Human-readable reason for failure
        reason: String,
        /// Whether the rule handles the error itself
        handled: bool,
    },
    /// Action raised the stop-processing signal
    Stopped,
    /// Edge into the action was not traversed
    Skipped {
        /// Human-readable reason for skip
        reason: String,
    },
}

/// Log of one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    /// When the dispatch started
    pub dispatched_at: DateTime<Utc>,
    /// Records in execution order
    pub records: Vec<ActionRecord>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self {
            dispatched_at: Utc::now(),
            records: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        rule_id: impl Into<String>,
        node_id: impl Into<String>,
        plugin: impl Into<String>,
        status: ExecutionStatus,
    ) {
        self.records.push(ActionRecord {
            rule_id: rule_id.into(),
            node_id: node_id.into(),
            plugin: plugin.into(),
            status,
        });
    }

    /// Get the number of successful actions
    pub fn success_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.status, ExecutionStatus::Success))
            .count()
    }

    /// Get the number of failed actions, handled or not
    pub fn failure_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.status, ExecutionStatus::Failed { .. }))
            .count()
    }

    /// Ids of the nodes of `rule` that ran, in order.
    pub fn executed(&self, rule: &str) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.rule_id == rule)
            .filter(|r| !matches!(r.status, ExecutionStatus::Skipped { .. }))
            .map(|r| r.node_id.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::new()
    }
}
