//! Agent run audit records.
//!
//! One row is appended per agent invocation. Rows are never read back by the
//! coordination layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Insert payload for the `agent_runs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAgentRun {
    pub session_id: String,
    pub agent_id: String,
    pub user_id: String,
    pub input: Value,
    pub output: Value,
    pub tokens_used: u64,
    pub cost_estimate: f64,
}

/// A stored audit row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    pub id: String,
    #[serde(flatten)]
    pub run: NewAgentRun,
    pub created_at: DateTime<Utc>,
}
