//! Session domain model.
//!
//! A session is a user's persistent instance of running a specific agent.
//! It carries an opaque state document owned by whichever agent view is mounted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::Agent;

/// The opaque, agent-defined state document persisted per session.
pub type StateMap = Map<String, Value>;

/// Represents a session row together with its joined agent record.
///
/// `user_id`, `agent_id` and `created_at` never change after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub agent_id: String,
    pub title: String,
    #[serde(default)]
    pub state: StateMap,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    /// Row version, bumped by every state or title write.
    #[serde(default)]
    pub version: u64,
    /// The agent this session runs, when the read joined it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<Agent>,
}

impl Session {
    pub fn with_agent(mut self, agent: Option<Agent>) -> Self {
        self.agent = agent;
        self
    }
}

/// Insert payload for a new session row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub user_id: String,
    pub agent_id: String,
    pub title: String,
    pub state: StateMap,
    pub last_active_at: DateTime<Utc>,
}

impl NewSession {
    /// A session with an empty state blob, active as of now.
    pub fn new(
        user_id: impl Into<String>,
        agent_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            agent_id: agent_id.into(),
            title: title.into(),
            state: StateMap::new(),
            last_active_at: Utc::now(),
        }
    }
}

/// Partial update of a session row.
///
/// `expected_version` makes the store reject the write with a conflict when
/// the row moved since the caller last read it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub state: Option<StateMap>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub expected_version: Option<u64>,
}

impl SessionPatch {
    pub fn state(state: StateMap) -> Self {
        Self {
            state: Some(state),
            last_active_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn touch() -> Self {
        Self {
            last_active_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn expecting(mut self, version: Option<u64>) -> Self {
        self.expected_version = version;
        self
    }

    /// Whether applying this patch changes versioned content.
    pub fn bumps_version(&self) -> bool {
        self.title.is_some() || self.state.is_some()
    }
}

/// Default label for a session created without an explicit title.
pub fn default_session_title(now: DateTime<Utc>) -> String {
    format!("Session {}", now.format("%Y-%m-%d"))
}
