//! Remote relational store contract.
//!
//! Defines the row-level CRUD surface and the push-change channel the
//! coordination layer consumes. Implementations live outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::agent::Agent;
use crate::error::Result;
use crate::run::{AgentRun, NewAgentRun};
use crate::session::{NewSession, Session, SessionPatch};
use crate::user::UserProfile;

/// An abstract relational store holding the workspace tables.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Return sessions with their joined `agent` populated
/// - Order `list_sessions` by `last_active_at` descending
/// - Reject a second session for the same `(user_id, agent_id)` with
///   `LaunchpadError::UniqueViolation`
/// - Reject a patch whose `expected_version` differs from the row's with
///   `LaunchpadError::Conflict`
/// - Map transport failures to `LaunchpadError::Persistence`
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Lists the agent catalog ordered by name.
    async fn list_agents(&self) -> Result<Vec<Agent>>;

    async fn find_agent(&self, agent_id: &str) -> Result<Option<Agent>>;

    /// Lists a user's sessions, most recently active first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>>;

    async fn find_session(&self, session_id: &str) -> Result<Option<Session>>;

    async fn insert_session(&self, session: NewSession) -> Result<Session>;

    /// Applies a partial update and returns the stored row.
    ///
    /// Returns `LaunchpadError::NotFound` when the row does not exist.
    async fn update_session(&self, session_id: &str, patch: SessionPatch) -> Result<Session>;

    /// Deletes a session row. Returns `LaunchpadError::NotFound` when absent.
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    async fn find_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    async fn insert_agent_run(&self, run: NewAgentRun) -> Result<AgentRun>;

    /// Subscribes to row changes matching `filter`.
    fn subscribe(&self, filter: ChangeFilter) -> ChangeSubscription;
}

/// Tables that emit change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Agents,
    Sessions,
    AgentRuns,
    UserProfiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Notifications were dropped; the subscriber must re-pull everything.
    Resync,
}

/// A single row change pushed by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub row_id: String,
    /// Owner of the changed row, for tables scoped to a user.
    pub user_id: Option<String>,
}

impl ChangeEvent {
    pub fn resync(table: Table) -> Self {
        Self {
            table,
            kind: ChangeKind::Resync,
            row_id: String::new(),
            user_id: None,
        }
    }
}

/// Selects which change events a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub user_id: Option<String>,
}

impl ChangeFilter {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            user_id: None,
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        match (&self.user_id, &event.user_id) {
            (Some(wanted), Some(owner)) => wanted == owner,
            (Some(_), None) => event.kind == ChangeKind::Resync,
            (None, _) => true,
        }
    }
}

/// A filtered view over the store's broadcast change channel.
#[derive(Debug)]
pub struct ChangeSubscription {
    filter: ChangeFilter,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeSubscription {
    pub fn new(filter: ChangeFilter, receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { filter, receiver }
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }

    /// Waits for the next matching event.
    ///
    /// A lagged receiver yields a `Resync` event. Returns `None` once the
    /// store has shut the channel.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, table = ?self.filter.table, "change feed lagged");
                    return Some(ChangeEvent::resync(self.filter.table));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(table: Table, user: Option<&str>) -> ChangeEvent {
        ChangeEvent {
            table,
            kind: ChangeKind::Update,
            row_id: "row".into(),
            user_id: user.map(str::to_string),
        }
    }

    #[test]
    fn test_filter_matches_table_and_owner() {
        let filter = ChangeFilter::table(Table::Sessions).for_user("u1");
        assert!(filter.matches(&event(Table::Sessions, Some("u1"))));
        assert!(!filter.matches(&event(Table::Sessions, Some("u2"))));
        assert!(!filter.matches(&event(Table::Agents, Some("u1"))));
        assert!(filter.matches(&ChangeEvent::resync(Table::Sessions)));
    }

    #[tokio::test]
    async fn test_subscription_skips_unmatched_and_reports_lag() {
        let (tx, rx) = broadcast::channel(2);
        let mut subscription =
            ChangeSubscription::new(ChangeFilter::table(Table::Sessions).for_user("u1"), rx);

        tx.send(event(Table::Sessions, Some("u2"))).unwrap();
        tx.send(event(Table::Sessions, Some("u1"))).unwrap();
        let received = subscription.next().await.unwrap();
        assert_eq!(received.user_id.as_deref(), Some("u1"));

        for _ in 0..4 {
            tx.send(event(Table::Sessions, Some("u1"))).unwrap();
        }
        let lagged = subscription.next().await.unwrap();
        assert_eq!(lagged.kind, ChangeKind::Resync);

        drop(tx);
        while subscription.next().await.is_some() {}
    }
}
