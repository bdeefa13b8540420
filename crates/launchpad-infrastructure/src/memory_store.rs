//! In-memory implementation of the remote store contract.
//!
//! Holds the workspace tables behind an async lock and behaves like the hosted
//! relational store the coordination layer talks to:
//! - `UNIQUE(user_id, agent_id)` on sessions, checked inside the insert
//! - row versions with optimistic conflict detection
//! - a broadcast change feed fed by every committed write
//! - an await point before each operation, so concurrent callers interleave
//!
//! It also keeps a journal of writes and can be switched offline, which makes
//! it the backing store for tests and the CLI.

use async_trait::async_trait;
use chrono::Utc;
use launchpad_core::agent::Agent;
use launchpad_core::error::{LaunchpadError, Result};
use launchpad_core::remote::{
    ChangeEvent, ChangeFilter, ChangeKind, ChangeSubscription, RemoteStore, Table,
};
use launchpad_core::run::{AgentRun, NewAgentRun};
use launchpad_core::session::{NewSession, Session, SessionPatch};
use launchpad_core::user::UserProfile;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

const DEFAULT_FEED_CAPACITY: usize = 64;

/// A write recorded by [`InMemoryRemoteStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOperation {
    InsertSession {
        session_id: String,
        user_id: String,
        agent_id: String,
    },
    UpdateSession {
        session_id: String,
        patch: SessionPatch,
    },
    DeleteSession {
        session_id: String,
    },
    InsertAgentRun {
        run_id: String,
        session_id: String,
    },
}

#[derive(Default)]
struct Tables {
    agents: HashMap<String, Agent>,
    sessions: HashMap<String, Session>,
    profiles: HashMap<String, UserProfile>,
    runs: Vec<AgentRun>,
}

impl Tables {
    fn joined(&self, session: &Session) -> Session {
        session
            .clone()
            .with_agent(self.agents.get(&session.agent_id).cloned())
    }
}

pub struct InMemoryRemoteStore {
    tables: RwLock<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
    online: AtomicBool,
    latency: Duration,
    journal: Mutex<Vec<StoreOperation>>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Creates a store whose change feed buffers `capacity` events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            tables: RwLock::new(Tables::default()),
            changes,
            online: AtomicBool::new(true),
            latency: Duration::ZERO,
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Delays every operation by `latency` before it reaches the tables.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Simulates losing (or regaining) the connection to the store.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub async fn seed_agent(&self, agent: Agent) {
        let id = agent.id.clone();
        self.tables.write().await.agents.insert(id.clone(), agent);
        self.publish(Table::Agents, ChangeKind::Insert, id, None);
    }

    pub async fn put_user_profile(&self, profile: UserProfile) {
        let user_id = profile.user_id.clone();
        self.tables
            .write()
            .await
            .profiles
            .insert(user_id.clone(), profile);
        self.publish(
            Table::UserProfiles,
            ChangeKind::Update,
            user_id.clone(),
            Some(user_id),
        );
    }

    /// Returns every write committed so far, oldest first.
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.journal.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns the patches committed against one session, oldest first.
    pub fn session_updates(&self, session_id: &str) -> Vec<SessionPatch> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                StoreOperation::UpdateSession { session_id: id, patch } if id == session_id => {
                    Some(patch)
                }
                _ => None,
            })
            .collect()
    }

    /// Number of session rows inserted so far.
    pub fn session_insert_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| matches!(op, StoreOperation::InsertSession { .. }))
            .count()
    }

    pub async fn agent_runs(&self) -> Vec<AgentRun> {
        self.tables.read().await.runs.clone()
    }

    async fn round_trip(&self) -> Result<()> {
        if self.latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.latency).await;
        }
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LaunchpadError::persistence("remote store unavailable"))
        }
    }

    fn record(&self, operation: StoreOperation) {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(operation);
    }

    fn publish(&self, table: Table, kind: ChangeKind, row_id: String, user_id: Option<String>) {
        // No subscribers is not an error.
        let _ = self.changes.send(ChangeEvent {
            table,
            kind,
            row_id,
            user_id,
        });
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn list_agents(&self) -> Result<Vec<Agent>> {
        self.round_trip().await?;
        let tables = self.tables.read().await;
        let mut agents: Vec<Agent> = tables.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(agents)
    }

    async fn find_agent(&self, agent_id: &str) -> Result<Option<Agent>> {
        self.round_trip().await?;
        Ok(self.tables.read().await.agents.get(agent_id).cloned())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        self.round_trip().await?;
        let tables = self.tables.read().await;
        let mut sessions: Vec<Session> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| tables.joined(s))
            .collect();
        sessions.sort_by(|a, b| {
            b.last_active_at
                .cmp(&a.last_active_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(sessions)
    }

    async fn find_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.round_trip().await?;
        let tables = self.tables.read().await;
        Ok(tables.sessions.get(session_id).map(|s| tables.joined(s)))
    }

    async fn insert_session(&self, new: NewSession) -> Result<Session> {
        self.round_trip().await?;
        let mut tables = self.tables.write().await;

        let duplicate = tables
            .sessions
            .values()
            .any(|s| s.user_id == new.user_id && s.agent_id == new.agent_id);
        if duplicate {
            return Err(LaunchpadError::UniqueViolation {
                entity_type: "Session",
                key: format!("(user_id={}, agent_id={})", new.user_id, new.agent_id),
            });
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            agent_id: new.agent_id,
            title: new.title,
            state: new.state,
            created_at: now,
            last_active_at: new.last_active_at,
            version: 1,
            agent: None,
        };
        tables.sessions.insert(session.id.clone(), session.clone());
        let joined = tables.joined(&session);
        drop(tables);

        self.record(StoreOperation::InsertSession {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            agent_id: session.agent_id.clone(),
        });
        self.publish(
            Table::Sessions,
            ChangeKind::Insert,
            session.id,
            Some(session.user_id),
        );
        Ok(joined)
    }

    async fn update_session(&self, session_id: &str, patch: SessionPatch) -> Result<Session> {
        self.round_trip().await?;
        let mut tables = self.tables.write().await;
        let row = tables
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| LaunchpadError::not_found("Session", session_id))?;

        if let Some(expected) = patch.expected_version {
            if patch.bumps_version() && expected != row.version {
                return Err(LaunchpadError::Conflict {
                    entity_type: "Session",
                    id: session_id.to_string(),
                    expected,
                    actual: row.version,
                });
            }
        }

        if let Some(title) = &patch.title {
            row.title = title.clone();
        }
        if let Some(state) = &patch.state {
            row.state = state.clone();
        }
        if let Some(at) = patch.last_active_at {
            row.last_active_at = at;
        }
        if patch.bumps_version() {
            row.version += 1;
        }
        let updated = row.clone();
        let joined = tables.joined(&updated);
        drop(tables);

        self.record(StoreOperation::UpdateSession {
            session_id: session_id.to_string(),
            patch,
        });
        self.publish(
            Table::Sessions,
            ChangeKind::Update,
            updated.id,
            Some(updated.user_id),
        );
        Ok(joined)
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.round_trip().await?;
        let removed = self
            .tables
            .write()
            .await
            .sessions
            .remove(session_id)
            .ok_or_else(|| LaunchpadError::not_found("Session", session_id))?;

        self.record(StoreOperation::DeleteSession {
            session_id: session_id.to_string(),
        });
        self.publish(
            Table::Sessions,
            ChangeKind::Delete,
            removed.id,
            Some(removed.user_id),
        );
        Ok(())
    }

    async fn find_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.round_trip().await?;
        Ok(self.tables.read().await.profiles.get(user_id).cloned())
    }

    async fn insert_agent_run(&self, run: NewAgentRun) -> Result<AgentRun> {
        self.round_trip().await?;
        let stored = AgentRun {
            id: Uuid::new_v4().to_string(),
            run,
            created_at: Utc::now(),
        };
        self.tables.write().await.runs.push(stored.clone());

        self.record(StoreOperation::InsertAgentRun {
            run_id: stored.id.clone(),
            session_id: stored.run.session_id.clone(),
        });
        self.publish(
            Table::AgentRuns,
            ChangeKind::Insert,
            stored.id.clone(),
            Some(stored.run.user_id.clone()),
        );
        Ok(stored)
    }

    fn subscribe(&self, filter: ChangeFilter) -> ChangeSubscription {
        ChangeSubscription::new(filter, self.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_core::agent::AgentType;
    use launchpad_core::session::StateMap;
    use serde_json::json;

    async fn seeded() -> InMemoryRemoteStore {
        let store = InMemoryRemoteStore::new();
        store.seed_agent(Agent::new("a1", "Helper", AgentType::Chat)).await;
        store.seed_agent(Agent::new("a2", "Builder", AgentType::Workflow)).await;
        store
    }

    #[tokio::test]
    async fn test_insert_joins_agent_and_enforces_uniqueness() {
        let store = seeded().await;
        let session = store
            .insert_session(NewSession::new("u1", "a1", "Helper session"))
            .await
            .unwrap();
        assert_eq!(session.agent.as_ref().map(|a| a.name.as_str()), Some("Helper"));
        assert!(session.state.is_empty());

        let err = store
            .insert_session(NewSession::new("u1", "a1", "again"))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        // Same agent for a different user is fine.
        store
            .insert_session(NewSession::new("u2", "a1", "other user"))
            .await
            .unwrap();
        assert_eq!(store.session_insert_count(), 2);
    }

    #[tokio::test]
    async fn test_list_orders_by_last_active_desc() {
        let store = seeded().await;
        let first = store
            .insert_session(NewSession::new("u1", "a1", "first"))
            .await
            .unwrap();
        let second = store
            .insert_session(NewSession::new("u1", "a2", "second"))
            .await
            .unwrap();

        let listed = store.list_sessions("u1").await.unwrap();
        assert_eq!(listed[0].id, second.id);

        store
            .update_session(&first.id, SessionPatch::touch())
            .await
            .unwrap();
        let listed = store.list_sessions("u1").await.unwrap();
        assert_eq!(listed[0].id, first.id);
        assert!(store.list_sessions("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let store = seeded().await;
        let session = store
            .insert_session(NewSession::new("u1", "a1", "s"))
            .await
            .unwrap();

        let mut state = StateMap::new();
        state.insert("count".into(), json!(1));
        let updated = store
            .update_session(
                &session.id,
                SessionPatch::state(state.clone()).expecting(Some(session.version)),
            )
            .await
            .unwrap();
        assert_eq!(updated.version, session.version + 1);

        let err = store
            .update_session(
                &session.id,
                SessionPatch::title("late").expecting(Some(session.version)),
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Touch never conflicts and never bumps the version.
        let touched = store
            .update_session(&session.id, SessionPatch::touch().expecting(Some(0)))
            .await
            .unwrap();
        assert_eq!(touched.version, updated.version);
    }

    #[tokio::test]
    async fn test_offline_store_fails_with_persistence_error() {
        let store = seeded().await;
        store.set_online(false);
        let err = store.list_agents().await.unwrap_err();
        assert!(err.is_persistence());

        store.set_online(true);
        let agents = store.list_agents().await.unwrap();
        assert_eq!(
            agents.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            vec!["Builder", "Helper"]
        );
    }

    #[tokio::test]
    async fn test_change_feed_reports_session_writes() {
        let store = seeded().await;
        let mut feed = store.subscribe(ChangeFilter::table(Table::Sessions).for_user("u1"));

        let session = store
            .insert_session(NewSession::new("u1", "a1", "s"))
            .await
            .unwrap();
        store.delete_session(&session.id).await.unwrap();

        let inserted = feed.next().await.unwrap();
        assert_eq!(inserted.kind, ChangeKind::Insert);
        let deleted = feed.next().await.unwrap();
        assert_eq!(deleted.kind, ChangeKind::Delete);
        assert_eq!(deleted.row_id, session.id);

        let err = store.delete_session(&session.id).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
