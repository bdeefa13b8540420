//! Workspace coordination: agent catalog, session lifecycle and the single
//! active-session pointer.

use crate::agent_state::AgentStateCoordinator;
use crate::session::SessionRepository;
use crate::workspace_store::{Notice, WorkspaceState, WorkspaceStore};
use launchpad_core::agent::Agent;
use launchpad_core::config::WorkspaceSettings;
use launchpad_core::error::{LaunchpadError, Result};
use launchpad_core::remote::RemoteStore;
use launchpad_core::session::Session;
use launchpad_core::user::IdentityProvider;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

type EnsureKey = (String, String);

/// Ties the agent catalog, [`SessionRepository`] and
/// [`AgentStateCoordinator`] together.
///
/// Moving the active pointer always flushes unsaved agent state first.
pub struct WorkspaceCoordinator {
    remote: Arc<dyn RemoteStore>,
    store: Arc<WorkspaceStore>,
    sessions: Arc<SessionRepository>,
    state: AgentStateCoordinator,
    settings: WorkspaceSettings,
    /// One async lock per `(user_id, agent_id)` for find-or-create.
    ensure_locks: Mutex<HashMap<EnsureKey, Arc<AsyncMutex<()>>>>,
}

impl WorkspaceCoordinator {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        settings: WorkspaceSettings,
    ) -> Self {
        let store = Arc::new(WorkspaceStore::new(settings.change_feed_capacity));
        let sessions = Arc::new(SessionRepository::new(
            remote.clone(),
            identity,
            store.clone(),
        ));
        let state = AgentStateCoordinator::new(sessions.clone(), settings.autosave_delay());
        Self {
            remote,
            store,
            sessions,
            state,
            settings,
            ensure_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<WorkspaceStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionRepository> {
        &self.sessions
    }

    pub fn state(&self) -> &AgentStateCoordinator {
        &self.state
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    pub fn snapshot(&self) -> WorkspaceState {
        self.store.snapshot()
    }

    /// Loads the catalog, the user's preferences and sessions.
    ///
    /// When nothing is active yet and `restore_last_session` is set, the most
    /// recently active session is focused.
    pub async fn initialize(&self) -> Result<WorkspaceState> {
        let user_id = self.sessions.current_user_id("initialize")?;
        self.refresh_agents().await?;
        // A failed preference read keeps the default and is already surfaced.
        if let Err(err) = self.state.refresh_preferences(&user_id).await {
            tracing::debug!(user_id = %user_id, error = %err, "keeping default preferences");
        }
        let sessions = self.refresh_sessions().await?;

        if self.store.active_session_id().is_none() && self.settings.restore_last_session {
            if let Some(latest) = sessions.first() {
                self.store.set_active(Some(&latest.id))?;
                self.state.load(Some(latest));
                tracing::info!(session_id = %latest.id, "restored last session");
            }
        }

        tracing::info!(
            user_id = %user_id,
            agents = self.store.agents().len(),
            sessions = sessions.len(),
            "workspace initialized"
        );
        Ok(self.store.snapshot())
    }

    /// Re-pulls the agent catalog, ordered by name.
    pub async fn refresh_agents(&self) -> Result<Vec<Agent>> {
        match self.remote.list_agents().await {
            Ok(mut agents) => {
                agents.sort_by(|a, b| a.name.cmp(&b.name));
                self.store.replace_agents(agents.clone());
                Ok(agents)
            }
            Err(err) => Err(self.sessions.surface("refresh_agents", err)),
        }
    }

    /// Re-pulls the session list and reconciles the state mirror with it.
    pub async fn refresh_sessions(&self) -> Result<Vec<Session>> {
        let sessions = self.sessions.refresh().await?;
        self.state.reconcile();
        Ok(sessions)
    }

    /// Returns the user's session for `agent`, creating it on first launch,
    /// and makes it the active session.
    ///
    /// Calls for the same `(user, agent)` pair are serialized, and the store
    /// rejects a second row for the pair, so concurrent launches from this
    /// or any other workspace converge on a single session.
    pub async fn ensure_session_for_agent(&self, agent: &Agent) -> Result<Session> {
        let user_id = self.sessions.current_user_id("ensure_session")?;
        let lock = self.ensure_lock(&user_id, &agent.id);
        let _guard = lock.lock().await;

        if let Some(existing) = self.store.session_for_agent(&agent.id) {
            tracing::debug!(session_id = %existing.id, agent_id = %agent.id, "reusing session");
            return self.activate(&existing.id, true).await;
        }

        self.flush_before_transition().await?;
        let title = format!("{} session", agent.name);
        let session = self.sessions.create(&agent.id, Some(&title)).await?;
        self.state.load(Some(&session));
        Ok(session)
    }

    /// Focuses `session_id`, refreshing its `last_active_at` on a best-effort basis.
    pub async fn switch_session(&self, session_id: &str) -> Result<Session> {
        if self.store.find_session(session_id).is_none() {
            return Err(self
                .sessions
                .surface("switch_session", LaunchpadError::not_found("Session", session_id)));
        }
        self.activate(session_id, true).await
    }

    /// Unfocuses the active session without touching any persisted row.
    pub async fn clear_active_session(&self) -> Result<()> {
        self.flush_before_transition().await?;
        self.store.set_active(None)?;
        self.state.load(None);
        Ok(())
    }

    /// Deletes a session; deleting the active one leaves nothing focused.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.sessions.delete(session_id).await?;
        if self.state.session_id().as_deref() == Some(session_id) {
            self.state.load(None);
        }
        Ok(())
    }

    pub async fn rename_session(&self, session_id: &str, title: &str) -> Result<Session> {
        self.sessions.update_title(session_id, title).await
    }

    async fn activate(&self, session_id: &str, touch: bool) -> Result<Session> {
        if self.store.active_session_id().as_deref() != Some(session_id) {
            self.flush_before_transition().await?;
            self.store.set_active(Some(session_id))?;
        }

        let session = self
            .store
            .find_session(session_id)
            .ok_or_else(|| LaunchpadError::not_found("Session", session_id))?;
        if self.state.session_id().as_deref() != Some(session_id) {
            self.state.load(Some(&session));
        }

        if !touch {
            return Ok(session);
        }
        // Failing to persist the timestamp never blocks the switch; the
        // repository has already published a notice.
        match self.sessions.touch(session_id).await {
            Ok(touched) => Ok(touched),
            Err(err) => {
                tracing::debug!(session_id, error = %err, "touch after switch failed");
                Ok(session)
            }
        }
    }

    /// Persists dirty agent state before the active pointer moves.
    ///
    /// A session that vanished remotely is not worth blocking on; any other
    /// failure keeps the pointer where it is and the edits dirty.
    async fn flush_before_transition(&self) -> Result<()> {
        match self.state.flush().await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                self.store.notify(Notice::info(
                    "flush_state",
                    "Unsaved changes were dropped because their session no longer exists.",
                ));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn ensure_lock(&self, user_id: &str, agent_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.ensure_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry((user_id.to_string(), agent_id.to_string()))
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_core::agent::AgentType;
    use launchpad_core::user::StaticIdentity;
    use launchpad_infrastructure::InMemoryRemoteStore;
    use serde_json::json;

    async fn fixture() -> (Arc<InMemoryRemoteStore>, WorkspaceCoordinator) {
        let remote = Arc::new(InMemoryRemoteStore::new());
        remote.seed_agent(Agent::new("a1", "Helper", AgentType::Chat)).await;
        remote.seed_agent(Agent::new("a2", "Intake", AgentType::Form)).await;
        let workspace = WorkspaceCoordinator::new(
            remote.clone(),
            Arc::new(StaticIdentity::signed_in("u1")),
            WorkspaceSettings::default(),
        );
        (remote, workspace)
    }

    #[tokio::test]
    async fn test_initialize_restores_most_recent_session() {
        let (remote, workspace) = fixture().await;
        let older = remote
            .insert_session(launchpad_core::session::NewSession::new("u1", "a1", "older"))
            .await
            .unwrap();
        let newer = remote
            .insert_session(launchpad_core::session::NewSession::new("u1", "a2", "newer"))
            .await
            .unwrap();
        assert!(newer.last_active_at >= older.last_active_at);

        let state = workspace.initialize().await.unwrap();
        let names: Vec<_> = state.agents().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Helper", "Intake"]);
        assert_eq!(state.active_session_id(), Some(newer.id.as_str()));
        assert_eq!(workspace.state().session_id().as_deref(), Some(newer.id.as_str()));
    }

    #[tokio::test]
    async fn test_switch_flushes_dirty_state_first() {
        let (remote, workspace) = fixture().await;
        workspace.initialize().await.unwrap();
        let helper = workspace.store().find_agent("a1").unwrap();
        let intake = workspace.store().find_agent("a2").unwrap();

        let first = workspace.ensure_session_for_agent(&helper).await.unwrap();
        let second = workspace.ensure_session_for_agent(&intake).await.unwrap();
        workspace.switch_session(&first.id).await.unwrap();
        workspace.state().set("draft", json!("unsent"));

        workspace.switch_session(&second.id).await.unwrap();
        let stored = remote.find_session(&first.id).await.unwrap().unwrap();
        assert_eq!(stored.state["draft"], json!("unsent"));
        assert!(!workspace.state().has("draft"));
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_pointer() {
        let (remote, workspace) = fixture().await;
        workspace.initialize().await.unwrap();
        let helper = workspace.store().find_agent("a1").unwrap();
        let session = workspace.ensure_session_for_agent(&helper).await.unwrap();
        workspace.state().set("draft", json!("unsent"));

        remote.set_online(false);
        let err = workspace.clear_active_session().await.unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(
            workspace.store().active_session_id().as_deref(),
            Some(session.id.as_str())
        );
        assert!(workspace.state().is_dirty());

        remote.set_online(true);
        workspace.clear_active_session().await.unwrap();
        assert_eq!(workspace.store().active_session_id(), None);
    }

    #[tokio::test]
    async fn test_switch_survives_touch_failure() {
        let (remote, workspace) = fixture().await;
        workspace.initialize().await.unwrap();
        let helper = workspace.store().find_agent("a1").unwrap();
        let session = workspace.ensure_session_for_agent(&helper).await.unwrap();
        workspace.clear_active_session().await.unwrap();

        remote.set_online(false);
        let switched = workspace.switch_session(&session.id).await.unwrap();
        assert_eq!(switched.id, session.id);
        assert_eq!(
            workspace.store().active_session_id().as_deref(),
            Some(session.id.as_str())
        );
        assert!(
            workspace
                .store()
                .notices()
                .iter()
                .any(|n| n.operation == "touch_session")
        );
    }

    #[tokio::test]
    async fn test_switch_to_unknown_session_fails() {
        let (_remote, workspace) = fixture().await;
        workspace.initialize().await.unwrap();
        let err = workspace.switch_session("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_active_session_resets_state() {
        let (_remote, workspace) = fixture().await;
        workspace.initialize().await.unwrap();
        let helper = workspace.store().find_agent("a1").unwrap();
        let session = workspace.ensure_session_for_agent(&helper).await.unwrap();
        workspace.state().set("draft", json!("x"));

        workspace.delete_session(&session.id).await.unwrap();
        assert_eq!(workspace.store().active_session_id(), None);
        assert_eq!(workspace.state().session_id(), None);
        assert!(workspace.state().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_rename_session() {
        let (_remote, workspace) = fixture().await;
        workspace.initialize().await.unwrap();
        let helper = workspace.store().find_agent("a1").unwrap();
        let session = workspace.ensure_session_for_agent(&helper).await.unwrap();
        assert_eq!(session.title, "Helper session");

        let renamed = workspace.rename_session(&session.id, "Research").await.unwrap();
        assert_eq!(renamed.title, "Research");
        assert_eq!(renamed.version, session.version + 1);
    }
}
