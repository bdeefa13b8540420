use crate::workspace_store::{Notice, WorkspaceStore};
use chrono::Utc;
use launchpad_core::error::{LaunchpadError, Result};
use launchpad_core::remote::RemoteStore;
use launchpad_core::session::{NewSession, Session, SessionPatch, StateMap, default_session_title};
use launchpad_core::user::IdentityProvider;
use std::sync::Arc;

/// Result of [`SessionRepository::list`].
///
/// When the remote read fails, `sessions` holds the last known cache and
/// `stale` carries the error that was surfaced.
#[derive(Debug, Clone)]
pub struct SessionListing {
    pub sessions: Vec<Session>,
    pub stale: Option<LaunchpadError>,
}

impl SessionListing {
    pub fn is_stale(&self) -> bool {
        self.stale.is_some()
    }
}

/// Locally cached view of the signed-in user's sessions.
///
/// Every remote session read or write goes through this type. Successful
/// results are applied to the [`WorkspaceStore`] cache; failures are logged,
/// published as notices and returned to the caller.
pub struct SessionRepository {
    remote: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<WorkspaceStore>,
}

impl SessionRepository {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<WorkspaceStore>,
    ) -> Self {
        Self {
            remote,
            identity,
            store,
        }
    }

    pub fn store(&self) -> &Arc<WorkspaceStore> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Returns the signed-in user, or surfaces `NotAuthenticated`.
    pub fn current_user_id(&self, operation: &'static str) -> Result<String> {
        self.identity
            .current_user_id()
            .ok_or_else(|| self.surface(operation, LaunchpadError::NotAuthenticated))
    }

    /// Fetches the sessions of `user_id`, most recently active first.
    ///
    /// The cache is only replaced when `user_id` is the signed-in user. On a
    /// transport failure the last known cache is returned and the error is
    /// reported through [`SessionListing::stale`].
    pub async fn list(&self, user_id: &str) -> SessionListing {
        let is_current = self.identity.current_user_id().as_deref() == Some(user_id);
        match self.remote.list_sessions(user_id).await {
            Ok(sessions) => {
                if is_current {
                    self.store.replace_sessions(sessions.clone());
                }
                tracing::debug!(user_id, count = sessions.len(), "listed sessions");
                SessionListing {
                    sessions,
                    stale: None,
                }
            }
            Err(err) => {
                let err = self.surface("list_sessions", err);
                let sessions = if is_current {
                    self.store.sessions()
                } else {
                    Vec::new()
                };
                SessionListing {
                    sessions,
                    stale: Some(err),
                }
            }
        }
    }

    /// Re-pulls the signed-in user's sessions and replaces the cache.
    pub async fn refresh(&self) -> Result<Vec<Session>> {
        let user_id = self.current_user_id("refresh_sessions")?;
        let listing = self.list(&user_id).await;
        match listing.stale {
            Some(err) => Err(err),
            None => Ok(listing.sessions),
        }
    }

    /// Creates a session for `agent_id` and makes it the active session.
    ///
    /// # Arguments
    ///
    /// * `agent_id` - The agent the session runs
    /// * `title` - Explicit title; blank or `None` falls back to `"Session <date>"`
    ///
    /// # Returns
    ///
    /// The inserted row. When the store already holds a session for this
    /// `(user, agent)` pair, that row is fetched and returned instead.
    pub async fn create(&self, agent_id: &str, title: Option<&str>) -> Result<Session> {
        let user_id = self.current_user_id("create_session")?;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_session_title(Utc::now()));

        let session = match self
            .remote
            .insert_session(NewSession::new(&user_id, agent_id, title))
            .await
        {
            Ok(session) => {
                tracing::info!(session_id = %session.id, agent_id, "created session");
                self.store.upsert_session(session.clone());
                session
            }
            Err(err) if err.is_unique_violation() => {
                tracing::info!(agent_id, "session already exists remotely, adopting it");
                self.adopt_existing(agent_id, err).await?
            }
            Err(err) => return Err(self.surface("create_session", err)),
        };

        self.store.set_active(Some(&session.id))?;
        Ok(session)
    }

    /// Writes a new state document, guarded by the cached row version.
    pub async fn update_state(&self, session_id: &str, state: StateMap) -> Result<Session> {
        self.current_user_id("update_state")?;
        let patch = SessionPatch::state(state).expecting(self.cached_version(session_id));
        self.apply("update_state", session_id, patch).await
    }

    /// Renames a session, guarded by the cached row version.
    pub async fn update_title(&self, session_id: &str, title: &str) -> Result<Session> {
        self.current_user_id("update_title")?;
        let title = title.trim();
        if title.is_empty() {
            return Err(self.surface(
                "update_title",
                LaunchpadError::invalid_input("session title must not be empty"),
            ));
        }
        let patch = SessionPatch::title(title).expecting(self.cached_version(session_id));
        self.apply("update_title", session_id, patch).await
    }

    /// Bumps `last_active_at` without touching the row version.
    pub async fn touch(&self, session_id: &str) -> Result<Session> {
        self.current_user_id("touch_session")?;
        self.apply("touch_session", session_id, SessionPatch::touch())
            .await
    }

    /// Deletes the remote row, then evicts it from the cache.
    ///
    /// A row that is already gone remotely is still evicted locally.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        self.current_user_id("delete_session")?;
        match self.remote.delete_session(session_id).await {
            Ok(()) => {
                tracing::info!(session_id, "deleted session");
                self.store.remove_session(session_id);
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!(session_id, "session already deleted remotely");
                self.store.remove_session(session_id);
                self.refresh_after("delete_session").await;
                Ok(())
            }
            Err(err) => Err(self.surface("delete_session", err)),
        }
    }

    async fn apply(
        &self,
        operation: &'static str,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<Session> {
        match self.remote.update_session(session_id, patch).await {
            Ok(session) => {
                tracing::debug!(session_id, version = session.version, operation, "session updated");
                self.store.upsert_session(session.clone());
                Ok(session)
            }
            Err(err) if err.is_conflict() => {
                let err = self.surface(operation, err);
                self.refresh_after(operation).await;
                Err(err)
            }
            Err(err) if err.is_not_found() => {
                let err = self.surface(operation, err);
                self.store.remove_session(session_id);
                self.refresh_after(operation).await;
                Err(err)
            }
            Err(err) => Err(self.surface(operation, err)),
        }
    }

    /// Re-pulls the cache after a stale-cache error. A failed refresh has
    /// already been surfaced by [`refresh`](Self::refresh).
    async fn refresh_after(&self, operation: &'static str) {
        if let Err(err) = self.refresh().await {
            tracing::debug!(operation, error = %err, "refresh after stale cache failed");
        }
    }

    async fn adopt_existing(&self, agent_id: &str, err: LaunchpadError) -> Result<Session> {
        self.refresh().await?;
        self.store
            .session_for_agent(agent_id)
            .ok_or_else(|| self.surface("create_session", err))
    }

    fn cached_version(&self, session_id: &str) -> Option<u64> {
        self.store.find_session(session_id).map(|s| s.version)
    }

    /// Logs `err` and publishes it as a notice before handing it back.
    pub(crate) fn surface(&self, operation: &'static str, err: LaunchpadError) -> LaunchpadError {
        if err.is_not_authenticated() {
            tracing::warn!(operation, "rejected: no signed-in user");
        } else {
            tracing::warn!(operation, error = %err, "session operation failed");
        }
        self.store.notify(Notice::from_error(operation, &err));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_core::agent::{Agent, AgentType};
    use launchpad_core::user::StaticIdentity;
    use launchpad_infrastructure::InMemoryRemoteStore;
    use serde_json::json;

    async fn fixture() -> (Arc<InMemoryRemoteStore>, Arc<StaticIdentity>, SessionRepository) {
        let remote = Arc::new(InMemoryRemoteStore::new());
        remote.seed_agent(Agent::new("a1", "Helper", AgentType::Chat)).await;
        remote.seed_agent(Agent::new("a2", "Intake", AgentType::Form)).await;
        let identity = Arc::new(StaticIdentity::signed_in("u1"));
        let repository = SessionRepository::new(
            remote.clone(),
            identity.clone(),
            Arc::new(WorkspaceStore::default()),
        );
        (remote, identity, repository)
    }

    #[tokio::test]
    async fn test_create_prepends_and_activates() {
        let (_remote, _identity, repository) = fixture().await;
        let first = repository.create("a1", None).await.unwrap();
        assert!(first.title.starts_with("Session "));
        assert!(first.state.is_empty());

        let second = repository.create("a2", Some("Intake run")).await.unwrap();
        let store = repository.store();
        assert_eq!(store.active_session_id().as_deref(), Some(second.id.as_str()));
        let ids: Vec<_> = store.sessions().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_create_requires_identity() {
        let (remote, identity, repository) = fixture().await;
        identity.sign_out();

        let err = repository.create("a1", None).await.unwrap_err();
        assert!(err.is_not_authenticated());
        assert_eq!(remote.session_insert_count(), 0);
        assert_eq!(repository.store().notices().len(), 1);
    }

    #[tokio::test]
    async fn test_create_adopts_row_created_elsewhere() {
        let (remote, _identity, repository) = fixture().await;
        let elsewhere = remote
            .insert_session(NewSession::new("u1", "a1", "other tab"))
            .await
            .unwrap();

        let adopted = repository.create("a1", None).await.unwrap();
        assert_eq!(adopted.id, elsewhere.id);
        assert_eq!(remote.session_insert_count(), 1);
        assert_eq!(
            repository.store().active_session_id().as_deref(),
            Some(elsewhere.id.as_str())
        );
    }

    #[tokio::test]
    async fn test_list_falls_back_to_cache_when_offline() {
        let (remote, _identity, repository) = fixture().await;
        let session = repository.create("a1", None).await.unwrap();

        remote.set_online(false);
        let listing = repository.list("u1").await;
        assert!(listing.is_stale());
        assert!(listing.stale.as_ref().unwrap().is_persistence());
        assert_eq!(listing.sessions.len(), 1);
        assert_eq!(listing.sessions[0].id, session.id);
        assert!(!repository.store().notices().is_empty());
    }

    #[tokio::test]
    async fn test_stale_version_surfaces_conflict_and_refreshes() {
        let (remote, _identity, repository) = fixture().await;
        let session = repository.create("a1", None).await.unwrap();

        // Another writer moves the row on.
        let mut theirs = StateMap::new();
        theirs.insert("from".into(), json!("other tab"));
        remote
            .update_session(&session.id, SessionPatch::state(theirs.clone()))
            .await
            .unwrap();

        let mut ours = StateMap::new();
        ours.insert("from".into(), json!("this tab"));
        let err = repository
            .update_state(&session.id, ours.clone())
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // The refresh picked up the newer row, so a retry goes through.
        let cached = repository.store().find_session(&session.id).unwrap();
        assert_eq!(cached.state, theirs);
        let saved = repository.update_state(&session.id, ours.clone()).await.unwrap();
        assert_eq!(saved.state, ours);
    }

    #[tokio::test]
    async fn test_update_of_vanished_row_evicts_it() {
        let (remote, _identity, repository) = fixture().await;
        let session = repository.create("a1", None).await.unwrap();
        remote.delete_session(&session.id).await.unwrap();

        let err = repository
            .update_title(&session.id, "renamed")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(repository.store().find_session(&session.id).is_none());
        assert_eq!(repository.store().active_session_id(), None);
    }

    #[tokio::test]
    async fn test_touch_keeps_version() {
        let (_remote, _identity, repository) = fixture().await;
        let session = repository.create("a1", None).await.unwrap();
        let touched = repository.touch(&session.id).await.unwrap();
        assert_eq!(touched.version, session.version);
        assert!(touched.last_active_at >= session.last_active_at);
    }

    #[tokio::test]
    async fn test_delete_clears_active_pointer() {
        let (remote, _identity, repository) = fixture().await;
        let session = repository.create("a1", None).await.unwrap();

        repository.delete(&session.id).await.unwrap();
        assert_eq!(repository.store().active_session_id(), None);
        assert!(repository.store().sessions().is_empty());

        // Deleting again is harmless.
        repository.delete(&session.id).await.unwrap();
        assert!(remote.list_sessions("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_cache() {
        let (remote, _identity, repository) = fixture().await;
        let session = repository.create("a1", None).await.unwrap();

        remote.set_online(false);
        let err = repository.delete(&session.id).await.unwrap_err();
        assert!(err.is_persistence());
        assert!(repository.store().find_session(&session.id).is_some());
        assert_eq!(
            repository.store().active_session_id().as_deref(),
            Some(session.id.as_str())
        );
    }
}
