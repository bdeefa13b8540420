//! Key/value access to the active session's state document.
//!
//! The coordinator keeps an in-memory mirror of the focused session's
//! `state` and persists it through [`SessionRepository::update_state`]:
//!
//! - explicitly via [`AgentStateCoordinator::save`]
//! - after a quiet period via the trailing-edge autosave debounce
//! - before the active session moves, via [`AgentStateCoordinator::flush`]
//!
//! Every save is keyed by the session id captured when it starts, so a write
//! that is in flight while the focus moves still lands on its own session.
//! Saves never overlap: an explicit save waits for a running autosave and then
//! writes against the version that autosave produced.

use crate::session::SessionRepository;
use crate::workspace_store::{Notice, NoticeLevel};
use launchpad_core::error::{LaunchpadError, Result};
use launchpad_core::session::{Session, StateMap};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct Mirror {
    session_id: Option<String>,
    values: StateMap,
    dirty: bool,
    /// Incremented by every local mutation and reload.
    generation: u64,
    /// Row version the mirror was last read from or written to.
    loaded_version: Option<u64>,
}

/// A snapshot taken at the start of a save.
struct PendingSave {
    session_id: String,
    values: StateMap,
    generation: u64,
}

struct StateInner {
    repository: Arc<SessionRepository>,
    mirror: Mutex<Mirror>,
    auto_save: AtomicBool,
    delay: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    /// Held from snapshot to completion of every save.
    saving: tokio::sync::Mutex<()>,
}

impl StateInner {
    fn mirror(&self) -> MutexGuard<'_, Mirror> {
        self.mirror.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            timer.abort();
        }
    }

    /// Snapshots the mirror. With `focus`, fails unless the mirror belongs to
    /// that session.
    ///
    /// A pending timer is cancelled while the mirror is still locked; edits
    /// made after the snapshot arm a fresh one.
    fn capture(&self, only_dirty: bool, focus: Option<&str>) -> Result<Option<PendingSave>> {
        let mirror = self.mirror();
        if let Some(expected) = focus {
            if mirror.session_id.as_deref() != Some(expected) {
                return Err(LaunchpadError::not_focused(expected));
            }
        }
        if only_dirty && !mirror.dirty {
            return Ok(None);
        }
        let Some(session_id) = mirror.session_id.clone() else {
            return Ok(None);
        };
        self.cancel_timer();
        Ok(Some(PendingSave {
            session_id,
            values: mirror.values.clone(),
            generation: mirror.generation,
        }))
    }

    /// Snapshots and writes the mirror once no other save is running.
    ///
    /// Returns `false` when there was nothing to write.
    async fn save_exclusive(&self, only_dirty: bool, focus: Option<&str>) -> Result<bool> {
        let _saving = self.saving.lock().await;
        let Some(pending) = self.capture(only_dirty, focus)? else {
            return Ok(false);
        };
        self.persist(pending).await?;
        Ok(true)
    }

    async fn persist(&self, pending: PendingSave) -> Result<()> {
        let PendingSave {
            session_id,
            values,
            generation,
        } = pending;
        let saved = self.repository.update_state(&session_id, values).await?;

        let mut mirror = self.mirror();
        if mirror.session_id.as_deref() == Some(session_id.as_str()) {
            mirror.loaded_version = Some(saved.version);
            if mirror.generation == generation {
                mirror.dirty = false;
            }
        }
        tracing::debug!(session_id = %session_id, version = saved.version, "agent state saved");
        Ok(())
    }
}

impl Drop for StateInner {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

/// Shared handle to the active session's state mirror.
#[derive(Clone)]
pub struct AgentStateCoordinator {
    inner: Arc<StateInner>,
}

impl AgentStateCoordinator {
    pub fn new(repository: Arc<SessionRepository>, autosave_delay: Duration) -> Self {
        Self {
            inner: Arc::new(StateInner {
                repository,
                mirror: Mutex::new(Mirror::default()),
                auto_save: AtomicBool::new(true),
                delay: autosave_delay,
                timer: Mutex::new(None),
                saving: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The session the mirror currently belongs to.
    pub fn session_id(&self) -> Option<String> {
        self.inner.mirror().session_id.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.mirror().values.get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.mirror().values.contains_key(key)
    }

    pub fn snapshot(&self) -> StateMap {
        self.inner.mirror().values.clone()
    }

    /// Whether local edits have not been persisted yet.
    pub fn is_dirty(&self) -> bool {
        self.inner.mirror().dirty
    }

    pub fn auto_save_enabled(&self) -> bool {
        self.inner.auto_save.load(Ordering::SeqCst)
    }

    pub fn set_auto_save(&self, enabled: bool) {
        self.inner.auto_save.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.inner.cancel_timer();
        }
    }

    /// Reads the user's `auto_save_sessions` preference from the store.
    ///
    /// A missing profile row means the defaults apply. A failed read keeps the
    /// current setting and publishes a notice.
    pub async fn refresh_preferences(&self, user_id: &str) -> Result<bool> {
        let repository = &self.inner.repository;
        let enabled = match repository.remote().find_user_profile(user_id).await {
            Ok(profile) => profile.map_or(true, |p| p.auto_save_sessions),
            Err(err) => return Err(repository.surface("load_preferences", err)),
        };
        self.set_auto_save(enabled);
        tracing::debug!(user_id, auto_save = enabled, "loaded user preferences");
        Ok(enabled)
    }

    /// Merges one key into the mirror and arms the autosave timer.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.mutate(|values| {
            values.insert(key.into(), value);
        });
    }

    /// Overwrites the whole mirror and arms the autosave timer.
    pub fn replace(&self, state: StateMap) {
        self.mutate(|values| *values = state);
    }

    /// Empties the mirror; the empty document is persisted like any other edit.
    pub fn clear(&self) {
        self.replace(StateMap::new());
    }

    /// Writes the mirror to the session it belongs to.
    ///
    /// Saving twice without an edit in between writes the same document again.
    pub async fn save(&self) -> Result<()> {
        if self.inner.save_exclusive(false, None).await? {
            Ok(())
        } else {
            Err(self
                .inner
                .repository
                .surface("save_state", LaunchpadError::NoActiveSession))
        }
    }

    /// Saves only when there are unpersisted edits for a session.
    pub async fn flush(&self) -> Result<()> {
        self.inner.save_exclusive(true, None).await.map(|_| ())
    }

    /// Like [`save`](Self::save), but only while the mirror belongs to
    /// `session_id`.
    pub async fn save_for(&self, session_id: &str) -> Result<()> {
        match self.inner.save_exclusive(false, Some(session_id)).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_focused() => {
                Err(self.inner.repository.surface("save_state", err))
            }
            Err(err) => Err(err),
        }
    }

    /// Reads `key` of `session_id`: from the mirror while it belongs to that
    /// session, otherwise from the cached row.
    pub fn get_for(&self, session_id: &str, key: &str) -> Option<Value> {
        {
            let mirror = self.inner.mirror();
            if mirror.session_id.as_deref() == Some(session_id) {
                return mirror.values.get(key).cloned();
            }
        }
        self.inner
            .repository
            .store()
            .find_session(session_id)?
            .state
            .get(key)
            .cloned()
    }

    /// Sets `key` only while the mirror still belongs to `session_id`.
    pub fn set_for(&self, session_id: &str, key: &str, value: Value) -> Result<()> {
        let key = key.to_string();
        if self.edit_focused(Some(session_id), |values| {
            values.insert(key, value);
        }) {
            Ok(())
        } else {
            Err(self
                .inner
                .repository
                .surface("write_state", LaunchpadError::not_focused(session_id)))
        }
    }

    /// Removes `key` only while the mirror still belongs to `session_id`.
    pub fn remove_for(&self, session_id: &str, key: &str) -> Result<()> {
        if self.edit_focused(Some(session_id), |values| {
            values.remove(key);
        }) {
            Ok(())
        } else {
            Err(self
                .inner
                .repository
                .surface("write_state", LaunchpadError::not_focused(session_id)))
        }
    }

    /// Sets `key` for `session_id` whether or not the mirror still belongs to it.
    ///
    /// While focused this is [`set_for`](Self::set_for). Once the focus has
    /// moved on, the key is merged into the cached row and written straight
    /// to the store, and an info notice tells the user where it went.
    pub async fn persist_for(&self, session_id: &str, key: &str, value: Value) -> Result<()> {
        {
            let _saving = self.inner.saving.lock().await;
            let focused = self.edit_focused(Some(session_id), |values| {
                values.insert(key.to_string(), value.clone());
            });
            if focused {
                return Ok(());
            }

            let repository = &self.inner.repository;
            let Some(session) = repository.store().find_session(session_id) else {
                return Err(repository.surface(
                    "write_state",
                    LaunchpadError::not_found("Session", session_id),
                ));
            };
            let mut state = session.state;
            state.insert(key.to_string(), value);
            let saved = repository.update_state(session_id, state).await?;
            tracing::debug!(session_id, key, version = saved.version, "wrote state of unfocused session");
            repository.store().notify(Notice::info(
                "write_state",
                format!("Saved an update to '{}' in the background.", saved.title),
            ));
        }
        // The mirror may have been pointed back at this session meanwhile.
        self.reconcile();
        Ok(())
    }

    /// Points the mirror at `session`, discarding the previous contents.
    ///
    /// Callers flush first if the previous contents matter.
    pub fn load(&self, session: Option<&Session>) {
        self.inner.cancel_timer();
        let mut mirror = self.inner.mirror();
        mirror.session_id = session.map(|s| s.id.clone());
        mirror.values = session.map(|s| s.state.clone()).unwrap_or_default();
        mirror.loaded_version = session.map(|s| s.version);
        mirror.dirty = false;
        mirror.generation += 1;
        if let Some(session) = session {
            tracing::debug!(session_id = %session.id, keys = session.state.len(), "loaded agent state");
        }
    }

    /// Brings a clean mirror up to date with the cached session row.
    ///
    /// Drops the mirror when its session left the cache, and reloads it when
    /// another writer produced a newer version. Dirty mirrors are left alone.
    pub fn reconcile(&self) {
        let Some(session_id) = self.session_id() else {
            return;
        };
        let store = self.inner.repository.store();
        match store.find_session(&session_id) {
            None => {
                tracing::debug!(session_id = %session_id, "state mirror's session left the cache");
                self.load(None);
            }
            Some(session) => {
                let stale = {
                    let mirror = self.inner.mirror();
                    !mirror.dirty
                        && mirror.session_id.as_deref() == Some(session.id.as_str())
                        && mirror.loaded_version.is_some_and(|v| session.version > v)
                };
                if stale {
                    self.load(Some(&session));
                }
            }
        }
    }

    fn mutate(&self, edit: impl FnOnce(&mut StateMap)) {
        self.edit_focused(None, edit);
    }

    /// Applies `edit` and arms the autosave. With `focus`, does nothing and
    /// returns `false` unless the mirror belongs to that session.
    fn edit_focused(&self, focus: Option<&str>, edit: impl FnOnce(&mut StateMap)) -> bool {
        let has_session = {
            let mut mirror = self.inner.mirror();
            if focus.is_some_and(|expected| mirror.session_id.as_deref() != Some(expected)) {
                return false;
            }
            edit(&mut mirror.values);
            mirror.dirty = true;
            mirror.generation += 1;
            mirror.session_id.is_some()
        };
        if has_session && self.auto_save_enabled() {
            self.schedule_autosave();
        }
        true
    }

    /// (Re)arms the trailing-edge autosave timer.
    fn schedule_autosave(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("autosave requested outside a tokio runtime");
            self.inner.repository.store().notify(Notice {
                level: NoticeLevel::Warning,
                operation: "autosave",
                message: "Autosave is unavailable here; save the session manually.".into(),
                retryable: true,
            });
            return;
        };

        let weak: Weak<StateInner> = Arc::downgrade(&self.inner);
        let delay = self.inner.delay;
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // The write runs on its own task so re-arming the timer never
            // cancels it.
            tokio::spawn(async move {
                if let Err(err) = inner.save_exclusive(true, None).await {
                    tracing::warn!(error = %err, "autosave failed");
                }
            });
        });

        let previous = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(timer);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace_store::WorkspaceStore;
    use launchpad_core::agent::{Agent, AgentType};
    use launchpad_core::remote::RemoteStore;
    use launchpad_core::user::{StaticIdentity, UserProfile};
    use launchpad_infrastructure::InMemoryRemoteStore;
    use serde_json::json;

    const DELAY: Duration = Duration::from_millis(1000);

    async fn fixture() -> (Arc<InMemoryRemoteStore>, Arc<SessionRepository>, AgentStateCoordinator) {
        fixture_with_latency(Duration::ZERO).await
    }

    async fn fixture_with_latency(
        latency: Duration,
    ) -> (Arc<InMemoryRemoteStore>, Arc<SessionRepository>, AgentStateCoordinator) {
        let remote = Arc::new(InMemoryRemoteStore::new().with_latency(latency));
        remote.seed_agent(Agent::new("a1", "Helper", AgentType::Chat)).await;
        remote.seed_agent(Agent::new("a2", "Intake", AgentType::Form)).await;
        let repository = Arc::new(SessionRepository::new(
            remote.clone(),
            Arc::new(StaticIdentity::signed_in("u1")),
            Arc::new(WorkspaceStore::default()),
        ));
        let state = AgentStateCoordinator::new(repository.clone(), DELAY);
        (remote, repository, state)
    }

    #[test]
    fn test_local_reads_and_writes() {
        let repository = Arc::new(SessionRepository::new(
            Arc::new(InMemoryRemoteStore::new()),
            Arc::new(StaticIdentity::anonymous()),
            Arc::new(WorkspaceStore::default()),
        ));
        let state = AgentStateCoordinator::new(repository, DELAY);

        assert!(!state.has("count"));
        state.set("count", json!(1));
        state.set("count", json!(2));
        assert_eq!(state.get("count"), Some(json!(2)));
        assert!(state.is_dirty());

        state.clear();
        assert!(state.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_saves_once_with_last_value() {
        let (remote, repository, state) = fixture().await;
        let session = repository.create("a1", None).await.unwrap();
        state.load(Some(&session));

        for i in 0..5 {
            state.set("count", json!(i));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(remote.session_updates(&session.id).is_empty());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let updates = remote.session_updates(&session.id);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].state.as_ref().unwrap()["count"], json!(4));
        assert!(!state.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_disabled_by_profile() {
        let (remote, repository, state) = fixture().await;
        let mut profile = UserProfile::defaults_for("u1");
        profile.auto_save_sessions = false;
        remote.put_user_profile(profile).await;
        assert!(!state.refresh_preferences("u1").await.unwrap());

        let session = repository.create("a1", None).await.unwrap();
        state.load(Some(&session));
        state.set("draft", json!("hello"));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(remote.session_updates(&session.id).is_empty());
        assert!(state.is_dirty());

        state.flush().await.unwrap();
        assert_eq!(remote.session_updates(&session.id).len(), 1);
    }

    #[tokio::test]
    async fn test_save_without_session_is_surfaced() {
        let (_remote, repository, state) = fixture().await;
        let err = state.save().await.unwrap_err();
        assert_eq!(err, LaunchpadError::NoActiveSession);
        assert_eq!(repository.store().notices().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_save_keeps_captured_session() {
        let (remote, repository, state) = fixture_with_latency(Duration::from_millis(50)).await;
        let first = repository.create("a1", None).await.unwrap();
        let second = repository.create("a2", None).await.unwrap();
        state.set_auto_save(false);
        state.load(Some(&first));
        state.set("note", json!("for first"));

        let saving = state.clone();
        let save = tokio::spawn(async move { saving.save().await });
        // Let the save capture its snapshot and block on the store.
        tokio::time::sleep(Duration::from_millis(10)).await;
        state.load(Some(&second));
        save.await.unwrap().unwrap();

        let stored = remote.find_session(&first.id).await.unwrap().unwrap();
        assert_eq!(stored.state["note"], json!("for first"));
        assert!(remote.session_updates(&second.id).is_empty());
        assert_eq!(state.session_id().as_deref(), Some(second.id.as_str()));
        assert!(!state.has("note"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_save_waits_for_running_autosave() {
        let (remote, repository, state) = fixture_with_latency(Duration::from_millis(50)).await;
        let session = repository.create("a1", None).await.unwrap();
        state.load(Some(&session));
        state.set("draft", json!("hello"));

        // The autosave write is now blocked on the store.
        tokio::time::sleep(Duration::from_millis(1010)).await;
        state.save().await.unwrap();

        let updates = remote.session_updates(&session.id);
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|p| p.state.as_ref().unwrap()["draft"] == json!("hello")));
        assert!(repository.store().notices().is_empty());
        assert!(!state.is_dirty());
        let stored = remote.find_session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.version, session.version + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_during_autosave_writes_nothing_extra() {
        let (remote, repository, state) = fixture_with_latency(Duration::from_millis(50)).await;
        let session = repository.create("a1", None).await.unwrap();
        state.load(Some(&session));
        state.set("draft", json!("hello"));

        tokio::time::sleep(Duration::from_millis(1010)).await;
        state.flush().await.unwrap();

        assert_eq!(remote.session_updates(&session.id).len(), 1);
        assert!(repository.store().notices().is_empty());
        assert!(!state.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_autosave_is_saved_by_flush() {
        let (remote, repository, state) = fixture_with_latency(Duration::from_millis(50)).await;
        let session = repository.create("a1", None).await.unwrap();
        state.load(Some(&session));
        state.set("draft", json!("first"));

        tokio::time::sleep(Duration::from_millis(1010)).await;
        state.set_auto_save(false);
        state.set("draft", json!("second"));
        state.flush().await.unwrap();

        let updates = remote.session_updates(&session.id);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].state.as_ref().unwrap()["draft"], json!("second"));
        assert!(repository.store().notices().is_empty());
        assert!(!state.is_dirty());
    }

    #[tokio::test]
    async fn test_reconcile_reloads_clean_mirror_on_newer_version() {
        let (remote, repository, state) = fixture().await;
        let session = repository.create("a1", None).await.unwrap();
        state.load(Some(&session));

        let mut theirs = StateMap::new();
        theirs.insert("from".into(), json!("other tab"));
        remote
            .update_session(&session.id, launchpad_core::session::SessionPatch::state(theirs))
            .await
            .unwrap();
        repository.refresh().await.unwrap();

        state.reconcile();
        assert_eq!(state.get("from"), Some(json!("other tab")));

        repository.delete(&session.id).await.unwrap();
        state.reconcile();
        assert_eq!(state.session_id(), None);
    }
}
