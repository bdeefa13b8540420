//! Explicit store for the tab-local workspace state.
//!
//! `WorkspaceStore` owns the agent cache, the session cache and the active
//! session pointer. Every mutation goes through a method that keeps the
//! invariants and then notifies subscribers:
//!
//! - sessions stay ordered by `last_active_at`, most recent first
//! - a non-null active pointer always names a cached session; evicting that
//!   session clears the pointer in the same critical section

use launchpad_core::agent::Agent;
use launchpad_core::error::{LaunchpadError, Result};
use launchpad_core::session::Session;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

const MAX_NOTICES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible, non-fatal message produced by a failed or degraded operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    /// Operation that produced the notice, e.g. `"update_state"`.
    pub operation: &'static str,
    pub message: String,
    /// Whether repeating the operation may succeed.
    pub retryable: bool,
}

impl Notice {
    pub fn from_error(operation: &'static str, err: &LaunchpadError) -> Self {
        let level = if err.is_conflict() || err.is_not_found() || err.is_not_focused() {
            NoticeLevel::Warning
        } else {
            NoticeLevel::Error
        };
        Self {
            level,
            operation,
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }

    pub fn info(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            operation,
            message: message.into(),
            retryable: false,
        }
    }
}

/// Change notifications published by [`WorkspaceStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceEvent {
    AgentsChanged,
    SessionsChanged,
    ActiveSessionChanged {
        previous: Option<String>,
        current: Option<String>,
    },
    Notice(Notice),
}

/// A point-in-time copy of the workspace state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceState {
    agents: Vec<Agent>,
    sessions: Vec<Session>,
    active_session_id: Option<String>,
    notices: Vec<Notice>,
}

impl WorkspaceState {
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    pub fn active_session(&self) -> Option<&Session> {
        let id = self.active_session_id.as_deref()?;
        self.find_session(id)
    }

    pub fn find_session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    fn sort_sessions(&mut self) {
        self.sessions
            .sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
    }

    /// Clears the pointer when it no longer names a cached session.
    fn repair_active(&mut self) -> Option<String> {
        match &self.active_session_id {
            Some(id) if !self.sessions.iter().any(|s| &s.id == id) => self.active_session_id.take(),
            _ => None,
        }
    }
}

pub struct WorkspaceStore {
    state: RwLock<WorkspaceState>,
    events: broadcast::Sender<WorkspaceEvent>,
}

impl WorkspaceStore {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            state: RwLock::new(WorkspaceState::default()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> WorkspaceState {
        self.read().clone()
    }

    pub fn agents(&self) -> Vec<Agent> {
        self.read().agents.clone()
    }

    pub fn find_agent(&self, agent_id: &str) -> Option<Agent> {
        self.read().agents.iter().find(|a| a.id == agent_id).cloned()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.read().sessions.clone()
    }

    pub fn find_session(&self, session_id: &str) -> Option<Session> {
        self.read().find_session(session_id).cloned()
    }

    /// Returns the cached session for `agent_id`, if any.
    pub fn session_for_agent(&self, agent_id: &str) -> Option<Session> {
        self.read()
            .sessions
            .iter()
            .find(|s| s.agent_id == agent_id)
            .cloned()
    }

    pub fn active_session_id(&self) -> Option<String> {
        self.read().active_session_id.clone()
    }

    pub fn active_session(&self) -> Option<Session> {
        self.read().active_session().cloned()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.read().notices.clone()
    }

    /// Removes and returns all pending notices.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.write().notices)
    }

    pub fn replace_agents(&self, agents: Vec<Agent>) {
        self.write().agents = agents;
        self.emit(WorkspaceEvent::AgentsChanged);
    }

    /// Replaces the whole session cache, evicting the active pointer if its
    /// session is gone.
    ///
    /// A cached row with a higher version than the incoming one is kept: the
    /// listing was read before one of our own writes committed.
    pub fn replace_sessions(&self, sessions: Vec<Session>) {
        let evicted = {
            let mut state = self.write();
            let merged: Vec<Session> = sessions
                .into_iter()
                .map(|incoming| {
                    match state.sessions.iter().find(|s| s.id == incoming.id) {
                        Some(cached) if cached.version > incoming.version => {
                            tracing::debug!(
                                session_id = %incoming.id,
                                cached = cached.version,
                                listed = incoming.version,
                                "keeping newer cached session row"
                            );
                            cached.clone()
                        }
                        _ => incoming,
                    }
                })
                .collect();
            state.sessions = merged;
            state.sort_sessions();
            state.repair_active()
        };
        self.emit(WorkspaceEvent::SessionsChanged);
        if let Some(previous) = evicted {
            self.emit(WorkspaceEvent::ActiveSessionChanged {
                previous: Some(previous),
                current: None,
            });
        }
    }

    /// Inserts or replaces one cached session, keeping the cache ordered.
    pub fn upsert_session(&self, session: Session) {
        {
            let mut state = self.write();
            match state.sessions.iter_mut().find(|s| s.id == session.id) {
                Some(existing) => *existing = session,
                None => state.sessions.push(session),
            }
            state.sort_sessions();
        }
        self.emit(WorkspaceEvent::SessionsChanged);
    }

    /// Removes a cached session; clears the active pointer if it named it.
    pub fn remove_session(&self, session_id: &str) -> Option<Session> {
        let (removed, cleared) = {
            let mut state = self.write();
            let index = state.sessions.iter().position(|s| s.id == session_id)?;
            let removed = state.sessions.remove(index);
            (removed, state.repair_active())
        };
        self.emit(WorkspaceEvent::SessionsChanged);
        if let Some(previous) = cleared {
            self.emit(WorkspaceEvent::ActiveSessionChanged {
                previous: Some(previous),
                current: None,
            });
        }
        Some(removed)
    }

    /// Points the workspace at `session_id`, or at nothing.
    ///
    /// Fails with `NotFound` when the id is not in the session cache.
    pub fn set_active(&self, session_id: Option<&str>) -> Result<()> {
        let previous = {
            let mut state = self.write();
            if let Some(id) = session_id {
                if state.find_session(id).is_none() {
                    return Err(LaunchpadError::not_found("Session", id));
                }
            }
            let next = session_id.map(str::to_string);
            if state.active_session_id == next {
                return Ok(());
            }
            std::mem::replace(&mut state.active_session_id, next)
        };
        self.emit(WorkspaceEvent::ActiveSessionChanged {
            previous,
            current: session_id.map(str::to_string),
        });
        Ok(())
    }

    /// Records a notice and publishes it to subscribers.
    pub fn notify(&self, notice: Notice) {
        {
            let mut state = self.write();
            state.notices.push(notice.clone());
            let overflow = state.notices.len().saturating_sub(MAX_NOTICES);
            state.notices.drain(..overflow);
        }
        self.emit(WorkspaceEvent::Notice(notice));
    }

    fn emit(&self, event: WorkspaceEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn read(&self) -> RwLockReadGuard<'_, WorkspaceState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorkspaceState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for WorkspaceStore {
    fn default() -> Self {
        Self::new(64)
    }
}
