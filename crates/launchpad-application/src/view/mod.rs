//! Agent views and their dispatch.
//!
//! # Module Structure
//!
//! - `dispatcher`: maps a session's agent type to a mounted view
//! - `registry`: string-keyed factories for `custom` agents
//! - `chat`, `form`, `workflow`: built-in views
//! - `unsupported`: the placeholder mounted when nothing else applies
//! - `plugins`: custom views bundled with the workspace

mod chat;
mod dispatcher;
mod form;
pub mod plugins;
mod registry;
mod unsupported;
mod workflow;

pub use chat::{ChatView, FAILURE_REPLY};
pub use dispatcher::{AgentViewDispatcher, MISSING_COMPONENT, MountedView, ViewResolution};
pub use form::{FieldType, FormConfig, FormField, FormView, SUBMIT_FAILURE, SUBMIT_SUCCESS, SelectOption};
pub use registry::{PluginRegistry, ViewFactory};
pub use unsupported::UnsupportedView;
pub use workflow::{NodeKind, WorkflowNode, WorkflowView, default_nodes};

use crate::agent_state::AgentStateCoordinator;
use async_trait::async_trait;
use launchpad_core::agent::Agent;
use launchpad_core::completion::{CompletionRequest, CompletionService};
use launchpad_core::error::Result;
use launchpad_core::session::{ChatMessage, Session};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// A mounted agent view.
///
/// Views read and write session state only through the
/// [`AgentStateCoordinator`] in their [`ViewContext`], keyed by the session
/// they were mounted for.
#[async_trait]
pub trait AgentView: Send + Sync {
    /// Stable identifier of the implementation (`"chat"`, a plugin key, ...).
    fn kind(&self) -> &str;

    /// Plain-text rendering of the current view state.
    fn render(&self) -> String;

    /// Applies one line of user input and returns the text to show for it.
    async fn handle_input(&mut self, input: &str) -> Result<String>;
}

/// Everything a view is handed when it is mounted.
#[derive(Clone)]
pub struct ViewContext {
    pub session: Session,
    pub agent: Agent,
    pub state: AgentStateCoordinator,
    pub completion: Option<Arc<dyn CompletionService>>,
}

impl ViewContext {
    pub(crate) fn completion_request(&self, input: Value, history: Vec<ChatMessage>) -> CompletionRequest {
        CompletionRequest {
            agent_id: self.agent.id.clone(),
            session_id: self.session.id.clone(),
            user_id: self.session.user_id.clone(),
            input,
            history,
        }
    }

    /// Reads a typed value from this view's session; malformed values read as
    /// absent.
    pub(crate) fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.state.get_for(&self.session.id, key)?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(session_id = %self.session.id, key, error = %err, "ignoring malformed state value");
                None
            }
        }
    }

    /// Writes to the state mirror; refused once the focus left this session.
    pub(crate) fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.state
            .set_for(&self.session.id, key, serde_json::to_value(value)?)
    }

    /// Writes to this view's session even if the focus has moved elsewhere.
    ///
    /// For results that arrive after an await, such as a completion reply.
    pub(crate) async fn write_through<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.state
            .persist_for(&self.session.id, key, serde_json::to_value(value)?)
            .await
    }

    pub(crate) fn remove(&self, key: &str) -> Result<()> {
        self.state.remove_for(&self.session.id, key)
    }

    /// Saves the mirror now, provided it still belongs to this view's session.
    pub(crate) async fn save(&self) -> Result<()> {
        self.state.save_for(&self.session.id).await
    }
}
