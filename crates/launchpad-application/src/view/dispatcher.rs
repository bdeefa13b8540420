use super::{
    AgentView, ChatView, FormView, PluginRegistry, UnsupportedView, ViewContext, WorkflowView,
};
use crate::agent_state::AgentStateCoordinator;
use crate::workspace::WorkspaceCoordinator;
use crate::workspace_store::{Notice, NoticeLevel, WorkspaceStore};
use launchpad_core::agent::{Agent, AgentType};
use launchpad_core::completion::CompletionService;
use launchpad_core::error::LaunchpadError;
use launchpad_core::remote::RemoteStore;
use launchpad_core::session::Session;
use std::sync::Arc;

/// Shown when a custom agent does not name a component.
pub const MISSING_COMPONENT: &str =
    "No custom component registered. Update the agent config with a valid component key.";

/// The outcome of resolving a session's agent to a view implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewResolution {
    Chat,
    Form,
    Workflow,
    Custom(String),
    Unsupported { reason: String },
}

/// A view together with how it was resolved.
pub struct MountedView {
    pub resolution: ViewResolution,
    pub view: Box<dyn AgentView>,
}

/// Maps sessions to agent views.
///
/// Built-in types resolve directly. `custom` agents resolve through the
/// [`PluginRegistry`]; a missing or unknown component key resolves to
/// [`ViewResolution::Unsupported`] and mounts a placeholder instead of failing.
pub struct AgentViewDispatcher {
    registry: Arc<PluginRegistry>,
    remote: Arc<dyn RemoteStore>,
    store: Arc<WorkspaceStore>,
    state: AgentStateCoordinator,
    completion: Option<Arc<dyn CompletionService>>,
}

impl AgentViewDispatcher {
    pub fn new(registry: Arc<PluginRegistry>, workspace: &WorkspaceCoordinator) -> Self {
        Self {
            registry,
            remote: workspace.remote().clone(),
            store: workspace.store().clone(),
            state: workspace.state().clone(),
            completion: None,
        }
    }

    /// Lets mounted views call the completion service.
    pub fn with_completion(mut self, completion: Arc<dyn CompletionService>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn resolve(&self, agent: &Agent) -> ViewResolution {
        match agent.agent_type {
            AgentType::Chat => ViewResolution::Chat,
            AgentType::Form => ViewResolution::Form,
            AgentType::Workflow => ViewResolution::Workflow,
            AgentType::Custom => match agent.component_key() {
                None => ViewResolution::Unsupported {
                    reason: MISSING_COMPONENT.to_string(),
                },
                Some(key) if self.registry.contains(key) => ViewResolution::Custom(key.to_string()),
                Some(key) => ViewResolution::Unsupported {
                    reason: LaunchpadError::PluginNotRegistered(key.to_string()).to_string(),
                },
            },
        }
    }

    /// Resolves and instantiates the view for `session`.
    ///
    /// The agent comes from the session's join, then the catalog cache, then
    /// the remote store. The view edits state only while `session` is the
    /// focused one; replies that arrive later are written to `session`
    /// directly.
    pub async fn mount(&self, session: &Session) -> MountedView {
        let Some(agent) = self.agent_for(session).await else {
            return self.unsupported(
                session,
                format!("agent '{}' is not in the catalog", session.agent_id),
            );
        };

        let resolution = self.resolve(&agent);
        let ctx = ViewContext {
            session: session.clone(),
            agent,
            state: self.state.clone(),
            completion: self.completion.clone(),
        };
        let view: Box<dyn AgentView> = match &resolution {
            ViewResolution::Chat => Box::new(ChatView::new(ctx)),
            ViewResolution::Form => Box::new(FormView::new(ctx)),
            ViewResolution::Workflow => Box::new(WorkflowView::new(ctx)),
            ViewResolution::Custom(key) => match self.registry.instantiate(key, ctx) {
                Ok(view) => view,
                Err(err) => return self.unsupported(session, err.to_string()),
            },
            ViewResolution::Unsupported { reason } => {
                return self.unsupported(session, reason.clone());
            }
        };

        tracing::debug!(session_id = %session.id, view = view.kind(), "mounted agent view");
        MountedView { resolution, view }
    }

    async fn agent_for(&self, session: &Session) -> Option<Agent> {
        if let Some(agent) = &session.agent {
            return Some(agent.clone());
        }
        if let Some(agent) = self.store.find_agent(&session.agent_id) {
            return Some(agent);
        }
        match self.remote.find_agent(&session.agent_id).await {
            Ok(agent) => agent,
            Err(err) => {
                tracing::warn!(agent_id = %session.agent_id, error = %err, "agent lookup failed");
                self.store.notify(Notice::from_error("mount_view", &err));
                None
            }
        }
    }

    fn unsupported(&self, session: &Session, reason: String) -> MountedView {
        tracing::warn!(session_id = %session.id, reason = %reason, "no view for session");
        self.store.notify(Notice {
            level: NoticeLevel::Warning,
            operation: "mount_view",
            message: reason.clone(),
            retryable: false,
        });
        MountedView {
            resolution: ViewResolution::Unsupported {
                reason: reason.clone(),
            },
            view: Box::new(UnsupportedView::new(reason)),
        }
    }
}
