//! Session and workspace coordination for the Launchpad workspace.
//!
//! Entry point is [`WorkspaceCoordinator`]: it owns the [`WorkspaceStore`],
//! the [`SessionRepository`] and the [`AgentStateCoordinator`], and guarantees
//! at most one session per agent per user. [`SessionSync`] keeps the cache in
//! step with remote changes, and [`view::AgentViewDispatcher`] mounts the view
//! matching a session's agent.

pub mod agent_state;
pub mod completion;
pub mod session;
pub mod view;
pub mod workspace;
pub mod workspace_store;

pub use agent_state::AgentStateCoordinator;
pub use completion::AuditedCompletion;
pub use session::{SessionListing, SessionRepository, SessionSync};
pub use workspace::WorkspaceCoordinator;
pub use workspace_store::{Notice, NoticeLevel, WorkspaceEvent, WorkspaceState, WorkspaceStore};
