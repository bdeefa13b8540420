//! Domain models and collaborator contracts for the Launchpad workspace.
//!
//! Nothing in this crate performs I/O. Storage, identity and completion are
//! reached through the [`RemoteStore`], [`IdentityProvider`] and
//! [`CompletionService`] traits.

pub mod agent;
pub mod completion;
pub mod config;
pub mod error;
pub mod remote;
pub mod run;
pub mod session;
pub mod user;

// Re-export common types
pub use agent::{Agent, AgentType};
pub use completion::{CompletionRequest, CompletionResponse, CompletionService};
pub use error::{LaunchpadError, Result};
pub use remote::{ChangeEvent, ChangeFilter, ChangeKind, ChangeSubscription, RemoteStore, Table};
pub use session::{Session, StateMap};
pub use user::{IdentityProvider, UserProfile};
