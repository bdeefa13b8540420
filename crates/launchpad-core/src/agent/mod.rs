//! Agent catalog domain module.

mod model;

pub use model::{Agent, AgentType};
