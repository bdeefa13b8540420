//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: Core session row (`Session`) plus insert/patch payloads
//! - `message`: Chat turn types (`MessageRole`, `ChatMessage`)

mod message;
mod model;

pub use message::{ChatMessage, MessageRole};
pub use model::{NewSession, Session, SessionPatch, StateMap, default_session_title};
