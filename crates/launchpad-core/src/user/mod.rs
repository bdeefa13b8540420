//! User domain module.
//!
//! This module contains the user profile model and the identity provider
//! contract consumed by every write path.

mod identity;
mod model;

pub use identity::{IdentityProvider, StaticIdentity};
pub use model::UserProfile;
