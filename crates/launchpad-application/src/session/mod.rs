//! Session application services.
//!
//! - `repository`: cached CRUD over the remote `sessions` table
//! - `sync`: change-feed listener that keeps the cache in step with other tabs

mod repository;
mod sync;

pub use repository::{SessionListing, SessionRepository};
pub use sync::SessionSync;
