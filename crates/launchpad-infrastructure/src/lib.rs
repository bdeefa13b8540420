pub mod completion_client;
pub mod config_service;
pub mod memory_store;
pub mod paths;

pub use crate::completion_client::HttpCompletionClient;
pub use crate::config_service::ConfigService;
pub use crate::memory_store::{InMemoryRemoteStore, StoreOperation};
pub use crate::paths::LaunchpadPaths;
