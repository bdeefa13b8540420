//! Configuration model.
//!
//! Mirrors `config.toml`; every field has a default so a partial file loads.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct RootConfig {
    #[serde(default)]
    pub workspace: WorkspaceSettings,
    #[serde(default)]
    pub completion: CompletionSettings,
}

/// Settings for the session coordination layer.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct WorkspaceSettings {
    /// Quiet period before a burst of state edits is persisted.
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,
    /// Buffer size of the change feed and workspace event channels.
    #[serde(default = "default_change_feed_capacity")]
    pub change_feed_capacity: usize,
    /// Activate the most recent session when the workspace initializes.
    #[serde(default = "default_true")]
    pub restore_last_session: bool,
}

impl WorkspaceSettings {
    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            autosave_delay_ms: default_autosave_delay_ms(),
            change_feed_capacity: default_change_feed_capacity(),
            restore_last_session: true,
        }
    }
}

/// Settings for the external completion endpoint.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_autosave_delay_ms() -> u64 {
    1000
}

fn default_change_feed_capacity() -> usize {
    64
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}
