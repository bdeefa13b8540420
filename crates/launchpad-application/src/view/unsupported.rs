use super::AgentView;
use async_trait::async_trait;
use launchpad_core::error::{LaunchpadError, Result};

/// Placeholder mounted when no implementation exists for a session's agent.
pub struct UnsupportedView {
    reason: String,
}

impl UnsupportedView {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl AgentView for UnsupportedView {
    fn kind(&self) -> &str {
        "unsupported"
    }

    fn render(&self) -> String {
        format!("Not configured: {}", self.reason)
    }

    async fn handle_input(&mut self, _input: &str) -> Result<String> {
        Err(LaunchpadError::invalid_input(format!(
            "this agent is not configured: {}",
            self.reason
        )))
    }
}
