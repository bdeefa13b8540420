//! Agent catalog domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::LaunchpadError;

/// The kind of view an agent is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Chat,
    Form,
    Workflow,
    /// Rendered by a plugin named in `config.component`.
    Custom,
}

impl AgentType {
    pub const ALL: [AgentType; 4] = [
        AgentType::Chat,
        AgentType::Form,
        AgentType::Workflow,
        AgentType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Chat => "chat",
            AgentType::Form => "form",
            AgentType::Workflow => "workflow",
            AgentType::Custom => "custom",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = LaunchpadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(AgentType::Chat),
            "form" => Ok(AgentType::Form),
            "workflow" => Ok(AgentType::Workflow),
            "custom" => Ok(AgentType::Custom),
            other => Err(LaunchpadError::invalid_input(format!(
                "unknown agent type '{other}'"
            ))),
        }
    }
}

/// A catalog entry describing a launchable capability.
///
/// Agents are owned by an external catalog editor; this layer only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    #[serde(default)]
    pub icon: Option<String>,
    /// Opaque per-type configuration document.
    #[serde(default)]
    pub config: Value,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Creates an agent with an empty configuration.
    pub fn new(id: impl Into<String>, name: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            agent_type,
            icon: None,
            config: Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The plugin key declared by a custom agent, if any.
    pub fn component_key(&self) -> Option<&str> {
        self.config
            .get("component")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
