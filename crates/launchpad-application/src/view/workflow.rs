use super::{AgentView, ViewContext};
use async_trait::async_trait;
use launchpad_core::error::{LaunchpadError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const NODES_KEY: &str = "nodes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Input,
    Action,
    Output,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Action => "action",
            NodeKind::Output => "output",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

impl WorkflowNode {
    fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }
}

/// The pipeline a fresh workflow session starts with.
pub fn default_nodes() -> Vec<WorkflowNode> {
    vec![
        WorkflowNode::new("input-1", "User Input", NodeKind::Input),
        WorkflowNode::new("llm-1", "LLM Call", NodeKind::Action),
        WorkflowNode::new("output-1", "Result", NodeKind::Output),
    ]
}

/// Ordered node editor; the pipeline lives under `nodes` in session state.
pub struct WorkflowView {
    ctx: ViewContext,
}

impl WorkflowView {
    pub fn new(ctx: ViewContext) -> Self {
        Self { ctx }
    }

    pub fn nodes(&self) -> Vec<WorkflowNode> {
        self.ctx.read(NODES_KEY).unwrap_or_else(default_nodes)
    }

    /// Appends an action node labelled `Step <n+1>`.
    pub fn add_node(&self) -> Result<WorkflowNode> {
        let mut nodes = self.nodes();
        let node = WorkflowNode::new(
            format!("node-{}", Uuid::new_v4().simple()),
            format!("Step {}", nodes.len() + 1),
            NodeKind::Action,
        );
        nodes.push(node.clone());
        self.ctx.write(NODES_KEY, &nodes)?;
        Ok(node)
    }

    pub fn rename_node(&self, id: &str, label: &str) -> Result<()> {
        let label = label.trim();
        if label.is_empty() {
            return Err(LaunchpadError::invalid_input("node label must not be empty"));
        }
        let mut nodes = self.nodes();
        let node = nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| LaunchpadError::not_found("WorkflowNode", id))?;
        node.label = label.to_string();
        self.ctx.write(NODES_KEY, &nodes)
    }

    pub fn remove_node(&self, id: &str) -> Result<WorkflowNode> {
        let mut nodes = self.nodes();
        let index = nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| LaunchpadError::not_found("WorkflowNode", id))?;
        let removed = nodes.remove(index);
        self.ctx.write(NODES_KEY, &nodes)?;
        Ok(removed)
    }
}

#[async_trait]
impl AgentView for WorkflowView {
    fn kind(&self) -> &str {
        "workflow"
    }

    fn render(&self) -> String {
        self.nodes()
            .iter()
            .enumerate()
            .map(|(i, node)| {
                format!("{}. [{}] {} ({})", i + 1, node.kind.as_str(), node.label, node.id)
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    async fn handle_input(&mut self, input: &str) -> Result<String> {
        let mut parts = input.trim().splitn(3, ' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("add"), None, None) => {
                let node = self.add_node()?;
                Ok(format!("Added {}.", node.label))
            }
            (Some("remove"), Some(id), None) => {
                let node = self.remove_node(id)?;
                Ok(format!("Removed {}.", node.label))
            }
            (Some("rename"), Some(id), Some(label)) => {
                self.rename_node(id, label)?;
                Ok(format!("Renamed {id}."))
            }
            _ => Err(LaunchpadError::invalid_input(
                "enter `add`, `remove <id>` or `rename <id> <label>`",
            )),
        }
    }
}
