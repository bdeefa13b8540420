use super::{AgentView, ViewContext};
use async_trait::async_trait;
use launchpad_core::agent::Agent;
use launchpad_core::error::{LaunchpadError, Result};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

pub const SUBMIT_SUCCESS: &str = "Form submitted to agent successfully.";
pub const SUBMIT_FAILURE: &str = "Submission failed. Please try again.";
const EMPTY_FORM: &str = "Configure form fields in the agent config to render this agent.";
const VALUES_KEY: &str = "values";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Number,
    Select,
    Date,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub options: Vec<SelectOption>,
    #[serde(default)]
    pub required: bool,
}

/// The `config` document of a form agent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfig {
    #[serde(default)]
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub submit_label: Option<String>,
}

impl FormConfig {
    /// Parses the agent's config; an unreadable config yields an empty form.
    pub fn from_agent(agent: &Agent) -> Self {
        if agent.config.is_null() {
            return Self::default();
        }
        serde_json::from_value(agent.config.clone()).unwrap_or_else(|err| {
            tracing::warn!(agent_id = %agent.id, error = %err, "unreadable form config");
            Self::default()
        })
    }

    pub fn submit_label(&self) -> &str {
        self.submit_label.as_deref().unwrap_or("Submit")
    }

    fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Structured-input view driven by `config.fields`.
pub struct FormView {
    ctx: ViewContext,
    config: FormConfig,
    status: Option<String>,
}

impl FormView {
    pub fn new(ctx: ViewContext) -> Self {
        let config = FormConfig::from_agent(&ctx.agent);
        Self {
            ctx,
            config,
            status: None,
        }
    }

    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    pub fn values(&self) -> BTreeMap<String, String> {
        self.ctx.read(VALUES_KEY).unwrap_or_default()
    }

    /// Outcome of the last submission, if any.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_field(&self, name: &str, value: &str) -> Result<()> {
        let field = self
            .config
            .field(name)
            .ok_or_else(|| LaunchpadError::invalid_input(format!("unknown field '{name}'")))?;
        match field.field_type {
            FieldType::Number if !value.is_empty() && value.trim().parse::<f64>().is_err() => {
                return Err(LaunchpadError::invalid_input(format!(
                    "{} must be a number",
                    field.label
                )));
            }
            FieldType::Select
                if !value.is_empty() && !field.options.iter().any(|o| o.value == value) =>
            {
                return Err(LaunchpadError::invalid_input(format!(
                    "'{value}' is not an option for {}",
                    field.label
                )));
            }
            _ => {}
        }

        let mut values = self.values();
        values.insert(field.name.clone(), value.to_string());
        self.ctx.write(VALUES_KEY, &values)
    }

    /// Labels of required fields that are still blank.
    pub fn missing_required(&self) -> Vec<String> {
        let values = self.values();
        self.config
            .fields
            .iter()
            .filter(|f| f.required)
            .filter(|f| values.get(&f.name).is_none_or(|v| v.trim().is_empty()))
            .map(|f| f.label.clone())
            .collect()
    }

    /// Saves the values, sends them to the agent and records the outcome.
    ///
    /// Returns the status line shown to the user. Validation errors are
    /// returned as `InvalidInput` without contacting anything.
    pub async fn submit(&mut self) -> Result<String> {
        if self.config.fields.is_empty() {
            return Err(LaunchpadError::invalid_input(EMPTY_FORM));
        }
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(LaunchpadError::invalid_input(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let status = match self.deliver().await {
            Ok(()) => SUBMIT_SUCCESS,
            Err(err) => {
                tracing::warn!(session_id = %self.ctx.session.id, error = %err, "form submission failed");
                SUBMIT_FAILURE
            }
        };
        self.status = Some(status.to_string());
        Ok(status.to_string())
    }

    async fn deliver(&self) -> Result<()> {
        self.ctx.save().await?;
        let completion = self
            .ctx
            .completion
            .as_ref()
            .ok_or_else(|| LaunchpadError::completion("no completion service configured"))?;
        let request = self.ctx.completion_request(json!(self.values()), Vec::new());
        completion.complete(request).await?;
        Ok(())
    }
}

#[async_trait]
impl AgentView for FormView {
    fn kind(&self) -> &str {
        "form"
    }

    fn render(&self) -> String {
        if self.config.fields.is_empty() {
            return EMPTY_FORM.to_string();
        }
        let values = self.values();
        let mut lines: Vec<String> = self
            .config
            .fields
            .iter()
            .map(|field| {
                let marker = if field.required { "*" } else { "" };
                let value = values
                    .get(&field.name)
                    .filter(|v| !v.is_empty())
                    .map(String::as_str)
                    .or(field.placeholder.as_deref())
                    .unwrap_or("");
                format!("{}{marker} ({}): {value}", field.label, field.name)
            })
            .collect();
        lines.push(format!("[{}]", self.config.submit_label()));
        if let Some(status) = &self.status {
            lines.push(status.clone());
        }
        lines.join("\n")
    }

    /// Accepts `name=value` to fill a field and `submit` to send the form.
    async fn handle_input(&mut self, input: &str) -> Result<String> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("submit") {
            return self.submit().await;
        }
        let Some((name, value)) = input.split_once('=') else {
            return Err(LaunchpadError::invalid_input(
                "enter `field=value` or `submit`",
            ));
        };
        self.set_field(name.trim(), value.trim())?;
        Ok(format!("Updated {}.", name.trim()))
    }
}
