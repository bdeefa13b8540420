use super::{AgentView, ViewContext};
use async_trait::async_trait;
use launchpad_core::error::{LaunchpadError, Result};
use launchpad_core::session::{ChatMessage, MessageRole};
use serde_json::json;

/// Assistant turn appended when the completion service fails.
pub const FAILURE_REPLY: &str = "Something went wrong.";

const MESSAGES_KEY: &str = "messages";

/// Conversational view: the transcript lives under `messages` in session state.
pub struct ChatView {
    ctx: ViewContext,
}

impl ChatView {
    pub fn new(ctx: ViewContext) -> Self {
        Self { ctx }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.ctx.read(MESSAGES_KEY).unwrap_or_default()
    }

    /// Appends a user turn, asks the completion service, and appends its reply.
    ///
    /// A failed completion still yields an assistant turn carrying
    /// [`FAILURE_REPLY`], so the transcript never silently drops a message.
    pub async fn send(&self, text: &str) -> Result<ChatMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LaunchpadError::invalid_input("message must not be empty"));
        }

        let mut messages = self.messages();
        messages.push(ChatMessage::user(text));
        self.ctx.write(MESSAGES_KEY, &messages)?;

        let reply = match &self.ctx.completion {
            Some(completion) => {
                let request = self.ctx.completion_request(json!(text), messages.clone());
                match completion.complete(request).await {
                    Ok(response) => ChatMessage::assistant(response.response),
                    Err(err) => {
                        tracing::warn!(session_id = %self.ctx.session.id, error = %err, "chat turn failed");
                        ChatMessage::assistant(FAILURE_REPLY)
                    }
                }
            }
            None => {
                tracing::warn!(session_id = %self.ctx.session.id, "no completion service configured");
                ChatMessage::assistant(FAILURE_REPLY)
            }
        };

        // The focus may have moved while the completion was pending.
        messages.push(reply.clone());
        self.ctx.write_through(MESSAGES_KEY, &messages).await?;
        Ok(reply)
    }
}

#[async_trait]
impl AgentView for ChatView {
    fn kind(&self) -> &str {
        "chat"
    }

    fn render(&self) -> String {
        let messages = self.messages();
        if messages.is_empty() {
            return format!("{}: start the conversation.", self.ctx.agent.name);
        }
        messages
            .iter()
            .map(|m| {
                let who = match m.role {
                    MessageRole::User => "you",
                    MessageRole::Assistant => self.ctx.agent.name.as_str(),
                    MessageRole::System => "system",
                };
                format!("{who}: {}", m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn handle_input(&mut self, input: &str) -> Result<String> {
        Ok(self.send(input).await?.content)
    }
}
