//! Free-form chat about the current brief, run on the lighter chat model.

use std::sync::Arc;

use tracing::debug;

use crate::{
    error::Result,
    gemini::GenerativeBackend,
    prompt::brainstorm_system_instruction,
    types::{ChatRole, ChatTurn},
};

pub const GREETING: &str =
    "Hi! I'm your creative assistant. Let's work out an idea for your video. What's it about?";

pub const FALLBACK_REPLY: &str = "I couldn't come up with an answer. Try rephrasing.";

pub struct BrainstormSession {
    backend: Arc<dyn GenerativeBackend>,
    current_input: String,
    history: Vec<ChatTurn>,
}

impl BrainstormSession {
    pub fn new(backend: Arc<dyn GenerativeBackend>, current_input: impl Into<String>) -> Self {
        Self {
            backend,
            current_input: current_input.into(),
            history: vec![ChatTurn {
                role: ChatRole::Model,
                text: GREETING.to_string(),
            }],
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn last_reply(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|turn| turn.role == ChatRole::Model)
            .map(|turn| turn.text.as_str())
    }

    /// Send a message. Blank input is ignored and returns `Ok(None)`.
    ///
    /// On error the user turn stays in the history, so the next message
    /// still carries it as context.
    pub async fn send(&mut self, message: &str) -> Result<Option<String>> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(None);
        }

        self.history.push(ChatTurn {
            role: ChatRole::User,
            text: message.to_string(),
        });

        let system = brainstorm_system_instruction(&self.current_input);
        let reply = self.backend.chat(&system, &self.history).await?;
        let reply = if reply.trim().is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            reply.trim().to_string()
        };
        debug!(turns = self.history.len(), "Brainstorm reply received");

        self.history.push(ChatTurn {
            role: ChatRole::Model,
            text: reply.clone(),
        });
        Ok(Some(reply))
    }
}
