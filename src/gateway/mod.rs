//! Client side of the OpenAI-compatible LLM gateway used by the generators.

mod client;
mod error;

use futures::future::BoxFuture;
use serde::Serialize;

pub use client::HttpChatGateway;
pub use error::GatewayError;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions framing the conversation.
    System,
    /// End-user prompt.
    User,
}

/// One message of a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// System message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Completion request; the gateway implementation chooses the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Conversation sent to the model.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature, gateway default when `None`.
    pub temperature: Option<f32>,
}

/// Abstraction over the chat completion backend.
///
/// Implementations return the text of the first choice, or an empty string
/// when the model produced none.
pub trait ChatGateway: Send + Sync {
    /// Run a completion and return the first choice's content.
    fn complete(&self, request: ChatRequest) -> BoxFuture<'static, Result<String, GatewayError>>;
}
