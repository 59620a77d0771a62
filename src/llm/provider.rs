//! Completion-service abstraction.
//!
//! The service returns the raw HTTP status and body. Interpreting the
//! envelope is the caller's job, so a shape change upstream degrades
//! one extraction instead of failing the transport layer.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::LlmError;

/// Role of a chat message. Only user turns are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Uninterpreted response from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCompletion {
    pub status: u16,
    pub body: String,
}

/// A chat-completions endpoint.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Model identifier sent with every request.
    fn model_name(&self) -> &str;

    /// Issue one request. Only transport failures are errors.
    async fn complete(&self, request: CompletionRequest) -> Result<RawCompletion, LlmError>;
}
