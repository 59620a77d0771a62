//! LLM integration.
//!
//! `CompletionService` is the seam; `OpenAiClient` talks to any
//! OpenAI-compatible `/chat/completions` endpoint over reqwest.

pub mod openai;
pub mod provider;

pub use openai::OpenAiClient;
pub use provider::*;
