//! OpenAI-compatible chat completion client shared by extraction and synthesis.

pub mod client;
pub mod types;

pub use client::{CompletionClient, LlmError, OpenAiClient};
pub use types::{ChatMessage, Sampling};
