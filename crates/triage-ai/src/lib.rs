//! Chat-completion client surface used by the triage pipeline.
mod openai;
mod types;

pub use openai::{OpenAiClient, OpenAiConfig, DEFAULT_OPENAI_API_BASE};
pub use types::{
    ChatRequest, ChatResponse, ChatUsage, LlmClient, Message, MessageRole, TriageAiError,
};
