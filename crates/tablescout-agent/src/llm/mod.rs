//! LLM integration layer.
//!
//! - [`types`] -- Core data types (messages, tool calls, replies).
//! - [`client`] -- The [`ChatModel`] capability and its OpenAI-compatible
//!   HTTP implementation.

pub mod client;
pub mod types;

// Re-export the most commonly used types for convenience.
pub use client::{ChatModel, LlmClient, LlmClientConfig};
pub use types::{
    ChatRequest, LlmResponse, Message, MessageKind, ModelReply, ResponseMetadata, Role, ToolCall,
    ToolDefinition,
};
