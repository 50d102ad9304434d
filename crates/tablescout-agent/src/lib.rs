//! Agent pipeline core for TableScout.
//!
//! TableScout answers restaurant-finding requests with a fixed chain of model
//! backed agents and, on request, renders the answer as structured UI data.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  query ────> │ place finder │──>│ data finder  │──>│  presenter   │
//!              └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!                     │ tools            │ tools            │
//!              ┌──────┴──────────────────┴───────┐          │ final answer
//!              │          ToolRegistry           │          v
//!              └─────────────────────────────────┘   ┌──────────────┐
//!                                                    │  validator   │── retry
//!  snapshots ──> StreamFormatter ──> RunEvent <──────│  + retries   │
//!                                                    └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`llm`] -- Message types, the [`ChatModel`] capability and its HTTP client.
//! - [`tools`] -- Tool providers, the lazily discovered catalog, per-agent tool sets.
//! - [`agent`] -- One model-backed node and its tool loop.
//! - [`pipeline`] -- The three-node graph, run snapshots and checkpointing.
//! - [`checkpoint`] -- Run checkpoint storage.
//! - [`formatter`] -- Progress lines and the run token counter.
//! - [`validator`] -- Structured UI payload validation.
//! - [`coordinator`] -- Run events, retries and configuration changes.
//! - [`config`] -- Settings and per-node agent configuration.
//! - [`error`] -- Agent error types.

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod formatter;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod state;
pub mod tools;
pub mod validator;

// Re-export the most commonly used types at the crate root.
pub use agent::{Agent, InputPolicy, OutputFormatting};
pub use checkpoint::{Checkpoint, Checkpointer, InMemoryCheckpointer};
pub use config::{AgentConfig, PipelineConfig, Settings};
pub use coordinator::{Coordinator, CoordinatorOptions, RunEvent};
pub use error::{AgentError, Result};
pub use formatter::{FormattedUpdate, StreamFormatter};
pub use llm::{
    ChatModel, ChatRequest, LlmClient, LlmClientConfig, LlmResponse, Message, MessageKind,
    ModelReply, ResponseMetadata, Role, ToolCall, ToolDefinition,
};
pub use pipeline::{NodeKind, Pipeline, Snapshot};
pub use state::{ConversationState, RunContext, RunPhase};
pub use tools::{ToolCatalog, ToolProvider, ToolRegistry, ToolSet};
pub use validator::{A2UI_DELIMITER, ResponseValidator, ValidationOutcome};
