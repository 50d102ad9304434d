//! Agent error types.
//!
//! All pipeline subsystems surface errors through [`AgentError`].  Each variant
//! carries enough context for callers to decide how to handle the failure.
//! Validation failures of the structured UI payload are *not* errors at this
//! level: the coordinator turns them into retries (see
//! [`crate::validator::ValidationOutcome`]).

/// Unified error type for the agent pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- LLM errors ----------------------------------------------------------
    /// An HTTP request to the LLM provider failed.
    #[error("llm request failed: {reason}")]
    LlmRequestFailed { reason: String },

    /// The LLM response could not be parsed into the expected format.
    #[error("llm response parse error: {reason}")]
    LlmParseFailed { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    // -- Agent errors --------------------------------------------------------
    /// An agent kept requesting tools past its turn limit.
    #[error("agent `{agent}` exceeded max turns ({max_turns})")]
    MaxTurnsExceeded { agent: String, max_turns: u32 },

    /// A tool call referenced by the LLM is not in the agent's tool set.
    #[error("unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    /// A tool invocation failed.
    #[error("tool execution failed for `{tool_name}`: {reason}")]
    ToolExecutionFailed { tool_name: String, reason: String },

    /// An agent was invoked with no messages to respond to.
    #[error("agent `{agent}` invoked with an empty conversation")]
    EmptyConversation { agent: String },

    // -- Pipeline errors -----------------------------------------------------
    /// `run` was called before `build`.
    #[error("pipeline has not been built")]
    PipelineNotBuilt,

    /// `build` was called a second time.
    #[error("pipeline has already been built")]
    PipelineAlreadyBuilt,

    /// A tool result was appended without a preceding tool call request.
    #[error("tool result `{tool_call_id}` has no preceding tool call request")]
    OrphanToolResult { tool_call_id: String },

    // -- Configuration errors ------------------------------------------------
    /// Configuration validation or loading failed.
    #[error("config error: {reason}")]
    ConfigError { reason: String },

    /// The UI schema asset is missing or unusable.
    #[error("schema error: {reason}")]
    SchemaError { reason: String },

    /// Validation failed for input data.
    #[error("validation error: {reason}")]
    ValidationError { reason: String },

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal agent error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Whether the error was caused by bad caller-supplied configuration
    /// rather than an upstream failure.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigError { .. } | Self::ValidationError { .. } | Self::SchemaError { .. }
        )
    }
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LlmRequestFailed {
            reason: err.to_string(),
        }
    }
}
