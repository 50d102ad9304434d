//! Tool provider error types.
//!
//! Providers surface failures through [`ToolError`] and convert them into
//! [`AgentError`] at the [`ToolProvider`](tablescout_agent::ToolProvider)
//! boundary.

use std::path::PathBuf;

use tablescout_agent::AgentError;

/// Unified error type for the place tool providers.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The requested tool does not exist on this provider.
    #[error("tool not found: `{tool_name}` on provider `{provider_id}`")]
    ToolNotFound {
        provider_id: String,
        tool_name: String,
    },

    /// The arguments supplied to a tool are invalid.
    #[error("invalid parameters for tool `{tool_name}`: {reason}")]
    InvalidParams { tool_name: String, reason: String },

    /// A place data file exists but could not be read or parsed.
    #[error("failed to load place data from {} for tool `{tool_name}`: {reason}", .path.display())]
    DataLoad {
        tool_name: String,
        path: PathBuf,
        reason: String,
    },

    /// JSON serialization of a tool result failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Convenience alias used throughout the tools crate.
pub type Result<T> = std::result::Result<T, ToolError>;

impl ToolError {
    /// Convert into the agent-level error.  `tool_name` is the tool that was
    /// being executed when the failure happened.
    pub fn into_agent_error(self, tool_name: &str) -> AgentError {
        match self {
            Self::ToolNotFound { tool_name, .. } => AgentError::UnknownTool { tool_name },
            other => AgentError::ToolExecutionFailed {
                tool_name: tool_name.to_owned(),
                reason: other.to_string(),
            },
        }
    }
}
