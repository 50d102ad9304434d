//! Core types for LLM interaction.
//!
//! These types model the data flowing between the agents and the model
//! endpoint.  They are provider-agnostic at this layer; the [`super::client`]
//! module translates them into the wire format.
//!
//! A [`Message`] is stored as a flat record (so it serializes cleanly into a
//! checkpoint), but it is always *read* through [`Message::kind`], the single
//! place that decides which variant a message belongs to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Name stamped on human messages that hand one node's output to the next.
pub const HANDOFF_NAME: &str = "handoff";

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions that shape model behavior.
    System,
    /// Input from the human user (or a node handoff).
    User,
    /// Output from the LLM.
    Assistant,
    /// Result of a tool invocation, fed back to the model.
    Tool,
}

/// Metadata the model endpoint attaches to a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// The model that produced the response, as reported by the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,

    /// Total tokens (prompt + completion) billed for the call.
    #[serde(default)]
    pub total_tokens: u64,
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// The textual content of the message.
    ///
    /// For [`Role::Tool`] messages this contains the serialized tool result.
    /// For assistant messages that only request tools, this may be empty.
    #[serde(default)]
    pub content: String,

    /// Originating agent name (assistant messages), tool name (tool
    /// results) or [`HANDOFF_NAME`] (node handoffs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Identifies which tool call this message is a response to
    /// (only present when `role == Role::Tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Response metadata (only present on assistant messages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

/// Borrowed, classified view of a [`Message`].
///
/// Produced only by [`Message::kind`]; every consumer that needs to branch on
/// the kind of a message matches on this enum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageKind<'a> {
    /// The model asked for one or more tools to run.
    ToolInvocation {
        agent: Option<&'a str>,
        calls: &'a [ToolCall],
    },
    /// Output of a tool, addressed to a preceding invocation.
    ToolResult {
        tool_name: Option<&'a str>,
        tool_call_id: Option<&'a str>,
        content: &'a str,
    },
    /// Final text produced by an agent for its turn.
    AgentText {
        agent: Option<&'a str>,
        content: &'a str,
        metadata: Option<&'a ResponseMetadata>,
    },
    /// User query or node handoff.
    Human { content: &'a str },
    /// Anything else (system instructions).
    Other { content: &'a str },
}

impl Message {
    fn bare(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            metadata: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::bare(Role::System, content.into())
    }

    /// Create a human (user) message.
    pub fn human(content: impl Into<String>) -> Self {
        Self::bare(Role::User, content.into())
    }

    /// Create a human message that carries the previous node's output into
    /// the next node.
    pub fn handoff(content: impl Into<String>) -> Self {
        Self {
            name: Some(HANDOFF_NAME.into()),
            ..Self::bare(Role::User, content.into())
        }
    }

    /// Whether this is a node handoff rather than a user query.
    pub fn is_handoff(&self) -> bool {
        self.role == Role::User && self.name.as_deref() == Some(HANDOFF_NAME)
    }

    /// Create an agent text message carrying response metadata.
    pub fn agent_text(
        agent: impl Into<String>,
        content: impl Into<String>,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            name: Some(agent.into()),
            metadata: Some(metadata),
            ..Self::bare(Role::Assistant, content.into())
        }
    }

    /// Create an assistant message that requests tool calls.
    pub fn tool_request(
        agent: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            name: Some(agent.into()),
            tool_calls,
            metadata: Some(metadata),
            ..Self::bare(Role::Assistant, String::new())
        }
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(tool_name.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Self::bare(Role::Tool, content.into())
        }
    }

    /// Classify this message.
    ///
    /// Tool call requests win over everything else, so an assistant message
    /// that carries both text and tool calls is a [`MessageKind::ToolInvocation`].
    pub fn kind(&self) -> MessageKind<'_> {
        if !self.tool_calls.is_empty() {
            return MessageKind::ToolInvocation {
                agent: self.name.as_deref(),
                calls: &self.tool_calls,
            };
        }
        match self.role {
            Role::Tool => MessageKind::ToolResult {
                tool_name: self.name.as_deref(),
                tool_call_id: self.tool_call_id.as_deref(),
                content: &self.content,
            },
            Role::Assistant => MessageKind::AgentText {
                agent: self.name.as_deref(),
                content: &self.content,
                metadata: self.metadata.as_ref(),
            },
            Role::User => MessageKind::Human {
                content: &self.content,
            },
            Role::System => MessageKind::Other {
                content: &self.content,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tool calls
// ---------------------------------------------------------------------------

/// A tool invocation requested by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned by the LLM for correlating results.
    pub id: String,

    /// The name of the tool to invoke.
    pub name: String,

    /// Arguments as a JSON value.  The structure depends on the tool's schema.
    pub arguments: Value,
}

/// A tool definition exposed to the LLM so it knows what tools are available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,

    /// Human-readable description of what the tool does.
    pub description: String,

    /// JSON Schema describing the tool's input parameters.
    pub input_schema: Value,

    /// JSON Schema describing what the tool returns.  Informational only;
    /// it is not sent to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

// ---------------------------------------------------------------------------
// LLM response
// ---------------------------------------------------------------------------

/// The high-level response from an LLM after processing a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmResponse {
    /// The model produced a final text answer.
    Text(String),

    /// The model wants to invoke one or more tools before continuing.
    ToolCalls(Vec<ToolCall>),
}

/// A model response together with the endpoint's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub response: LlmResponse,
    pub metadata: ResponseMetadata,
}

impl ModelReply {
    /// Convenience constructor for a text reply.
    pub fn text(text: impl Into<String>, metadata: ResponseMetadata) -> Self {
        Self {
            response: LlmResponse::Text(text.into()),
            metadata,
        }
    }

    /// Convenience constructor for a tool-call reply.
    pub fn tool_calls(calls: Vec<ToolCall>, metadata: ResponseMetadata) -> Self {
        Self {
            response: LlmResponse::ToolCalls(calls),
            metadata,
        }
    }
}

// ---------------------------------------------------------------------------
// Chat request
// ---------------------------------------------------------------------------

/// A full request to send to the model endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// The model identifier (e.g. `"xai.grok-4-fast-non-reasoning"`).
    pub model: String,

    /// The conversation history, system instruction first.
    pub messages: Vec<Message>,

    /// Tool definitions the model may invoke.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens the model may generate in this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
