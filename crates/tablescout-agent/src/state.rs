//! Conversation state and run bookkeeping.

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::llm::types::{Message, MessageKind};
use crate::pipeline::NodeKind;

/// Ordered, append-only message history of one run.
///
/// Every tool result must answer a tool call requested earlier in the same
/// history; [`ConversationState::push`] rejects anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a state from stored messages, re-checking tool result order.
    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> Result<Self> {
        let mut state = Self::new();
        state.extend(messages)?;
        Ok(state)
    }

    /// Rebuild a stored conversation for continuation.
    ///
    /// A run that failed mid-tool-call leaves a tool request whose calls
    /// were not all answered.  That exchange, and any partial results after
    /// it, is dropped so the history stays acceptable to the model.
    pub fn resume(messages: impl IntoIterator<Item = Message>) -> Result<Self> {
        let mut state = Self::from_messages(messages)?;
        let dropped = state.drop_unanswered_tool_request();
        if dropped > 0 {
            tracing::warn!(dropped, "discarded unanswered tool request from stored conversation");
        }
        Ok(state)
    }

    /// Truncate at the last tool request if any of its calls has no result
    /// after it.  Returns the number of messages removed.
    fn drop_unanswered_tool_request(&mut self) -> usize {
        let Some(start) = self
            .messages
            .iter()
            .rposition(|m| !m.tool_calls.is_empty())
        else {
            return 0;
        };

        let answered = self.messages[start].tool_calls.iter().all(|call| {
            self.messages[start + 1..]
                .iter()
                .any(|m| m.tool_call_id.as_deref() == Some(call.id.as_str()))
        });
        if answered {
            return 0;
        }

        let dropped = self.messages.len() - start;
        self.messages.truncate(start);
        dropped
    }

    /// Append one message.
    pub fn push(&mut self, message: Message) -> Result<()> {
        if let MessageKind::ToolResult { tool_call_id, .. } = message.kind() {
            let id = tool_call_id.unwrap_or_default();
            if !self.has_tool_call(id) {
                return Err(AgentError::OrphanToolResult {
                    tool_call_id: id.to_owned(),
                });
            }
        }
        self.messages.push(message);
        Ok(())
    }

    /// Append several messages in order, stopping at the first rejected one.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) -> Result<()> {
        messages.into_iter().try_for_each(|m| self.push(m))
    }

    fn has_tool_call(&self, id: &str) -> bool {
        self.messages
            .iter()
            .any(|m| m.tool_calls.iter().any(|call| call.id == id))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent user query, skipping node handoffs.
    pub fn current_query(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m.kind() {
            MessageKind::Human { content } if !m.is_handoff() => Some(content),
            _ => None,
        })
    }

    /// The most recent final agent answer, if any.
    pub fn last_agent_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m.kind() {
            MessageKind::AgentText { content, .. } => Some(content),
            _ => None,
        })
    }
}

/// Lifecycle of a run as recorded in its checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Running,
    Completed,
}

/// Identity and position of one run.
///
/// The run id doubles as the checkpoint key.  `next` only moves forward
/// through [`NodeKind::ORDER`] and is `None` once the last node finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: String,
    pub next: Option<NodeKind>,
    pub phase: RunPhase,
}

impl RunContext {
    /// A fresh context positioned before the first node.
    pub fn start(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            next: NodeKind::ORDER.first().copied(),
            phase: RunPhase::Running,
        }
    }

    /// Move past `node`.
    pub fn advance_past(&mut self, node: NodeKind) {
        self.next = node.successor();
        if self.next.is_none() {
            self.phase = RunPhase::Completed;
        }
    }
}
