//! Progress rendering.
//!
//! Turns each pipeline snapshot into a short timeline line and a longer
//! detail line, and keeps the run's token counter.

use crate::llm::types::{Message, MessageKind};
use crate::pipeline::Snapshot;

/// Characters of message content shown in detail lines.
pub const CONTENT_PREVIEW_CHARS: usize = 50;

/// Node label used when the run state names no next node.
pub const GRAPH_LABEL: &str = "GRAPH";

/// Node label before the first snapshot.
pub const START_LABEL: &str = "START";

/// One rendered progress update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedUpdate {
    pub timeline: String,
    pub detail: String,
    /// Running token count after this message.
    pub token_count: u64,
}

/// First [`CONTENT_PREVIEW_CHARS`] characters of `content`.
fn preview(content: &str) -> &str {
    match content.char_indices().nth(CONTENT_PREVIEW_CHARS) {
        Some((end, _)) => &content[..end],
        None => content,
    }
}

/// Render one message.
///
/// Tool call requests are checked first, so an agent message carrying both
/// text and tool calls is shown as a tool call.  Only final agent text adds
/// to the token count.
pub fn classify(message: &Message, token_count: u64, node_label: &str) -> FormattedUpdate {
    let (timeline, detail, token_count) = match message.kind() {
        MessageKind::ToolInvocation { agent, calls } => {
            let agent = agent.unwrap_or_default();
            let (tool, args) = calls
                .first()
                .map(|c| (c.name.as_str(), c.arguments.to_string()))
                .unwrap_or_default();
            (
                format!("{agent} called tool: {tool}"),
                format!("Agent {agent} called tool: {tool} with args {args}"),
                token_count,
            )
        }
        MessageKind::ToolResult { tool_name, content, .. } => {
            let tool = tool_name.unwrap_or_default();
            (
                format!("Tool {tool} responded"),
                format!("Tool {tool} responded with data:\n{}", preview(content)),
                token_count,
            )
        }
        MessageKind::AgentText { agent, content, metadata } => {
            let agent = agent.unwrap_or(GRAPH_LABEL);
            let model_id = metadata
                .and_then(|m| m.model_id.as_deref())
                .unwrap_or("unknown");
            let updated = token_count + metadata.map_or(0, |m| m.total_tokens);
            (
                format!("{agent} responded"),
                format!(
                    "{agent} response:\n{}...\n\nAgent metadata:\n\n            \
                     model_id: {model_id},\n            \
                     total_tokens_on_call: {updated}\n        ",
                    preview(content)
                ),
                updated,
            )
        }
        MessageKind::Human { content } => (
            format!("Current query: {node_label}"),
            format!("Query in process at {node_label}:\n{}...", preview(content)),
            token_count,
        ),
        MessageKind::Other { content } => (
            format!("Calling node: {node_label}"),
            format!("Calling node {node_label} with status: {}", preview(content)),
            token_count,
        ),
    };

    FormattedUpdate {
        timeline,
        detail,
        token_count,
    }
}

/// Per-run formatter state: token counter and the last known node label.
#[derive(Debug, Clone)]
pub struct StreamFormatter {
    token_count: u64,
    node_label: String,
}

impl Default for StreamFormatter {
    fn default() -> Self {
        Self {
            token_count: 0,
            node_label: START_LABEL.into(),
        }
    }
}

impl StreamFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    pub fn node_label(&self) -> &str {
        &self.node_label
    }

    /// Render the latest message of `snapshot`.
    ///
    /// Human messages are labelled with the node about to run; for every
    /// other message the label is refreshed after rendering.
    pub fn observe(&mut self, snapshot: &Snapshot) -> Option<FormattedUpdate> {
        let message = snapshot.latest()?;
        let next_label = snapshot.next.map_or(GRAPH_LABEL, |n| n.node_name());

        let is_human = matches!(message.kind(), MessageKind::Human { .. });
        if is_human {
            self.node_label = next_label.to_owned();
        }

        let update = classify(message, self.token_count, &self.node_label);
        self.token_count = update.token_count;

        if !is_human {
            self.node_label = next_label.to_owned();
        }

        tracing::debug!(
            run_id = %snapshot.run_id,
            node = %self.node_label,
            tokens = self.token_count,
            timeline = %update.timeline,
            "progress"
        );
        Some(update)
    }
}
