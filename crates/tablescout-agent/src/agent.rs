//! Agent nodes.
//!
//! An [`Agent`] wraps a model endpoint, a system instruction and the subset of
//! catalog tools its configuration enables.  Given a conversation state it
//! runs a tool loop: call the model; if the model asks for tools, run them
//! and feed the results back; stop at the first plain-text answer or when the
//! turn limit is reached.
//!
//! Every message the agent appends is observable: [`Agent::steps`] yields the
//! state after each append, and [`Agent::invoke`] collects to the final one.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::OnceCell;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::llm::ChatModel;
use crate::llm::types::{ChatRequest, LlmResponse, Message};
use crate::pipeline::NodeKind;
use crate::prompts;
use crate::state::ConversationState;
use crate::tools::{ToolRegistry, ToolSet};

// ---------------------------------------------------------------------------
// Input policy
// ---------------------------------------------------------------------------

/// What an agent sends to the model as conversation input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPolicy {
    /// The whole conversation so far.
    FullHistory,
    /// Only the user's query and the previous node's last message, both
    /// appended to the conversation before the agent runs.
    QueryAndHandoff,
}

impl InputPolicy {
    pub fn for_node(node: NodeKind) -> Self {
        match node {
            NodeKind::PlaceFinder => Self::FullHistory,
            NodeKind::DataFinder | NodeKind::Presenter => Self::QueryAndHandoff,
        }
    }
}

/// Output instructions for the node that answers the user.
#[derive(Debug, Clone)]
pub struct OutputFormatting {
    /// Single UI message schema, rendered into the instruction.  `None` when
    /// no schema could be loaded.
    pub schema: Option<String>,
    /// Base URL for static assets referenced from the UI payload.
    pub base_url: String,
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// One pipeline node backed by a model.
pub struct Agent {
    node: NodeKind,
    config: AgentConfig,
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    tools: OnceCell<ToolSet>,
    formatting: Option<OutputFormatting>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("node", &self.node)
            .field("name", &self.config.name)
            .field("model", &self.config.model)
            .field("tools_ready", &self.tools.initialized())
            .finish()
    }
}

impl Agent {
    /// Create an agent.  Its tool set is resolved lazily on first use.
    pub fn new(
        node: NodeKind,
        config: AgentConfig,
        model: Arc<dyn ChatModel>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            node,
            config,
            model,
            registry,
            tools: OnceCell::new(),
            formatting: None,
        }
    }

    /// Attach output instructions (structured or plain text, chosen per run).
    pub fn with_output_formatting(mut self, formatting: OutputFormatting) -> Self {
        self.formatting = Some(formatting);
        self
    }

    pub fn node(&self) -> NodeKind {
        self.node
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn input_policy(&self) -> InputPolicy {
        InputPolicy::for_node(self.node)
    }

    /// The agent's tools: the catalog filtered by `tools_enabled`, built once.
    pub async fn tool_set(&self) -> Result<&ToolSet> {
        self.tools
            .get_or_try_init(|| async {
                let set = self.registry.tool_set(&self.config.tools_enabled).await?;
                tracing::debug!(
                    agent = %self.config.name,
                    tools = ?set.names(),
                    "agent tool set resolved"
                );
                Ok::<_, AgentError>(set)
            })
            .await
    }

    /// System instruction for one run.
    pub fn system_instruction(&self, structured: bool) -> String {
        let base = self.config.instruction_for(self.node);
        match &self.formatting {
            None => base.to_owned(),
            Some(OutputFormatting { schema: Some(schema), base_url }) if structured => {
                format!("{base}\n\n{}", prompts::structured_output_suffix(schema, base_url))
            }
            Some(_) => format!("{base}\n\n{}", prompts::TEXT_ONLY_SUFFIX),
        }
    }

    /// Messages appended to the conversation before the model is called.
    fn handoff(&self, state: &ConversationState) -> Vec<Message> {
        match self.input_policy() {
            InputPolicy::FullHistory => Vec::new(),
            InputPolicy::QueryAndHandoff => {
                let query = state
                    .current_query()
                    .or_else(|| state.messages().first().map(|m| m.content.as_str()))
                    .unwrap_or_default();
                let previous = state.last().map(|m| m.content.clone()).unwrap_or_default();
                vec![Message::human(query), Message::handoff(previous)]
            }
        }
    }

    /// Run the agent, yielding the conversation state after every appended
    /// message.
    ///
    /// The stream ends after the agent's final text answer.  Model and tool
    /// errors end it with an `Err` item.
    pub fn steps(
        &self,
        state: ConversationState,
        structured: bool,
    ) -> impl Stream<Item = Result<ConversationState>> + Send + '_ {
        async_stream::try_stream! {
            if state.is_empty() {
                Err(AgentError::EmptyConversation { agent: self.config.name.clone() })?;
            }

            let mut state = state;
            let handoff = self.handoff(&state);
            let mut input: Vec<Message> = match self.input_policy() {
                InputPolicy::FullHistory => state.messages().to_vec(),
                InputPolicy::QueryAndHandoff => handoff.clone(),
            };
            for message in handoff {
                state.push(message)?;
                yield state.clone();
            }

            let tools = self.tool_set().await?;
            let definitions = tools.definitions();
            let system = Message::system(self.system_instruction(structured));
            let mut answered = false;

            for turn in 0..self.config.max_turns {
                tracing::debug!(agent = %self.config.name, turn, "agent turn");

                let request = ChatRequest {
                    model: self.config.model.clone(),
                    messages: std::iter::once(system.clone()).chain(input.iter().cloned()).collect(),
                    tools: definitions.clone(),
                    temperature: Some(self.config.temperature),
                    max_tokens: None,
                };
                let reply = self.model.complete(&request).await?;

                match reply.response {
                    LlmResponse::Text(text) => {
                        tracing::debug!(
                            agent = %self.config.name,
                            tokens = reply.metadata.total_tokens,
                            "agent answered"
                        );
                        state.push(Message::agent_text(&self.config.name, text, reply.metadata))?;
                        yield state.clone();
                        answered = true;
                        break;
                    }
                    LlmResponse::ToolCalls(calls) => {
                        tracing::info!(
                            agent = %self.config.name,
                            turn,
                            tools = ?calls.iter().map(|c| &c.name).collect::<Vec<_>>(),
                            "model requested tool calls"
                        );
                        let request_message =
                            Message::tool_request(&self.config.name, calls.clone(), reply.metadata);
                        input.push(request_message.clone());
                        state.push(request_message)?;
                        yield state.clone();

                        for call in &calls {
                            let content = tools.execute(call).await?;
                            let result = Message::tool_result(&call.id, &call.name, content);
                            input.push(result.clone());
                            state.push(result)?;
                            yield state.clone();
                        }
                    }
                }
            }

            if !answered {
                Err(AgentError::MaxTurnsExceeded {
                    agent: self.config.name.clone(),
                    max_turns: self.config.max_turns,
                })?;
            }
        }
    }

    /// Run the agent to completion and return the updated state.
    pub async fn invoke(&self, state: ConversationState, structured: bool) -> Result<ConversationState> {
        let mut latest = state.clone();
        let steps = self.steps(state, structured);
        futures::pin_mut!(steps);
        while let Some(next) = steps.next().await {
            latest = next?;
        }
        Ok(latest)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
