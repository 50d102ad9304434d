//! The agent pipeline.
//!
//! ```text
//!   query ──> place_finder_agent ──> place_data_agent ──> presenter_agent ──> end
//! ```
//!
//! A [`Pipeline`] is built once from a [`PipelineConfig`] and never changed
//! afterwards; a configuration change builds a new one.  [`Pipeline::run`]
//! returns a lazy stream of [`Snapshot`]s, one per appended message, in
//! execution order.  The run's state is checkpointed after every snapshot.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, OutputFormatting};
use crate::checkpoint::{Checkpoint, Checkpointer};
use crate::config::PipelineConfig;
use crate::error::{AgentError, Result};
use crate::llm::ChatModel;
use crate::llm::types::{Message, MessageKind};
use crate::state::{ConversationState, RunContext};
use crate::tools::ToolRegistry;

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// The pipeline's nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "place_finder_agent")]
    PlaceFinder,
    #[serde(rename = "place_data_agent")]
    DataFinder,
    #[serde(rename = "presenter_agent")]
    Presenter,
}

impl NodeKind {
    /// Execution order.
    pub const ORDER: [NodeKind; 3] = [Self::PlaceFinder, Self::DataFinder, Self::Presenter];

    /// Graph node name, as reported in progress events.
    pub fn node_name(self) -> &'static str {
        match self {
            Self::PlaceFinder => "place_finder_agent",
            Self::DataFinder => "place_data_agent",
            Self::Presenter => "presenter_agent",
        }
    }

    /// Key of this node's entry in [`PipelineConfig`].
    pub fn config_key(self) -> &'static str {
        match self {
            Self::PlaceFinder => "place_finder_agent",
            Self::DataFinder => "data_finder_agent",
            Self::Presenter => "presenter_agent",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|n| n.config_key() == key)
    }

    /// The node that runs after this one.
    pub fn successor(self) -> Option<Self> {
        let index = Self::ORDER.iter().position(|n| *n == self)?;
        Self::ORDER.get(index + 1).copied()
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.node_name())
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Conversation state after one appended message.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub run_id: String,
    /// Node that produced the latest message; `None` for the user's query.
    pub node: Option<NodeKind>,
    /// Node that runs next according to the run state; `None` once the
    /// last node has answered.
    pub next: Option<NodeKind>,
    pub state: ConversationState,
}

impl Snapshot {
    /// The message this snapshot was taken for.
    pub fn latest(&self) -> Option<&Message> {
        self.state.last()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Executable three-node pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    checkpointer: Arc<dyn Checkpointer>,
    formatting: OutputFormatting,
    /// `None` until [`Pipeline::build`] succeeds.
    agents: Option<Vec<Agent>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("built", &self.is_built())
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        model: Arc<dyn ChatModel>,
        registry: Arc<ToolRegistry>,
        checkpointer: Arc<dyn Checkpointer>,
        formatting: OutputFormatting,
    ) -> Self {
        Self {
            config,
            model,
            registry,
            checkpointer,
            formatting,
            agents: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_built(&self) -> bool {
        self.agents.is_some()
    }

    /// Wire the three agents in order and resolve their tool sets.
    ///
    /// Must be called exactly once before [`Pipeline::run`].
    pub async fn build(&mut self) -> Result<()> {
        if self.is_built() {
            return Err(AgentError::PipelineAlreadyBuilt);
        }
        self.config.validate()?;

        let mut agents = Vec::with_capacity(NodeKind::ORDER.len());
        for node in NodeKind::ORDER {
            let mut agent = Agent::new(
                node,
                self.config.get(node).clone(),
                Arc::clone(&self.model),
                Arc::clone(&self.registry),
            );
            if node == NodeKind::Presenter {
                agent = agent.with_output_formatting(self.formatting.clone());
            }
            agent.tool_set().await?;
            agents.push(agent);
        }

        tracing::info!(
            nodes = ?NodeKind::ORDER.map(NodeKind::node_name),
            "pipeline built"
        );
        self.agents = Some(agents);
        Ok(())
    }

    /// Run the pipeline for one query.
    ///
    /// If `run_id` already has a checkpoint the stored conversation is
    /// continued; otherwise a new one starts.  The returned stream is lazy
    /// and can be consumed once.  The first model or tool failure ends it
    /// with an `Err` item.
    pub fn run<'a>(
        &'a self,
        query: &'a str,
        run_id: &'a str,
        structured: bool,
    ) -> Result<impl Stream<Item = Result<Snapshot>> + Send + 'a> {
        let agents = self.agents.as_deref().ok_or(AgentError::PipelineNotBuilt)?;

        Ok(async_stream::try_stream! {
            let mut state = match self.checkpointer.load(run_id).await? {
                Some(checkpoint) => {
                    tracing::debug!(
                        run_id,
                        messages = checkpoint.messages.len(),
                        "continuing checkpointed run"
                    );
                    ConversationState::resume(checkpoint.messages)?
                }
                None => ConversationState::new(),
            };
            let mut ctx = RunContext::start(run_id);

            state.push(Message::human(query))?;
            yield self.record(&ctx, None, &state).await?;

            for agent in agents {
                let node = agent.node();
                tracing::info!(run_id, node = node.node_name(), "node started");

                let steps = agent.steps(state.clone(), structured);
                futures::pin_mut!(steps);
                while let Some(step) = steps.next().await {
                    state = step?;
                    let answered = state.last().is_some_and(|m| {
                        matches!(m.kind(), MessageKind::AgentText { .. })
                    });
                    if answered {
                        ctx.advance_past(node);
                    }
                    yield self.record(&ctx, Some(node), &state).await?;
                }

                tracing::info!(run_id, node = node.node_name(), "node finished");
            }

            tracing::info!(run_id, messages = state.len(), "pipeline run completed");
        })
    }

    async fn record(
        &self,
        ctx: &RunContext,
        node: Option<NodeKind>,
        state: &ConversationState,
    ) -> Result<Snapshot> {
        self.checkpointer
            .save(Checkpoint::capture(ctx, state.messages()))
            .await?;
        Ok(Snapshot {
            run_id: ctx.run_id.clone(),
            node,
            next: ctx.next,
            state: state.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
