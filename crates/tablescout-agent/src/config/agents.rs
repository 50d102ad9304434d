//! Per-node agent configuration.
//!
//! A [`PipelineConfig`] holds one [`AgentConfig`] per pipeline node.  Both are
//! plain immutable values: changing the configuration means producing a new
//! `PipelineConfig` (see [`PipelineConfig::apply_update`]) and building a new
//! pipeline from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::pipeline::NodeKind;
use crate::prompts;

/// Default model for every node.
pub const DEFAULT_MODEL: &str = "xai.grok-4-fast-non-reasoning";

/// Default sampling temperature for every node.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Highest temperature accepted by [`AgentConfig::validate`].
const MAX_TEMPERATURE: f32 = 2.0;

fn default_max_turns() -> u32 {
    10
}

/// Configuration for one agent node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model identifier sent to the endpoint.
    pub model: String,

    /// Display name; stamped on every message the agent produces.
    pub name: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// System instruction.  `None` selects the node's built-in instruction.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Names of the catalog tools this agent may call.
    #[serde(default)]
    pub tools_enabled: Vec<String>,

    /// Upper bound on model calls per invocation.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

impl AgentConfig {
    /// The built-in configuration for a node.
    pub fn default_for(node: NodeKind) -> Self {
        let (name, tools): (&str, &[&str]) = match node {
            NodeKind::PlaceFinder => ("food_place_agent", &["get_restaurants", "get_cafes"]),
            NodeKind::DataFinder => ("place_data_agent", &["get_cafe_data", "get_restaurant_data"]),
            NodeKind::Presenter => ("presenter_agent", &[]),
        };
        Self {
            model: DEFAULT_MODEL.into(),
            name: name.into(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: None,
            tools_enabled: tools.iter().map(|t| (*t).to_owned()).collect(),
            max_turns: default_max_turns(),
        }
    }

    /// The system instruction for this agent, falling back to the node's
    /// built-in text.
    pub fn instruction_for(&self, node: NodeKind) -> &str {
        match self.system_prompt.as_deref() {
            Some(prompt) if !prompt.trim().is_empty() => prompt,
            _ => match node {
                NodeKind::PlaceFinder => prompts::PLACE_FINDER_INSTRUCTIONS,
                NodeKind::DataFinder => prompts::DATA_FINDER_INSTRUCTIONS,
                NodeKind::Presenter => prompts::PRESENTER_INSTRUCTIONS,
            },
        }
    }

    /// Reject configurations no agent could run with.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AgentError::ValidationError {
                reason: format!("agent `{}`: model must not be empty", self.name),
            });
        }
        if self.name.trim().is_empty() {
            return Err(AgentError::ValidationError {
                reason: "agent name must not be empty".into(),
            });
        }
        if !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(AgentError::ValidationError {
                reason: format!(
                    "agent `{}`: temperature {} outside 0.0..={MAX_TEMPERATURE}",
                    self.name, self.temperature
                ),
            });
        }
        if self.max_turns == 0 {
            return Err(AgentError::ValidationError {
                reason: format!("agent `{}`: max_turns must be at least 1", self.name),
            });
        }
        Ok(())
    }
}

/// Configuration for the whole pipeline, one entry per node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub place_finder_agent: AgentConfig,
    pub data_finder_agent: AgentConfig,
    pub presenter_agent: AgentConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            place_finder_agent: AgentConfig::default_for(NodeKind::PlaceFinder),
            data_finder_agent: AgentConfig::default_for(NodeKind::DataFinder),
            presenter_agent: AgentConfig::default_for(NodeKind::Presenter),
        }
    }
}

impl PipelineConfig {
    /// The configuration of one node.
    pub fn get(&self, node: NodeKind) -> &AgentConfig {
        match node {
            NodeKind::PlaceFinder => &self.place_finder_agent,
            NodeKind::DataFinder => &self.data_finder_agent,
            NodeKind::Presenter => &self.presenter_agent,
        }
    }

    fn get_mut(&mut self, node: NodeKind) -> &mut AgentConfig {
        match node {
            NodeKind::PlaceFinder => &mut self.place_finder_agent,
            NodeKind::DataFinder => &mut self.data_finder_agent,
            NodeKind::Presenter => &mut self.presenter_agent,
        }
    }

    /// Validate every node.
    pub fn validate(&self) -> Result<()> {
        NodeKind::ORDER
            .iter()
            .try_for_each(|node| self.get(*node).validate())
    }

    /// Produce a new configuration with the nodes named in `update` replaced.
    ///
    /// `update` must be a JSON object keyed by node config key
    /// (`place_finder_agent`, `data_finder_agent`, `presenter_agent`); each
    /// value is a complete [`AgentConfig`].  `self` is never modified.
    pub fn apply_update(&self, update: &Value) -> Result<Self> {
        let entries = update.as_object().ok_or_else(|| AgentError::ConfigError {
            reason: "configuration update must be a JSON object".into(),
        })?;
        if entries.is_empty() {
            return Err(AgentError::ConfigError {
                reason: "configuration update is empty".into(),
            });
        }

        let mut next = self.clone();
        for (key, value) in entries {
            let node = NodeKind::from_config_key(key).ok_or_else(|| AgentError::ConfigError {
                reason: format!("unknown agent configuration key `{key}`"),
            })?;
            let config: AgentConfig =
                serde_json::from_value(value.clone()).map_err(|e| AgentError::ConfigError {
                    reason: format!("invalid configuration for `{key}`: {e}"),
                })?;
            config.validate()?;
            *next.get_mut(node) = config;
        }
        Ok(next)
    }
}
