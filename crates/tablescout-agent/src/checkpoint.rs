//! Run checkpoints.
//!
//! The pipeline saves a [`Checkpoint`] after every message it appends, keyed
//! by run id.  Running an id that already has a checkpoint continues that
//! conversation.  Checkpoints never expire; callers delete them explicitly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::llm::types::Message;
use crate::pipeline::NodeKind;
use crate::state::{RunContext, RunPhase};

/// Stored state of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub run_id: String,
    pub messages: Vec<Message>,
    pub next: Option<NodeKind>,
    pub phase: RunPhase,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Capture the current position and history of a run.
    pub fn capture(ctx: &RunContext, messages: &[Message]) -> Self {
        Self {
            run_id: ctx.run_id.clone(),
            messages: messages.to_vec(),
            next: ctx.next,
            phase: ctx.phase,
            updated_at: Utc::now(),
        }
    }
}

/// Storage for run checkpoints.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Insert or replace the checkpoint for `checkpoint.run_id`.
    async fn save(&self, checkpoint: Checkpoint) -> Result<()>;

    async fn load(&self, run_id: &str) -> Result<Option<Checkpoint>>;

    /// Ids of all stored runs, most recently updated first.
    async fn list(&self) -> Result<Vec<String>>;

    /// Remove a checkpoint.  Returns whether one existed.
    async fn delete(&self, run_id: &str) -> Result<bool>;
}

/// Process-local checkpoint store.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointer {
    runs: DashMap<String, Checkpoint>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        tracing::trace!(
            run_id = %checkpoint.run_id,
            messages = checkpoint.messages.len(),
            "checkpoint saved"
        );
        self.runs.insert(checkpoint.run_id.clone(), checkpoint);
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.runs.get(run_id).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut runs: Vec<(String, DateTime<Utc>)> = self
            .runs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().updated_at))
            .collect();
        runs.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(runs.into_iter().map(|(id, _)| id).collect())
    }

    async fn delete(&self, run_id: &str) -> Result<bool> {
        Ok(self.runs.remove(run_id).is_some())
    }
}
