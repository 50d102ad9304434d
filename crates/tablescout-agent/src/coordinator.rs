//! Run coordination: progress events, answer validation and retries.
//!
//! The [`Coordinator`] owns the current [`Pipeline`] and is the entry point
//! for callers.  [`Coordinator::run`] streams [`RunEvent`]s: one progress
//! event per pipeline snapshot and exactly one terminal event.  When the
//! caller asks for structured output the final answer is validated; an
//! invalid answer re-runs the whole pipeline with an amended query until the
//! retry budget is spent, after which a fixed apology is sent.
//!
//! Configuration changes build a complete new pipeline and swap it in.  Runs
//! already in flight keep the pipeline they started with.

use std::path::PathBuf;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde::Serialize;
use serde::ser::SerializeStruct;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::agent::OutputFormatting;
use crate::checkpoint::{Checkpoint, Checkpointer, InMemoryCheckpointer};
use crate::config::{PipelineConfig, Settings};
use crate::error::Result;
use crate::formatter::StreamFormatter;
use crate::llm::ChatModel;
use crate::pipeline::{Pipeline, Snapshot};
use crate::tools::ToolRegistry;
use crate::validator::{A2UI_DELIMITER, ResponseValidator, ValidationOutcome};

/// Sent when retries are exhausted in structured mode.
pub const UI_RETRY_APOLOGY: &str = "I'm sorry, I'm having trouble generating the interface for \
                                    that request right now. Please try again in a moment.";

/// Sent for structured runs when no UI schema is available.
pub const UI_CONFIG_APOLOGY: &str = "I'm sorry, I'm facing an internal configuration error with \
                                     my UI components. Please contact support.";

/// Sent when a plain-text run produced no answer on any attempt.
pub const NO_RESPONSE_ERROR: &str =
    "I'm sorry, I encountered an error and couldn't process your request.";

/// Query for the next attempt after an invalid structured answer.
pub fn retry_query(error_detail: &str, query: &str) -> String {
    format!(
        "Your previous response was invalid. {error_detail} You MUST generate a valid response \
         that strictly follows the A2UI JSON SCHEMA. The response MUST be a JSON list of A2UI \
         messages. Ensure the response is split by '{A2UI_DELIMITER}' and the JSON part is \
         well-formed. Please retry the original request: '{query}'"
    )
}

/// Query for the next attempt after an attempt produced no answer.
pub fn no_response_query(query: &str) -> String {
    format!("I received no response. Please try again. Please retry the original request: '{query}'")
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One item of a run's event stream.
///
/// Serializes as `{"complete": false, "timeline", "detail"}` or
/// `{"complete": true, "content", "detail", "tokenCount"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Progress {
        timeline: String,
        detail: String,
    },
    Complete {
        content: String,
        detail: String,
        token_count: u64,
    },
}

impl RunEvent {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

impl Serialize for RunEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Progress { timeline, detail } => {
                let mut s = serializer.serialize_struct("RunEvent", 3)?;
                s.serialize_field("complete", &false)?;
                s.serialize_field("timeline", timeline)?;
                s.serialize_field("detail", detail)?;
                s.end()
            }
            Self::Complete {
                content,
                detail,
                token_count,
            } => {
                let mut s = serializer.serialize_struct("RunEvent", 4)?;
                s.serialize_field("complete", &true)?;
                s.serialize_field("content", content)?;
                s.serialize_field("detail", detail)?;
                s.serialize_field("tokenCount", &token_count.to_string())?;
                s.end()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Static options of a coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Configuration built at startup and restored by
    /// [`Coordinator::reset_config`].
    pub pipeline: PipelineConfig,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Public base URL, referenced from UI payload instructions.
    pub base_url: String,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            max_retries: 1,
            base_url: "http://localhost:10002".into(),
        }
    }
}

/// Entry point for running queries and changing configuration.
pub struct Coordinator {
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    checkpointer: Arc<dyn Checkpointer>,
    validator: Option<Arc<ResponseValidator>>,
    options: CoordinatorOptions,
    pipeline: RwLock<Arc<Pipeline>>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("registry", &self.registry)
            .field("validator", &self.validator.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl Coordinator {
    /// Build the initial pipeline and create a coordinator around it.
    ///
    /// `validator` is `None` when the UI schema could not be loaded; plain
    /// text runs still work and structured runs answer with
    /// [`UI_CONFIG_APOLOGY`].
    pub async fn new(
        model: Arc<dyn ChatModel>,
        registry: Arc<ToolRegistry>,
        checkpointer: Arc<dyn Checkpointer>,
        validator: Option<ResponseValidator>,
        options: CoordinatorOptions,
    ) -> Result<Self> {
        let validator = validator.map(Arc::new);
        let pipeline = build_pipeline(
            options.pipeline.clone(),
            &model,
            &registry,
            &checkpointer,
            validator.as_deref(),
            &options.base_url,
        )
        .await?;

        Ok(Self {
            model,
            registry,
            checkpointer,
            validator,
            options,
            pipeline: RwLock::new(Arc::new(pipeline)),
        })
    }

    /// Create a coordinator from loaded settings, with in-memory
    /// checkpoints.  A UI schema that fails to load is logged and leaves
    /// structured output unavailable.
    pub async fn from_settings(
        settings: &Settings,
        model: Arc<dyn ChatModel>,
        registry: Arc<ToolRegistry>,
    ) -> Result<Self> {
        let schema_path: Option<PathBuf> = settings.validation.schema_path.clone();
        let validator = match ResponseValidator::load(schema_path.as_deref()) {
            Ok(validator) => Some(validator),
            Err(e) => {
                error!(error = %e, "UI schema unavailable, structured output disabled");
                None
            }
        };

        Self::new(
            model,
            registry,
            Arc::new(InMemoryCheckpointer::new()),
            validator,
            CoordinatorOptions {
                pipeline: settings.pipeline.clone(),
                max_retries: settings.validation.max_retries,
                base_url: settings.server.base_url.clone(),
            },
        )
        .await
    }

    async fn current_pipeline(&self) -> Arc<Pipeline> {
        Arc::clone(&*self.pipeline.read().await)
    }

    /// Run a query.
    ///
    /// The stream yields progress events and ends with exactly one
    /// [`RunEvent::Complete`].  Model and tool failures end it with an
    /// `Err` item instead.
    pub fn run<'a>(
        &'a self,
        query: &'a str,
        run_id: &'a str,
        structured: bool,
    ) -> impl Stream<Item = Result<RunEvent>> + Send + 'a {
        async_stream::try_stream! {
            let pipeline = self.current_pipeline().await;
            let attempts = self.options.max_retries.saturating_add(1);

            if structured && self.validator.is_none() {
                error!(run_id, "structured output requested but no UI schema is loaded");
                yield RunEvent::Complete {
                    content: UI_CONFIG_APOLOGY.into(),
                    detail: String::new(),
                    token_count: 0,
                };
            } else {
                let mut current_query = query.to_owned();
                let mut detail = String::new();

                for attempt in 1..=attempts {
                    info!(run_id, attempt, max_attempts = attempts, structured, "attempt started");

                    let mut formatter = StreamFormatter::new();
                    let mut last_snapshot: Option<Snapshot> = None;

                    {
                        let snapshots = pipeline.run(&current_query, run_id, structured)?;
                        futures::pin_mut!(snapshots);
                        while let Some(snapshot) = snapshots.next().await {
                            let snapshot = snapshot?;
                            let update = formatter.observe(&snapshot);
                            last_snapshot = Some(snapshot);
                            if let Some(update) = update {
                                detail.clone_from(&update.detail);
                                yield RunEvent::Progress {
                                    timeline: update.timeline,
                                    detail: update.detail,
                                };
                            }
                        }
                    }

                    let token_count = formatter.token_count();
                    let exhausted = attempt == attempts;
                    // The presenter answers last, so its text is the latest
                    // agent text in the thread.
                    let final_content = last_snapshot
                        .as_ref()
                        .and_then(|s| s.state.last_agent_text())
                        .map(str::to_owned);

                    let Some(content) = final_content.filter(|c| !c.trim().is_empty()) else {
                        warn!(run_id, attempt, "no final response from pipeline");
                        if !exhausted {
                            current_query = no_response_query(query);
                            continue;
                        }
                        error!(run_id, attempt, "retries exhausted without a response");
                        yield RunEvent::Complete {
                            content: if structured { UI_RETRY_APOLOGY } else { NO_RESPONSE_ERROR }.into(),
                            detail: detail.clone(),
                            token_count,
                        };
                        break;
                    };

                    let outcome = match self.validator.as_deref() {
                        Some(v) if structured => v.validate(&content, true),
                        _ => ValidationOutcome::plain_text(content),
                    };

                    if outcome.valid {
                        info!(run_id, attempt, tokens = token_count, "response accepted");
                        yield RunEvent::Complete {
                            content: outcome.content,
                            detail: detail.clone(),
                            token_count,
                        };
                        break;
                    }

                    let error_detail = outcome.error_detail.unwrap_or_default();
                    warn!(run_id, attempt, error = %error_detail, "UI validation failed");
                    if !exhausted {
                        current_query = retry_query(&error_detail, query);
                        continue;
                    }

                    error!(run_id, attempt, "retries exhausted, sending apology");
                    yield RunEvent::Complete {
                        content: UI_RETRY_APOLOGY.into(),
                        detail: detail.clone(),
                        token_count,
                    };
                }
            }
        }
    }

    // -- Configuration -------------------------------------------------------

    /// Configuration of the current pipeline.
    pub async fn get_config(&self) -> PipelineConfig {
        self.current_pipeline().await.config().clone()
    }

    /// Apply a partial update (see [`PipelineConfig::apply_update`]).
    ///
    /// On error the current pipeline stays in place.
    pub async fn update_config(&self, update: &Value) -> Result<()> {
        let mut current = self.pipeline.write().await;
        let next = current.config().apply_update(update)?;
        *current = Arc::new(self.build(next).await?);
        info!("pipeline configuration updated");
        Ok(())
    }

    /// Restore the startup configuration.
    pub async fn reset_config(&self) -> Result<()> {
        let mut current = self.pipeline.write().await;
        *current = Arc::new(self.build(self.options.pipeline.clone()).await?);
        info!("pipeline configuration reset");
        Ok(())
    }

    async fn build(&self, config: PipelineConfig) -> Result<Pipeline> {
        build_pipeline(
            config,
            &self.model,
            &self.registry,
            &self.checkpointer,
            self.validator.as_deref(),
            &self.options.base_url,
        )
        .await
    }

    // -- Runs ----------------------------------------------------------------

    /// Stored checkpoint of a run.
    pub async fn run_state(&self, run_id: &str) -> Result<Option<Checkpoint>> {
        self.checkpointer.load(run_id).await
    }

    /// Ids of all checkpointed runs, most recent first.
    pub async fn runs(&self) -> Result<Vec<String>> {
        self.checkpointer.list().await
    }

    /// Forget a run's conversation.  Returns `false` if the run was unknown.
    pub async fn delete_run(&self, run_id: &str) -> Result<bool> {
        let deleted = self.checkpointer.delete(run_id).await?;
        if deleted {
            info!(run_id = %run_id, "run deleted");
        }
        Ok(deleted)
    }
}

async fn build_pipeline(
    config: PipelineConfig,
    model: &Arc<dyn ChatModel>,
    registry: &Arc<ToolRegistry>,
    checkpointer: &Arc<dyn Checkpointer>,
    validator: Option<&ResponseValidator>,
    base_url: &str,
) -> Result<Pipeline> {
    let formatting = OutputFormatting {
        schema: validator.map(ResponseValidator::message_schema_text),
        base_url: base_url.to_owned(),
    };
    let mut pipeline = Pipeline::new(
        config,
        Arc::clone(model),
        Arc::clone(registry),
        Arc::clone(checkpointer),
        formatting,
    );
    pipeline.build().await?;
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn progress_event_serializes_with_complete_false() {
        let event = RunEvent::Progress {
            timeline: "Current query: place_finder_agent".into(),
            detail: "Query in process".into(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"complete": false, "timeline": "Current query: place_finder_agent", "detail": "Query in process"})
        );
    }

    #[test]
    fn complete_event_carries_token_count_as_string() {
        let event = RunEvent::Complete {
            content: "done".into(),
            detail: "d".into(),
            token_count: 42,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["complete"], true);
        assert_eq!(value["tokenCount"], "42");
        assert!(event.is_complete());
    }

    #[test]
    fn retry_query_embeds_error_and_original_request() {
        let query = retry_query("Validation failed: JSON part is empty..", "top 3 chinese in NY");
        assert!(query.starts_with("Your previous response was invalid. Validation failed: JSON part is empty.. "));
        assert!(query.contains("split by '---a2ui_JSON---'"));
        assert!(query.ends_with("Please retry the original request: 'top 3 chinese in NY'"));
    }

    #[test]
    fn no_response_query_restates_request() {
        assert_eq!(
            no_response_query("cafes"),
            "I received no response. Please try again. Please retry the original request: 'cafes'"
        );
    }
}
