//! REST and streaming route handlers.
//!
//! Every non-streaming error response has the shape
//! `{"status": "error", "message": ...}`; caller mistakes are `400`,
//! upstream failures `500`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use tablescout_agent::{AgentError, Coordinator, PipelineConfig};

use crate::state::AppState;

/// Response header carrying the id of a started run.
pub const RUN_ID_HEADER: &str = "x-run-id";

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Body of the configuration endpoints.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

impl StatusMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            message: message.into(),
        }
    }
}

/// An error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        let status = if err.is_config() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %err, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(StatusMessage::error(self.message))).into_response()
    }
}

// ---------------------------------------------------------------------------
// /agent/config
// ---------------------------------------------------------------------------

/// Return the active pipeline configuration.
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<PipelineConfig> {
    Json(state.coordinator.get_config().await)
}

/// Apply a partial configuration update.
///
/// The body is an object keyed by agent (`place_finder_agent`,
/// `data_finder_agent`, `presenter_agent`).  A rejected update leaves the
/// active configuration untouched.
pub async fn post_config(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<StatusMessage>, ApiError> {
    let Json(update) = body?;
    state.coordinator.update_config(&update).await?;
    Ok(Json(StatusMessage::success("Configuration updated")))
}

/// Restore the startup configuration.
pub async fn delete_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusMessage>, ApiError> {
    state.coordinator.reset_config().await?;
    Ok(Json(StatusMessage::success("Configuration reset to default")))
}

// ---------------------------------------------------------------------------
// POST /agent/run
// ---------------------------------------------------------------------------

/// Request body for `/agent/run`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunBody {
    pub query: String,
    /// Continue this run's conversation; a new id is generated when absent.
    #[serde(default)]
    pub run_id: Option<String>,
    /// Ask for a UI payload in addition to the text answer.
    #[serde(default)]
    pub structured: bool,
}

/// Run a query and stream its events.
///
/// Each run event is sent as one SSE `data` frame holding the event's JSON.
/// A failure mid-run is sent as a final frame named `error`.  The run id is
/// returned in the [`RUN_ID_HEADER`] response header.
pub async fn run_agent(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RunBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    if body.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    let run_id = body
        .run_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
    tracing::info!(run_id = %run_id, structured = body.structured, "run requested");

    let events = event_stream(
        Arc::clone(&state.coordinator),
        body.query,
        run_id.clone(),
        body.structured,
    );
    let sse = Sse::new(events).keep_alive(KeepAlive::default());
    Ok(([(RUN_ID_HEADER, run_id)], sse).into_response())
}

/// Own the request's data for the lifetime of the response stream.
fn event_stream(
    coordinator: Arc<Coordinator>,
    query: String,
    run_id: String,
    structured: bool,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    async_stream::stream! {
        let events = coordinator.run(&query, &run_id, structured);
        futures::pin_mut!(events);

        while let Some(item) = events.next().await {
            match item {
                Ok(event) => match Event::default().json_data(&event) {
                    Ok(frame) => yield Ok(frame),
                    Err(e) => {
                        tracing::error!(run_id = %run_id, error = %e, "failed to encode run event");
                        yield Ok(error_event(&e.to_string()));
                        break;
                    }
                },
                Err(e) => {
                    tracing::error!(run_id = %run_id, error = %e, "run failed");
                    yield Ok(error_event(&e.to_string()));
                    break;
                }
            }
        }
    }
}

fn error_event(message: &str) -> Event {
    Event::default()
        .event("error")
        .data(json!({"status": "error", "message": message}).to_string())
}

// ---------------------------------------------------------------------------
// /agent/runs
// ---------------------------------------------------------------------------

/// Ids of all checkpointed runs, most recent first.
pub async fn list_runs(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.coordinator.runs().await?))
}

/// The stored checkpoint of one run.
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.coordinator.run_state(&id).await? {
        Some(checkpoint) => Ok(Json(checkpoint).into_response()),
        None => Err(ApiError::not_found(format!("run `{id}` not found"))),
    }
}

/// Drop a run's checkpoint so the id starts a fresh conversation.
pub async fn delete_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    if state.coordinator.delete_run(&id).await? {
        Ok(Json(StatusMessage::success("Run deleted")))
    } else {
        Err(ApiError::not_found(format!("run `{id}` not found")))
    }
}
