//! Integration tests for the tablescout-agent crate.
//!
//! These tests drive the coordinator end to end with a scripted model, so no
//! network access is needed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde_json::{Value, json};

use tablescout_agent::coordinator::{NO_RESPONSE_ERROR, UI_CONFIG_APOLOGY, UI_RETRY_APOLOGY};
use tablescout_agent::{
    A2UI_DELIMITER, AgentError, ChatModel, ChatRequest, Coordinator, CoordinatorOptions,
    InMemoryCheckpointer, ModelReply, ResponseMetadata, ResponseValidator, Result, Role, RunEvent,
    ToolCall, ToolDefinition, ToolProvider, ToolRegistry,
};

// ═══════════════════════════════════════════════════════════════════════
//  Fixtures
// ═══════════════════════════════════════════════════════════════════════

const VALID_PAYLOAD: &str = r#"[{"beginRendering":{"surfaceId":"default","root":"root"}}]"#;

struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    fn new(replies: Vec<ModelReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelReply> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::LlmRequestFailed {
                reason: "script exhausted".into(),
            })
    }
}

struct Restaurants;

#[async_trait]
impl ToolProvider for Restaurants {
    fn provider_id(&self) -> &str {
        "food_place_server"
    }

    async fn tool_definitions(&self) -> Result<Vec<ToolDefinition>> {
        Ok(vec![ToolDefinition {
            name: "get_restaurants".into(),
            description: "Restaurants by cuisine and city".into(),
            input_schema: json!({"type": "object"}),
            output_schema: None,
        }])
    }

    async fn execute(&self, _tool_name: &str, arguments: Value) -> Result<String> {
        assert_eq!(arguments["cuisine_type"], "chinese");
        Ok(r#"["Xi'an Famous Foods","Han Dynasty","RedFarm"]"#.into())
    }
}

/// A data source that is down.
struct Unavailable;

#[async_trait]
impl ToolProvider for Unavailable {
    fn provider_id(&self) -> &str {
        "food_place_server"
    }

    async fn tool_definitions(&self) -> Result<Vec<ToolDefinition>> {
        Restaurants.tool_definitions().await
    }

    async fn execute(&self, tool_name: &str, _arguments: Value) -> Result<String> {
        Err(AgentError::ToolExecutionFailed {
            tool_name: tool_name.into(),
            reason: "connection refused".into(),
        })
    }
}

fn restaurants_call() -> ModelReply {
    ModelReply::tool_calls(
        vec![ToolCall {
            id: "call_1".into(),
            name: "get_restaurants".into(),
            arguments: json!({"cuisine_type": "chinese", "city": "NY"}),
        }],
        ResponseMetadata::default(),
    )
}

/// Tool calls in `request` with no matching tool result after them.
fn unanswered_tool_calls(request: &ChatRequest) -> Vec<String> {
    let messages = &request.messages;
    messages
        .iter()
        .enumerate()
        .flat_map(|(i, m)| m.tool_calls.iter().map(move |call| (i, call)))
        .filter(|(i, call)| {
            !messages[i + 1..]
                .iter()
                .any(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some(call.id.as_str()))
        })
        .map(|(_, call)| call.id.clone())
        .collect()
}

fn text(content: &str, tokens: u64) -> ModelReply {
    ModelReply::text(
        content,
        ResponseMetadata {
            model_id: Some("xai.grok-4-fast-non-reasoning".into()),
            total_tokens: tokens,
        },
    )
}

/// Three replies: place finder, data finder, presenter.
fn attempt(final_answer: &str) -> Vec<ModelReply> {
    vec![
        text("Xi'an Famous Foods\nHan Dynasty", 10),
        text("Xi'an Famous Foods: 45 Bayard St", 20),
        text(final_answer, 30),
    ]
}

async fn coordinator(model: Arc<ScriptedModel>, validator: Option<ResponseValidator>) -> Coordinator {
    Coordinator::new(
        model,
        Arc::new(ToolRegistry::new(vec![Arc::new(Restaurants)])),
        Arc::new(InMemoryCheckpointer::new()),
        validator,
        CoordinatorOptions::default(),
    )
    .await
    .unwrap()
}

async fn collect(coordinator: &Coordinator, query: &str, run_id: &str, structured: bool) -> Vec<RunEvent> {
    coordinator
        .run(query, run_id, structured)
        .try_collect()
        .await
        .unwrap()
}

fn completes(events: &[RunEvent]) -> Vec<&RunEvent> {
    events.iter().filter(|e| e.is_complete()).collect()
}

fn complete_content(events: &[RunEvent]) -> &str {
    match events.last() {
        Some(RunEvent::Complete { content, .. }) => content,
        other => panic!("expected a terminal event, got {other:?}"),
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Structured output
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn valid_payload_completes_once_without_retry() {
    let answer = format!("Here you go{A2UI_DELIMITER}{VALID_PAYLOAD}");
    let model = ScriptedModel::new(attempt(&answer));
    let coordinator = coordinator(model.clone(), Some(ResponseValidator::bundled().unwrap())).await;

    let events = collect(&coordinator, "top chinese in NY", "run-valid", true).await;

    assert_eq!(completes(&events).len(), 1);
    assert_eq!(complete_content(&events), answer);
    assert_eq!(model.requests().len(), 3);
}

#[tokio::test]
async fn missing_delimiter_triggers_retry() {
    let answer = format!("Here you go{A2UI_DELIMITER}{VALID_PAYLOAD}");
    let mut replies = attempt("Here you go, no payload");
    replies.extend(attempt(&answer));
    let model = ScriptedModel::new(replies);
    let coordinator = coordinator(model.clone(), Some(ResponseValidator::bundled().unwrap())).await;

    let events = collect(&coordinator, "top chinese in NY", "run-retry", true).await;

    assert_eq!(completes(&events).len(), 1);
    assert_eq!(complete_content(&events), answer);
    assert_eq!(model.requests().len(), 6);
}

#[tokio::test]
async fn exhausted_retries_send_apology() {
    let mut replies = attempt("no delimiter here");
    replies.extend(attempt("still no delimiter"));
    let model = ScriptedModel::new(replies);
    let coordinator = coordinator(model, Some(ResponseValidator::bundled().unwrap())).await;

    let events = collect(&coordinator, "top chinese in NY", "run-apology", true).await;

    assert_eq!(completes(&events).len(), 1);
    assert_eq!(complete_content(&events), UI_RETRY_APOLOGY);
}

#[tokio::test]
async fn whitespace_payload_retries_with_amended_query() {
    let answer = format!("Here you go{A2UI_DELIMITER}{VALID_PAYLOAD}");
    let mut replies = attempt(&format!("Here you go{A2UI_DELIMITER}```json\n   \n```"));
    replies.extend(attempt(&answer));
    let model = ScriptedModel::new(replies);
    let coordinator = coordinator(model.clone(), Some(ResponseValidator::bundled().unwrap())).await;

    let events = collect(&coordinator, "top chinese in NY", "run-ws", true).await;
    assert_eq!(complete_content(&events), answer);

    let retry_request = &model.requests()[3];
    let amended = retry_request
        .messages
        .iter()
        .rev()
        .find(|m| m.content.starts_with("Your previous response was invalid."))
        .expect("amended query sent on retry");
    assert!(amended.content.contains("Validation failed"));
    assert!(amended.content.ends_with("'top chinese in NY'"));
}

#[tokio::test]
async fn missing_schema_short_circuits_structured_runs() {
    let model = ScriptedModel::new(vec![]);
    let coordinator = coordinator(model.clone(), None).await;

    let events = collect(&coordinator, "top chinese in NY", "run-noschema", true).await;

    assert_eq!(events.len(), 1);
    assert_eq!(complete_content(&events), UI_CONFIG_APOLOGY);
    assert!(model.requests().is_empty());
}

#[tokio::test]
async fn empty_answers_in_structured_mode_end_with_retry_apology() {
    let mut replies = attempt("");
    replies.extend(attempt("  \n "));
    let model = ScriptedModel::new(replies);
    let coordinator = coordinator(model.clone(), Some(ResponseValidator::bundled().unwrap())).await;

    let events = collect(&coordinator, "top chinese in NY", "run-silent-ui", true).await;

    assert_eq!(completes(&events).len(), 1);
    assert_eq!(complete_content(&events), UI_RETRY_APOLOGY);
    let requests = model.requests();
    assert_eq!(requests.len(), 6);
    let amended = requests[3]
        .messages
        .iter()
        .rev()
        .find(|m| m.content.starts_with("I received no response"))
        .expect("no-response query sent on retry");
    assert!(amended.content.ends_with("'top chinese in NY'"));
}

// ═══════════════════════════════════════════════════════════════════════
//  Progress events
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn text_mode_follows_node_order_and_has_no_delimiter() {
    let model = ScriptedModel::new(vec![
        ModelReply::tool_calls(
            vec![ToolCall {
                id: "call_1".into(),
                name: "get_restaurants".into(),
                arguments: json!({"cuisine_type": "chinese", "city": "NY"}),
            }],
            ResponseMetadata::default(),
        ),
        text("Xi'an Famous Foods\nHan Dynasty\nRedFarm", 10),
        text("Xi'an Famous Foods: 45 Bayard St", 20),
        text("Here are the top 3 chinese restaurants in NY: ...", 30),
    ]);
    let coordinator = coordinator(model, Some(ResponseValidator::bundled().unwrap())).await;

    let events = collect(&coordinator, "Find me top 3 chinese restaurants in NY", "run-text", false).await;

    let timeline: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Progress { timeline, .. } => Some(timeline.as_str()),
            RunEvent::Complete { .. } => None,
        })
        .collect();
    assert_eq!(
        timeline,
        vec![
            "Current query: place_finder_agent",
            "food_place_agent called tool: get_restaurants",
            "Tool get_restaurants responded",
            "food_place_agent responded",
            "Current query: place_data_agent",
            "Current query: place_data_agent",
            "place_data_agent responded",
            "Current query: presenter_agent",
            "Current query: presenter_agent",
            "presenter_agent responded",
        ]
    );
    assert!(!complete_content(&events).contains(A2UI_DELIMITER));
}

#[tokio::test]
async fn token_count_is_sum_of_agent_text_tokens() {
    let model = ScriptedModel::new(attempt("plain answer"));
    let coordinator = coordinator(model, None).await;

    let events = collect(&coordinator, "cafes in NY", "run-tokens", false).await;

    match events.last() {
        Some(RunEvent::Complete { token_count, detail, .. }) => {
            assert_eq!(*token_count, 60);
            assert!(detail.contains("total_tokens_on_call: 60"));
        }
        other => panic!("expected a terminal event, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_answers_in_text_mode_end_with_no_response_error() {
    let mut replies = attempt("");
    replies.extend(attempt("   "));
    let model = ScriptedModel::new(replies);
    let coordinator = coordinator(model.clone(), None).await;

    let events = collect(&coordinator, "cafes in NY", "run-silent", false).await;

    assert_eq!(completes(&events).len(), 1);
    assert_eq!(complete_content(&events), NO_RESPONSE_ERROR);
    let requests = model.requests();
    assert_eq!(requests.len(), 6);
    assert!(
        requests[3]
            .messages
            .iter()
            .any(|m| m.content.starts_with("I received no response") && m.content.ends_with("'cafes in NY'"))
    );
}

#[tokio::test]
async fn run_after_tool_failure_sends_consistent_history() {
    let mut replies = vec![restaurants_call()];
    replies.extend(attempt("Try Han Dynasty."));
    let model = ScriptedModel::new(replies);
    let coordinator = Coordinator::new(
        model.clone(),
        Arc::new(ToolRegistry::new(vec![Arc::new(Unavailable)])),
        Arc::new(InMemoryCheckpointer::new()),
        None,
        CoordinatorOptions::default(),
    )
    .await
    .unwrap();

    let first: Vec<Result<RunEvent>> = coordinator.run("chinese in NY", "t", false).collect().await;
    assert!(matches!(first.last(), Some(Err(AgentError::ToolExecutionFailed { .. }))));

    let second = collect(&coordinator, "chinese in NY", "t", false).await;
    assert_eq!(complete_content(&second), "Try Han Dynasty.");

    let requests = model.requests();
    assert_eq!(requests.len(), 4);
    for request in &requests[1..] {
        assert_eq!(unanswered_tool_calls(request), Vec::<String>::new());
    }
    let checkpoint = coordinator.run_state("t").await.unwrap().unwrap();
    assert!(checkpoint.messages.iter().all(|m| m.tool_calls.is_empty()));
}

#[tokio::test]
async fn upstream_failure_reaches_the_caller() {
    let model = ScriptedModel::new(vec![text("Marte", 1)]);
    let coordinator = coordinator(model, None).await;

    let results: Vec<Result<RunEvent>> = coordinator.run("cafes", "run-fail", false).collect().await;

    assert!(matches!(results.last(), Some(Err(AgentError::LlmRequestFailed { .. }))));
    assert!(!results.iter().any(|r| matches!(r, Ok(e) if e.is_complete())));
}

#[tokio::test]
async fn run_state_is_checkpointed() {
    let model = ScriptedModel::new(attempt("plain answer"));
    let coordinator = coordinator(model, None).await;

    collect(&coordinator, "cafes in NY", "run-ckpt", false).await;

    let checkpoint = coordinator.run_state("run-ckpt").await.unwrap().unwrap();
    assert_eq!(checkpoint.messages.len(), 8);
    assert_eq!(checkpoint.next, None);
    assert_eq!(coordinator.runs().await.unwrap(), vec!["run-ckpt"]);

    assert!(coordinator.delete_run("run-ckpt").await.unwrap());
    assert!(coordinator.run_state("run-ckpt").await.unwrap().is_none());
    assert!(!coordinator.delete_run("run-ckpt").await.unwrap());
}

// ═══════════════════════════════════════════════════════════════════════
//  Configuration
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn config_update_rebuilds_and_reset_restores() {
    let coordinator = coordinator(ScriptedModel::new(vec![]), None).await;

    coordinator
        .update_config(&json!({
            "presenter_agent": {"model": "openai.gpt-4.1", "name": "presenter", "temperature": 0.3}
        }))
        .await
        .unwrap();
    assert_eq!(coordinator.get_config().await.presenter_agent.model, "openai.gpt-4.1");

    coordinator.reset_config().await.unwrap();
    assert_eq!(
        coordinator.get_config().await.presenter_agent.model,
        "xai.grok-4-fast-non-reasoning"
    );
}

#[tokio::test]
async fn rejected_config_update_keeps_current_pipeline() {
    let coordinator = coordinator(ScriptedModel::new(vec![]), None).await;
    let before = coordinator.get_config().await;

    let err = coordinator
        .update_config(&json!({"place_finder_agent": {"model": "", "name": "x", "temperature": 0.5}}))
        .await
        .unwrap_err();

    assert!(err.is_config());
    assert_eq!(coordinator.get_config().await, before);
}

#[tokio::test]
async fn new_run_uses_updated_model() {
    let model = ScriptedModel::new(attempt("plain answer"));
    let coordinator = coordinator(model.clone(), None).await;
    coordinator
        .update_config(&json!({
            "data_finder_agent": {
                "model": "openai.gpt-4.1",
                "name": "place_data_agent",
                "temperature": 0.7,
                "tools_enabled": ["get_restaurant_data"]
            }
        }))
        .await
        .unwrap();

    collect(&coordinator, "cafes in NY", "run-updated", false).await;

    let models: Vec<String> = model.requests().into_iter().map(|r| r.model).collect();
    assert_eq!(
        models,
        vec!["xai.grok-4-fast-non-reasoning", "openai.gpt-4.1", "xai.grok-4-fast-non-reasoning"]
    );
}
