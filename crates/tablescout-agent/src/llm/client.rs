//! OpenAI-compatible chat client.
//!
//! Talks to any endpoint that speaks the **OpenAI Chat Completions API**
//! (hosted OpenAI, OCI Generative AI's OpenAI-compatible gateway, vLLM,
//! Ollama, ...).  The agents never use this type directly; they call through
//! the [`ChatModel`] trait so the endpoint can be swapped or mocked.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::llm::types::{
    ChatRequest, LlmResponse, Message, ModelReply, ResponseMetadata, Role, ToolCall,
    ToolDefinition,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default OpenAI API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// Model capability
// ---------------------------------------------------------------------------

/// Anything that can answer a chat request.
///
/// One instance is shared by every agent of every pipeline, so
/// implementations must be safe for concurrent use.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and tool set, returning the model's reply.
    async fn complete(&self, request: &ChatRequest) -> Result<ModelReply>;
}

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to an LLM endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// API key for bearer authentication.
    pub api_key: String,
    /// Base URL for the API (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    /// Model used when a request leaves `model` empty.
    pub default_model: String,
    /// Default maximum tokens per response.
    pub max_tokens: u32,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl LlmClientConfig {
    /// Create a configuration for the hosted OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::openai_compatible(api_key, model, OPENAI_BASE_URL)
    }

    /// Create a configuration for any OpenAI-compatible API.
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: model.into(),
            max_tokens: 4096,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for an OpenAI-compatible Chat Completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmClientConfig,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: "openai-compatible".into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    /// Wire request for the Chat Completions API.
    fn build_request<'a>(&'a self, request: &'a ChatRequest) -> WireRequest<'a> {
        let model: &str = if request.model.is_empty() {
            &self.config.default_model
        } else {
            &request.model
        };

        WireRequest {
            model,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            tools: request.tools.iter().map(WireTool::from).collect(),
        }
    }

    /// Send the HTTP request to the Chat Completions endpoint.
    async fn send(&self, body: &WireRequest<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("invalid authorization header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(
            url = %url,
            model = body.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "sending LLM request"
        );

        self.http
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelReply> {
        let body = self.build_request(request);
        let resp = self.send(&body).await?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(AgentError::LlmRequestFailed {
                reason: format!("API returned {status}: {text}"),
            });
        }

        parse_completion(&text)
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(msg: &'a Message) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        // Tool requests without text go out with no `content` key.
        let content = (msg.tool_calls.is_empty() || !msg.content.is_empty())
            .then_some(msg.content.as_str());

        Self {
            role,
            content,
            tool_calls: msg.tool_calls.iter().map(WireToolCall::from).collect(),
            tool_call_id: msg.tool_call_id.as_deref(),
        }
    }
}

/// A tool call as it appears in both requests and responses.  The
/// arguments travel as a JSON-encoded string.
#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_kind() -> String {
    "function".into()
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: function_kind(),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }
}

impl TryFrom<WireToolCall> for ToolCall {
    type Error = AgentError;

    fn try_from(wire: WireToolCall) -> Result<Self> {
        let WireFunctionCall { name, arguments } = wire.function;
        let arguments = if arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&arguments).map_err(|e| AgentError::LlmParseFailed {
                reason: format!("invalid JSON in tool call `{name}` arguments: {e}"),
            })?
        };
        Ok(ToolCall {
            id: wire.id,
            name,
            arguments,
        })
    }
}

/// Tool advertisement.  Output schemas stay local.
#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireToolSpec<'a>,
}

#[derive(Debug, Serialize)]
struct WireToolSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

impl<'a> From<&'a ToolDefinition> for WireTool<'a> {
    fn from(tool: &'a ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: WireToolSpec {
                name: &tool.name,
                description: &tool.description,
                parameters: &tool.input_schema,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireCompletion {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireReplyMessage,
}

#[derive(Debug, Deserialize)]
struct WireReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    total_tokens: u64,
}

/// Parse a Chat Completions response body.
///
/// Tool calls win over text when a message carries both.
fn parse_completion(body: &str) -> Result<ModelReply> {
    let completion: WireCompletion =
        serde_json::from_str(body).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

    let metadata = ResponseMetadata {
        model_id: completion.model,
        total_tokens: completion.usage.map_or(0, |u| u.total_tokens),
    };
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| AgentError::LlmParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        })?;

    let calls = message.tool_calls.unwrap_or_default();
    let response = if calls.is_empty() {
        LlmResponse::Text(message.content.unwrap_or_default())
    } else {
        LlmResponse::ToolCalls(
            calls
                .into_iter()
                .map(ToolCall::try_from)
                .collect::<Result<Vec<_>>>()?,
        )
    };

    Ok(ModelReply { response, metadata })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_api_key_returns_error() {
        let config = LlmClientConfig::openai("", "gpt-4.1");
        assert!(matches!(
            LlmClient::new(config),
            Err(AgentError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn openai_compatible_config_construction() {
        let config =
            LlmClientConfig::openai_compatible("key", "xai.grok-4", "http://localhost:8080/v1");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.default_model, "xai.grok-4");
        assert_eq!(config.max_tokens, 4096);
    }

    fn body(client: &LlmClient, request: &ChatRequest) -> Value {
        serde_json::to_value(client.build_request(request)).unwrap()
    }

    #[test]
    fn request_body_falls_back_to_default_model() {
        let client = LlmClient::new(LlmClientConfig::openai("key", "default-model")).unwrap();
        let request = ChatRequest {
            model: String::new(),
            messages: vec![Message::system("be brief"), Message::human("hi")],
            tools: vec![],
            temperature: Some(0.7),
            max_tokens: None,
        };

        let body = body(&client, &request);
        assert_eq!(body["model"], "default-model");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "hi"}));
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn tool_round_and_tools_on_the_wire() {
        let client = LlmClient::new(LlmClientConfig::openai("key", "m")).unwrap();
        let calls = vec![ToolCall {
            id: "call_1".into(),
            name: "get_cafes".into(),
            arguments: json!({"city": "NY"}),
        }];
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![
                Message::tool_request("finder", calls, ResponseMetadata::default()),
                Message::tool_result("call_1", "get_cafes", r#"["Marte"]"#),
            ],
            tools: vec![ToolDefinition {
                name: "get_cafes".into(),
                description: "Find cafes".into(),
                input_schema: json!({"type": "object"}),
                output_schema: Some(json!({"type": "array"})),
            }],
            temperature: None,
            max_tokens: Some(256),
        };

        let body = body(&client, &request);
        let wire = &body["messages"];
        assert!(wire[0].get("content").is_none());
        assert_eq!(wire[0]["tool_calls"][0]["type"], "function");
        assert_eq!(wire[0]["tool_calls"][0]["function"]["arguments"], r#"{"city":"NY"}"#);
        assert_eq!(wire[1]["role"], "tool");
        assert_eq!(wire[1]["tool_call_id"], "call_1");

        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
        assert!(body["tools"][0]["function"].get("output_schema").is_none());
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn parse_text_response_with_usage() {
        let v = json!({
            "model": "gpt-4.1",
            "choices": [{"message": {"role": "assistant", "content": "Hello", "tool_calls": null}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });

        let reply = parse_completion(&v.to_string()).unwrap();
        assert_eq!(reply.response, LlmResponse::Text("Hello".into()));
        assert_eq!(reply.metadata.model_id.as_deref(), Some("gpt-4.1"));
        assert_eq!(reply.metadata.total_tokens, 15);
    }

    #[test]
    fn parse_tool_call_response() {
        let v = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": "get_restaurants", "arguments": "{\"cuisine_type\":\"chinese\"}"}
                }]
            }}]
        });

        let reply = parse_completion(&v.to_string()).unwrap();
        let LlmResponse::ToolCalls(calls) = reply.response else {
            panic!("expected tool calls");
        };
        assert_eq!(calls[0].id, "call_abc");
        assert_eq!(calls[0].arguments["cuisine_type"], "chinese");
        assert_eq!(reply.metadata.total_tokens, 0);
    }

    #[test]
    fn malformed_responses_are_parse_errors() {
        for body in [r#"{"choices": []}"#, "not json"] {
            assert!(matches!(
                parse_completion(body),
                Err(AgentError::LlmParseFailed { .. })
            ));
        }

        let bad_args = json!({"choices": [{"message": {"tool_calls": [{
            "id": "c", "function": {"name": "get_cafes", "arguments": "{city"}
        }]}}]});
        assert!(matches!(
            parse_completion(&bad_args.to_string()),
            Err(AgentError::LlmParseFailed { .. })
        ));
    }
}
