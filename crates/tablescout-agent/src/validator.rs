//! Structured UI payload validation.
//!
//! A structured answer is `<free text>---a2ui_JSON---<payload>`, where the
//! payload is a JSON array of UI messages.  The single-message schema is
//! loaded once; validation wraps it as `{"type": "array", "items": ..}`.

use std::path::Path;

use jsonschema::{Draft, JSONSchema};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};

/// Separator between the free text and the UI payload.
pub const A2UI_DELIMITER: &str = "---a2ui_JSON---";

/// Schema of one UI message, used when no schema file is configured.
pub const BUNDLED_MESSAGE_SCHEMA: &str = include_str!("../assets/a2ui_message_schema.json");

/// Result of checking one final answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    /// Content to deliver when valid; the original answer otherwise.
    pub content: String,
    /// Parsed UI payload, when one was found and accepted.
    pub payload: Option<Value>,
    pub valid: bool,
    /// `Validation failed: <reason>.` when invalid.
    pub error_detail: Option<String>,
}

impl ValidationOutcome {
    /// A plain-text answer; always valid.
    pub fn plain_text(content: impl Into<String>) -> Self {
        Self::accepted(content.into(), None)
    }

    fn accepted(content: String, payload: Option<Value>) -> Self {
        Self {
            content,
            payload,
            valid: true,
            error_detail: None,
        }
    }

    fn rejected(content: &str, reason: &str) -> Self {
        Self {
            content: content.to_owned(),
            payload: None,
            valid: false,
            error_detail: Some(format!("Validation failed: {reason}.")),
        }
    }
}

/// Checks final answers against the UI message schema.
pub struct ResponseValidator {
    message_schema: Value,
    compiled: JSONSchema,
}

impl std::fmt::Debug for ResponseValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseValidator")
            .field("message_schema", &self.message_schema.get("title"))
            .finish()
    }
}

impl ResponseValidator {
    /// Compile a validator from the schema of a single UI message.
    pub fn from_message_schema(message_schema: Value) -> Result<Self> {
        if !message_schema.is_object() {
            return Err(AgentError::SchemaError {
                reason: "UI message schema must be a JSON object".into(),
            });
        }
        let array_schema = json!({"type": "array", "items": message_schema});
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&array_schema)
            .map_err(|e| AgentError::SchemaError {
                reason: format!("failed to compile UI schema: {e}"),
            })?;

        Ok(Self {
            message_schema,
            compiled,
        })
    }

    /// Parse and compile a single-message schema from text.
    pub fn from_schema_str(schema: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(schema).map_err(|e| AgentError::SchemaError {
            reason: format!("failed to parse UI schema: {e}"),
        })?;
        Self::from_message_schema(value)
    }

    /// The bundled schema.
    pub fn bundled() -> Result<Self> {
        Self::from_schema_str(BUNDLED_MESSAGE_SCHEMA)
    }

    /// Load from `path`, or use the bundled schema when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::bundled();
        };
        let text = std::fs::read_to_string(path).map_err(|e| AgentError::SchemaError {
            reason: format!("failed to read UI schema {}: {e}", path.display()),
        })?;
        let validator = Self::from_schema_str(&text)?;
        tracing::info!(path = ?path, "UI schema loaded");
        Ok(validator)
    }

    /// Single-message schema as pretty JSON, for model instructions.
    pub fn message_schema_text(&self) -> String {
        serde_json::to_string_pretty(&self.message_schema).unwrap_or_else(|_| self.message_schema.to_string())
    }

    /// Check a final answer.
    ///
    /// Plain-text answers are always valid.  A structured answer is valid
    /// when it contains the delimiter and the text after the first one,
    /// minus an optional ```` ```json ```` fence, is a schema-conforming
    /// array.  The delivered content keeps the payload exactly as received.
    pub fn validate(&self, content: &str, structured: bool) -> ValidationOutcome {
        if !structured {
            return ValidationOutcome::plain_text(content);
        }

        match self.check_structured(content) {
            Ok((free_text, raw_payload, payload)) => ValidationOutcome::accepted(
                format!("{free_text}{A2UI_DELIMITER}{raw_payload}"),
                Some(payload),
            ),
            Err(reason) => ValidationOutcome::rejected(content, &reason),
        }
    }

    fn check_structured<'a>(
        &self,
        content: &'a str,
    ) -> std::result::Result<(&'a str, &'a str, Value), String> {
        let (free_text, raw_payload) = content
            .split_once(A2UI_DELIMITER)
            .ok_or_else(|| format!("Delimiter '{A2UI_DELIMITER}' not found."))?;

        if raw_payload.trim().is_empty() {
            return Err("JSON part is empty.".into());
        }

        let cleaned = strip_json_fence(raw_payload);
        if cleaned.is_empty() {
            return Err("Cleaned JSON string is empty.".into());
        }

        let payload: Value = serde_json::from_str(cleaned).map_err(|e| e.to_string())?;

        if let Err(errors) = self.compiled.validate(&payload) {
            let reasons: Vec<String> = errors
                .map(|e| format!("{}: {e}", e.instance_path))
                .collect();
            return Err(reasons.join("; "));
        }

        Ok((free_text, raw_payload, payload))
    }
}

/// Trim whitespace and a surrounding code fence, tagged ```` ```json ````
/// or bare ```` ``` ````.
fn strip_json_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim()
}
