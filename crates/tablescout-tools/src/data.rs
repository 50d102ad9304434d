//! Place data provider -- detailed records for named restaurants and cafes.
//!
//! Exposes the `data_server` tools.  Records live in `restaurants.json` and
//! `cafes.json` under the configured data directory; each file is a JSON
//! array of objects with at least a `name` field.  Files are read on every
//! call, so edits are picked up without a restart.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Value, json};
use tablescout_agent::{ToolDefinition, ToolProvider};
use tracing::{debug, warn};

use crate::error::{Result, ToolError};
use crate::require_str;

/// Provider id used in logs and the tool catalog.
pub const PLACE_DATA_ID: &str = "data_server";

/// Restaurant records file name.
pub const RESTAURANTS_FILE: &str = "restaurants.json";

/// Cafe records file name.
pub const CAFES_FILE: &str = "cafes.json";

/// Looks up place records by name.
#[derive(Debug, Clone)]
pub struct PlaceDataProvider {
    data_dir: PathBuf,
}

impl PlaceDataProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Read one records file.
    ///
    /// An absent file yields no records; an unreadable or malformed one is
    /// an error.
    async fn load_records(&self, file: &str, tool_name: &str) -> Result<Vec<Value>> {
        let path = self.data_dir.join(file);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "place data file not found, returning no records");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(ToolError::DataLoad {
                    tool_name: tool_name.into(),
                    path,
                    reason: e.to_string(),
                });
            }
        };

        serde_json::from_str(&raw).map_err(|e| ToolError::DataLoad {
            tool_name: tool_name.into(),
            path,
            reason: e.to_string(),
        })
    }

    /// Records whose `name` occurs in `names`.
    ///
    /// `names` is free text from the model (for example `"Marte, Starbucks"`),
    /// so the test is a plain substring check against each record's name.
    fn matching<'a>(records: &'a [Value], names: &str) -> Vec<&'a Value> {
        records
            .iter()
            .filter(|record| {
                record
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| names.contains(name))
            })
            .collect()
    }

    async fn lookup(&self, file: &str, field: &str, tool_name: &str, params: &Value) -> Result<String> {
        let names = require_str(params, field, tool_name)?;
        let records = self.load_records(file, tool_name).await?;
        let found = Self::matching(&records, names);
        debug!(tool = tool_name, loaded = records.len(), found = found.len(), "place data lookup");
        Ok(serde_json::to_string(&found)?)
    }

    async fn dispatch(&self, name: &str, params: &Value) -> Result<String> {
        match name {
            "get_restaurant_data" => {
                self.lookup(RESTAURANTS_FILE, "restaurant_names", name, params)
                    .await
            }
            "get_cafe_data" => self.lookup(CAFES_FILE, "cafe_names", name, params).await,
            _ => Err(ToolError::ToolNotFound {
                provider_id: PLACE_DATA_ID.into(),
                tool_name: name.into(),
            }),
        }
    }
}

fn names_input_schema(field: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            field: {"type": "string", "description": description}
        },
        "required": [field]
    })
}

#[async_trait]
impl ToolProvider for PlaceDataProvider {
    fn provider_id(&self) -> &str {
        PLACE_DATA_ID
    }

    async fn tool_definitions(&self) -> tablescout_agent::Result<Vec<ToolDefinition>> {
        let records_schema = json!({"type": "array", "items": {"type": "object"}});
        Ok(vec![
            ToolDefinition {
                name: "get_restaurant_data".into(),
                description: "Uses the restaurant names to return data for the specified \
                              restaurants."
                    .into(),
                input_schema: names_input_schema(
                    "restaurant_names",
                    "Names of the restaurants to look up",
                ),
                output_schema: Some(records_schema.clone()),
            },
            ToolDefinition {
                name: "get_cafe_data".into(),
                description: "Returns information about the specified cafes based on names."
                    .into(),
                input_schema: names_input_schema("cafe_names", "Names of the cafes to look up"),
                output_schema: Some(records_schema),
            },
        ])
    }

    async fn execute(&self, tool_name: &str, arguments: Value) -> tablescout_agent::Result<String> {
        self.dispatch(tool_name, &arguments)
            .await
            .map_err(|e| e.into_agent_error(tool_name))
    }
}
