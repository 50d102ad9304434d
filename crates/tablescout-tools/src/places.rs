//! Place finder provider -- restaurant and cafe names by cuisine and city.
//!
//! Exposes the `food_place_server` tools.  The place lists are fixed; the
//! city only appears in the "nothing found" answer.

use async_trait::async_trait;
use serde_json::{Value, json};
use tablescout_agent::{ToolDefinition, ToolProvider};
use tracing::debug;

use crate::error::{Result, ToolError};
use crate::require_str;

/// Provider id used in logs and the tool catalog.
pub const PLACE_FINDER_ID: &str = "food_place_server";

const CHINESE_RESTAURANTS: [&str; 5] = [
    "Xi'an Famous Foods",
    "Han Dynasty",
    "RedFarm",
    "Mott 32",
    "Hwa Yuan Szechuan",
];

const ITALIAN_RESTAURANTS: [&str; 5] = [
    "Lombardi's",
    "Di Fara",
    "Joe's Pizza",
    "L'Artusi",
    "Carbone",
];

const CAFES: [&str; 3] = ["Marte", "Starbucks", "ItalianCoffe"];

/// Finds restaurant and cafe names.
#[derive(Debug, Default, Clone)]
pub struct PlaceFinderProvider;

impl PlaceFinderProvider {
    pub fn new() -> Self {
        Self
    }

    /// Restaurant names for a cuisine.  Matching is a case-insensitive
    /// substring test, so "Chinese food" finds the Chinese list.
    pub fn restaurants(cuisine_type: &str, city: &str) -> Vec<String> {
        let cuisine = cuisine_type.to_lowercase();
        if cuisine.contains("chinese") {
            CHINESE_RESTAURANTS.map(String::from).to_vec()
        } else if cuisine.contains("italian") {
            ITALIAN_RESTAURANTS.map(String::from).to_vec()
        } else {
            vec![format!("No restaurants found in {city}")]
        }
    }

    /// Cafe names.  Every city gets the same list.
    pub fn cafes(_city: &str) -> Vec<String> {
        CAFES.map(String::from).to_vec()
    }

    // -- Tool implementations ------------------------------------------------

    fn tool_get_restaurants(&self, params: &Value) -> Result<String> {
        let cuisine_type = require_str(params, "cuisine_type", "get_restaurants")?;
        let city = require_str(params, "city", "get_restaurants")?;
        let names = Self::restaurants(cuisine_type, city);
        debug!(cuisine_type, city, found = names.len(), "restaurant lookup");
        Ok(serde_json::to_string(&names)?)
    }

    fn tool_get_cafes(&self, params: &Value) -> Result<String> {
        let city = require_str(params, "city", "get_cafes")?;
        let names = Self::cafes(city);
        debug!(city, found = names.len(), "cafe lookup");
        Ok(serde_json::to_string(&names)?)
    }

    fn dispatch(&self, name: &str, params: &Value) -> Result<String> {
        match name {
            "get_restaurants" => self.tool_get_restaurants(params),
            "get_cafes" => self.tool_get_cafes(params),
            _ => Err(ToolError::ToolNotFound {
                provider_id: PLACE_FINDER_ID.into(),
                tool_name: name.into(),
            }),
        }
    }
}

fn name_list_schema() -> Value {
    json!({"type": "array", "items": {"type": "string"}})
}

#[async_trait]
impl ToolProvider for PlaceFinderProvider {
    fn provider_id(&self) -> &str {
        PLACE_FINDER_ID
    }

    async fn tool_definitions(&self) -> tablescout_agent::Result<Vec<ToolDefinition>> {
        Ok(vec![
            ToolDefinition {
                name: "get_restaurants".into(),
                description: "Finds different restaurants depending on the city and type of \
                              cuisine selected."
                    .into(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "cuisine_type": {
                            "type": "string",
                            "description": "Type of cuisine, e.g. chinese or italian"
                        },
                        "city": {
                            "type": "string",
                            "description": "City to search in"
                        }
                    },
                    "required": ["cuisine_type", "city"]
                }),
                output_schema: Some(name_list_schema()),
            },
            ToolDefinition {
                name: "get_cafes".into(),
                description: "Finds different cafes depending on the city selected.".into(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "city": {
                            "type": "string",
                            "description": "City to search in"
                        }
                    },
                    "required": ["city"]
                }),
                output_schema: Some(name_list_schema()),
            },
        ])
    }

    async fn execute(&self, tool_name: &str, arguments: Value) -> tablescout_agent::Result<String> {
        self.dispatch(tool_name, &arguments)
            .map_err(|e| e.into_agent_error(tool_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablescout_agent::AgentError;

    #[test]
    fn cuisine_match_is_case_insensitive_substring() {
        let names = PlaceFinderProvider::restaurants("Chinese food", "New York");
        assert_eq!(names.len(), 5);
        assert_eq!(names[0], "Xi'an Famous Foods");

        let names = PlaceFinderProvider::restaurants("ITALIAN", "New York");
        assert!(names.contains(&"Carbone".to_string()));
    }

    #[test]
    fn unknown_cuisine_names_the_city() {
        assert_eq!(
            PlaceFinderProvider::restaurants("thai", "Boston"),
            vec!["No restaurants found in Boston".to_string()]
        );
    }

    #[tokio::test]
    async fn definitions_cover_both_tools() {
        let defs = PlaceFinderProvider::new().tool_definitions().await.unwrap();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["get_restaurants", "get_cafes"]);
        assert!(defs.iter().all(|d| d.output_schema.is_some()));
    }

    #[tokio::test]
    async fn execute_returns_json_list() {
        let provider = PlaceFinderProvider::new();
        let out = provider
            .execute("get_cafes", json!({"city": "New York"}))
            .await
            .unwrap();
        assert_eq!(out, r#"["Marte","Starbucks","ItalianCoffe"]"#);
    }

    #[tokio::test]
    async fn missing_argument_is_rejected() {
        let err = PlaceFinderProvider::new()
            .execute("get_restaurants", json!({"cuisine_type": "chinese"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ToolExecutionFailed { ref tool_name, .. } if tool_name == "get_restaurants"));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let err = PlaceFinderProvider::new()
            .execute("get_restaurant_data", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool { .. }));
    }
}
