//! Tool providers for TableScout.
//!
//! Two providers back the pipeline's agents:
//!
//! - [`PlaceFinderProvider`] (`food_place_server`) answers "which places?"
//!   with `get_restaurants` and `get_cafes`.
//! - [`PlaceDataProvider`] (`data_server`) answers "tell me about these
//!   places" with `get_restaurant_data` and `get_cafe_data`.
//!
//! Both implement [`tablescout_agent::ToolProvider`].  [`default_registry`]
//! wires them into a [`ToolRegistry`].

pub mod data;
pub mod error;
pub mod places;

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tablescout_agent::{ToolProvider, ToolRegistry};

pub use data::{PlaceDataProvider, PLACE_DATA_ID};
pub use error::{Result, ToolError};
pub use places::{PlaceFinderProvider, PLACE_FINDER_ID};

/// A registry holding both place providers, reading records from `data_dir`.
pub fn default_registry(data_dir: impl AsRef<Path>) -> ToolRegistry {
    let providers: Vec<Arc<dyn ToolProvider>> = vec![
        Arc::new(PlaceFinderProvider::new()),
        Arc::new(PlaceDataProvider::new(data_dir.as_ref())),
    ];
    ToolRegistry::new(providers)
}

/// Extract a required string field from JSON params.
pub(crate) fn require_str<'a>(params: &'a Value, field: &str, tool_name: &str) -> Result<&'a str> {
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidParams {
            tool_name: tool_name.to_string(),
            reason: format!("missing required string field `{field}`"),
        })
}
