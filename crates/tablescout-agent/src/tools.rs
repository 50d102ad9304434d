//! Tool registry.
//!
//! Tool providers (the place finder and place data services) implement
//! [`ToolProvider`].  A [`ToolRegistry`] owns the providers and discovers
//! their combined catalog exactly once, on first use; every pipeline rebuilt
//! afterwards reuses the same catalog.  Each agent holds a [`ToolSet`], the
//! subset of the catalog named in its configuration.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::error::{AgentError, Result};
use crate::llm::types::{ToolCall, ToolDefinition};

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// A service that exposes named lookup tools.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// The unique identifier for this provider.
    fn provider_id(&self) -> &str;

    /// Discover the tools this provider exposes.
    async fn tool_definitions(&self) -> Result<Vec<ToolDefinition>>;

    /// Execute a named tool with the given arguments.
    ///
    /// Returns the result as a string suitable for feeding back to the LLM.
    async fn execute(&self, tool_name: &str, arguments: Value) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One discovered tool and the provider that serves it.
#[derive(Clone)]
pub struct CatalogEntry {
    pub definition: ToolDefinition,
    provider: Arc<dyn ToolProvider>,
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.definition.name)
            .field("provider", &self.provider.provider_id())
            .finish()
    }
}

/// The full set of tools discovered across all providers.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    entries: Vec<CatalogEntry>,
}

impl ToolCatalog {
    /// Query every provider and collect its tools.
    ///
    /// When two providers expose the same tool name the first one wins.
    pub async fn discover(providers: &[Arc<dyn ToolProvider>]) -> Result<Self> {
        let mut entries: Vec<CatalogEntry> = Vec::new();

        for provider in providers {
            let definitions = provider.tool_definitions().await?;
            tracing::debug!(
                provider = provider.provider_id(),
                tool_count = definitions.len(),
                "discovered tools"
            );

            for definition in definitions {
                if entries.iter().any(|e| e.definition.name == definition.name) {
                    tracing::warn!(
                        provider = provider.provider_id(),
                        tool = %definition.name,
                        "duplicate tool name, keeping the first provider's tool"
                    );
                    continue;
                }
                entries.push(CatalogEntry {
                    definition,
                    provider: Arc::clone(provider),
                });
            }
        }

        Ok(Self { entries })
    }

    /// Names of every tool in the catalog.
    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.definition.name.as_str())
            .collect()
    }

    /// Number of tools in the catalog.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no tools.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the tools whose names are in `enabled`.
    ///
    /// Names that match no tool are ignored.
    pub fn filter(&self, enabled: &[String]) -> ToolSet {
        let tools = self
            .entries
            .iter()
            .filter(|e| enabled.iter().any(|name| name == &e.definition.name))
            .cloned()
            .collect();
        ToolSet { tools }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Process-wide owner of the tool providers and their discovered catalog.
pub struct ToolRegistry {
    providers: Vec<Arc<dyn ToolProvider>>,
    catalog: OnceCell<Arc<ToolCatalog>>,
}

impl ToolRegistry {
    /// Create a registry over the given providers.  Nothing is discovered
    /// until [`ToolRegistry::catalog`] is first awaited.
    pub fn new(providers: Vec<Arc<dyn ToolProvider>>) -> Self {
        Self {
            providers,
            catalog: OnceCell::new(),
        }
    }

    /// A registry with no providers.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// The discovered catalog, initialising it on first use.
    ///
    /// Concurrent first callers wait on the same discovery.  A failed
    /// discovery is not cached, so the next caller retries.
    pub async fn catalog(&self) -> Result<Arc<ToolCatalog>> {
        let catalog = self
            .catalog
            .get_or_try_init(|| async {
                let catalog = ToolCatalog::discover(&self.providers).await?;
                tracing::info!(
                    providers = self.providers.len(),
                    tools = ?catalog.names(),
                    "tool catalog initialised"
                );
                Ok::<_, AgentError>(Arc::new(catalog))
            })
            .await?;
        Ok(Arc::clone(catalog))
    }

    /// The filtered tool set for one agent.
    pub async fn tool_set(&self, enabled: &[String]) -> Result<ToolSet> {
        Ok(self.catalog().await?.filter(enabled))
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("providers", &self.providers.len())
            .field("initialised", &self.catalog.initialized())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tool set
// ---------------------------------------------------------------------------

/// The tools one agent is allowed to call.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: Vec<CatalogEntry>,
}

impl ToolSet {
    /// Definitions to advertise to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    /// Names of the tools in this set.
    pub fn names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .map(|t| t.definition.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one tool call requested by the model.
    ///
    /// # Errors
    ///
    /// [`AgentError::UnknownTool`] if the call names a tool outside this set;
    /// provider errors are propagated unchanged.
    pub async fn execute(&self, call: &ToolCall) -> Result<String> {
        let entry = self
            .tools
            .iter()
            .find(|t| t.definition.name == call.name)
            .ok_or_else(|| AgentError::UnknownTool {
                tool_name: call.name.clone(),
            })?;

        tracing::debug!(
            tool = %call.name,
            id = %call.id,
            provider = entry.provider.provider_id(),
            "executing tool"
        );
        entry
            .provider
            .execute(&call.name, call.arguments.clone())
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use serde_json::json;

    struct MockProvider {
        id: String,
        tools: Vec<&'static str>,
        discoveries: AtomicUsize,
    }

    impl MockProvider {
        fn new(id: &str, tools: Vec<&'static str>) -> Self {
            Self {
                id: id.into(),
                tools,
                discoveries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ToolProvider for MockProvider {
        fn provider_id(&self) -> &str {
            &self.id
        }

        async fn tool_definitions(&self) -> Result<Vec<ToolDefinition>> {
            self.discoveries.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .tools
                .iter()
                .map(|name| ToolDefinition {
                    name: (*name).into(),
                    description: format!("{name} tool"),
                    input_schema: json!({"type": "object"}),
                    output_schema: None,
                })
                .collect())
        }

        async fn execute(&self, tool_name: &str, _arguments: Value) -> Result<String> {
            Ok(format!("{} ran {tool_name}", self.id))
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments: json!({}),
        }
    }

    #[tokio::test]
    async fn catalog_is_discovered_once() {
        let provider = Arc::new(MockProvider::new("places", vec!["get_restaurants"]));
        let registry = ToolRegistry::new(vec![provider.clone() as Arc<dyn ToolProvider>]);

        let first = registry.catalog().await.unwrap();
        let second = registry.catalog().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.discoveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn filter_drops_unknown_names() {
        let registry = ToolRegistry::new(vec![
            Arc::new(MockProvider::new("places", vec!["get_restaurants", "get_cafes"])),
            Arc::new(MockProvider::new("data", vec!["get_cafe_data"])),
        ]);

        let set = registry
            .tool_set(&["get_cafes".into(), "get_cafe_data".into(), "book_table".into()])
            .await
            .unwrap();

        assert_eq!(set.names(), vec!["get_cafes", "get_cafe_data"]);
    }

    #[tokio::test]
    async fn duplicate_names_keep_first_provider() {
        let registry = ToolRegistry::new(vec![
            Arc::new(MockProvider::new("first", vec!["get_cafes"])),
            Arc::new(MockProvider::new("second", vec!["get_cafes"])),
        ]);

        let set = registry.tool_set(&["get_cafes".into()]).await.unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.execute(&call("get_cafes")).await.unwrap(), "first ran get_cafes");
    }

    #[tokio::test]
    async fn execute_outside_set_is_unknown_tool() {
        let registry = ToolRegistry::new(vec![Arc::new(MockProvider::new(
            "places",
            vec!["get_restaurants", "get_cafes"],
        ))]);
        let set = registry.tool_set(&["get_cafes".into()]).await.unwrap();

        let err = set.execute(&call("get_restaurants")).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool { tool_name } if tool_name == "get_restaurants"));
    }
}
