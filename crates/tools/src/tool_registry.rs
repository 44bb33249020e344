use {
    anyhow::Result,
    async_trait::async_trait,
    std::{collections::BTreeMap, sync::Arc},
    tracing::debug,
};

/// Agent-callable tool.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema of the `params` object accepted by [`AgentTool::execute`].
    fn parameters_schema(&self) -> serde_json::Value;
    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value>;
}

/// Registry of tools exposed to clients.
///
/// Tools are keyed by name, so registering a second tool under an existing
/// name replaces the first. Iteration order is by name, which keeps
/// `tools/list` output stable.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "replaced previously registered tool");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentTool>> {
        self.tools.get(name).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AgentTool>> {
        self.tools.values()
    }

    pub fn list_schemas(&self) -> Vec<serde_json::Value> {
        self.tools
            .values()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.parameters_schema(),
                })
            })
            .collect()
    }

    /// Get the list of tool names.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    struct Echo(&'static str);

    #[async_trait]
    impl AgentTool for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "echoes its params"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({ "type": "object" })
        }

        async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value> {
            Ok(json!({ "tool": self.0, "params": params }))
        }
    }

    #[test]
    fn names_are_sorted_and_unique() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo("calendar_list_events")));
        registry.register(Arc::new(Echo("list_calendars")));
        registry.register(Arc::new(Echo("calendar_list_events")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.tool_names(), vec![
            "calendar_list_events".to_string(),
            "list_calendars".to_string(),
        ]);
    }

    #[test]
    fn list_schemas_includes_parameters() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo("a")));
        let schemas = registry.list_schemas();
        assert_eq!(schemas[0]["name"], "a");
        assert_eq!(schemas[0]["parameters"]["type"], "object");
    }

    #[tokio::test]
    async fn get_returns_executable_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo("a")));
        let tool = registry.get("a").unwrap();
        let out = tool.execute(json!({ "x": 1 })).await.unwrap();
        assert_eq!(out["params"]["x"], 1);
        assert!(registry.get("missing").is_none());
    }
}
