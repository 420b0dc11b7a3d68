//! Tool registry (spec C3), adapted from a prior internal tool registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::provider::{ToolCall, ToolResult, ToolSchema};

use super::validate::validate_arguments;
use super::ToolProvider;

/// Owns the set of tools available to the orchestrator and dispatches
/// validated calls to them.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolProvider>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Registers `tool`, idempotent on name (spec §4.3): re-registering the
    /// same name with an identical schema is a no-op, and a same-name
    /// registration whose schema differs is rejected — the original
    /// registration wins and the conflicting one is dropped, logged at warn.
    pub fn register<T: ToolProvider + 'static>(mut self, tool: T) -> Self {
        let name = tool.name().to_string();
        if let Some(existing) = self.tools.get(&name) {
            if existing.schema() != tool.schema() {
                log::warn!("rejected re-registration of tool '{name}' with a differing schema");
            }
            return self;
        }
        self.tools.insert(name, Arc::new(tool));
        self
    }

    /// Registers every built-in tool (spec C3's default toolset).
    pub fn register_all_builtin(self) -> Self {
        self.register(super::bash::BashTool::new())
            .register(super::edit_file::EditFileTool::new())
            .register(super::read_file::ReadFileTool::new())
            .register(super::write_file::WriteFileTool::new())
            .register(super::grep::GrepTool::new())
            .register(super::glob_tool::GlobTool::new())
            .register(super::git_status::GitStatusTool::new())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolProvider>> {
        self.tools.get(name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Schemas for every registered tool, sent to the model each round.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn schema_for(&self, name: &str) -> Option<ToolSchema> {
        self.tools.get(name).map(|t| t.schema())
    }

    /// Validates then executes a single call, timing the execution.
    ///
    /// Returns `None` only when `call.name` is not registered at all; an
    /// unknown tool is distinct from a tool that ran and failed.
    pub async fn execute(&self, call: &ToolCall) -> Option<ToolResult> {
        let tool = self.tools.get(&call.name)?.clone();
        let schema = tool.schema();

        if let Err(e) = validate_arguments(&schema, &call.arguments) {
            return Some(ToolResult::failure(call.id.clone(), e, 0));
        }

        let started = Instant::now();
        let result = tool.execute(call).await;
        let elapsed = started.elapsed().as_millis() as u64;

        Some(match result {
            Ok(output) => ToolResult::success(call.id.clone(), output, elapsed),
            Err(error) => ToolResult::failure(call.id.clone(), error, elapsed),
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_has_no_tools() {
        let registry = ToolRegistry::new();
        assert!(registry.tool_names().is_empty());
    }

    #[test]
    fn builtin_registration_includes_bash() {
        let registry = ToolRegistry::new().register_all_builtin();
        assert!(registry.has_tool("bash"));
        assert!(registry.has_tool("read_file"));
    }

    #[tokio::test]
    async fn unknown_tool_returns_none() {
        let registry = ToolRegistry::new();
        let call = ToolCall { id: "1".into(), name: "nope".into(), arguments: serde_json::json!({}) };
        assert!(registry.execute(&call).await.is_none());
    }

    #[tokio::test]
    async fn invalid_arguments_produce_a_failure_result_not_none() {
        let registry = ToolRegistry::new().register_all_builtin();
        let call = ToolCall { id: "1".into(), name: "bash".into(), arguments: serde_json::json!({}) };
        let result = registry.execute(&call).await.unwrap();
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("invalid_arguments"));
    }

    #[tokio::test]
    async fn bash_executes_successfully() {
        let registry = ToolRegistry::new().register_all_builtin();
        let call = ToolCall {
            id: "1".into(),
            name: "bash".into(),
            arguments: serde_json::json!({"command": "echo hi"}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert!(result.ok);
    }

    struct StubTool {
        name: &'static str,
        brief: &'static str,
    }

    impl ToolProvider for StubTool {
        fn name(&self) -> &str {
            self.name
        }
        fn brief(&self) -> &str {
            self.brief
        }
        fn parameters(&self) -> Vec<crate::provider::ToolParameter> {
            Vec::new()
        }
        fn execute<'a>(&'a self, call: &'a ToolCall) -> crate::provider::BoxFuture<'a, Result<String, String>> {
            let id = call.id.clone();
            Box::pin(async move { Ok(id) })
        }
    }

    #[test]
    fn re_registering_the_same_name_with_an_identical_schema_is_a_no_op() {
        let registry = ToolRegistry::new()
            .register(StubTool { name: "stub", brief: "a stub" })
            .register(StubTool { name: "stub", brief: "a stub" });
        assert_eq!(registry.tool_names().len(), 1);
    }

    #[test]
    fn re_registering_the_same_name_with_a_differing_schema_is_rejected() {
        let registry = ToolRegistry::new()
            .register(StubTool { name: "stub", brief: "original description" })
            .register(StubTool { name: "stub", brief: "a completely different tool" });
        assert_eq!(registry.tool_names().len(), 1);
        assert_eq!(registry.schema_for("stub").unwrap().description, "original description");
    }
}
