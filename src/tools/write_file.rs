//! Whole-file write tool (create or overwrite).
//!
//! Distinct from [`super::edit_file`]: this always writes the full content,
//! creating parent directories as needed. The safety pipeline (spec C9/C10)
//! governs whether a call to this tool reaches execution at all; this tool
//! itself performs no risk assessment.

use crate::provider::{BoxFuture, ParamType, ToolCall, ToolParameter};

use super::ToolProvider;

#[derive(Clone, Default)]
pub struct WriteFileTool;

impl WriteFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl ToolProvider for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn brief(&self) -> &str {
        "Create or overwrite a text file with the given content."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter {
                name: "file_path".to_string(),
                param_type: ParamType::String,
                description: "Absolute path to the file to write.".to_string(),
                required: true,
                default: None,
                enum_values: None,
            },
            ToolParameter {
                name: "content".to_string(),
                param_type: ParamType::String,
                description: "Full file content.".to_string(),
                required: true,
                default: None,
                enum_values: None,
            },
        ]
    }

    fn category(&self) -> &str {
        "filesystem"
    }

    fn dangerous(&self) -> bool {
        true
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let path = call
                .arguments
                .get("file_path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "Missing 'file_path' argument".to_string())?;
            let content = call
                .arguments
                .get("content")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "Missing 'content' argument".to_string())?;

            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| format!("Failed to create '{}': {e}", parent.display()))?;
                }
            }
            std::fs::write(path, content).map_err(|e| format!("Failed to write '{path}': {e}"))?;
            Ok(format!("Wrote {} bytes to '{path}'", content.len()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_new_file_creating_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/file.txt");
        let tool = WriteFileTool::new();
        let call = ToolCall {
            id: "1".into(),
            name: "write_file".into(),
            arguments: serde_json::json!({"file_path": path.to_str().unwrap(), "content": "hello"}),
        };
        assert!(tool.execute(&call).await.is_ok());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        std::fs::write(&path, "old").unwrap();
        let tool = WriteFileTool::new();
        let call = ToolCall {
            id: "1".into(),
            name: "write_file".into(),
            arguments: serde_json::json!({"file_path": path.to_str().unwrap(), "content": "new"}),
        };
        assert!(tool.execute(&call).await.is_ok());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }
}
