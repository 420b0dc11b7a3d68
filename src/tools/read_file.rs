//! Whole/partial file read tool.

use crate::provider::{BoxFuture, ParamType, ToolCall, ToolParameter};

use super::ToolProvider;

const MAX_BYTES: usize = 256 * 1024;

#[derive(Clone, Default)]
pub struct ReadFileTool;

impl ReadFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl ToolProvider for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn brief(&self) -> &str {
        "Read a text file, optionally a line range, capped at 256KiB."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter {
                name: "file_path".to_string(),
                param_type: ParamType::String,
                description: "Absolute path to the file to read.".to_string(),
                required: true,
                default: None,
                enum_values: None,
            },
            ToolParameter {
                name: "start_line".to_string(),
                param_type: ParamType::Number,
                description: "1-indexed first line to include (default 1).".to_string(),
                required: false,
                default: None,
                enum_values: None,
            },
            ToolParameter {
                name: "end_line".to_string(),
                param_type: ParamType::Number,
                description: "1-indexed last line to include (default: end of file).".to_string(),
                required: false,
                default: None,
                enum_values: None,
            },
        ]
    }

    fn category(&self) -> &str {
        "filesystem"
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let path = call
                .arguments
                .get("file_path")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "Missing 'file_path' argument".to_string())?;

            let metadata = std::fs::metadata(path).map_err(|e| format!("Failed to stat '{path}': {e}"))?;
            if metadata.len() as usize > MAX_BYTES {
                return Err(format!("File '{path}' is {} bytes, exceeding the {MAX_BYTES}-byte read cap", metadata.len()));
            }

            let content = std::fs::read_to_string(path).map_err(|e| format!("Failed to read '{path}': {e}"))?;

            let start = call.arguments.get("start_line").and_then(|v| v.as_u64()).unwrap_or(1).max(1) as usize;
            let end = call.arguments.get("end_line").and_then(|v| v.as_u64()).map(|v| v as usize);

            let lines: Vec<&str> = content.lines().collect();
            let end = end.unwrap_or(lines.len()).min(lines.len());
            if start > lines.len() {
                return Ok(String::new());
            }

            Ok(lines[start - 1..end].join("\n"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use std::io::Write;

    #[tokio::test]
    async fn reads_whole_file_by_default() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "a\nb\nc\n").unwrap();
        let tool = ReadFileTool::new();
        let call = ToolCall {
            id: "1".into(),
            name: "read_file".into(),
            arguments: serde_json::json!({"file_path": f.path().to_str().unwrap()}),
        };
        assert_eq!(tool.execute(&call).await.unwrap(), "a\nb\nc");
    }

    #[tokio::test]
    async fn reads_a_line_range() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "a\nb\nc\n").unwrap();
        let tool = ReadFileTool::new();
        let call = ToolCall {
            id: "1".into(),
            name: "read_file".into(),
            arguments: serde_json::json!({"file_path": f.path().to_str().unwrap(), "start_line": 2, "end_line": 2}),
        };
        assert_eq!(tool.execute(&call).await.unwrap(), "b");
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let tool = ReadFileTool::new();
        let big = NamedTempFile::new().unwrap();
        std::fs::write(big.path(), vec![b'x'; MAX_BYTES + 1]).unwrap();
        let call = ToolCall {
            id: "1".into(),
            name: "read_file".into(),
            arguments: serde_json::json!({"file_path": big.path().to_str().unwrap()}),
        };
        assert!(tool.execute(&call).await.is_err());
    }
}
