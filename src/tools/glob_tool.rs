//! Glob-pattern file listing tool.
//!
//! Grounded on `PPRAMANIK62-kaze`'s `tools::glob_tool::GlobTool`, adapted to
//! the [`ToolProvider`] contract with the same capped result count and
//! root-escape guard.

use std::path::PathBuf;

use crate::provider::{BoxFuture, ParamType, ToolCall, ToolParameter};

use super::ToolProvider;

const MAX_RESULTS: usize = 200;

#[derive(Clone)]
pub struct GlobTool {
    root: PathBuf,
}

impl GlobTool {
    pub fn new() -> Self {
        Self { root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")) }
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }
}

impl Default for GlobTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolProvider for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn brief(&self) -> &str {
        "List files matching a glob pattern relative to the working directory."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter {
            name: "pattern".to_string(),
            param_type: ParamType::String,
            description: "Glob pattern, e.g. 'src/**/*.rs'.".to_string(),
            required: true,
            default: None,
            enum_values: None,
        }]
    }

    fn category(&self) -> &str {
        "filesystem"
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let pattern = call
                .arguments
                .get("pattern")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "Missing 'pattern' argument".to_string())?;

            let full_pattern = self.root.join(pattern);
            let pattern_str = full_pattern.to_string_lossy().to_string();
            let root_canonical = self.root.canonicalize().map_err(|e| e.to_string())?;

            let mut paths: Vec<String> = Vec::new();
            let entries = glob::glob(&pattern_str).map_err(|e| format!("Invalid glob pattern: {e}"))?;
            for entry in entries {
                if paths.len() >= MAX_RESULTS {
                    paths.push(format!("... truncated at {MAX_RESULTS} results"));
                    break;
                }
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => continue,
                };
                match entry.canonicalize() {
                    Ok(canonical) if canonical.starts_with(&root_canonical) => {}
                    _ => continue,
                }
                let relative = entry.strip_prefix(&self.root).unwrap_or(&entry);
                paths.push(relative.display().to_string());
            }

            if paths.is_empty() {
                Ok("No files matched the pattern.".to_string())
            } else {
                Ok(paths.join("\n"))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lists_matching_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();

        let tool = GlobTool::with_root(dir.path().to_path_buf());
        let call = ToolCall { id: "1".into(), name: "glob".into(), arguments: serde_json::json!({"pattern": "*.rs"}) };
        let out = tool.execute(&call).await.unwrap();
        assert_eq!(out, "a.rs");
    }

    #[tokio::test]
    async fn reports_no_matches() {
        let dir = TempDir::new().unwrap();
        let tool = GlobTool::with_root(dir.path().to_path_buf());
        let call = ToolCall { id: "1".into(), name: "glob".into(), arguments: serde_json::json!({"pattern": "*.nope"}) };
        assert_eq!(tool.execute(&call).await.unwrap(), "No files matched the pattern.");
    }
}
