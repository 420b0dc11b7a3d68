//! Git working-tree status tool.
//!
//! Grounded on `bash.rs`'s process-spawning shape, narrowed to one
//! read-only command and given a parsed, model-friendly summary instead
//! of raw porcelain output.

use std::path::PathBuf;
use tokio::process::Command;

use crate::provider::{BoxFuture, ToolCall};

use super::ToolProvider;

#[derive(Clone)]
pub struct GitStatusTool {
    working_dir: Option<PathBuf>,
}

impl GitStatusTool {
    pub fn new() -> Self {
        Self { working_dir: None }
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    fn describe(code: &str) -> &'static str {
        match code {
            "??" => "untracked",
            " M" | "M " | "MM" => "modified",
            "A " | "AM" => "added",
            " D" | "D " => "deleted",
            "R " => "renamed",
            "C " => "copied",
            _ => "changed",
        }
    }

    fn format_porcelain(output: &str) -> String {
        let lines: Vec<&str> = output.lines().collect();
        if lines.is_empty() {
            return "working tree clean".to_string();
        }
        lines
            .iter()
            .map(|line| {
                let (code, path) = line.split_at(2.min(line.len()));
                format!("{}: {}", Self::describe(code.trim_end()), path.trim())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for GitStatusTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolProvider for GitStatusTool {
    fn name(&self) -> &str {
        "git_status"
    }

    fn brief(&self) -> &str {
        "Report the working tree's changed, staged, and untracked files."
    }

    fn parameters(&self) -> Vec<crate::provider::ToolParameter> {
        Vec::new()
    }

    fn category(&self) -> &str {
        "git"
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    fn execute<'a>(&'a self, _call: &'a ToolCall) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            let mut cmd = Command::new("git");
            cmd.args(["status", "--porcelain"]);
            if let Some(dir) = &self.working_dir {
                cmd.current_dir(dir);
            }
            let output = cmd.output().await.map_err(|e| format!("failed to run git: {e}"))?;

            if !output.status.success() {
                return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(Self::format_porcelain(&stdout))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_output_reports_clean_tree() {
        assert_eq!(GitStatusTool::format_porcelain(""), "working tree clean");
    }

    #[test]
    fn parses_common_status_codes() {
        let raw = " M src/lib.rs\n?? scratch.txt\nA  new_file.rs";
        let formatted = GitStatusTool::format_porcelain(raw);
        assert!(formatted.contains("modified: src/lib.rs"));
        assert!(formatted.contains("untracked: scratch.txt"));
        assert!(formatted.contains("added: new_file.rs"));
    }

    #[tokio::test]
    async fn outside_a_repo_surfaces_git_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let tool = GitStatusTool::new().with_working_dir(dir.path().to_path_buf());
        let call = ToolCall { id: "1".into(), name: "git_status".into(), arguments: serde_json::json!({}) };
        let result = tool.execute(&call).await;
        assert!(result.is_err());
    }
}
