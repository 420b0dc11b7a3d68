//! Regex content search tool.
//!
//! Grounded on `PPRAMANIK62-kaze`'s `tools::grep_tool::GrepTool`: a manual
//! directory walk skipping hidden/`target`/`node_modules` directories and
//! binary files, bounded by a hard match cap so a broad pattern can't run
//! away.

use regex::Regex;
use std::path::{Path, PathBuf};

use crate::provider::{BoxFuture, ParamType, ToolCall, ToolParameter};

use super::ToolProvider;

const MAX_MATCHES: usize = 200;
const BINARY_DETECTION_BYTES: usize = 8192;

#[derive(Clone)]
pub struct GrepTool {
    root: PathBuf,
}

impl GrepTool {
    pub fn new() -> Self {
        Self { root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")) }
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    fn search(&self, regex: &Regex, search_root: &Path, include: Option<&glob::Pattern>) -> Vec<String> {
        let mut matches = Vec::new();
        self.walk(search_root, regex, include, &mut matches);
        matches
    }

    fn walk(&self, dir: &Path, regex: &Regex, include: Option<&glob::Pattern>, matches: &mut Vec<String>) {
        if matches.len() >= MAX_MATCHES {
            return;
        }
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => return,
        };
        let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            if matches.len() >= MAX_MATCHES {
                return;
            }
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if path.is_dir() {
                if name.starts_with('.') || name == "target" || name == "node_modules" {
                    continue;
                }
                self.walk(&path, regex, include, matches);
            } else if path.is_file() {
                if let Some(pattern) = include {
                    if !pattern.matches_path(&path) {
                        continue;
                    }
                }
                self.search_file(&path, regex, matches);
            }
        }
    }

    fn search_file(&self, path: &Path, regex: &Regex, matches: &mut Vec<String>) {
        let content = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => return,
        };
        let check_len = content.len().min(BINARY_DETECTION_BYTES);
        if content[..check_len].contains(&0) {
            return;
        }
        let text = match String::from_utf8(content) {
            Ok(s) => s,
            Err(_) => return,
        };
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        for (line_num, line) in text.lines().enumerate() {
            if matches.len() >= MAX_MATCHES {
                return;
            }
            if regex.is_match(line) {
                matches.push(format!("{}:{}:{}", relative.display(), line_num + 1, line));
            }
        }
    }
}

impl Default for GrepTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolProvider for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn brief(&self) -> &str {
        "Search file contents with a regex pattern, returning path:line:content matches."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter {
                name: "pattern".to_string(),
                param_type: ParamType::String,
                description: "Regex pattern to search for.".to_string(),
                required: true,
                default: None,
                enum_values: None,
            },
            ToolParameter {
                name: "path".to_string(),
                param_type: ParamType::String,
                description: "Directory to search (relative to the working directory, defaults to '.').".to_string(),
                required: false,
                default: None,
                enum_values: None,
            },
            ToolParameter {
                name: "include".to_string(),
                param_type: ParamType::String,
                description: "Glob pattern to filter files searched, e.g. '*.rs'.".to_string(),
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
            let pattern = call
                .arguments
                .get("pattern")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "Missing 'pattern' argument".to_string())?;
            let regex = Regex::new(pattern).map_err(|e| format!("Invalid regex: {e}"))?;

            let search_root = match call.arguments.get("path").and_then(|v| v.as_str()) {
                Some(p) => {
                    let resolved = self.root.join(p);
                    let canonical = resolved
                        .canonicalize()
                        .map_err(|_| format!("Search path does not exist: {p}"))?;
                    let root_canonical = self.root.canonicalize().map_err(|e| e.to_string())?;
                    if !canonical.starts_with(&root_canonical) {
                        return Err("Search path escapes the working directory".to_string());
                    }
                    canonical
                }
                None => self.root.clone(),
            };

            let include = call
                .arguments
                .get("include")
                .and_then(|v| v.as_str())
                .and_then(|pat| glob::Pattern::new(&self.root.join("**").join(pat).to_string_lossy()).ok());

            let matches = self.search(&regex, &search_root, include.as_ref());

            if matches.is_empty() {
                Ok("No matches found.".to_string())
            } else {
                let truncated = if matches.len() >= MAX_MATCHES {
                    format!("\n... truncated at {MAX_MATCHES} matches")
                } else {
                    String::new()
                };
                Ok(format!("{}{truncated}", matches.join("\n")))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn finds_matching_lines() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello\nworld\nhello again\n").unwrap();

        let tool = GrepTool::with_root(dir.path().to_path_buf());
        let call = ToolCall { id: "1".into(), name: "grep".into(), arguments: serde_json::json!({"pattern": "hello"}) };
        let out = tool.execute(&call).await.unwrap();
        assert_eq!(out.lines().count(), 2);
    }

    #[tokio::test]
    async fn invalid_regex_is_rejected() {
        let dir = TempDir::new().unwrap();
        let tool = GrepTool::with_root(dir.path().to_path_buf());
        let call = ToolCall { id: "1".into(), name: "grep".into(), arguments: serde_json::json!({"pattern": "("}) };
        assert!(tool.execute(&call).await.is_err());
    }
}
