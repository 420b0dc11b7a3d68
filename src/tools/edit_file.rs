//! File editing tool with multiple operation modes.
//!
//! Grounded on a prior internal multi-mode file editor tool: literal
//! search-and-replace edits (no regex), plus anchor-based insert/delete and
//! whole-file append/prepend. Adapted to the [`ToolProvider`]/[`ToolSchema`]
//! contract — the request still accepts either a basic `edits` array or an
//! extended single `operation`, dispatched by which fields are present.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::provider::{BoxFuture, ParamType, ToolCall, ToolParameter};

use super::ToolProvider;

#[derive(Clone)]
pub struct EditFileTool;

impl EditFileTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EditFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct BasicEditRequest {
    file_path: String,
    edits: Vec<BasicEdit>,
}

#[derive(Debug, Deserialize)]
struct BasicEdit {
    old_text: String,
    new_text: String,
    #[serde(default)]
    replace_all: bool,
}

#[derive(Debug, Deserialize)]
struct ExtendedEditRequest {
    file_path: String,
    operation: Operation,
    #[serde(default)]
    anchor: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Operation {
    Replace,
    InsertBefore,
    InsertAfter,
    Delete,
    Append,
    Prepend,
}

impl ToolProvider for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn brief(&self) -> &str {
        "Edit a text file via literal search-and-replace or anchor-based insert/delete."
    }

    fn full_description(&self) -> String {
        "Edit files using intuitive search-and-replace operations. No regex, no escape \
         sequences, just literal text matching.\n\
         - `old_text`/`anchor` must match EXACTLY and must be unique in the file unless \
           `replace_all` is set.\n\
         - Basic mode: pass `edits`, a list of {old_text,new_text,replace_all}.\n\
         - Extended mode: pass `operation` (replace/insert_before/insert_after/delete/append/\
           prepend) with `anchor` and/or `content`."
            .to_string()
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter {
                name: "file_path".to_string(),
                param_type: ParamType::String,
                description: "Absolute path to the file to edit.".to_string(),
                required: true,
                default: None,
                enum_values: None,
            },
            ToolParameter {
                name: "edits".to_string(),
                param_type: ParamType::Array,
                description: "Basic mode: list of {old_text,new_text,replace_all} objects."
                    .to_string(),
                required: false,
                default: None,
                enum_values: None,
            },
            ToolParameter {
                name: "operation".to_string(),
                param_type: ParamType::String,
                description: "Extended mode: one of the declared operations.".to_string(),
                required: false,
                default: None,
                enum_values: Some(vec![
                    "replace".to_string(),
                    "insert_before".to_string(),
                    "insert_after".to_string(),
                    "delete".to_string(),
                    "append".to_string(),
                    "prepend".to_string(),
                ]),
            },
            ToolParameter {
                name: "anchor".to_string(),
                param_type: ParamType::String,
                description: "Text to locate (for replace/insert/delete operations).".to_string(),
                required: false,
                default: None,
                enum_values: None,
            },
            ToolParameter {
                name: "content".to_string(),
                param_type: ParamType::String,
                description: "New content (for replace/insert/append/prepend operations)."
                    .to_string(),
                required: false,
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
            if let Ok(request) = serde_json::from_value::<BasicEditRequest>(call.arguments.clone()) {
                return execute_basic_edits(&request).await;
            }
            if let Ok(request) = serde_json::from_value::<ExtendedEditRequest>(call.arguments.clone()) {
                return execute_extended_operation(&request).await;
            }
            Err("Invalid request: provide either 'edits' (basic mode) or 'operation' (extended mode).".to_string())
        })
    }
}

async fn execute_basic_edits(request: &BasicEditRequest) -> Result<String, String> {
    let file_path = Path::new(&request.file_path);
    let mut content = fs::read_to_string(file_path)
        .map_err(|e| format!("Failed to read file '{}': {e}", request.file_path))?;

    let mut edits_applied = 0;
    let mut total_replacements = 0;

    for (idx, edit) in request.edits.iter().enumerate() {
        let count = content.matches(&edit.old_text).count();

        if count == 0 {
            return Err(format!("Edit #{}: old_text not found in file.\nSearching for:\n{}\n", idx + 1, edit.old_text));
        }
        if !edit.replace_all && count > 1 {
            return Err(format!(
                "Edit #{}: old_text appears {count} times (must be unique).\nSearching for:\n{}\n\nInclude more context, or set replace_all: true.",
                idx + 1,
                edit.old_text
            ));
        }

        content = content.replace(&edit.old_text, &edit.new_text);
        edits_applied += 1;
        total_replacements += count;
    }

    fs::write(file_path, &content).map_err(|e| format!("Failed to write file '{}': {e}", request.file_path))?;

    Ok(format!(
        "Successfully applied {edits_applied} edit(s) ({total_replacements} replacement(s)) to '{}'",
        request.file_path
    ))
}

async fn execute_extended_operation(request: &ExtendedEditRequest) -> Result<String, String> {
    let file_path = Path::new(&request.file_path);

    match request.operation {
        Operation::Append => {
            let mut content = fs::read_to_string(file_path)
                .map_err(|e| format!("Failed to read file '{}': {e}", request.file_path))?;
            content.push_str(&request.content);
            fs::write(file_path, &content).map_err(|e| format!("Failed to write file '{}': {e}", request.file_path))?;
            Ok(format!("Successfully appended {} bytes to '{}'", request.content.len(), request.file_path))
        }
        Operation::Prepend => {
            let content = fs::read_to_string(file_path)
                .map_err(|e| format!("Failed to read file '{}': {e}", request.file_path))?;
            let new_content = format!("{}{}", request.content, content);
            fs::write(file_path, &new_content).map_err(|e| format!("Failed to write file '{}': {e}", request.file_path))?;
            Ok(format!("Successfully prepended {} bytes to '{}'", request.content.len(), request.file_path))
        }
        Operation::Replace | Operation::InsertBefore | Operation::InsertAfter | Operation::Delete => {
            if request.anchor.is_empty() {
                return Err("This operation requires the 'anchor' field".to_string());
            }

            let content = fs::read_to_string(file_path)
                .map_err(|e| format!("Failed to read file '{}': {e}", request.file_path))?;

            let count = content.matches(&request.anchor).count();
            if count == 0 {
                return Err(format!("Anchor not found in file.\nSearching for:\n{}\n", request.anchor));
            }
            if count > 1 {
                return Err(format!(
                    "Anchor appears {count} times (must be unique).\nSearching for:\n{}\n\nInclude more context.",
                    request.anchor
                ));
            }

            let new_content = match request.operation {
                Operation::Replace => content.replace(&request.anchor, &request.content),
                Operation::InsertBefore => content.replace(&request.anchor, &format!("{}{}", request.content, request.anchor)),
                Operation::InsertAfter => content.replace(&request.anchor, &format!("{}{}", request.anchor, request.content)),
                Operation::Delete => content.replace(&request.anchor, ""),
                _ => unreachable!(),
            };

            fs::write(file_path, &new_content).map_err(|e| format!("Failed to write file '{}': {e}", request.file_path))?;
            Ok(format!("Successfully applied the operation to '{}'", request.file_path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn basic_replace_succeeds() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "Hello, world!\n").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let request = BasicEditRequest {
            file_path: path.clone(),
            edits: vec![BasicEdit { old_text: "world".to_string(), new_text: "Rust".to_string(), replace_all: false }],
        };

        assert!(execute_basic_edits(&request).await.is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), "Hello, Rust!\n");
    }

    #[tokio::test]
    async fn non_unique_anchor_without_replace_all_fails() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "test\ntest\n").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let request = BasicEditRequest {
            file_path: path,
            edits: vec![BasicEdit { old_text: "test".to_string(), new_text: "replaced".to_string(), replace_all: false }],
        };

        let err = execute_basic_edits(&request).await.unwrap_err();
        assert!(err.contains("appears 2 times"));
    }

    #[tokio::test]
    async fn replace_all_replaces_every_occurrence() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "test test test\n").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let request = BasicEditRequest {
            file_path: path.clone(),
            edits: vec![BasicEdit { old_text: "test".to_string(), new_text: "replaced".to_string(), replace_all: true }],
        };

        assert!(execute_basic_edits(&request).await.is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), "replaced replaced replaced\n");
    }

    #[tokio::test]
    async fn insert_after_anchor() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "use std::io;\n\nfn main() {{}}\n").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let request = ExtendedEditRequest {
            file_path: path.clone(),
            operation: Operation::InsertAfter,
            anchor: "use std::io;\n".to_string(),
            content: "use std::fs;\n".to_string(),
        };

        assert!(execute_extended_operation(&request).await.is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), "use std::io;\nuse std::fs;\n\nfn main() {}\n");
    }

    #[tokio::test]
    async fn delete_removes_anchor() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "line1\nline2\nline3\n").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let request = ExtendedEditRequest {
            file_path: path.clone(),
            operation: Operation::Delete,
            anchor: "line2\n".to_string(),
            content: String::new(),
        };

        assert!(execute_extended_operation(&request).await.is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), "line1\nline3\n");
    }

    #[tokio::test]
    async fn execute_dispatches_basic_mode_via_tool_call() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "foo\n").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let tool = EditFileTool::new();
        let call = ToolCall {
            id: "1".into(),
            name: "edit_file".into(),
            arguments: serde_json::json!({
                "file_path": path,
                "edits": [{"old_text": "foo", "new_text": "bar"}]
            }),
        };

        assert!(tool.execute(&call).await.is_ok());
    }
}
