//! The tool contract (spec §3, C3).
//!
//! Reconstructed to match the shape the rest of the crate already expects
//! of a tool: a name/description pair for registry bookkeeping, a
//! [`ToolSchema`] for the model-facing function definition, and an async
//! `execute` returning plain text or a plain-text error (never a typed
//! error — the text is what gets fed back into the conversation).

use crate::provider::{BoxFuture, ToolCall, ToolSchema};

/// Tool-layer error taxonomy (spec §7): `invalid_arguments | unapproved |
/// denied | timeout | internal`. `UnknownTool` is folded under `internal`
/// for the merged taxonomy but kept distinguishable for logging.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid_arguments: {0}")]
    InvalidArguments(String),
    #[error("unapproved: {0}")]
    Unapproved(String),
    #[error("denied: {0}")]
    Denied(String),
    #[error("timeout after {0}s")]
    Timeout(u64),
    #[error("unknown_tool: {0}")]
    UnknownTool(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ToolError {
    /// Concise, actionable, user-facing resolution (spec §7).
    pub fn resolution(&self) -> String {
        match self {
            ToolError::InvalidArguments(msg) => format!("fix the tool call arguments: {msg}"),
            ToolError::Unapproved(_) => "this tool requires approval; approve it and retry".to_string(),
            ToolError::Denied(_) => "this tool call was denied".to_string(),
            ToolError::Timeout(secs) => format!("tool execution exceeded {secs}s; try a narrower operation"),
            ToolError::UnknownTool(name) => format!("'{name}' is not a registered tool"),
            ToolError::Internal(msg) => format!("internal tool error: {msg}"),
        }
    }
}

/// A single callable tool exposed to the model.
pub trait ToolProvider: Send + Sync {
    /// Stable identifier, matches [`ToolCall::name`].
    fn name(&self) -> &str;

    /// One-line summary shown in compact tool listings.
    fn brief(&self) -> &str;

    /// Full prose description sent to the model as the function description.
    fn full_description(&self) -> String {
        self.brief().to_string()
    }

    /// Declared parameters, used both for the model-facing schema and for
    /// argument validation before execution.
    fn parameters(&self) -> Vec<crate::provider::ToolParameter>;

    fn category(&self) -> &str {
        "general"
    }

    fn dangerous(&self) -> bool {
        false
    }

    /// Whether independent calls to this tool may run concurrently within
    /// the same round (spec §9 open question, resolved: opt-in per tool).
    fn side_effect_free(&self) -> bool {
        false
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.full_description(),
            parameters: self.parameters(),
            category: self.category().to_string(),
            dangerous: self.dangerous(),
            side_effect_free: self.side_effect_free(),
        }
    }

    /// Executes the already-validated call. Ok carries the text fed back to
    /// the model; Err carries the text fed back as the error message.
    fn execute<'a>(&'a self, call: &'a ToolCall) -> BoxFuture<'a, Result<String, String>>;
}
