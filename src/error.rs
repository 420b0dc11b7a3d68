//! Merged error taxonomy (spec §7).
//!
//! Each layer defines its own `thiserror` enum (see `provider::ProviderError`,
//! `tools::ToolError`, `safety::SafetyError`, `container::ContainerError`).
//! [`CoreError`] composes them for callers that sit above all four layers
//! (the orchestrator, the NL router) and need one type to propagate.

use crate::container::ContainerError;
use crate::provider::ProviderError;
use crate::safety::SafetyError;
use crate::tools::ToolError;

/// Category for [`CoreError::User`], used to pick a resolution hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserErrorCategory {
    Connection,
    Validation,
    System,
    Permission,
}

/// Top-level error type returned across the core/CLI boundary.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Cooperative cancellation. Not logged as an error; maps to exit 130.
    #[error("cancelled")]
    Cancelled,

    #[error("{category:?}: {message}")]
    User {
        category: UserErrorCategory,
        message: String,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("no provider available for this request")]
    NoProviderAvailable,

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Safety(#[from] SafetyError),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl CoreError {
    /// Whether retrying the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Concise, actionable, user-facing resolution. Never a stack trace.
    pub fn resolution(&self) -> String {
        match self {
            CoreError::Cancelled => "operation cancelled".to_string(),
            CoreError::User { message, .. } => message.clone(),
            CoreError::Provider(e) => e.resolution(),
            CoreError::NoProviderAvailable => {
                "no healthy provider could handle this request; check provider config and network connectivity".to_string()
            }
            CoreError::Tool(e) => e.resolution(),
            CoreError::Safety(e) => e.resolution(),
            CoreError::Container(e) => format!("internal service error: {e}"),
        }
    }

    /// Process exit code per spec §6: 0 success, 1 user error, 2 system
    /// error, 130 cancelled. This type never represents success, so 0 is
    /// unreachable from here but listed for completeness of the mapping.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::Cancelled => 130,
            CoreError::User { .. } => 1,
            _ => 2,
        }
    }
}
