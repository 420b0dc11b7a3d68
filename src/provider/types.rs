//! Shared provider-layer data model (spec §3, §4.1).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// A single turn in a conversation sent to or received from a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub name: Option<String>,
    pub tool_call_id: Option<String>,
    /// Tool calls the assistant requested in this message, if any.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            name: None,
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// A tool call emitted by the model mid-stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// The outcome of executing a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub ok: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, data: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            call_id: call_id.into(),
            ok: true,
            data: Some(serde_json::Value::String(data.into())),
            error: None,
            duration_ms,
        }
    }

    pub fn failure(call_id: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            call_id: call_id.into(),
            ok: false,
            data: None,
            error: Some(error.into()),
            duration_ms,
        }
    }

    /// Renders the result as the text that goes into the follow-up `tool`
    /// message fed back to the model.
    pub fn as_message_content(&self) -> String {
        if self.ok {
            match &self.data {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(v) => v.to_string(),
                None => String::new(),
            }
        } else {
            self.error.clone().unwrap_or_else(|| "unknown error".to_string())
        }
    }
}

/// A single parameter in a [`ToolSchema`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// The schema a provider/orchestrator uses to expose a tool to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    pub category: String,
    pub dangerous: bool,
    /// Opt-in flag for parallel execution within a tool-call round (spec
    /// a tool opts in explicitly; nothing infers it automatically).
    #[serde(default)]
    pub side_effect_free: bool,
}

/// Generation options, all fields provider-scoped-default when unset.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
    pub stream: bool,
    pub tools: Option<Vec<ToolSchema>>,
    pub system: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// One discrete chunk of a streamed completion.
#[derive(Debug, Clone, Default)]
pub struct StreamEvent {
    pub delta: String,
    pub done: bool,
    pub usage: Option<Usage>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt: u32,
    pub completion: u32,
    pub total: u32,
}

/// A non-streaming completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub status: HealthStatus,
    pub last_check: SystemTime,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Unknown,
            last_check: SystemTime::now(),
            last_error: None,
            consecutive_failures: 0,
        }
    }
}

/// Totals since process start; `avg_latency` is derived at read time.
#[derive(Debug, Clone, Default)]
pub struct ProviderMetrics {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub total_latency_ms: u64,
}

impl ProviderMetrics {
    pub fn avg_latency_ms(&self) -> f64 {
        self.total_latency_ms as f64 / self.requests.max(1) as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub max_context: u32,
    pub streaming: bool,
    pub function_calling: bool,
    pub image_input: bool,
    pub document_input: bool,
    pub rate_limits: HashMap<String, u32>,
}

#[derive(Debug, Clone)]
pub struct Model {
    pub id: String,
    pub display_name: String,
    pub max_context: u32,
}
