//! The uniform provider contract (spec §4.1).

use async_trait::async_trait;
use std::pin::Pin;

use super::types::*;

/// Error taxonomy for the provider layer.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ProviderError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limited{}", retry_after.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimit { retry_after: Option<u64> },

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("provider error: {message}")]
    Other { message: String, retryable: bool },
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Connection(_) => true,
            ProviderError::Authentication(_) => false,
            ProviderError::RateLimit { .. } => true,
            ProviderError::Timeout(_) => true,
            ProviderError::Server { .. } => true,
            ProviderError::Other { retryable, .. } => *retryable,
        }
    }

    pub fn resolution(&self) -> String {
        match self {
            ProviderError::Connection(_) => {
                "ensure the model server is reachable (local server running, or network up for a remote API)".to_string()
            }
            ProviderError::Authentication(_) => {
                "check the provider's API key is set and valid".to_string()
            }
            ProviderError::RateLimit { retry_after } => match retry_after {
                Some(s) => format!("rate limited; wait {s}s and retry"),
                None => "rate limited; wait and retry".to_string(),
            },
            ProviderError::Timeout(_) => {
                "request timed out; shorten the input or switch to a lower-latency provider".to_string()
            }
            ProviderError::Server { .. } => "the provider is having issues; retry shortly".to_string(),
            ProviderError::Other { message, .. } => message.clone(),
        }
    }

    /// Maps an HTTP status code to the taxonomy per spec §4.1.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => ProviderError::Authentication(body.to_string()),
            429 => ProviderError::RateLimit { retry_after: None },
            500..=599 => ProviderError::Server {
                status,
                message: body.to_string(),
            },
            _ => ProviderError::Other {
                message: format!("HTTP {status}: {body}"),
                retryable: false,
            },
        }
    }
}

/// Callback invoked once per ordered [`StreamEvent`].
pub type OnEvent<'a> = &'a mut (dyn FnMut(StreamEvent) + Send);

/// Cooperative cancellation signal shared across a request's suspension
/// points (stream read, tool execution, approval prompt, retry backoff).
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// One capability a provider can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Streaming,
    FunctionCalling,
    ImageInput,
    DocumentInput,
}

/// Uniform surface over a heterogeneous chat/completion backend (spec §4.1).
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn display_name(&self) -> &str;
    fn capabilities(&self) -> Capabilities;

    /// Cheap self-test; on success sets health=healthy, on failure propagates
    /// and leaves health=unhealthy.
    async fn initialize(&self) -> Result<(), ProviderError>;

    /// Idempotent, bounded-time connectivity probe.
    async fn test_connection(&self) -> bool;

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Streams a completion, invoking `on_event` with ordered [`StreamEvent`]s
    /// until `done`. Honors `cancel` on a best-effort basis (at most one
    /// in-flight chunk after cancellation is observed).
    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
        on_event: OnEvent<'_>,
        cancel: &CancelToken,
    ) -> Result<(), ProviderError>;

    fn list_models(&self) -> Vec<Model>;
    fn get_model(&self, id: &str) -> Option<Model> {
        self.list_models().into_iter().find(|m| m.id == id)
    }

    /// Pure pricing calculation; per-adapter table.
    fn calculate_cost(&self, prompt_tokens: u32, completion_tokens: u32, model: Option<&str>) -> f64;

    fn health(&self) -> ProviderHealth;
    fn metrics(&self) -> ProviderMetrics;

    /// Applies a live settings change (endpoint, model, credential rotation)
    /// without tearing down and reconstructing the adapter. No-op by default;
    /// adapters override the fields they hold mutably.
    fn update_config(&self, _update: ProviderConfigUpdate) {}

    fn cleanup(&self) {}
}

/// Partial update applied via [`Provider::update_config`]. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfigUpdate {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Type-erased boxed future, matching the shape used by the tool contract.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
