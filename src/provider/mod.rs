//! Multi-provider abstraction layer (spec C1).
//!
//! A uniform [`Provider`] trait with three concrete wire adapters — a local
//! NDJSON-streaming HTTP server, an OpenAI-compatible SSE backend, and an
//! Anthropic-compatible SSE backend — plus the shared retry policy and data
//! model they're built on.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod retry;
pub mod traits;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use retry::RetryPolicy;
pub use traits::{BoxFuture, CancelToken, Capability, OnEvent, Provider, ProviderConfigUpdate, ProviderError};
pub use types::*;
