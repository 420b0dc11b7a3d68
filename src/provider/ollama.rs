//! Local HTTP model server adapter.
//!
//! Speaks the `/tags`, `/chat`, `/generate` surface with newline-delimited
//! JSON streaming frames `{message:{content:...}, done:bool}`, the trailing
//! frame additionally carrying usage counters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::retry::RetryPolicy;
use super::traits::{CancelToken, OnEvent, Provider, ProviderConfigUpdate, ProviderError};
use super::types::*;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: RwLock<String>,
    model: RwLock<String>,
    retry: RetryPolicy,
    health: Arc<RwLock<ProviderHealth>>,
    metrics: Arc<RwLock<ProviderMetrics>>,
}

impl OllamaProvider {
    pub fn new(model: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: RwLock::new(base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string())),
            model: RwLock::new(model),
            retry: RetryPolicy::default(),
            health: Arc::new(RwLock::new(ProviderHealth::default())),
            metrics: Arc::new(RwLock::new(ProviderMetrics::default())),
        }
    }

    fn base_url(&self) -> String {
        self.base_url.read().map(|u| u.clone()).unwrap_or_default()
    }

    fn model(&self) -> String {
        self.model.read().map(|m| m.clone()).unwrap_or_default()
    }

    fn record_outcome(&self, ok: bool, latency: Duration, tokens: u32, err: Option<&str>) {
        if let Ok(mut m) = self.metrics.write() {
            m.requests += 1;
            if ok {
                m.successes += 1;
            } else {
                m.failures += 1;
            }
            m.total_tokens += tokens as u64;
            m.total_latency_ms += latency.as_millis() as u64;
        }
        if let Ok(mut h) = self.health.write() {
            if ok {
                h.consecutive_failures = 0;
                h.status = HealthStatus::Healthy;
                h.last_error = None;
            } else {
                h.consecutive_failures += 1;
                h.last_error = err.map(str::to_string);
                h.status = if h.consecutive_failures >= 6 {
                    HealthStatus::Unhealthy
                } else if h.consecutive_failures >= 3 {
                    HealthStatus::Degraded
                } else {
                    h.status
                };
            }
            h.last_check = std::time::SystemTime::now();
        }
    }

    fn to_wire_messages(messages: &[Message]) -> Vec<WireMessage> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect()
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize, Default)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Deserialize)]
struct ChatFrame {
    #[serde(default)]
    message: Option<FrameMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct FrameMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn display_name(&self) -> &str {
        "Ollama (local)"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_context: 8192,
            streaming: true,
            function_calling: false,
            image_input: false,
            document_input: false,
            rate_limits: Default::default(),
        }
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        if self.test_connection().await {
            if let Ok(mut h) = self.health.write() {
                h.status = HealthStatus::Healthy;
            }
            Ok(())
        } else {
            if let Ok(mut h) = self.health.write() {
                h.status = HealthStatus::Unhealthy;
                h.last_error = Some("self-test failed".to_string());
            }
            Err(ProviderError::Connection(
                "local model server not reachable".to_string(),
            ))
        }
    }

    async fn test_connection(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url());
        matches!(
            self.client
                .get(&url)
                .timeout(Duration::from_secs(5))
                .send()
                .await,
            Ok(resp) if resp.status().is_success()
        )
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        let mut full = String::new();
        let mut usage = None;
        let cancel = CancelToken::new();
        self.complete_stream(
            messages,
            &CompletionOptions {
                stream: false,
                ..options.clone()
            },
            &mut |ev| {
                full.push_str(&ev.delta);
                if ev.done {
                    usage = ev.usage;
                }
            },
            &cancel,
        )
        .await?;
        Ok(CompletionResponse {
            content: full,
            tool_calls: Vec::new(),
            usage,
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
        on_event: OnEvent<'_>,
        cancel: &CancelToken,
    ) -> Result<(), ProviderError> {
        let model = options.model.clone().unwrap_or_else(|| self.model());
        let started = Instant::now();

        let body = ChatRequest {
            model,
            messages: Self::to_wire_messages(messages),
            stream: true,
            options: Some(ChatOptions {
                temperature: options.temperature,
                top_p: options.top_p,
                top_k: options.top_k,
            }),
        };

        let url = format!("{}/api/chat", self.base_url());
        let response = self
            .retry
            .run(cancel, || async {
                self.client
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| ProviderError::Connection(e.to_string()))
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let err = ProviderError::from_status(status, &text);
            self.record_outcome(false, started.elapsed(), 0, Some(&err.to_string()));
            return Err(err);
        }

        use futures::StreamExt;
        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut full_content = String::new();
        let mut final_usage = None;

        while let Some(chunk) = byte_stream.next().await {
            if cancel.is_cancelled() {
                break;
            }
            let chunk = chunk.map_err(|e| ProviderError::Connection(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);
                if line.is_empty() {
                    continue;
                }
                let frame: ChatFrame = match serde_json::from_str(&line) {
                    Ok(f) => f,
                    Err(e) => {
                        log::debug!("ollama: skipping malformed NDJSON frame: {e}");
                        continue;
                    }
                };

                if let Some(msg) = &frame.message {
                    if !msg.content.is_empty() {
                        full_content.push_str(&msg.content);
                        on_event(StreamEvent {
                            delta: msg.content.clone(),
                            done: false,
                            usage: None,
                            tool_calls: None,
                        });
                    }
                }

                if frame.done {
                    let usage = Usage {
                        prompt: frame.prompt_eval_count.unwrap_or(0),
                        completion: frame.eval_count.unwrap_or(0),
                        total: frame.prompt_eval_count.unwrap_or(0) + frame.eval_count.unwrap_or(0),
                    };
                    final_usage = Some(usage);
                    on_event(StreamEvent {
                        delta: String::new(),
                        done: true,
                        usage: Some(usage),
                        tool_calls: None,
                    });
                }
            }
        }

        let tokens = final_usage.map(|u| u.total).unwrap_or(0);
        self.record_outcome(true, started.elapsed(), tokens, None);
        Ok(())
    }

    fn list_models(&self) -> Vec<Model> {
        // Synchronous trait surface; callers needing the live list use
        // `list_tags` below. This returns the configured model only.
        let model = self.model();
        vec![Model {
            id: model.clone(),
            display_name: model,
            max_context: 8192,
        }]
    }

    fn calculate_cost(&self, _prompt_tokens: u32, _completion_tokens: u32, _model: Option<&str>) -> f64 {
        0.0 // local inference has no per-token cost
    }

    fn health(&self) -> ProviderHealth {
        self.health.read().map(|h| h.clone()).unwrap_or_default()
    }

    fn metrics(&self) -> ProviderMetrics {
        self.metrics.read().map(|m| m.clone()).unwrap_or_default()
    }

    fn update_config(&self, update: ProviderConfigUpdate) {
        if let Some(model) = update.model {
            if let Ok(mut m) = self.model.write() {
                *m = model;
            }
        }
        if let Some(base_url) = update.base_url {
            if let Ok(mut u) = self.base_url.write() {
                *u = base_url;
            }
        }
    }
}

impl OllamaProvider {
    /// Queries the live `/api/tags` endpoint for installed models.
    pub async fn list_tags(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url());
        let resp: TagsResponse = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?
            .json()
            .await
            .map_err(|e| ProviderError::Other {
                message: e.to_string(),
                retryable: false,
            })?;
        Ok(resp.models.into_iter().map(|m| m.name).collect())
    }
}
