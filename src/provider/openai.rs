//! OpenAI-style remote HTTPS adapter.
//!
//! JSON request with `messages[{role,content}]`, optional `tools`; streaming
//! via Server-Sent Events `data: ...` lines terminated by `data: [DONE]`.
//! Grounded on a prior internal SSE chat adapter module, generalized behind the
//! uniform [`Provider`] contract.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::retry::RetryPolicy;
use super::traits::{CancelToken, OnEvent, Provider, ProviderConfigUpdate, ProviderError};
use super::types::*;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: RwLock<String>,
    api_key: RwLock<String>,
    model: RwLock<String>,
    retry: RetryPolicy,
    health: Arc<RwLock<ProviderHealth>>,
    metrics: Arc<RwLock<ProviderMetrics>>,
}

impl OpenAiProvider {
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: RwLock::new(base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string())),
            api_key: RwLock::new(api_key),
            model: RwLock::new(model),
            retry: RetryPolicy::default(),
            health: Arc::new(RwLock::new(ProviderHealth::default())),
            metrics: Arc::new(RwLock::new(ProviderMetrics::default())),
        }
    }

    fn base_url(&self) -> String {
        self.base_url.read().map(|u| u.clone()).unwrap_or_default()
    }

    fn api_key(&self) -> String {
        self.api_key.read().map(|k| k.clone()).unwrap_or_default()
    }

    fn model(&self) -> String {
        self.model.read().map(|m| m.clone()).unwrap_or_default()
    }

    fn record_outcome(&self, ok: bool, latency: Duration, tokens: u32, cost: f64, err: Option<&str>) {
        if let Ok(mut m) = self.metrics.write() {
            m.requests += 1;
            if ok {
                m.successes += 1;
            } else {
                m.failures += 1;
            }
            m.total_tokens += tokens as u64;
            m.total_cost += cost;
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

    fn to_wire(history: &[Message], tools: Option<&[ToolSchema]>) -> (Vec<ChatMessage>, Option<Vec<OpenAiTool>>) {
        let messages = history
            .iter()
            .map(|m| match m.role {
                Role::System => ChatMessage::System {
                    content: m.content.clone(),
                },
                Role::User => ChatMessage::User {
                    content: m.content.clone(),
                },
                Role::Assistant => ChatMessage::Assistant {
                    content: if m.content.is_empty() {
                        None
                    } else {
                        Some(m.content.clone())
                    },
                    tool_calls: if m.tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            m.tool_calls
                                .iter()
                                .map(|tc| OpenAiToolCall {
                                    id: tc.id.clone(),
                                    tool_type: "function".to_string(),
                                    function: OpenAiFunctionCall {
                                        name: tc.name.clone(),
                                        arguments: tc.arguments.to_string(),
                                    },
                                })
                                .collect(),
                        )
                    },
                },
                Role::Tool => ChatMessage::Tool {
                    content: m.content.clone(),
                    tool_call_id: m.tool_call_id.clone().unwrap_or_default(),
                },
            })
            .collect();

        let wire_tools = tools.map(|ts| {
            ts.iter()
                .map(|t| OpenAiTool {
                    tool_type: "function".to_string(),
                    function: OpenAiFunction {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: schema_to_json(t),
                    },
                })
                .collect()
        });

        (messages, wire_tools)
    }
}

fn schema_to_json(schema: &ToolSchema) -> serde_json::Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for p in &schema.parameters {
        let mut prop = serde_json::json!({
            "type": match p.param_type {
                ParamType::String => "string",
                ParamType::Number => "number",
                ParamType::Boolean => "boolean",
                ParamType::Array => "array",
                ParamType::Object => "object",
            },
            "description": p.description,
        });
        if let Some(enum_values) = &p.enum_values {
            prop["enum"] = serde_json::json!(enum_values);
        }
        properties.insert(p.name.clone(), prop);
        if p.required {
            required.push(p.name.clone());
        }
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAiTool>>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize, Clone)]
struct OpenAiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize, Clone)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "role")]
enum ChatMessage {
    #[serde(rename = "system")]
    System { content: String },
    #[serde(rename = "user")]
    User { content: String },
    #[serde(rename = "assistant")]
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<OpenAiToolCall>>,
    },
    #[serde(rename = "tool")]
    Tool { content: String, tool_call_id: String },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Delta,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[allow(dead_code)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
struct ChunkUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

/// Accumulates per-call-id tool call deltas into completed [`ToolCall`]s.
#[derive(Default)]
struct ToolCallAssembler {
    order: Vec<String>,
    calls: HashMap<String, (String, String)>, // id -> (name, arguments json)
}

impl ToolCallAssembler {
    fn process(&mut self, id_hint: usize, delta: &ToolCallDelta) {
        let id = delta.id.clone().unwrap_or_else(|| id_hint.to_string());
        if !self.calls.contains_key(&id) {
            self.order.push(id.clone());
        }
        let entry = self.calls.entry(id).or_insert_with(|| (String::new(), String::new()));
        if let Some(f) = &delta.function {
            if let Some(name) = &f.name {
                entry.0 = name.clone();
            }
            if let Some(args) = &f.arguments {
                entry.1.push_str(args);
            }
        }
    }

    fn finish(self) -> Vec<ToolCall> {
        self.order
            .into_iter()
            .filter_map(|id| {
                let (name, args) = self.calls.get(&id)?;
                let arguments = serde_json::from_str(args).unwrap_or(serde_json::Value::Null);
                Some(ToolCall {
                    id,
                    name: name.clone(),
                    arguments,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn display_name(&self) -> &str {
        "OpenAI"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_context: 128_000,
            streaming: true,
            function_calling: true,
            image_input: true,
            document_input: false,
            rate_limits: Default::default(),
        }
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        if self.api_key().trim().is_empty() {
            if let Ok(mut h) = self.health.write() {
                h.status = HealthStatus::Unhealthy;
            }
            return Err(ProviderError::Authentication("missing OpenAI API key".to_string()));
        }
        if self.test_connection().await {
            if let Ok(mut h) = self.health.write() {
                h.status = HealthStatus::Healthy;
            }
            Ok(())
        } else {
            if let Ok(mut h) = self.health.write() {
                h.status = HealthStatus::Unhealthy;
            }
            Err(ProviderError::Connection("OpenAI API unreachable".to_string()))
        }
    }

    async fn test_connection(&self) -> bool {
        let url = format!("{}/models", self.base_url());
        matches!(
            self.client
                .get(&url)
                .bearer_auth(self.api_key())
                .timeout(Duration::from_secs(10))
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
        let mut tool_calls = Vec::new();
        let mut usage = None;
        let cancel = CancelToken::new();
        self.complete_stream(
            messages,
            options,
            &mut |ev| {
                full.push_str(&ev.delta);
                if let Some(tc) = ev.tool_calls {
                    tool_calls = tc;
                }
                if ev.done {
                    usage = ev.usage;
                }
            },
            &cancel,
        )
        .await?;
        Ok(CompletionResponse {
            content: full,
            tool_calls,
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

        let mut history = Vec::new();
        if let Some(sys) = &options.system {
            history.push(Message::system(sys.clone()));
        }
        history.extend_from_slice(messages);

        let (wire_messages, wire_tools) = Self::to_wire(&history, options.tools.as_deref());

        let request = ChatCompletionRequest {
            model,
            messages: wire_messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: true,
            stream_options: Some(StreamOptions { include_usage: true }),
            tools: wire_tools,
        };

        let url = format!("{}/chat/completions", self.base_url());
        let response = self
            .retry
            .run(cancel, || async {
                self.client
                    .post(&url)
                    .bearer_auth(self.api_key())
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| ProviderError::Connection(e.to_string()))
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let err = ProviderError::from_status(status, &text);
            self.record_outcome(false, started.elapsed(), 0, 0.0, Some(&err.to_string()));
            return Err(err);
        }

        use futures::StreamExt;
        let mut event_stream = response.bytes_stream().eventsource();
        let mut assembler = ToolCallAssembler::default();
        let mut final_usage: Option<ChunkUsage> = None;
        let mut idx = 0usize;

        while let Some(event_result) = event_stream.next().await {
            if cancel.is_cancelled() {
                break;
            }
            let event = match event_result {
                Ok(e) => e,
                Err(err) => {
                    let perr = ProviderError::Connection(format!("SSE framing error: {err}"));
                    on_event(StreamEvent {
                        delta: String::new(),
                        done: true,
                        usage: None,
                        tool_calls: None,
                    });
                    self.record_outcome(false, started.elapsed(), 0, 0.0, Some(&perr.to_string()));
                    return Err(perr);
                }
            };

            if event.data.trim() == "[DONE]" {
                break;
            }
            if event.data.trim().is_empty() {
                continue;
            }

            let chunk: ChatCompletionChunk = match serde_json::from_str(&event.data) {
                Ok(c) => c,
                Err(e) => {
                    log::debug!("openai: skipping malformed SSE chunk: {e}");
                    continue;
                }
            };

            if let Some(usage) = &chunk.usage {
                final_usage = Some(usage.clone());
            }

            for choice in &chunk.choices {
                if let Some(content) = &choice.delta.content {
                    if !content.is_empty() {
                        on_event(StreamEvent {
                            delta: content.clone(),
                            done: false,
                            usage: None,
                            tool_calls: None,
                        });
                    }
                }
                if let Some(deltas) = &choice.delta.tool_calls {
                    for d in deltas {
                        assembler.process(idx, d);
                        idx += 1;
                    }
                }
            }
        }

        let tool_calls = assembler.finish();
        let usage = final_usage.map(|u| Usage {
            prompt: u.prompt_tokens,
            completion: u.completion_tokens,
            total: if u.total_tokens > 0 {
                u.total_tokens
            } else {
                u.prompt_tokens + u.completion_tokens
            },
        });

        let cost = usage
            .map(|u| self.calculate_cost(u.prompt, u.completion, Some(&self.model())))
            .unwrap_or(0.0);

        on_event(StreamEvent {
            delta: String::new(),
            done: true,
            usage,
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        });

        self.record_outcome(true, started.elapsed(), usage.map(|u| u.total).unwrap_or(0), cost, None);
        Ok(())
    }

    fn list_models(&self) -> Vec<Model> {
        vec![
            Model { id: "gpt-4o".into(), display_name: "GPT-4o".into(), max_context: 128_000 },
            Model { id: "gpt-4o-mini".into(), display_name: "GPT-4o mini".into(), max_context: 128_000 },
        ]
    }

    fn calculate_cost(&self, prompt_tokens: u32, completion_tokens: u32, model: Option<&str>) -> f64 {
        let model_name = self.model();
        let (prompt_rate, completion_rate) = match model.unwrap_or(&model_name) {
            m if m.starts_with("gpt-4o-mini") => (0.15, 0.60),
            m if m.starts_with("gpt-4o") => (2.50, 10.00),
            _ => (1.00, 2.00),
        };
        (prompt_tokens as f64 / 1_000_000.0) * prompt_rate
            + (completion_tokens as f64 / 1_000_000.0) * completion_rate
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
        if let Some(api_key) = update.api_key {
            if let Ok(mut k) = self.api_key.write() {
                *k = api_key;
            }
        }
    }
}
