//! Anthropic-style remote HTTPS adapter.
//!
//! `messages` array of user/assistant only, `system` as a top-level string,
//! SSE with typed events including `content_block_delta` (`.delta.text`) and
//! `message_stop`; auth via `x-api-key` + `anthropic-version`. Grounded on
//! a prior internal SSE chat adapter module.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::retry::RetryPolicy;
use super::traits::{CancelToken, OnEvent, Provider, ProviderConfigUpdate, ProviderError};
use super::types::*;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: RwLock<String>,
    api_key: RwLock<String>,
    model: RwLock<String>,
    retry: RetryPolicy,
    health: Arc<RwLock<ProviderHealth>>,
    metrics: Arc<RwLock<ProviderMetrics>>,
}

impl AnthropicProvider {
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

    /// Splits the uniform message history into Anthropic's user/assistant
    /// `messages` plus a top-level `system` string.
    fn build_request_body(
        history: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> (Vec<AnthropicMessage>, Option<String>, Option<Vec<AnthropicTool>>) {
        let mut messages = Vec::new();
        let mut system = None;

        for msg in history {
            match msg.role {
                Role::System => {
                    if system.is_none() {
                        system = Some(msg.content.clone());
                    }
                }
                Role::User => {
                    messages.push(AnthropicMessage {
                        role: "user".to_string(),
                        content: AnthropicContent::Text(msg.content.clone()),
                    });
                }
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    if !msg.content.is_empty() {
                        blocks.push(AnthropicContentBlock::Text { text: msg.content.clone() });
                    }
                    for tc in &msg.tool_calls {
                        blocks.push(AnthropicContentBlock::ToolUse {
                            id: tc.id.clone(),
                            name: tc.name.clone(),
                            input: tc.arguments.clone(),
                        });
                    }
                    if !blocks.is_empty() {
                        messages.push(AnthropicMessage {
                            role: "assistant".to_string(),
                            content: AnthropicContent::Blocks(blocks),
                        });
                    }
                }
                Role::Tool => {
                    if let Some(id) = &msg.tool_call_id {
                        messages.push(AnthropicMessage {
                            role: "user".to_string(),
                            content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                                tool_use_id: id.clone(),
                                content: msg.content.clone(),
                            }]),
                        });
                    }
                }
            }
        }

        let anthropic_tools = tools.map(|ts| {
            ts.iter()
                .map(|t| AnthropicTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: schema_to_json(t),
                })
                .collect()
        });

        (messages, system, anthropic_tools)
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
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<AnthropicContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
}

#[derive(Debug, Deserialize)]
struct MessageStart {
    message: MessageStartInner,
}

#[derive(Debug, Deserialize)]
struct MessageStartInner {
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize, Clone)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ContentBlockStart {
    index: usize,
    content_block: StartBlock,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StartBlock {
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ContentBlockDelta {
    index: usize,
    delta: ContentDelta,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    delta: MessageDeltaInner,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaInner {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn display_name(&self) -> &str {
        "Anthropic"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_context: 200_000,
            streaming: true,
            function_calling: true,
            image_input: true,
            document_input: true,
            rate_limits: Default::default(),
        }
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        if self.api_key().trim().is_empty() {
            if let Ok(mut h) = self.health.write() {
                h.status = HealthStatus::Unhealthy;
            }
            return Err(ProviderError::Authentication("missing Anthropic API key".to_string()));
        }
        if let Ok(mut h) = self.health.write() {
            h.status = HealthStatus::Healthy;
        }
        Ok(())
    }

    async fn test_connection(&self) -> bool {
        let url = format!("{}/models", self.base_url());
        matches!(
            self.client
                .get(&url)
                .header("x-api-key", self.api_key())
                .header("anthropic-version", ANTHROPIC_VERSION)
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
        Ok(CompletionResponse { content: full, tool_calls, usage })
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

        let (wire_messages, system, tools) = Self::build_request_body(&history, options.tools.as_deref());

        let request = CreateMessageRequest {
            model,
            max_tokens: options.max_tokens.unwrap_or(4096),
            messages: wire_messages,
            system,
            temperature: options.temperature,
            stream: true,
            tools,
        };

        let url = format!("{}/messages", self.base_url());
        let response = self
            .retry
            .run(cancel, || async {
                self.client
                    .post(&url)
                    .header("x-api-key", self.api_key())
                    .header("anthropic-version", ANTHROPIC_VERSION)
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

        let mut input_usage = AnthropicUsage { input_tokens: 0, output_tokens: 0 };
        let mut tool_names: HashMap<usize, (String, String)> = HashMap::new(); // index -> (id, name)
        let mut tool_args: HashMap<usize, String> = HashMap::new();
        let mut final_usage: Option<Usage> = None;

        while let Some(event_result) = event_stream.next().await {
            if cancel.is_cancelled() {
                break;
            }
            let event = match event_result {
                Ok(e) => e,
                Err(err) => {
                    let perr = ProviderError::Connection(format!("SSE framing error: {err}"));
                    on_event(StreamEvent { delta: String::new(), done: true, usage: None, tool_calls: None });
                    self.record_outcome(false, started.elapsed(), 0, 0.0, Some(&perr.to_string()));
                    return Err(perr);
                }
            };

            if event.event == "message_stop" {
                break;
            }
            if event.data.trim().is_empty() {
                continue;
            }

            match event.event.as_str() {
                "message_start" => {
                    if let Ok(start) = serde_json::from_str::<MessageStart>(&event.data) {
                        input_usage.input_tokens = start.message.usage.input_tokens;
                    }
                }
                "content_block_start" => {
                    if let Ok(start) = serde_json::from_str::<ContentBlockStart>(&event.data) {
                        if let StartBlock::ToolUse { id, name } = start.content_block {
                            tool_names.insert(start.index, (id, name));
                        }
                    }
                }
                "content_block_delta" => {
                    if let Ok(delta) = serde_json::from_str::<ContentBlockDelta>(&event.data) {
                        match delta.delta {
                            ContentDelta::TextDelta { text } => {
                                on_event(StreamEvent { delta: text, done: false, usage: None, tool_calls: None });
                            }
                            ContentDelta::InputJsonDelta { partial_json } => {
                                tool_args.entry(delta.index).or_default().push_str(&partial_json);
                            }
                            ContentDelta::Other => {}
                        }
                    }
                }
                "message_delta" => {
                    if let Ok(msg_delta) = serde_json::from_str::<MessageDelta>(&event.data) {
                        let _ = msg_delta.delta.stop_reason;
                        if let Some(u) = msg_delta.usage {
                            input_usage.output_tokens = u.output_tokens;
                        }
                        final_usage = Some(Usage {
                            prompt: input_usage.input_tokens,
                            completion: input_usage.output_tokens,
                            total: input_usage.input_tokens + input_usage.output_tokens,
                        });
                    }
                }
                _ => {}
            }
        }

        let tool_calls: Vec<ToolCall> = tool_names
            .into_iter()
            .map(|(idx, (id, name))| {
                let args = tool_args.get(&idx).cloned().unwrap_or_default();
                let arguments = serde_json::from_str(&args).unwrap_or(serde_json::Value::Null);
                ToolCall { id, name, arguments }
            })
            .collect();

        let cost = final_usage
            .map(|u| self.calculate_cost(u.prompt, u.completion, Some(&self.model())))
            .unwrap_or(0.0);

        on_event(StreamEvent {
            delta: String::new(),
            done: true,
            usage: final_usage,
            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
        });

        self.record_outcome(true, started.elapsed(), final_usage.map(|u| u.total).unwrap_or(0), cost, None);
        Ok(())
    }

    fn list_models(&self) -> Vec<Model> {
        vec![
            Model { id: "claude-opus-4-5-20251101".into(), display_name: "Claude Opus 4.5".into(), max_context: 200_000 },
            Model { id: "claude-sonnet-4-5-20250929".into(), display_name: "Claude Sonnet 4.5".into(), max_context: 200_000 },
        ]
    }

    fn calculate_cost(&self, prompt_tokens: u32, completion_tokens: u32, model: Option<&str>) -> f64 {
        let model_name = self.model();
        let (prompt_rate, completion_rate) = match model.unwrap_or(&model_name) {
            m if m.contains("opus") => (15.00, 75.00),
            m if m.contains("haiku") => (0.80, 4.00),
            _ => (3.00, 15.00),
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
