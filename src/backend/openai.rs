use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::backend::prompt::render_prompt;
use crate::backend::utils::{check_response_status, extract_json_from_markdown, handle_http_error};
use crate::backend::{PromptContext, ReasoningGateway, RequestKind};
use crate::error::GatewayError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI models available for reasoning requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Model {
    Gpt4O,
    Gpt4OMini,
    Gpt41,
    /// Any other model name understood by the endpoint
    Custom(String),
}

impl Model {
    pub fn as_str(&self) -> &str {
        match self {
            Model::Gpt4O => "gpt-4o",
            Model::Gpt4OMini => "gpt-4o-mini",
            Model::Gpt41 => "gpt-4.1",
            Model::Custom(name) => name,
        }
    }
}

/// Configuration for the OpenAI reasoning gateway
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Model for triage and diagnosis requests
    pub model: Model,
    /// Model for summarize requests
    pub summary_model: Model,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
    pub base_url: String,
}

/// Reasoning gateway backed by an OpenAI-compatible chat-completions endpoint.
///
/// The expected result schema is sent as a forced function call, so the
/// answer comes back as the function's JSON arguments.
///
/// # Examples
///
/// ```no_run
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use clinflow::{OpenAiGateway, OpenAiModel};
///
/// let gateway = OpenAiGateway::from_env()?
///     .model(OpenAiModel::Gpt4O)
///     .temperature(0.0)
///     .build();
/// # Ok(())
/// # }
/// ```
pub struct OpenAiGateway {
    config: OpenAiConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct FunctionDef<'a> {
    name: &'a str,
    description: &'static str,
    parameters: &'a Value,
}

#[derive(Debug, Serialize)]
struct ToolDef<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: FunctionDef<'a>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    tools: Vec<ToolDef<'a>>,
    tool_choice: Value,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

impl OpenAiGateway {
    /// Create a new gateway with default configuration
    #[instrument(name = "openai_gateway_new", skip(api_key))]
    pub fn new(api_key: impl Into<String>) -> Result<Self, GatewayError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(GatewayError::Rejected {
                status: 401,
                message: "OpenAI API key is empty".to_string(),
            });
        }
        info!("Creating new OpenAI reasoning gateway");
        trace!("API key length: {}", api_key.len());

        let config = OpenAiConfig {
            api_key,
            model: Model::Gpt4O,
            summary_model: Model::Gpt4OMini,
            temperature: 0.0, // deterministic clinical output
            max_tokens: None,
            timeout: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        };

        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    /// Create a gateway reading the API key from `OPENAI_API_KEY`.
    #[instrument(name = "openai_gateway_from_env")]
    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| GatewayError::Rejected {
            status: 401,
            message: "OPENAI_API_KEY is not set".to_string(),
        })?;
        Self::new(api_key)
    }

    /// Set the model used for triage and diagnosis
    #[instrument(skip(self))]
    pub fn model(mut self, model: Model) -> Self {
        debug!(previous_model = ?self.config.model, new_model = ?model, "Setting OpenAI model");
        self.config.model = model;
        self
    }

    /// Set the model used for document summarization
    #[instrument(skip(self))]
    pub fn summary_model(mut self, model: Model) -> Self {
        debug!(previous_model = ?self.config.summary_model, new_model = ?model, "Setting summary model");
        self.config.summary_model = model;
        self
    }

    /// Set the temperature (0.0 to 1.0, lower = more deterministic)
    #[instrument(skip(self))]
    pub fn temperature(mut self, temp: f32) -> Self {
        debug!(
            previous_temp = self.config.temperature,
            new_temp = temp,
            "Setting temperature"
        );
        self.config.temperature = temp;
        self
    }

    /// Set the maximum tokens to generate
    #[instrument(skip(self))]
    pub fn max_tokens(mut self, max: u32) -> Self {
        debug!(previous_max = ?self.config.max_tokens, new_max = max, "Setting max_tokens");
        self.config.max_tokens = Some(max.max(1));
        self
    }

    /// Set the HTTP timeout applied to each request.
    ///
    /// The engine applies its own per-call deadline on top of this.
    #[instrument(skip(self))]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        debug!(previous_timeout = ?self.config.timeout, new_timeout = ?timeout, "Setting timeout");
        self.config.timeout = Some(timeout);
        self
    }

    /// Point the gateway at another OpenAI-compatible endpoint
    #[instrument(skip(self))]
    pub fn base_url(mut self, base_url: impl Into<String> + std::fmt::Debug) -> Self {
        let base_url = base_url.into();
        debug!(new_base_url = %base_url, "Setting base URL");
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Build the gateway (chainable after configuration)
    #[instrument(skip(self))]
    pub fn build(mut self) -> Self {
        info!(
            model = self.config.model.as_str(),
            summary_model = self.config.summary_model.as_str(),
            temperature = self.config.temperature,
            timeout = ?self.config.timeout,
            "OpenAI gateway configuration complete"
        );

        let mut client_builder = reqwest::Client::builder();
        if let Some(timeout) = self.config.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        self.client = client_builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build reqwest client with timeout, using default");
            reqwest::Client::new()
        });

        self
    }

    fn model_for(&self, kind: RequestKind) -> &Model {
        match kind {
            RequestKind::Summarize => &self.config.summary_model,
            RequestKind::Triage | RequestKind::Diagnosis => &self.config.model,
        }
    }
}

#[async_trait]
impl ReasoningGateway for OpenAiGateway {
    #[instrument(
        name = "openai_infer",
        skip(self, context),
        fields(run_id = %context.run_id, schema = %context.schema_name)
    )]
    async fn infer(
        &self,
        kind: RequestKind,
        context: &PromptContext,
    ) -> Result<Value, GatewayError> {
        let model = self.model_for(kind);
        let prompt = render_prompt(kind, context);
        debug!(model = model.as_str(), prompt_len = prompt.len(), "Building OpenAI request");

        let request = ChatCompletionRequest {
            model: model.as_str(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            tools: vec![ToolDef {
                tool_type: "function",
                function: FunctionDef {
                    name: &context.schema_name,
                    description: "Return the answer in exactly this structure, including all required fields.",
                    parameters: context.schema.to_json(),
                },
            }],
            tool_choice: json!({"type": "function", "function": {"name": context.schema_name}}),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| handle_http_error(e, "OpenAI"))?;
        let response = check_response_status(response, "OpenAI").await?;

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse JSON response from OpenAI");
            GatewayError::MalformedOutput(e.to_string())
        })?;

        let Some(choice) = completion.choices.into_iter().next() else {
            error!("OpenAI returned empty choices array");
            return Err(GatewayError::MalformedOutput(
                "no completion choices returned".to_string(),
            ));
        };
        trace!(finish_reason = ?choice.finish_reason, "Completion finish reason");

        if let Some(call) = choice.message.tool_calls.into_iter().next() {
            debug!(
                function_name = %call.function.name,
                args_len = call.function.arguments.len(),
                "Function call received from OpenAI"
            );
            return serde_json::from_str(&call.function.arguments).map_err(|e| {
                error!(error = %e, "Function arguments are not valid JSON");
                GatewayError::MalformedOutput(e.to_string())
            });
        }

        match choice.message.content {
            Some(content) => {
                warn!(
                    content_len = content.len(),
                    "No function call in response, attempting to parse content as JSON"
                );
                serde_json::from_str(&extract_json_from_markdown(&content)).map_err(|e| {
                    error!(error = %e, "Failed to parse content as JSON");
                    GatewayError::MalformedOutput(e.to_string())
                })
            }
            None => {
                error!("No function call or content in OpenAI response");
                Err(GatewayError::MalformedOutput(
                    "no function call or content in response".to_string(),
                ))
            }
        }
    }
}
