//! OpenAI chat completions connector

use crate::{
    EgressError, Result,
    client::{
        HttpClientConfig, ProviderResponseHandler, create_client, log_response_headers,
        parse_body,
    },
};
use async_trait::async_trait;
use promptrun_core::{
    normalized::ToolCall,
    provider::{ConversationInput, HistoryItem, LlmClient, ProviderConfig, ToolConfig},
    raw::{ChatCompletionResponse, RawProviderResponse, WireFunctionCall, WireToolCall},
};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Polling behaviour for assistants runs
#[derive(Debug, Clone, Copy)]
pub struct RunPollConfig {
    /// Delay between run status checks
    pub interval: Duration,

    /// Status checks before giving up with a timeout
    pub max_attempts: u32,
}

impl Default for RunPollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: 60,
        }
    }
}

/// OpenAI connector configuration (shared by every OpenAI API family)
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for OpenAI API (default: https://api.openai.com/v1)
    pub base_url: String,

    /// Organization ID (optional)
    pub organization: Option<String>,

    /// HTTP client configuration
    pub client_config: HttpClientConfig,

    /// Assistants run polling
    pub run_poll: RunPollConfig,
}

impl OpenAIConfig {
    /// Create a new OpenAI configuration
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            organization: None,
            client_config: HttpClientConfig::default(),
            run_poll: RunPollConfig::default(),
        }
    }

    /// Set the base URL (for custom endpoints)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the organization ID
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_client_config(mut self, client_config: HttpClientConfig) -> Self {
        self.client_config = client_config;
        self
    }

    pub fn with_run_poll(mut self, run_poll: RunPollConfig) -> Self {
        self.run_poll = run_poll;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// OpenAI chat completions connector
pub struct OpenAIConnector {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIConnector {
    /// Create a new OpenAI connector
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = create_client(&config.client_config)?;
        Ok(Self { config, client })
    }

    /// Send one chat completions request
    #[instrument(skip(self, provider, input), fields(model = %provider.model, input = input.kind()))]
    pub async fn send(
        &self,
        provider: &ProviderConfig,
        input: &ConversationInput,
    ) -> Result<ChatCompletionResponse> {
        let request = to_chat_request(provider, input)?;
        debug!(messages = request.messages.len(), "Sending chat completions request to OpenAI");

        debug!("┌─────────────────────────────────────────────────────────");
        debug!("│ OpenAI Request Headers");
        debug!("├─────────────────────────────────────────────────────────");
        debug!("│ Authorization: Bearer <api_key>");
        debug!("│ Content-Type: application/json");
        if let Some(ref org) = self.config.organization {
            debug!("│ OpenAI-Organization: {}", org);
        }
        debug!("└─────────────────────────────────────────────────────────");

        let response = self
            .client
            .post(self.config.url("/chat/completions"))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .apply_organization_header(&self.config)
            .json(&request)
            .send()
            .await?;

        log_response_headers("OpenAI", &response);

        let body = response.provider_body("OpenAI").await?;
        parse_body(&body, "OpenAI")
    }
}

#[async_trait]
impl LlmClient for OpenAIConnector {
    async fn call(
        &self,
        config: &ProviderConfig,
        input: &ConversationInput,
    ) -> promptrun_core::Result<RawProviderResponse> {
        let response = self.send(config, input).await?;
        Ok(RawProviderResponse::ChatCompletion(response))
    }
}

// OpenAI chat completions request types

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatRequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Reasoning models use max_completion_tokens instead of max_tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatTool>>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequestMessage {
    pub role: String,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatRequestMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: ChatFunction,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatFunction {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}

/// Function tools in the `{type: function, function: {...}}` shape
pub(crate) fn function_tools(tools: &ToolConfig) -> Vec<ChatTool> {
    tools
        .functions
        .iter()
        .map(|f| ChatTool {
            tool_type: "function".to_string(),
            function: ChatFunction {
                name: f.name.clone(),
                description: f.description.clone(),
                parameters: f.parameters.clone(),
            },
        })
        .collect()
}

/// Convert a normalized tool call back into the OpenAI wire shape
pub(crate) fn to_wire_tool_call(call: &ToolCall) -> WireToolCall {
    WireToolCall {
        id: call.id.clone(),
        tool_type: "function".to_string(),
        function: WireFunctionCall {
            name: call.function_name.clone(),
            arguments: call.arguments_json(),
        },
    }
}

fn uses_max_completion_tokens(model: &str) -> bool {
    model.starts_with("gpt-5") || model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4")
}

/// Build a chat completions request from a prompt or replayed history
pub(crate) fn to_chat_request(
    provider: &ProviderConfig,
    input: &ConversationInput,
) -> Result<ChatRequest> {
    let mut messages = Vec::new();

    match input {
        ConversationInput::Prompt { text } => {
            messages.push(ChatRequestMessage::text("user", text.as_str()));
        }
        ConversationInput::History { system, items } => {
            if let Some(system) = system.as_deref().filter(|s| !s.is_empty()) {
                messages.push(ChatRequestMessage::text("system", system));
            }

            for item in items {
                match item {
                    HistoryItem::User { content } => {
                        messages.push(ChatRequestMessage::text("user", content.as_str()));
                    }
                    HistoryItem::Assistant {
                        content,
                        tool_calls,
                    } => {
                        let tool_calls = if tool_calls.is_empty() {
                            None
                        } else {
                            Some(tool_calls.iter().map(to_wire_tool_call).collect())
                        };
                        // Content may be null only when the message carries tool calls
                        let content = if content.is_empty() && tool_calls.is_some() {
                            None
                        } else {
                            Some(content.clone())
                        };
                        messages.push(ChatRequestMessage {
                            role: "assistant".to_string(),
                            content,
                            tool_calls,
                            tool_call_id: None,
                        });
                    }
                    HistoryItem::ToolOutputs { outputs } => {
                        for output in outputs {
                            messages.push(ChatRequestMessage {
                                role: "tool".to_string(),
                                content: Some(output.output.clone()),
                                tool_calls: None,
                                tool_call_id: Some(output.call_id.clone()),
                            });
                        }
                    }
                }
            }
        }
        ConversationInput::Continuation { .. } => {
            return Err(EgressError::ConfigError(
                "chat completions is stateless and cannot continue from a response handle"
                    .to_string(),
            ));
        }
    }

    if messages.is_empty() {
        return Err(EgressError::ConfigError(
            "chat completions request has no messages".to_string(),
        ));
    }

    if !provider.tools.builtin.is_empty() {
        debug!(
            builtin = ?provider.tools.builtin,
            "Built-in tools are not offered over chat completions, ignoring"
        );
    }

    let tools = function_tools(&provider.tools);
    let (max_tokens, max_completion_tokens) = if uses_max_completion_tokens(&provider.model) {
        (None, provider.max_tokens)
    } else {
        (provider.max_tokens, None)
    };

    Ok(ChatRequest {
        model: provider.model.clone(),
        messages,
        temperature: provider.temperature,
        max_tokens,
        max_completion_tokens,
        tools: if tools.is_empty() { None } else { Some(tools) },
    })
}

// Helper trait for adding organization header
pub(crate) trait OrganizationHeader {
    fn apply_organization_header(self, config: &OpenAIConfig) -> Self;
}

impl OrganizationHeader for reqwest::RequestBuilder {
    fn apply_organization_header(self, config: &OpenAIConfig) -> Self {
        if let Some(ref org) = config.organization {
            self.header("OpenAI-Organization", org)
        } else {
            self
        }
    }
}
