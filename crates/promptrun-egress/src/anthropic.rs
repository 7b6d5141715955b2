//! Anthropic messages connector

use crate::{
    EgressError, Result,
    client::{
        HttpClientConfig, ProviderResponseHandler, create_client, log_response_headers,
        parse_body,
    },
};
use async_trait::async_trait;
use promptrun_core::{
    provider::{BuiltinTool, ConversationInput, HistoryItem, LlmClient, ProviderConfig, ToolConfig},
    raw::{MessagesApiResponse, RawProviderResponse},
};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

/// Default output budget; the messages API requires `max_tokens`
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

const WEB_SEARCH_TOOL: &str = "web_search_20250305";
const CODE_EXECUTION_TOOL: &str = "code_execution_20250522";
const CODE_EXECUTION_BETA: &str = "code-execution-2025-05-22";

/// Anthropic connector configuration
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for Anthropic API (default: https://api.anthropic.com)
    pub base_url: String,

    /// Anthropic API version (default: 2023-06-01)
    pub api_version: String,

    /// HTTP client configuration
    pub client_config: HttpClientConfig,
}

impl AnthropicConfig {
    /// Create a new Anthropic configuration
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_string(),
            api_version: "2023-06-01".to_string(),
            client_config: HttpClientConfig::default(),
        }
    }

    /// Set the base URL (for custom endpoints)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the API version
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_client_config(mut self, client_config: HttpClientConfig) -> Self {
        self.client_config = client_config;
        self
    }
}

/// Anthropic connector
pub struct AnthropicConnector {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicConnector {
    /// Create a new Anthropic connector
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = create_client(&config.client_config)?;
        Ok(Self { config, client })
    }

    /// Send one messages request
    #[instrument(skip(self, provider, input), fields(model = %provider.model, input = input.kind()))]
    pub async fn send(
        &self,
        provider: &ProviderConfig,
        input: &ConversationInput,
    ) -> Result<MessagesApiResponse> {
        let request = to_anthropic_request(provider, input)?;
        let beta = beta_header(&provider.tools);

        debug!("┌─────────────────────────────────────────────────────────");
        debug!("│ Anthropic Request Headers");
        debug!("├─────────────────────────────────────────────────────────");
        debug!("│ x-api-key: <api_key>");
        debug!("│ anthropic-version: {}", self.config.api_version);
        if let Some(beta) = beta {
            debug!("│ anthropic-beta: {}", beta);
        }
        debug!("│ Content-Type: application/json");
        debug!("└─────────────────────────────────────────────────────────");

        let mut builder = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header("Content-Type", "application/json");
        if let Some(beta) = beta {
            builder = builder.header("anthropic-beta", beta);
        }

        let response = builder.json(&request).send().await?;
        log_response_headers("Anthropic", &response);

        let body = response.provider_body("Anthropic").await?;
        parse_body(&body, "Anthropic")
    }
}

#[async_trait]
impl LlmClient for AnthropicConnector {
    async fn call(
        &self,
        config: &ProviderConfig,
        input: &ConversationInput,
    ) -> promptrun_core::Result<RawProviderResponse> {
        let response = self.send(config, input).await?;
        Ok(RawProviderResponse::Messages(response))
    }
}

// Anthropic API types

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AnthropicRequest {
    pub model: String,
    pub messages: Vec<AnthropicMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AnthropicTool>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AnthropicMessage {
    pub role: String,
    pub content: Vec<AnthropicContent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicContent {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub(crate) enum AnthropicTool {
    Function {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        input_schema: Value,
    },
    Server {
        #[serde(rename = "type")]
        tool_type: &'static str,
        name: &'static str,
    },
}

fn beta_header(tools: &ToolConfig) -> Option<&'static str> {
    tools
        .has_builtin(BuiltinTool::CodeInterpreter)
        .then_some(CODE_EXECUTION_BETA)
}

pub(crate) fn anthropic_tools(tools: &ToolConfig) -> Vec<AnthropicTool> {
    let mut converted: Vec<AnthropicTool> = tools
        .functions
        .iter()
        .map(|f| AnthropicTool::Function {
            name: f.name.clone(),
            description: f.description.clone(),
            input_schema: f.parameters.clone(),
        })
        .collect();

    for builtin in &tools.builtin {
        match builtin {
            BuiltinTool::WebSearch => converted.push(AnthropicTool::Server {
                tool_type: WEB_SEARCH_TOOL,
                name: "web_search",
            }),
            BuiltinTool::CodeInterpreter => converted.push(AnthropicTool::Server {
                tool_type: CODE_EXECUTION_TOOL,
                name: "code_execution",
            }),
            BuiltinTool::FileSearch => {
                debug!("File search is not offered by the messages API, ignoring");
            }
        }
    }

    converted
}

fn text_message(role: &str, text: &str) -> AnthropicMessage {
    AnthropicMessage {
        role: role.to_string(),
        content: vec![AnthropicContent::Text {
            text: text.to_string(),
        }],
    }
}

/// Build a messages request from a prompt or replayed history
pub(crate) fn to_anthropic_request(
    provider: &ProviderConfig,
    input: &ConversationInput,
) -> Result<AnthropicRequest> {
    let (system, messages) = match input {
        ConversationInput::Prompt { text } => (None, vec![text_message("user", text)]),
        ConversationInput::History { system, items } => {
            let mut messages = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    HistoryItem::User { content } => messages.push(text_message("user", content)),
                    HistoryItem::Assistant {
                        content,
                        tool_calls,
                    } => {
                        let mut blocks = Vec::new();
                        if !content.is_empty() {
                            blocks.push(AnthropicContent::Text {
                                text: content.clone(),
                            });
                        }
                        blocks.extend(tool_calls.iter().map(|c| AnthropicContent::ToolUse {
                            id: c.id.clone(),
                            name: c.function_name.clone(),
                            input: Value::Object(c.arguments.clone()),
                        }));
                        // The API rejects assistant turns without content
                        if blocks.is_empty() {
                            continue;
                        }
                        messages.push(AnthropicMessage {
                            role: "assistant".to_string(),
                            content: blocks,
                        });
                    }
                    HistoryItem::ToolOutputs { outputs } => messages.push(AnthropicMessage {
                        role: "user".to_string(),
                        content: outputs
                            .iter()
                            .map(|o| AnthropicContent::ToolResult {
                                tool_use_id: o.call_id.clone(),
                                content: o.output.clone(),
                            })
                            .collect(),
                    }),
                }
            }
            (system.clone(), messages)
        }
        ConversationInput::Continuation { .. } => {
            return Err(EgressError::ConfigError(
                "the messages API is stateless and cannot continue from a response handle"
                    .to_string(),
            ));
        }
    };

    if messages.is_empty() {
        return Err(EgressError::ConfigError(
            "messages request has no messages".to_string(),
        ));
    }

    Ok(AnthropicRequest {
        model: provider.model.clone(),
        messages,
        max_tokens: provider.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: system.filter(|s| !s.is_empty()),
        temperature: provider.temperature,
        tools: anthropic_tools(&provider.tools),
    })
}
