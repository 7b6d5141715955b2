//! OpenAI responses connector
//!
//! The responses API keeps conversation state server-side: the first call of a
//! conversation sends the prompt, later calls send only new input together with
//! `previous_response_id`.

use crate::{
    EgressError, Result,
    client::{ProviderResponseHandler, create_client, log_response_headers, parse_body},
    openai::{OpenAIConfig, OrganizationHeader},
};
use async_trait::async_trait;
use promptrun_core::{
    normalized::FunctionOutput,
    provider::{
        BuiltinTool, ContinuationInput, ConversationInput, HistoryItem, LlmClient,
        ProviderConfig, ToolConfig,
    },
    raw::{RawProviderResponse, ResponsesApiResponse},
};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

/// OpenAI responses connector
pub struct ResponsesConnector {
    config: OpenAIConfig,
    client: Client,
}

impl ResponsesConnector {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = create_client(&config.client_config)?;
        Ok(Self { config, client })
    }

    /// Send one responses request
    #[instrument(skip(self, provider, input), fields(model = %provider.model, input = input.kind()))]
    pub async fn send(
        &self,
        provider: &ProviderConfig,
        input: &ConversationInput,
    ) -> Result<ResponsesApiResponse> {
        let request = to_responses_request(provider, input)?;
        debug!(
            previous_response_id = ?request.previous_response_id,
            "Sending responses request to OpenAI"
        );

        let response = self
            .client
            .post(self.config.url("/responses"))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .apply_organization_header(&self.config)
            .json(&request)
            .send()
            .await?;

        log_response_headers("OpenAI Responses", &response);

        let body = response.provider_body("OpenAI").await?;
        let parsed: ResponsesApiResponse = parse_body(&body, "OpenAI")?;

        if parsed.status.as_deref() == Some("failed") {
            return Err(EgressError::RunFailed {
                run_id: parsed.id,
                status: "failed".to_string(),
                message: "response generation failed".to_string(),
            });
        }

        Ok(parsed)
    }
}

#[async_trait]
impl LlmClient for ResponsesConnector {
    async fn call(
        &self,
        config: &ProviderConfig,
        input: &ConversationInput,
    ) -> promptrun_core::Result<RawProviderResponse> {
        let response = self.send(config, input).await?;
        Ok(RawProviderResponse::Responses(response))
    }
}

// OpenAI responses request types

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResponsesRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub input: ResponsesInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ResponsesTool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub(crate) enum ResponsesInput {
    Text(String),
    Items(Vec<ResponsesInputItem>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ResponsesInputItem {
    Message {
        role: String,
        content: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ResponsesTool {
    Function {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        parameters: serde_json::Value,
    },
    WebSearchPreview,
    FileSearch {
        vector_store_ids: Vec<String>,
    },
    CodeInterpreter {
        container: serde_json::Value,
    },
}

fn function_outputs(outputs: &[FunctionOutput]) -> Vec<ResponsesInputItem> {
    outputs
        .iter()
        .map(|o| ResponsesInputItem::FunctionCallOutput {
            call_id: o.call_id.clone(),
            output: o.output.clone(),
        })
        .collect()
}

fn history_items(items: &[HistoryItem]) -> Vec<ResponsesInputItem> {
    let mut converted = Vec::new();
    for item in items {
        match item {
            HistoryItem::User { content } => converted.push(ResponsesInputItem::Message {
                role: "user".to_string(),
                content: content.clone(),
            }),
            HistoryItem::Assistant {
                content,
                tool_calls,
            } => {
                if !content.is_empty() {
                    converted.push(ResponsesInputItem::Message {
                        role: "assistant".to_string(),
                        content: content.clone(),
                    });
                }
                converted.extend(tool_calls.iter().map(|c| ResponsesInputItem::FunctionCall {
                    call_id: c.id.clone(),
                    name: c.function_name.clone(),
                    arguments: c.arguments_json(),
                }));
            }
            HistoryItem::ToolOutputs { outputs } => converted.extend(function_outputs(outputs)),
        }
    }
    converted
}

pub(crate) fn responses_tools(tools: &ToolConfig) -> Result<Vec<ResponsesTool>> {
    let mut converted: Vec<ResponsesTool> = tools
        .functions
        .iter()
        .map(|f| ResponsesTool::Function {
            name: f.name.clone(),
            description: f.description.clone(),
            parameters: f.parameters.clone(),
        })
        .collect();

    for builtin in &tools.builtin {
        converted.push(match builtin {
            BuiltinTool::WebSearch => ResponsesTool::WebSearchPreview,
            BuiltinTool::FileSearch => {
                if tools.vector_store_ids.is_empty() {
                    return Err(EgressError::ConfigError(
                        "file_search requires at least one vector store id".to_string(),
                    ));
                }
                ResponsesTool::FileSearch {
                    vector_store_ids: tools.vector_store_ids.clone(),
                }
            }
            BuiltinTool::CodeInterpreter => ResponsesTool::CodeInterpreter {
                container: serde_json::json!({ "type": "auto" }),
            },
        });
    }

    Ok(converted)
}

/// Build a responses request
pub(crate) fn to_responses_request(
    provider: &ProviderConfig,
    input: &ConversationInput,
) -> Result<ResponsesRequest> {
    let (instructions, input, previous_response_id) = match input {
        ConversationInput::Prompt { text } => (None, ResponsesInput::Text(text.clone()), None),
        ConversationInput::History { system, items } => {
            if items.is_empty() {
                return Err(EgressError::ConfigError(
                    "responses request has no input".to_string(),
                ));
            }
            (system.clone(), ResponsesInput::Items(history_items(items)), None)
        }
        ConversationInput::Continuation {
            system,
            previous_response_id,
            input,
            ..
        } => {
            let converted = match input {
                ContinuationInput::Text { text } => ResponsesInput::Text(text.clone()),
                ContinuationInput::ToolOutputs { outputs } => {
                    if previous_response_id.is_none() {
                        return Err(EgressError::ConfigError(
                            "tool outputs require a previous_response_id".to_string(),
                        ));
                    }
                    ResponsesInput::Items(function_outputs(outputs))
                }
            };
            (system.clone(), converted, previous_response_id.clone())
        }
    };

    Ok(ResponsesRequest {
        model: provider.model.clone(),
        instructions: instructions.filter(|s| !s.is_empty()),
        input,
        previous_response_id,
        temperature: provider.temperature,
        max_output_tokens: provider.max_tokens,
        tools: responses_tools(&provider.tools)?,
    })
}
