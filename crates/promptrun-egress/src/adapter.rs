//! Provider adapter selection
//!
//! `ProviderAdapter` is the closed set of call adapters. It is chosen once per
//! conversation from the provider config and the real/mock switch.

use crate::{
    anthropic::{AnthropicConfig, AnthropicConnector},
    assistants::AssistantsConnector,
    mock::MockLlmClient,
    openai::{OpenAIConfig, OpenAIConnector},
    responses::ResponsesConnector,
};
use async_trait::async_trait;
use promptrun_core::{
    Error,
    provider::{ApiVariant, ContinuationInput, ConversationInput, LlmClient, Provider, ProviderConfig},
    raw::RawProviderResponse,
};
use tracing::info;

/// Credentials and endpoints for real provider calls
#[derive(Debug, Clone, Default)]
pub struct ProviderEndpoints {
    pub openai: Option<OpenAIConfig>,
    pub anthropic: Option<AnthropicConfig>,
}

impl ProviderEndpoints {
    pub fn with_openai(mut self, config: OpenAIConfig) -> Self {
        self.openai = Some(config);
        self
    }

    pub fn with_anthropic(mut self, config: AnthropicConfig) -> Self {
        self.anthropic = Some(config);
        self
    }

    fn openai(&self) -> promptrun_core::Result<OpenAIConfig> {
        self.openai
            .clone()
            .ok_or_else(|| Error::Config("no OpenAI API key configured".to_string()))
    }

    fn anthropic(&self) -> promptrun_core::Result<AnthropicConfig> {
        self.anthropic
            .clone()
            .ok_or_else(|| Error::Config("no Anthropic API key configured".to_string()))
    }
}

/// One call adapter per provider/API pair, plus the mock
pub enum ProviderAdapter {
    Mock(MockLlmClient),
    OpenAIChat(OpenAIConnector),
    OpenAIResponses(ResponsesConnector),
    OpenAIAssistants(AssistantsConnector),
    Anthropic(AnthropicConnector),
}

impl ProviderAdapter {
    /// Select the adapter for a provider config
    ///
    /// Fails with a configuration error for unsupported pairs or missing
    /// credentials.
    pub fn select(
        config: &ProviderConfig,
        endpoints: &ProviderEndpoints,
        use_real_llm: bool,
    ) -> promptrun_core::Result<Self> {
        config.validate()?;

        if !use_real_llm {
            return Ok(ProviderAdapter::Mock(MockLlmClient::new()));
        }

        let adapter = match (config.provider, config.api) {
            (Provider::OpenAI, ApiVariant::ChatCompletions) => {
                ProviderAdapter::OpenAIChat(OpenAIConnector::new(endpoints.openai()?)?)
            }
            (Provider::OpenAI, ApiVariant::Responses) => {
                ProviderAdapter::OpenAIResponses(ResponsesConnector::new(endpoints.openai()?)?)
            }
            (Provider::OpenAI, ApiVariant::Assistants) => {
                ProviderAdapter::OpenAIAssistants(AssistantsConnector::new(endpoints.openai()?)?)
            }
            (Provider::Anthropic, ApiVariant::Messages) => {
                ProviderAdapter::Anthropic(AnthropicConnector::new(endpoints.anthropic()?)?)
            }
            (provider, api) => {
                return Err(Error::Config(format!(
                    "API '{}' is not available for provider '{}'",
                    api, provider
                )));
            }
        };

        info!(provider = %config.provider, api = %config.api, "Using real provider adapter");
        Ok(adapter)
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, ProviderAdapter::Mock(_))
    }

    fn api(&self) -> Option<ApiVariant> {
        match self {
            ProviderAdapter::Mock(_) => None,
            ProviderAdapter::OpenAIChat(_) => Some(ApiVariant::ChatCompletions),
            ProviderAdapter::OpenAIResponses(_) => Some(ApiVariant::Responses),
            ProviderAdapter::OpenAIAssistants(_) => Some(ApiVariant::Assistants),
            ProviderAdapter::Anthropic(_) => Some(ApiVariant::Messages),
        }
    }
}

#[async_trait]
impl LlmClient for ProviderAdapter {
    async fn call(
        &self,
        config: &ProviderConfig,
        input: &ConversationInput,
    ) -> promptrun_core::Result<RawProviderResponse> {
        if let Some(api) = self.api()
            && api != config.api
        {
            return Err(Error::Config(format!(
                "adapter for '{}' cannot serve a '{}' config",
                api, config.api
            )));
        }
        check_input(config.api, input)?;

        match self {
            ProviderAdapter::Mock(client) => client.call(config, input).await,
            ProviderAdapter::OpenAIChat(connector) => connector.call(config, input).await,
            ProviderAdapter::OpenAIResponses(connector) => connector.call(config, input).await,
            ProviderAdapter::OpenAIAssistants(connector) => connector.call(config, input).await,
            ProviderAdapter::Anthropic(connector) => connector.call(config, input).await,
        }
    }
}

/// Reject inputs an API cannot accept, before any network traffic
pub fn check_input(api: ApiVariant, input: &ConversationInput) -> promptrun_core::Result<()> {
    match (api, input) {
        (ApiVariant::ChatCompletions | ApiVariant::Messages, ConversationInput::Continuation { .. }) => {
            Err(Error::Config(format!(
                "the {} API is stateless and needs the full history",
                api
            )))
        }
        (ApiVariant::Assistants, ConversationInput::History { .. }) => Err(Error::Config(
            "the assistants API keeps history in threads".to_string(),
        )),
        (
            ApiVariant::Responses,
            ConversationInput::Continuation {
                previous_response_id: None,
                input: ContinuationInput::ToolOutputs { .. },
                ..
            },
        ) => Err(Error::Config(
            "tool outputs require a previous response id".to_string(),
        )),
        (
            ApiVariant::Assistants,
            ConversationInput::Continuation {
                previous_response_id,
                thread_id,
                input: ContinuationInput::ToolOutputs { .. },
                ..
            },
        ) if previous_response_id.is_none() || thread_id.is_none() => Err(Error::Config(
            "tool outputs require both a thread id and a run id".to_string(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptrun_core::normalized::FunctionOutput;

    fn tool_outputs(previous: Option<&str>, thread: Option<&str>) -> ConversationInput {
        ConversationInput::Continuation {
            system: None,
            previous_response_id: previous.map(String::from),
            thread_id: thread.map(String::from),
            input: ContinuationInput::ToolOutputs {
                outputs: vec![FunctionOutput::new("call_1", "ok")],
            },
        }
    }

    #[test]
    fn test_mock_selected_without_real_flag() {
        let config = ProviderConfig::new(Provider::OpenAI, ApiVariant::ChatCompletions, "gpt-4o");
        let adapter = ProviderAdapter::select(&config, &ProviderEndpoints::default(), false).unwrap();
        assert!(adapter.is_mock());
    }

    #[test]
    fn test_real_mode_requires_credentials() {
        let config = ProviderConfig::new(Provider::Anthropic, ApiVariant::Messages, "claude");
        let err = ProviderAdapter::select(&config, &ProviderEndpoints::default(), true)
            .err()
            .unwrap();
        assert!(err.is_config());

        let endpoints = ProviderEndpoints::default().with_anthropic(AnthropicConfig::new("key"));
        let adapter = ProviderAdapter::select(&config, &endpoints, true).unwrap();
        assert!(matches!(adapter, ProviderAdapter::Anthropic(_)));
    }

    #[test]
    fn test_unsupported_pair_rejected_even_for_mock() {
        let config = ProviderConfig::new(Provider::Anthropic, ApiVariant::Assistants, "claude");
        assert!(ProviderAdapter::select(&config, &ProviderEndpoints::default(), false).is_err());
    }

    #[test]
    fn test_check_input() {
        let continuation = ConversationInput::Continuation {
            system: None,
            previous_response_id: None,
            thread_id: None,
            input: ContinuationInput::Text { text: "x".into() },
        };
        assert!(check_input(ApiVariant::ChatCompletions, &continuation).is_err());
        assert!(check_input(ApiVariant::Messages, &continuation).is_err());
        assert!(check_input(ApiVariant::Responses, &continuation).is_ok());
        assert!(check_input(ApiVariant::Assistants, &continuation).is_ok());

        assert!(check_input(ApiVariant::Responses, &tool_outputs(None, None)).is_err());
        assert!(check_input(ApiVariant::Responses, &tool_outputs(Some("resp_1"), None)).is_ok());
        assert!(check_input(ApiVariant::Assistants, &tool_outputs(Some("run_1"), None)).is_err());
        assert!(check_input(ApiVariant::Assistants, &tool_outputs(Some("run_1"), Some("thread_1"))).is_ok());

        let history = ConversationInput::History {
            system: None,
            items: vec![],
        };
        assert!(check_input(ApiVariant::Assistants, &history).is_err());
        assert!(check_input(ApiVariant::ChatCompletions, &ConversationInput::prompt("x")).is_ok());
    }
}
