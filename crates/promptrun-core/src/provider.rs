//! Provider selectors, provider configuration and the LLM client trait

use crate::{
    Error, Result,
    normalized::{FunctionOutput, ToolCall},
    raw::RawProviderResponse,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// LLM vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[serde(alias = "open_ai")]
    OpenAI,
    Anthropic,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAI => write!(f, "openai"),
            Provider::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Wire protocol family used to talk to a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiVariant {
    /// Stateless chat completions (full history replay)
    ChatCompletions,
    /// Stateful responses API (previous_response_id continuation)
    Responses,
    /// Assistants API (thread + polled run)
    Assistants,
    /// Anthropic messages API (full history replay)
    Messages,
}

impl ApiVariant {
    /// Whether the provider keeps conversation state server-side
    pub fn is_stateful(&self) -> bool {
        matches!(self, ApiVariant::Responses | ApiVariant::Assistants)
    }

    /// Whether this variant is offered by the given provider
    pub fn is_supported_by(&self, provider: Provider) -> bool {
        matches!(
            (provider, self),
            (Provider::OpenAI, ApiVariant::ChatCompletions)
                | (Provider::OpenAI, ApiVariant::Responses)
                | (Provider::OpenAI, ApiVariant::Assistants)
                | (Provider::Anthropic, ApiVariant::Messages)
        )
    }
}

impl fmt::Display for ApiVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiVariant::ChatCompletions => "chat_completions",
            ApiVariant::Responses => "responses",
            ApiVariant::Assistants => "assistants",
            ApiVariant::Messages => "messages",
        };
        f.write_str(name)
    }
}

/// Provider-hosted tools whose results are reported separately from function calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    WebSearch,
    CodeInterpreter,
    FileSearch,
}

/// Function definition offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,

    /// Description of what the function does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON schema for the function parameters
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Enabled tool set and tool configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub functions: Vec<FunctionDefinition>,

    #[serde(default)]
    pub builtin: Vec<BuiltinTool>,

    /// Vector stores searched by the file-search tool
    #[serde(default)]
    pub vector_store_ids: Vec<String>,
}

impl ToolConfig {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.builtin.is_empty()
    }

    pub fn has_builtin(&self, tool: BuiltinTool) -> bool {
        self.builtin.contains(&tool)
    }
}

/// Everything needed to address one provider/API pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,

    pub api: ApiVariant,

    /// Model identifier
    pub model: String,

    /// Sampling temperature (0.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum number of tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub tools: ToolConfig,

    /// Assistant to run (Assistants API only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: Provider, api: ApiVariant, model: impl Into<String>) -> Self {
        Self {
            provider,
            api,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            tools: ToolConfig::default(),
            assistant_id: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: ToolConfig) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_assistant_id(mut self, assistant_id: impl Into<String>) -> Self {
        self.assistant_id = Some(assistant_id.into());
        self
    }

    /// Reject configurations no adapter can serve
    pub fn validate(&self) -> Result<()> {
        if !self.api.is_supported_by(self.provider) {
            return Err(Error::Config(format!(
                "API '{}' is not available for provider '{}'",
                self.api, self.provider
            )));
        }

        if self.model.trim().is_empty() {
            return Err(Error::Config("model must not be empty".to_string()));
        }

        if let Some(temperature) = self.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(Error::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                temperature
            )));
        }

        if self.api == ApiVariant::Assistants && self.assistant_id.is_none() {
            return Err(Error::Config(
                "assistant_id is required for the assistants API".to_string(),
            ));
        }

        Ok(())
    }
}

/// One entry of a replayed transcript (stateless APIs)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryItem {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    ToolOutputs {
        outputs: Vec<FunctionOutput>,
    },
}

/// New input sent alongside a continuation handle (stateful APIs)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContinuationInput {
    Text { text: String },
    ToolOutputs { outputs: Vec<FunctionOutput> },
}

/// What a provider call is asked to continue from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationInput {
    /// A single prompt string
    Prompt { text: String },

    /// Full message history for stateless APIs
    History {
        system: Option<String>,
        items: Vec<HistoryItem>,
    },

    /// Continuation handle plus new input for stateful APIs
    Continuation {
        system: Option<String>,
        previous_response_id: Option<String>,
        thread_id: Option<String>,
        input: ContinuationInput,
    },
}

impl ConversationInput {
    pub fn prompt(text: impl Into<String>) -> Self {
        ConversationInput::Prompt { text: text.into() }
    }

    /// Short description used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ConversationInput::Prompt { .. } => "prompt",
            ConversationInput::History { .. } => "history",
            ConversationInput::Continuation { .. } => "continuation",
        }
    }

    /// Text of the newest user-authored input, if the newest input is text
    pub fn latest_text(&self) -> Option<&str> {
        match self {
            ConversationInput::Prompt { text } => Some(text),
            ConversationInput::History { items, .. } => match items.last() {
                Some(HistoryItem::User { content }) => Some(content),
                _ => None,
            },
            ConversationInput::Continuation { input, .. } => match input {
                ContinuationInput::Text { text } => Some(text),
                ContinuationInput::ToolOutputs { .. } => None,
            },
        }
    }

    /// Whether the newest input answers earlier tool calls
    pub fn is_tool_output(&self) -> bool {
        match self {
            ConversationInput::Prompt { .. } => false,
            ConversationInput::History { items, .. } => {
                matches!(items.last(), Some(HistoryItem::ToolOutputs { .. }))
            }
            ConversationInput::Continuation { input, .. } => {
                matches!(input, ContinuationInput::ToolOutputs { .. })
            }
        }
    }
}

/// One call to an LLM provider (or a stand-in for one)
///
/// Implementations must not retry or swallow errors; the engine propagates
/// them unchanged.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn call(
        &self,
        config: &ProviderConfig,
        input: &ConversationInput,
    ) -> Result<RawProviderResponse>;
}
