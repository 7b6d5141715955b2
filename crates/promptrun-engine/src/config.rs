//! Engine input

use promptrun_core::{
    Error, Result,
    provider::ProviderConfig,
    template::{self, PromptVariables},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Everything needed to run one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineInput {
    /// Provider, API, model, sampling and tool configuration
    pub provider: ProviderConfig,

    /// System prompt (may contain `{{variable}}` placeholders)
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Opening user message, sent verbatim on turn 1 after rendering
    pub first_user_message: String,

    /// Persona and context for the simulated user (required when max_turns > 1)
    #[serde(default)]
    pub interlocutor_prompt: Option<String>,

    /// Maximum number of turns (default: 1)
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Call real providers; false selects mock mode
    #[serde(default)]
    pub use_real_llm: bool,

    /// Mock outputs keyed by function name
    #[serde(default)]
    pub mock_outputs: HashMap<String, String>,

    /// Values for prompt placeholders
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

fn default_max_turns() -> u32 {
    1
}

/// Prompts after placeholder substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompts {
    pub system: Option<String>,
    pub first_message: String,
}

impl RenderedPrompts {
    /// The prompt reported in the result record
    pub fn display_prompt(&self) -> &str {
        self.system.as_deref().unwrap_or(&self.first_message)
    }
}

impl EngineInput {
    pub fn new(provider: ProviderConfig, first_user_message: impl Into<String>) -> Self {
        Self {
            provider,
            system_prompt: None,
            first_user_message: first_user_message.into(),
            interlocutor_prompt: None,
            max_turns: default_max_turns(),
            use_real_llm: false,
            mock_outputs: HashMap::new(),
            variables: HashMap::new(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_interlocutor_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.interlocutor_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_real_llm(mut self, use_real_llm: bool) -> Self {
        self.use_real_llm = use_real_llm;
        self
    }

    pub fn with_mock_output(
        mut self,
        function_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.mock_outputs.insert(function_name.into(), output.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Reject inputs that cannot start a conversation
    pub fn validate(&self) -> Result<()> {
        self.provider.validate()?;

        if self.max_turns == 0 {
            return Err(Error::Config("max_turns must be at least 1".to_string()));
        }

        if self.first_user_message.trim().is_empty() {
            return Err(Error::Config(
                "first_user_message must not be empty".to_string(),
            ));
        }

        let has_interlocutor = self
            .interlocutor_prompt
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if self.max_turns > 1 && !has_interlocutor {
            return Err(Error::Config(format!(
                "interlocutor_prompt is required when max_turns is {}",
                self.max_turns
            )));
        }

        Ok(())
    }

    /// Render the system prompt and opening message
    pub fn render_prompts(&self) -> RenderedPrompts {
        let variables = PromptVariables::from(self.variables.clone());

        for source in self.system_prompt.iter().chain([&self.first_user_message]) {
            let missing = template::missing_variables(source, &variables);
            if !missing.is_empty() {
                debug!(?missing, "Prompt references variables without values");
            }
        }

        RenderedPrompts {
            system: self
                .system_prompt
                .as_deref()
                .map(|s| template::render(s, &variables)),
            first_message: template::render(&self.first_user_message, &variables),
        }
    }
}
