use anyhow::{Context, Result};
use promptrun_core::provider::ProviderConfig;
use promptrun_egress::{
    ProviderEndpoints,
    anthropic::AnthropicConfig,
    client::HttpClientConfig,
    openai::{OpenAIConfig, RunPollConfig},
};
use promptrun_engine::{EngineInput, EngineSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// One conversation run, as read from a YAML or TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub provider: ProviderConfig,

    pub conversation: ConversationConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    pub first_user_message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interlocutor_prompt: Option<String>,

    /// Model for the simulated user in real mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interlocutor_model: Option<String>,

    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    #[serde(default = "default_false")]
    pub use_real_llm: bool,

    #[serde(default)]
    pub variables: HashMap<String, String>,

    #[serde(default)]
    pub mock_outputs: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_iterations: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub openai: Option<ProviderSettings>,
    pub anthropic: Option<ProviderSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,

    /// Delay between assistants run status checks
    #[serde(default = "default_poll_interval_ms")]
    pub run_poll_interval_ms: u64,

    #[serde(default = "default_poll_max_attempts")]
    pub run_poll_max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_false")]
    pub json: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            pool_max_idle_per_host: default_pool_max_idle(),
            run_poll_interval_ms: default_poll_interval_ms(),
            run_poll_max_attempts: default_poll_max_attempts(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl RunConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents).with_context(|| format!("invalid TOML in {}", path.display()))?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)
                .with_context(|| format!("invalid YAML in {}", path.display()))?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            self.credentials.openai.get_or_insert_with(Default::default).api_key = Some(api_key);
        }

        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            self.credentials.openai.get_or_insert_with(Default::default).base_url = Some(base_url);
        }

        if let Ok(organization) = std::env::var("OPENAI_ORGANIZATION") {
            self.credentials.openai.get_or_insert_with(Default::default).organization =
                Some(organization);
        }

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            self.credentials.anthropic.get_or_insert_with(Default::default).api_key = Some(api_key);
        }

        if let Ok(base_url) = std::env::var("ANTHROPIC_BASE_URL") {
            self.credentials.anthropic.get_or_insert_with(Default::default).base_url =
                Some(base_url);
        }

        if let Ok(val) = std::env::var("PROMPTRUN_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = std::env::var("PROMPTRUN_USE_REAL_LLM")
            && let Ok(enabled) = val.parse::<bool>()
        {
            self.conversation.use_real_llm = enabled;
        }
    }

    pub fn engine_input(&self) -> EngineInput {
        let conversation = &self.conversation;
        EngineInput {
            provider: self.provider.clone(),
            system_prompt: conversation.system_prompt.clone(),
            first_user_message: conversation.first_user_message.clone(),
            interlocutor_prompt: conversation.interlocutor_prompt.clone(),
            max_turns: conversation.max_turns,
            use_real_llm: conversation.use_real_llm,
            mock_outputs: conversation.mock_outputs.clone(),
            variables: conversation.variables.clone(),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let mut settings = EngineSettings::default();
        if let Some(max) = self.conversation.max_tool_iterations {
            settings.max_tool_iterations = max;
        }
        if let Some(model) = &self.conversation.interlocutor_model {
            settings.interlocutor.model = model.clone();
        }
        settings
    }

    fn client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout_secs: self.http.timeout_secs,
            connect_timeout_secs: self.http.connect_timeout_secs,
            pool_max_idle_per_host: self.http.pool_max_idle_per_host,
            ..Default::default()
        }
    }

    /// Endpoints for every provider that has an API key
    pub fn endpoints(&self) -> ProviderEndpoints {
        let mut endpoints = ProviderEndpoints::default();

        if let Some(settings) = &self.credentials.openai
            && let Some(api_key) = &settings.api_key
        {
            let mut config = OpenAIConfig::new(api_key)
                .with_client_config(self.client_config())
                .with_run_poll(RunPollConfig {
                    interval: Duration::from_millis(self.http.run_poll_interval_ms),
                    max_attempts: self.http.run_poll_max_attempts,
                });
            if let Some(base_url) = &settings.base_url {
                config = config.with_base_url(base_url);
            }
            if let Some(organization) = &settings.organization {
                config = config.with_organization(organization);
            }
            endpoints = endpoints.with_openai(config);
        }

        if let Some(settings) = &self.credentials.anthropic
            && let Some(api_key) = &settings.api_key
        {
            let mut config = AnthropicConfig::new(api_key).with_client_config(self.client_config());
            if let Some(base_url) = &settings.base_url {
                config = config.with_base_url(base_url);
            }
            endpoints = endpoints.with_anthropic(config);
        }

        endpoints
    }
}

fn default_max_turns() -> u32 {
    1
}

fn default_false() -> bool {
    false
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_pool_max_idle() -> usize {
    8
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_poll_max_attempts() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}
