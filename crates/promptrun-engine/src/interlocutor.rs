//! Simulated user for turns 2..N

use async_trait::async_trait;
use promptrun_core::{
    Result,
    normalized::{Message, Role},
    provider::{ApiVariant, ConversationInput, LlmClient, Provider, ProviderConfig},
};
use promptrun_egress::normalize;
use tracing::{debug, instrument};

/// Literal the simulator emits to end the conversation
pub const END_MARKER: &str = "[END_CONVERSATION]";

/// Canned follow-up returned in mock mode
pub const MOCK_FOLLOW_UP: &str = "Thanks, can you tell me more?";

/// Default model for the simulated user
pub const DEFAULT_INTERLOCUTOR_MODEL: &str = "gpt-4o-mini";

/// Produces the next user message, or `None` to end the conversation
#[async_trait]
pub trait Interlocutor: Send + Sync {
    async fn next_message(
        &self,
        simulation_prompt: &str,
        history: &[Message],
        turn: u32,
    ) -> Result<Option<String>>;
}

/// Always answers with the same follow-up and never ends the conversation
#[derive(Debug, Clone, Default)]
pub struct MockInterlocutor;

#[async_trait]
impl Interlocutor for MockInterlocutor {
    async fn next_message(
        &self,
        _simulation_prompt: &str,
        _history: &[Message],
        turn: u32,
    ) -> Result<Option<String>> {
        debug!(turn, "Mock interlocutor follow-up");
        Ok(Some(MOCK_FOLLOW_UP.to_string()))
    }
}

/// Asks a model to write the next user message
pub struct LlmInterlocutor<'a> {
    client: &'a dyn LlmClient,
    config: ProviderConfig,
}

impl<'a> LlmInterlocutor<'a> {
    pub fn new(client: &'a dyn LlmClient, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    /// Simulator configuration used when none is supplied
    pub fn default_config() -> ProviderConfig {
        ProviderConfig::new(
            Provider::OpenAI,
            ApiVariant::ChatCompletions,
            DEFAULT_INTERLOCUTOR_MODEL,
        )
        .with_temperature(0.7)
    }
}

#[async_trait]
impl Interlocutor for LlmInterlocutor<'_> {
    #[instrument(skip(self, simulation_prompt, history), fields(model = %self.config.model))]
    async fn next_message(
        &self,
        simulation_prompt: &str,
        history: &[Message],
        turn: u32,
    ) -> Result<Option<String>> {
        let prompt = build_simulation_prompt(simulation_prompt, history);
        let raw = self
            .client
            .call(&self.config, &ConversationInput::prompt(prompt))
            .await?;
        let reply = interpret_reply(&normalize(&raw).text);

        if reply.is_none() {
            debug!(turn, "Interlocutor ended the conversation");
        }
        Ok(reply)
    }
}

/// Prompt asking for exactly one next user message or the end marker
pub fn build_simulation_prompt(simulation_prompt: &str, history: &[Message]) -> String {
    let transcript = history
        .iter()
        .map(|m| match m.role {
            Role::User => format!("User: {}", m.content),
            Role::Assistant => format!("Assistant: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are simulating the user in a conversation with an AI assistant.\n\n\
         {}\n\n\
         Conversation so far:\n{}\n\n\
         Write exactly one next message from the user, with no prefix or commentary. \
         If the user's goal has been met or the conversation should end, reply with {} instead.",
        simulation_prompt.trim(),
        transcript,
        END_MARKER
    )
}

/// Marker anywhere (or nothing at all) ends the conversation
pub fn interpret_reply(text: &str) -> Option<String> {
    if text.contains(END_MARKER) {
        return None;
    }
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
