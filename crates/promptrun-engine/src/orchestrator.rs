//! Conversation orchestrator
//!
//! Runs turns 1..=max_turns: the opening message on turn 1, interlocutor
//! messages afterwards, a function-call loop per turn, and finally the result
//! record. A conversation either yields a complete result or an error.

use crate::{
    config::EngineInput,
    interlocutor::{Interlocutor, LlmInterlocutor, MockInterlocutor},
    output::{ConversationResult, build_output},
    state::ConversationState,
    tool_loop::{LoopTermination, MAX_TOOL_ITERATIONS, ToolLoop},
    tools::{MockToolExecutor, ToolExecutor},
};
use promptrun_core::{
    Result,
    provider::{LlmClient, ProviderConfig},
};
use promptrun_egress::{ProviderAdapter, ProviderEndpoints};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Engine-wide knobs
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Follow-up calls allowed per turn while the model keeps requesting tools
    pub max_tool_iterations: usize,

    /// Model that writes the simulated user messages in real mode
    pub interlocutor: ProviderConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_tool_iterations: MAX_TOOL_ITERATIONS,
            interlocutor: LlmInterlocutor::default_config(),
        }
    }
}

/// Executes conversations; holds no per-conversation state
#[derive(Debug, Clone, Default)]
pub struct ConversationEngine {
    endpoints: ProviderEndpoints,
    settings: EngineSettings,
}

impl ConversationEngine {
    pub fn new(endpoints: ProviderEndpoints) -> Self {
        Self {
            endpoints,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run one conversation with adapters chosen from the input
    #[instrument(skip(self, input), fields(provider = %input.provider.provider, api = %input.provider.api, model = %input.provider.model))]
    pub async fn run(&self, input: &EngineInput) -> Result<ConversationResult> {
        input.validate()?;

        let client = ProviderAdapter::select(&input.provider, &self.endpoints, input.use_real_llm)?;
        let executor = MockToolExecutor::new(input.mock_outputs.clone());

        if input.use_real_llm && input.max_turns > 1 {
            let simulator = ProviderAdapter::select(&self.settings.interlocutor, &self.endpoints, true)?;
            let interlocutor = LlmInterlocutor::new(&simulator, self.settings.interlocutor.clone());
            self.run_with(input, &client, &interlocutor, &executor).await
        } else {
            self.run_with(input, &client, &MockInterlocutor, &executor).await
        }
    }

    /// Run one conversation against explicit collaborators
    pub async fn run_with(
        &self,
        input: &EngineInput,
        client: &dyn LlmClient,
        interlocutor: &dyn Interlocutor,
        executor: &dyn ToolExecutor,
    ) -> Result<ConversationResult> {
        input.validate()?;

        let started = Instant::now();
        let prompts = input.render_prompts();
        let stateful = input.provider.api.is_stateful();
        let simulation_prompt = input.interlocutor_prompt.as_deref().unwrap_or_default();
        let tool_loop = ToolLoop::new(client, executor, &input.provider)
            .with_max_iterations(self.settings.max_tool_iterations);

        let mut state = ConversationState::new(prompts.system.clone());

        for turn in 1..=input.max_turns {
            let user_text = if turn == 1 {
                Some(prompts.first_message.clone())
            } else {
                interlocutor
                    .next_message(simulation_prompt, &state.messages, turn)
                    .await?
            };

            let Some(user_text) = user_text else {
                info!(turn, "Interlocutor ended the conversation early");
                break;
            };

            state.begin_turn(user_text.as_str());
            let outcome = tool_loop.run_turn(&state, &user_text).await?;

            if let LoopTermination::Capped { iterations } = outcome.termination {
                debug!(turn, iterations, "Turn finished at the tool-call cap");
            }
            info!(
                turn,
                tool_calls = outcome.tool_calls.len(),
                provider_calls = outcome.responses.len(),
                total_tokens = outcome.usage.total_tokens,
                "Turn completed"
            );

            state.complete_turn(outcome, stateful);
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = build_output(state, prompts.display_prompt(), &input.provider, elapsed_ms);

        info!(
            total_turns = result.total_turns,
            response_time_ms = result.response_time_ms,
            "Conversation completed"
        );
        Ok(result)
    }
}
