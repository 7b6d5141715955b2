//! Function-call loop
//!
//! One turn issues a provider call for the user input, then keeps executing
//! requested function calls and sending their outputs back until the model
//! answers without tool calls or the iteration cap is reached.

use crate::{state::ConversationState, tools::ToolExecutor, usage::aggregate};
use promptrun_core::{
    Result,
    normalized::{FunctionOutput, NormalizedResponse, ToolCall, Usage},
    provider::{ContinuationInput, ConversationInput, HistoryItem, LlmClient, ProviderConfig},
};
use promptrun_egress::normalize;
use tracing::{debug, instrument, warn};

/// Follow-up calls allowed per turn before the loop gives up on tool calls
pub const MAX_TOOL_ITERATIONS: usize = 10;

/// How a turn's tool loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopTermination {
    /// The model answered without requesting tools
    Completed,
    /// The cap was hit while tool calls were still pending
    Capped { iterations: usize },
}

/// Result of one turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Last response of the turn
    pub final_response: NormalizedResponse,

    /// Executed tool calls in request order
    pub tool_calls: Vec<ToolCall>,

    /// Outputs of the executed tool calls
    pub outputs: Vec<FunctionOutput>,

    /// Usage summed over every response of the turn
    pub usage: Usage,

    /// Every response of the turn, in call order
    pub responses: Vec<NormalizedResponse>,

    pub termination: LoopTermination,
}

/// Runs the function-call loop for one turn
pub struct ToolLoop<'a> {
    client: &'a dyn LlmClient,
    executor: &'a dyn ToolExecutor,
    config: &'a ProviderConfig,
    max_iterations: usize,
}

impl<'a> ToolLoop<'a> {
    pub fn new(
        client: &'a dyn LlmClient,
        executor: &'a dyn ToolExecutor,
        config: &'a ProviderConfig,
    ) -> Self {
        Self {
            client,
            executor,
            config,
            max_iterations: MAX_TOOL_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Input for the turn's first call; the user message is already in `state`
    fn initial_input(&self, state: &ConversationState, user_text: &str) -> ConversationInput {
        if self.config.api.is_stateful() {
            state.continuation(ContinuationInput::Text {
                text: user_text.to_string(),
            })
        } else {
            ConversationInput::History {
                system: state.system_prompt.clone(),
                items: state.history_items(),
            }
        }
    }

    /// Input answering the tool calls of `last`
    fn follow_up_input(
        &self,
        state: &ConversationState,
        transcript: &mut Vec<HistoryItem>,
        last: &NormalizedResponse,
        outputs: Vec<FunctionOutput>,
    ) -> ConversationInput {
        if self.config.api.is_stateful() {
            ConversationInput::Continuation {
                system: state.system_prompt.clone(),
                previous_response_id: last.response_id.clone(),
                thread_id: last.thread_id.clone().or_else(|| state.thread_id.clone()),
                input: ContinuationInput::ToolOutputs { outputs },
            }
        } else {
            transcript.push(HistoryItem::Assistant {
                content: last.text.clone(),
                tool_calls: last.tool_calls.clone(),
            });
            transcript.push(HistoryItem::ToolOutputs { outputs });
            ConversationInput::History {
                system: state.system_prompt.clone(),
                items: transcript.clone(),
            }
        }
    }

    async fn call(&self, input: &ConversationInput) -> Result<NormalizedResponse> {
        let raw = self.client.call(self.config, input).await?;
        Ok(normalize(&raw))
    }

    /// Run one turn for the user message most recently added to `state`
    #[instrument(skip(self, state, user_text), fields(model = %self.config.model, turn = state.turn))]
    pub async fn run_turn(&self, state: &ConversationState, user_text: &str) -> Result<TurnOutcome> {
        let mut transcript = state.history_items();
        let mut current = self.call(&self.initial_input(state, user_text)).await?;
        let mut responses = vec![current.clone()];
        let mut tool_calls = Vec::new();
        let mut outputs = Vec::new();
        let mut iterations = 0;
        let mut termination = LoopTermination::Completed;

        while current.has_tool_calls() {
            if iterations >= self.max_iterations {
                warn!(
                    model = %self.config.model,
                    iterations,
                    turn = state.turn,
                    pending = current.tool_calls.len(),
                    "Tool-call iteration cap reached, using the last response as final"
                );
                termination = LoopTermination::Capped { iterations };
                break;
            }
            iterations += 1;

            let mut batch = Vec::with_capacity(current.tool_calls.len());
            for call in &current.tool_calls {
                batch.push(self.executor.execute(call).await);
            }
            debug!(iteration = iterations, calls = batch.len(), "Executed tool calls");

            tool_calls.extend(current.tool_calls.iter().cloned());
            outputs.extend(batch.iter().cloned());

            let input = self.follow_up_input(state, &mut transcript, &current, batch);
            current = self.call(&input).await?;
            responses.push(current.clone());
        }

        Ok(TurnOutcome {
            usage: aggregate(&responses),
            final_response: current,
            tool_calls,
            outputs,
            responses,
            termination,
        })
    }
}
