//! Per-conversation state

use crate::tool_loop::TurnOutcome;
use promptrun_core::{
    normalized::{Message, NormalizedResponse, Role},
    provider::{ContinuationInput, ConversationInput, HistoryItem},
};

/// Mutable accumulator owned by one conversation run
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    /// Rendered system prompt
    pub system_prompt: Option<String>,

    /// Transcript in order
    pub messages: Vec<Message>,

    /// Current turn (0 before the first turn starts)
    pub turn: u32,

    /// Continuation handle from the previous turn's final response
    pub previous_response_id: Option<String>,

    /// Thread of a thread/run API
    pub thread_id: Option<String>,

    /// Every normalized response of the conversation, tool round-trips included
    pub accumulated_responses: Vec<NormalizedResponse>,
}

impl ConversationState {
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            system_prompt,
            ..Default::default()
        }
    }

    /// Start the next turn with its user message
    pub fn begin_turn(&mut self, user_text: impl Into<String>) -> u32 {
        self.turn += 1;
        self.messages.push(Message::user(user_text, self.turn));
        self.turn
    }

    /// Close the current turn with the tool loop's outcome
    pub fn complete_turn(&mut self, outcome: TurnOutcome, stateful: bool) {
        let TurnOutcome {
            final_response,
            tool_calls,
            usage,
            responses,
            ..
        } = outcome;

        if stateful {
            self.previous_response_id = final_response.response_id.clone();
            if final_response.thread_id.is_some() {
                self.thread_id = final_response.thread_id.clone();
            }
        }

        let message = Message::assistant(final_response.text.clone(), self.turn)
            .with_usage((!usage.is_zero()).then_some(usage))
            .with_tool_calls(tool_calls)
            .with_response_id(final_response.response_id.clone());
        self.messages.push(message);
        self.accumulated_responses.extend(responses);
    }

    /// Number of turns that produced an assistant message
    pub fn completed_turns(&self) -> u32 {
        self.messages.iter().filter(|m| m.is_assistant()).count() as u32
    }

    /// Transcript replay for stateless APIs (texts only)
    pub fn history_items(&self) -> Vec<HistoryItem> {
        self.messages
            .iter()
            .map(|m| match m.role {
                Role::User => HistoryItem::User {
                    content: m.content.clone(),
                },
                Role::Assistant => HistoryItem::Assistant {
                    content: m.content.clone(),
                    tool_calls: vec![],
                },
            })
            .collect()
    }

    /// Continuation input carrying the stored handles
    pub fn continuation(&self, input: ContinuationInput) -> ConversationInput {
        ConversationInput::Continuation {
            system: self.system_prompt.clone(),
            previous_response_id: self.previous_response_id.clone(),
            thread_id: self.thread_id.clone(),
            input,
        }
    }
}
