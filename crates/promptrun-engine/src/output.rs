//! Standardized conversation result

use crate::state::ConversationState;
use promptrun_core::{
    normalized::{Message, NormalizedResponse, Usage},
    provider::{ApiVariant, BuiltinTool, Provider, ProviderConfig},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Final status of a conversation that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Completed,
}

/// Result record handed to evaluators and callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResult {
    /// Rendered system prompt, or the rendered opening message without one
    pub rendered_prompt: String,

    pub model: String,

    pub provider: Provider,

    pub api: ApiVariant,

    pub messages: Vec<Message>,

    /// Number of assistant messages
    pub total_turns: u32,

    pub status: ConversationStatus,

    pub response_time_ms: u64,

    /// Conversation-wide usage; absent when no assistant message carried any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Usage>,

    pub tools_used: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search_results: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_interpreter_results: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_search_results: Option<Vec<Value>>,
}

impl ConversationResult {
    /// Text of the last assistant message
    pub fn final_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_assistant())
            .map(|m| m.content.as_str())
    }
}

fn builtin_name(tool: BuiltinTool) -> &'static str {
    match tool {
        BuiltinTool::WebSearch => "web_search",
        BuiltinTool::CodeInterpreter => "code_interpreter",
        BuiltinTool::FileSearch => "file_search",
    }
}

fn collect(
    responses: &[NormalizedResponse],
    pick: impl Fn(&NormalizedResponse) -> &Vec<Value>,
) -> Option<Vec<Value>> {
    let all: Vec<Value> = responses.iter().flat_map(|r| pick(r).iter().cloned()).collect();
    (!all.is_empty()).then_some(all)
}

/// Assemble the result from a finished conversation
pub fn build_output(
    state: ConversationState,
    rendered_prompt: impl Into<String>,
    config: &ProviderConfig,
    response_time_ms: u64,
) -> ConversationResult {
    let total_turns = state.completed_turns();
    let ConversationState {
        messages,
        accumulated_responses: responses,
        ..
    } = state;

    let assistants = || messages.iter().filter(|m| m.is_assistant());

    let usages: Vec<Usage> = assistants().filter_map(|m| m.usage).collect();
    let tokens = (!usages.is_empty()).then(|| usages.iter().sum());

    let web_search_results = collect(&responses, |r| &r.web_search_results);
    let code_interpreter_results = collect(&responses, |r| &r.code_interpreter_results);
    let file_search_results = collect(&responses, |r| &r.file_search_results);

    let mut tools_used: Vec<String> = Vec::new();
    for call in assistants().flat_map(|m| m.tool_calls.iter()) {
        if !tools_used.contains(&call.function_name) {
            tools_used.push(call.function_name.clone());
        }
    }
    for (tool, results) in [
        (BuiltinTool::WebSearch, &web_search_results),
        (BuiltinTool::CodeInterpreter, &code_interpreter_results),
        (BuiltinTool::FileSearch, &file_search_results),
    ] {
        if results.is_some() {
            tools_used.push(builtin_name(tool).to_string());
        }
    }

    ConversationResult {
        rendered_prompt: rendered_prompt.into(),
        model: config.model.clone(),
        provider: config.provider,
        api: config.api,
        messages,
        total_turns,
        status: ConversationStatus::Completed,
        response_time_ms,
        tokens,
        tools_used,
        web_search_results,
        code_interpreter_results,
        file_search_results,
    }
}
