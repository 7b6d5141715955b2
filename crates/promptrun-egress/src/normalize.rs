//! Response normalizer
//!
//! Pure translation of a raw provider response into a `NormalizedResponse`.
//! Missing optional fields become zero or empty; unknown item kinds are
//! skipped.

use promptrun_core::{
    normalized::{NormalizedResponse, ToolCall, Usage},
    raw::{
        AssistantRunResult, ChatCompletionResponse, ChatUsage, MessagesApiResponse,
        MessagesContentBlock, RawProviderResponse, ResponseContent, ResponseOutputItem,
        ResponsesApiResponse, RunStepToolCall, StepDetails, ThreadMessageContent, WireToolCall,
    },
};
use serde_json::{Map, Value, json};
use tracing::warn;

/// Normalize any raw provider response
pub fn normalize(raw: &RawProviderResponse) -> NormalizedResponse {
    let mut normalized = match raw {
        RawProviderResponse::ChatCompletion(r) => from_chat_completion(r),
        RawProviderResponse::Responses(r) => from_responses(r),
        RawProviderResponse::Assistants(r) => from_assistants(r),
        RawProviderResponse::Messages(r) => from_messages(r),
    };
    normalized.raw = raw.payload_json();
    normalized
}

/// Parse a JSON-encoded argument string
///
/// Anything that is not a JSON object is kept under `raw_arguments`.
pub fn parse_arguments(arguments: &str) -> Map<String, Value> {
    if arguments.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!(arguments, "Tool call arguments are not a JSON object");
            raw_arguments(arguments.to_string())
        }
    }
}

fn value_to_arguments(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            warn!(arguments = %other, "Tool call arguments are not a JSON object");
            raw_arguments(other.to_string())
        }
    }
}

fn raw_arguments(arguments: String) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("raw_arguments".to_string(), Value::String(arguments));
    map
}

fn usage(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Usage {
    let total = if total_tokens == 0 {
        prompt_tokens.saturating_add(completion_tokens)
    } else {
        total_tokens
    };
    Usage::new(prompt_tokens, completion_tokens, total)
}

fn from_chat_usage(u: Option<&ChatUsage>) -> Usage {
    u.map(|u| usage(u.prompt_tokens, u.completion_tokens, u.total_tokens))
        .unwrap_or_default()
}

fn from_wire_tool_calls(calls: &[WireToolCall]) -> Vec<ToolCall> {
    calls
        .iter()
        .filter(|c| c.tool_type == "function")
        .map(|c| ToolCall::new(&c.id, &c.function.name, parse_arguments(&c.function.arguments)))
        .collect()
}

fn from_chat_completion(resp: &ChatCompletionResponse) -> NormalizedResponse {
    let mut normalized = NormalizedResponse {
        usage: from_chat_usage(resp.usage.as_ref()),
        ..Default::default()
    };

    if let Some(choice) = resp.choices.first() {
        normalized.text = choice.message.content.clone().unwrap_or_default();
        normalized.tool_calls =
            from_wire_tool_calls(choice.message.tool_calls.as_deref().unwrap_or_default());
        normalized.web_search_results = choice
            .message
            .annotations
            .iter()
            .flatten()
            .filter(|a| a.get("type").and_then(Value::as_str) == Some("url_citation"))
            .cloned()
            .collect();
    }

    normalized
}

fn from_responses(resp: &ResponsesApiResponse) -> NormalizedResponse {
    let mut normalized = NormalizedResponse {
        usage: resp
            .usage
            .map(|u| usage(u.input_tokens, u.output_tokens, u.total_tokens))
            .unwrap_or_default(),
        response_id: Some(resp.id.clone()),
        ..Default::default()
    };
    let mut texts = Vec::new();

    for item in &resp.output {
        match item {
            ResponseOutputItem::Message { content, .. } => {
                let mut text = String::new();
                for part in content {
                    match part {
                        ResponseContent::OutputText {
                            text: part_text,
                            annotations,
                        } => {
                            text.push_str(part_text);
                            normalized.web_search_results.extend(
                                annotations
                                    .iter()
                                    .filter(|a| {
                                        a.get("type").and_then(Value::as_str)
                                            == Some("url_citation")
                                    })
                                    .cloned(),
                            );
                        }
                        ResponseContent::Refusal { refusal } => text.push_str(refusal),
                        ResponseContent::Other => {}
                    }
                }
                texts.push(text);
            }
            ResponseOutputItem::FunctionCall {
                call_id,
                name,
                arguments,
                ..
            } => normalized
                .tool_calls
                .push(ToolCall::new(call_id, name, parse_arguments(arguments))),
            ResponseOutputItem::WebSearchCall(fields) => {
                normalized.web_search_results.push(Value::Object(fields.clone()))
            }
            ResponseOutputItem::FileSearchCall(fields) => {
                normalized.file_search_results.push(Value::Object(fields.clone()))
            }
            ResponseOutputItem::CodeInterpreterCall(fields) => normalized
                .code_interpreter_results
                .push(Value::Object(fields.clone())),
            ResponseOutputItem::Other => {}
        }
    }

    normalized.text = texts.join("\n");
    normalized
}

fn from_assistants(result: &AssistantRunResult) -> NormalizedResponse {
    let run = &result.run;
    let mut normalized = NormalizedResponse {
        usage: from_chat_usage(run.usage.as_ref()),
        tool_calls: from_wire_tool_calls(run.pending_tool_calls()),
        response_id: Some(run.id.clone()),
        thread_id: Some(result.thread_id.clone()),
        ..Default::default()
    };

    normalized.text = result
        .messages
        .iter()
        .filter(|m| m.role == "assistant")
        .flat_map(|m| m.content.iter())
        .filter_map(|c| match c {
            ThreadMessageContent::Text { text } => Some(text.value.as_str()),
            ThreadMessageContent::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    for step in &result.steps {
        let Some(StepDetails::ToolCalls { tool_calls }) = &step.step_details else {
            continue;
        };
        for call in tool_calls {
            match call {
                RunStepToolCall::CodeInterpreter {
                    id,
                    code_interpreter,
                } => normalized
                    .code_interpreter_results
                    .push(json!({ "id": id, "code_interpreter": code_interpreter })),
                RunStepToolCall::FileSearch { id, file_search } => normalized
                    .file_search_results
                    .push(json!({ "id": id, "file_search": file_search })),
                RunStepToolCall::Function { .. } | RunStepToolCall::Other => {}
            }
        }
    }

    normalized
}

fn from_messages(resp: &MessagesApiResponse) -> NormalizedResponse {
    let mut normalized = NormalizedResponse {
        usage: resp
            .usage
            .map(|u| usage(u.input_tokens, u.output_tokens, 0))
            .unwrap_or_default(),
        ..Default::default()
    };

    for block in &resp.content {
        match block {
            // Web search answers arrive split into several cited text blocks
            MessagesContentBlock::Text { text, .. } => normalized.text.push_str(text),
            MessagesContentBlock::ToolUse { id, name, input } => normalized
                .tool_calls
                .push(ToolCall::new(id, name, value_to_arguments(input.clone()))),
            MessagesContentBlock::WebSearchToolResult { content, .. } => match content {
                Value::Array(results) => normalized.web_search_results.extend(results.iter().cloned()),
                Value::Null => {}
                other => normalized.web_search_results.push(other.clone()),
            },
            MessagesContentBlock::CodeExecutionToolResult { content, .. }
            | MessagesContentBlock::BashCodeExecutionToolResult { content, .. } => {
                if !content.is_null() {
                    normalized.code_interpreter_results.push(content.clone());
                }
            }
            MessagesContentBlock::ServerToolUse { .. } | MessagesContentBlock::Other => {}
        }
    }

    normalized
}
