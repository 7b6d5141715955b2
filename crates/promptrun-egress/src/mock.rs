//! Mock LLM client
//!
//! Fabricates well-formed raw responses for every API family without touching
//! the network. Responses are deterministic given the call counter, which is
//! scoped to one client instance and starts at 1.

use async_trait::async_trait;
use promptrun_core::{
    provider::{
        ApiVariant, BuiltinTool, ContinuationInput, ConversationInput, LlmClient, ProviderConfig,
    },
    raw::{
        AssistantRun, AssistantRunResult, ChatChoice, ChatCompletionResponse,
        ChatResponseMessage, ChatUsage, MessagesApiResponse, MessagesContentBlock, MessagesUsage,
        RawProviderResponse, RequiredAction, ResponseContent, ResponseOutputItem,
        ResponsesApiResponse, ResponsesUsage, RunStep, RunStepToolCall, StepDetails,
        SubmitToolOutputs, ThreadMessage, ThreadMessageContent, ThreadText, WireFunctionCall,
        WireToolCall,
    },
};
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Completion tokens reported for every mock call
pub const MOCK_COMPLETION_TOKENS: u64 = 20;

/// Deterministic stand-in for a real provider
#[derive(Debug, Default)]
pub struct MockLlmClient {
    calls: AtomicU64,
}

/// What a single mock call decided to produce
struct MockReply {
    call: u64,
    model: String,
    text: String,
    tool_request: Option<String>,
    builtin: Vec<BuiltinTool>,
    usage: ChatUsage,
}

impl MockReply {
    fn id(&self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.call)
    }

    fn wire_tool_calls(&self) -> Option<Vec<WireToolCall>> {
        self.tool_request.as_ref().map(|name| {
            vec![WireToolCall {
                id: self.id("mock_call"),
                tool_type: "function".to_string(),
                function: WireFunctionCall {
                    name: name.clone(),
                    arguments: "{}".to_string(),
                },
            }]
        })
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls served so far
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn reply(&self, config: &ProviderConfig, input: &ConversationInput) -> MockReply {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        let echo = match (input.latest_text(), input) {
            (Some(text), _) => text.to_string(),
            (
                None,
                ConversationInput::Continuation {
                    input: ContinuationInput::ToolOutputs { outputs },
                    ..
                },
            ) => format!("received {} tool output(s)", outputs.len()),
            (None, _) if input.is_tool_output() => "received tool outputs".to_string(),
            (None, _) => String::new(),
        };

        // Ask for the first function once per user input, then answer in text
        let tool_request = match config.tools.functions.first() {
            Some(function) if !input.is_tool_output() && input.latest_text().is_some() => {
                Some(function.name.clone())
            }
            _ => None,
        };

        let text = if tool_request.is_some() {
            String::new()
        } else {
            format!("Mock response from {} (call {}): {}", config.model, call, echo)
        };

        let prompt_tokens = 10 + echo.len() as u64 / 4;
        debug!(call, tool_request = ?tool_request, "Fabricated mock response");

        MockReply {
            call,
            model: config.model.clone(),
            text,
            builtin: if tool_request.is_some() {
                Vec::new()
            } else {
                config.tools.builtin.clone()
            },
            tool_request,
            usage: ChatUsage {
                prompt_tokens,
                completion_tokens: MOCK_COMPLETION_TOKENS,
                total_tokens: prompt_tokens + MOCK_COMPLETION_TOKENS,
            },
        }
    }
}

fn record(fields: Value) -> Map<String, Value> {
    match fields {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn chat_completion(reply: MockReply) -> ChatCompletionResponse {
    let tool_calls = reply.wire_tool_calls();
    let annotations = reply
        .builtin
        .contains(&BuiltinTool::WebSearch)
        .then(|| vec![json!({ "type": "url_citation", "url_citation": { "url": "https://example.com/mock", "title": "Mock source" } })]);

    ChatCompletionResponse {
        id: reply.id("mock_resp"),
        model: reply.model.clone(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatResponseMessage {
                role: "assistant".to_string(),
                content: (!reply.text.is_empty()).then(|| reply.text.clone()),
                tool_calls: tool_calls.clone(),
                annotations,
            },
            finish_reason: Some(if tool_calls.is_some() { "tool_calls" } else { "stop" }.to_string()),
        }],
        usage: Some(reply.usage),
    }
}

fn responses(reply: MockReply) -> ResponsesApiResponse {
    let mut output = Vec::new();

    for builtin in &reply.builtin {
        let id = reply.id(match builtin {
            BuiltinTool::WebSearch => "mock_ws",
            BuiltinTool::FileSearch => "mock_fs",
            BuiltinTool::CodeInterpreter => "mock_ci",
        });
        let fields = record(json!({ "id": id, "status": "completed" }));
        output.push(match builtin {
            BuiltinTool::WebSearch => ResponseOutputItem::WebSearchCall(fields),
            BuiltinTool::FileSearch => ResponseOutputItem::FileSearchCall(fields),
            BuiltinTool::CodeInterpreter => ResponseOutputItem::CodeInterpreterCall(fields),
        });
    }

    match &reply.tool_request {
        Some(name) => output.push(ResponseOutputItem::FunctionCall {
            id: Some(reply.id("mock_fc")),
            call_id: reply.id("mock_call"),
            name: name.clone(),
            arguments: "{}".to_string(),
        }),
        None => output.push(ResponseOutputItem::Message {
            id: Some(reply.id("mock_msg")),
            role: Some("assistant".to_string()),
            content: vec![ResponseContent::OutputText {
                text: reply.text.clone(),
                annotations: vec![],
            }],
        }),
    }

    ResponsesApiResponse {
        id: reply.id("mock_resp"),
        model: reply.model.clone(),
        status: Some("completed".to_string()),
        output,
        usage: Some(ResponsesUsage {
            input_tokens: reply.usage.prompt_tokens,
            output_tokens: reply.usage.completion_tokens,
            total_tokens: reply.usage.total_tokens,
        }),
    }
}

fn assistants(reply: MockReply, input: &ConversationInput) -> AssistantRunResult {
    let thread_id = match input {
        ConversationInput::Continuation {
            thread_id: Some(thread_id),
            ..
        } => thread_id.clone(),
        _ => reply.id("mock_thread"),
    };
    let run_id = reply.id("mock_run");
    let tool_calls = reply.wire_tool_calls();

    let steps = reply
        .builtin
        .iter()
        .filter_map(|builtin| match builtin {
            BuiltinTool::CodeInterpreter => Some(RunStepToolCall::CodeInterpreter {
                id: reply.id("mock_ci"),
                code_interpreter: json!({ "input": "print(42)", "outputs": [{ "type": "logs", "logs": "42" }] }),
            }),
            BuiltinTool::FileSearch => Some(RunStepToolCall::FileSearch {
                id: reply.id("mock_fs"),
                file_search: json!({ "results": [] }),
            }),
            BuiltinTool::WebSearch => None,
        })
        .map(|call| RunStep {
            id: reply.id("mock_step"),
            step_details: Some(StepDetails::ToolCalls {
                tool_calls: vec![call],
            }),
        })
        .collect();

    let messages = if tool_calls.is_some() {
        Vec::new()
    } else {
        vec![ThreadMessage {
            id: reply.id("mock_msg"),
            role: "assistant".to_string(),
            run_id: Some(run_id.clone()),
            content: vec![ThreadMessageContent::Text {
                text: ThreadText {
                    value: reply.text.clone(),
                    annotations: vec![],
                },
            }],
        }]
    };

    AssistantRunResult {
        thread_id: thread_id.clone(),
        run: AssistantRun {
            id: run_id,
            thread_id,
            status: if tool_calls.is_some() { "requires_action" } else { "completed" }.to_string(),
            model: reply.model.clone(),
            required_action: tool_calls.map(|tool_calls| RequiredAction {
                action_type: "submit_tool_outputs".to_string(),
                submit_tool_outputs: Some(SubmitToolOutputs { tool_calls }),
            }),
            last_error: None,
            usage: Some(reply.usage),
        },
        messages,
        steps,
    }
}

fn messages(reply: MockReply) -> MessagesApiResponse {
    let mut content = Vec::new();

    for builtin in &reply.builtin {
        match builtin {
            BuiltinTool::WebSearch => content.push(MessagesContentBlock::WebSearchToolResult {
                tool_use_id: reply.id("mock_srvtoolu"),
                content: json!([{ "type": "web_search_result", "url": "https://example.com/mock", "title": "Mock source" }]),
            }),
            BuiltinTool::CodeInterpreter => {
                content.push(MessagesContentBlock::CodeExecutionToolResult {
                    tool_use_id: reply.id("mock_srvtoolu"),
                    content: json!({ "type": "code_execution_result", "stdout": "42", "stderr": "", "return_code": 0 }),
                })
            }
            BuiltinTool::FileSearch => {}
        }
    }

    match &reply.tool_request {
        Some(name) => content.push(MessagesContentBlock::ToolUse {
            id: reply.id("mock_call"),
            name: name.clone(),
            input: json!({}),
        }),
        None => content.push(MessagesContentBlock::Text {
            text: reply.text.clone(),
            citations: None,
        }),
    }

    MessagesApiResponse {
        id: reply.id("mock_resp"),
        model: reply.model.clone(),
        stop_reason: Some(if reply.tool_request.is_some() { "tool_use" } else { "end_turn" }.to_string()),
        content,
        usage: Some(MessagesUsage {
            input_tokens: reply.usage.prompt_tokens,
            output_tokens: reply.usage.completion_tokens,
        }),
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn call(
        &self,
        config: &ProviderConfig,
        input: &ConversationInput,
    ) -> promptrun_core::Result<RawProviderResponse> {
        config.validate()?;
        crate::adapter::check_input(config.api, input)?;

        let reply = self.reply(config, input);
        Ok(match config.api {
            ApiVariant::ChatCompletions => RawProviderResponse::ChatCompletion(chat_completion(reply)),
            ApiVariant::Responses => RawProviderResponse::Responses(responses(reply)),
            ApiVariant::Assistants => RawProviderResponse::Assistants(assistants(reply, input)),
            ApiVariant::Messages => RawProviderResponse::Messages(messages(reply)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use promptrun_core::{
        normalized::FunctionOutput,
        provider::{FunctionDefinition, HistoryItem, Provider, ToolConfig},
    };

    fn config(api: ApiVariant) -> ProviderConfig {
        let provider = if api == ApiVariant::Messages {
            Provider::Anthropic
        } else {
            Provider::OpenAI
        };
        let config = ProviderConfig::new(provider, api, "mock-model");
        if api == ApiVariant::Assistants {
            config.with_assistant_id("asst_mock")
        } else {
            config
        }
    }

    fn with_function(config: ProviderConfig) -> ProviderConfig {
        config.with_tools(ToolConfig {
            functions: vec![FunctionDefinition {
                name: "get_weather".into(),
                description: None,
                parameters: json!({"type": "object"}),
            }],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_text_reply_for_every_api() {
        for api in [
            ApiVariant::ChatCompletions,
            ApiVariant::Responses,
            ApiVariant::Assistants,
            ApiVariant::Messages,
        ] {
            let client = MockLlmClient::new();
            let raw = client
                .call(&config(api), &ConversationInput::prompt("Hello there"))
                .await
                .unwrap();
            assert_eq!(raw.api(), api);

            let normalized = normalize(&raw);
            assert_eq!(normalized.text, "Mock response from mock-model (call 1): Hello there");
            assert_eq!(normalized.usage.prompt_tokens, 10 + 11 / 4);
            assert_eq!(normalized.usage.completion_tokens, MOCK_COMPLETION_TOKENS);
            assert!(normalized.tool_calls.is_empty());
        }
    }

    #[tokio::test]
    async fn test_counter_is_per_instance() {
        let first = MockLlmClient::new();
        let second = MockLlmClient::new();
        let cfg = config(ApiVariant::ChatCompletions);
        let input = ConversationInput::prompt("x");

        first.call(&cfg, &input).await.unwrap();
        let raw = first.call(&cfg, &input).await.unwrap();
        assert!(normalize(&raw).text.contains("(call 2)"));

        let raw = second.call(&cfg, &input).await.unwrap();
        assert!(normalize(&raw).text.contains("(call 1)"));
        assert_eq!(first.calls(), 2);
    }

    #[tokio::test]
    async fn test_requests_function_then_answers() {
        let client = MockLlmClient::new();
        let cfg = with_function(config(ApiVariant::ChatCompletions));

        let raw = client.call(&cfg, &ConversationInput::prompt("Weather?")).await.unwrap();
        let first = normalize(&raw);
        assert_eq!(first.tool_calls.len(), 1);
        assert_eq!(first.tool_calls[0].function_name, "get_weather");
        assert_eq!(first.tool_calls[0].id, "mock_call_1");
        assert!(first.text.is_empty());

        let input = ConversationInput::History {
            system: None,
            items: vec![
                HistoryItem::User {
                    content: "Weather?".into(),
                },
                HistoryItem::Assistant {
                    content: String::new(),
                    tool_calls: first.tool_calls.clone(),
                },
                HistoryItem::ToolOutputs {
                    outputs: vec![FunctionOutput::new("mock_call_1", "{}")],
                },
            ],
        };
        let second = normalize(&client.call(&cfg, &input).await.unwrap());
        assert!(second.tool_calls.is_empty());
        assert!(second.text.contains("(call 2)"));
    }

    #[tokio::test]
    async fn test_assistants_keeps_thread_and_requires_action() {
        let client = MockLlmClient::new();
        let cfg = with_function(config(ApiVariant::Assistants));

        let raw = client.call(&cfg, &ConversationInput::prompt("Hi")).await.unwrap();
        let first = normalize(&raw);
        assert_eq!(first.thread_id.as_deref(), Some("mock_thread_1"));
        assert_eq!(first.response_id.as_deref(), Some("mock_run_1"));
        assert_eq!(first.tool_calls.len(), 1);

        let input = ConversationInput::Continuation {
            system: None,
            previous_response_id: first.response_id.clone(),
            thread_id: first.thread_id.clone(),
            input: ContinuationInput::ToolOutputs {
                outputs: vec![FunctionOutput::new("mock_call_1", "{}")],
            },
        };
        let second = normalize(&client.call(&cfg, &input).await.unwrap());
        assert_eq!(second.thread_id.as_deref(), Some("mock_thread_1"));
        assert_eq!(second.response_id.as_deref(), Some("mock_run_2"));
        assert!(second.text.ends_with("received 1 tool output(s)"));
    }

    #[tokio::test]
    async fn test_builtin_results_fabricated() {
        let client = MockLlmClient::new();
        let cfg = config(ApiVariant::Responses).with_tools(ToolConfig {
            builtin: vec![BuiltinTool::WebSearch, BuiltinTool::CodeInterpreter],
            ..Default::default()
        });

        let normalized = normalize(&client.call(&cfg, &ConversationInput::prompt("news")).await.unwrap());
        assert_eq!(normalized.web_search_results.len(), 1);
        assert_eq!(normalized.code_interpreter_results.len(), 1);
        assert!(normalized.file_search_results.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let client = MockLlmClient::new();
        let cfg = ProviderConfig::new(Provider::Anthropic, ApiVariant::ChatCompletions, "claude");
        let err = client.call(&cfg, &ConversationInput::prompt("x")).await.unwrap_err();
        assert!(err.is_config());
        assert_eq!(client.calls(), 0);
    }
}
