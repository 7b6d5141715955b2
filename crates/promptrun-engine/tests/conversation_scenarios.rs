//! End-to-end conversation scenarios
//!
//! Drive `ConversationEngine` with scripted LLM clients and interlocutors and
//! check the resulting record.

use async_trait::async_trait;
use promptrun_core::{
    Error, Result,
    normalized::{Message, Usage},
    provider::{
        ApiVariant, ContinuationInput, ConversationInput, FunctionDefinition, HistoryItem,
        LlmClient, Provider, ProviderConfig, ToolConfig,
    },
    raw::RawProviderResponse,
};
use promptrun_engine::{
    ConversationEngine, EngineInput, EngineSettings, Interlocutor, MockInterlocutor,
    MockToolExecutor,
};
use serde_json::json;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

fn chat_config() -> ProviderConfig {
    ProviderConfig::new(Provider::OpenAI, ApiVariant::ChatCompletions, "gpt-4o")
}

fn with_lookup(config: ProviderConfig) -> ProviderConfig {
    config.with_tools(ToolConfig {
        functions: vec![FunctionDefinition {
            name: "lookup".to_string(),
            description: Some("Look something up".to_string()),
            parameters: json!({ "type": "object", "properties": {} }),
        }],
        ..Default::default()
    })
}

fn chat_text(id: usize, text: &str, usage: Option<(u64, u64)>) -> RawProviderResponse {
    let mut body = json!({
        "id": format!("chatcmpl-{}", id),
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    });
    if let Some((prompt, completion)) = usage {
        body["usage"] = json!({
            "prompt_tokens": prompt,
            "completion_tokens": completion,
            "total_tokens": prompt + completion
        });
    }
    RawProviderResponse::ChatCompletion(serde_json::from_value(body).unwrap())
}

fn chat_tool_call(id: usize) -> RawProviderResponse {
    RawProviderResponse::ChatCompletion(
        serde_json::from_value(json!({
            "id": format!("chatcmpl-{}", id),
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": format!("call_{}", id),
                        "type": "function",
                        "function": { "name": "lookup", "arguments": "{\"q\":\"x\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12 }
        }))
        .unwrap(),
    )
}

/// Chat client that always asks for another tool call
#[derive(Default)]
struct RunawayToolClient {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmClient for RunawayToolClient {
    async fn call(
        &self,
        _config: &ProviderConfig,
        _input: &ConversationInput,
    ) -> Result<RawProviderResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(chat_tool_call(n))
    }
}

/// Chat client answering in text without usage
#[derive(Default)]
struct NoUsageClient;

#[async_trait]
impl LlmClient for NoUsageClient {
    async fn call(
        &self,
        _config: &ProviderConfig,
        _input: &ConversationInput,
    ) -> Result<RawProviderResponse> {
        Ok(chat_text(1, "no usage reported", None))
    }
}

/// Interlocutor replaying a fixed script, then ending
struct ScriptedInterlocutor {
    replies: Mutex<Vec<&'static str>>,
}

impl ScriptedInterlocutor {
    fn new(replies: &[&'static str]) -> Self {
        let mut replies = replies.to_vec();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
        }
    }
}

#[async_trait]
impl Interlocutor for ScriptedInterlocutor {
    async fn next_message(
        &self,
        _simulation_prompt: &str,
        _history: &[Message],
        _turn: u32,
    ) -> Result<Option<String>> {
        let reply = self.replies.lock().unwrap().pop();
        Ok(reply.and_then(promptrun_engine::interlocutor::interpret_reply))
    }
}

/// Responses-API client: turn 1 requests a tool once, every call records its input
#[derive(Default)]
struct StatefulClient {
    inputs: Mutex<Vec<ConversationInput>>,
}

#[async_trait]
impl LlmClient for StatefulClient {
    async fn call(
        &self,
        _config: &ProviderConfig,
        input: &ConversationInput,
    ) -> Result<RawProviderResponse> {
        let n = {
            let mut inputs = self.inputs.lock().unwrap();
            inputs.push(input.clone());
            inputs.len()
        };

        let output = if n == 1 {
            json!([{ "type": "function_call", "call_id": "call_1", "name": "lookup", "arguments": "{}" }])
        } else {
            json!([{
                "type": "message",
                "role": "assistant",
                "content": [{ "type": "output_text", "text": format!("answer {}", n) }]
            }])
        };

        Ok(RawProviderResponse::Responses(
            serde_json::from_value(json!({
                "id": format!("resp_{}", n),
                "model": "gpt-4o",
                "status": "completed",
                "output": output,
                "usage": { "input_tokens": 5, "output_tokens": 5, "total_tokens": 10 }
            }))
            .unwrap(),
        ))
    }
}

#[tokio::test]
async fn test_single_turn_mock_conversation() {
    let input = EngineInput::new(chat_config(), "Hello");
    let result = ConversationEngine::default().run(&input).await.unwrap();

    assert_eq!(result.messages.len(), 2);
    assert_eq!(result.messages[0].content, "Hello");
    assert_eq!(result.messages[0].turn, 1);
    assert!(result.messages[1].is_assistant());
    assert_eq!(result.total_turns, 1);
    assert_eq!(result.model, "gpt-4o");
}

#[tokio::test]
async fn test_multi_turn_mock_conversation_runs_to_max_turns() {
    let input = EngineInput::new(chat_config(), "Hello")
        .with_max_turns(3)
        .with_interlocutor_prompt("You are a curious customer.");
    let result = ConversationEngine::default().run(&input).await.unwrap();

    let users: Vec<_> = result.messages.iter().filter(|m| !m.is_assistant()).collect();
    assert_eq!(users.len(), 3);
    assert_eq!(result.total_turns, 3);
    assert_eq!(users[1].content, "Thanks, can you tell me more?");
    assert_eq!(result.messages[5].turn, 3);
}

#[tokio::test]
async fn test_end_marker_stops_before_user_message() {
    let input = EngineInput::new(chat_config(), "Hello")
        .with_max_turns(5)
        .with_interlocutor_prompt("persona");
    let client = promptrun_egress::mock::MockLlmClient::new();
    let interlocutor = ScriptedInterlocutor::new(&["Tell me more", "ok bye [END_CONVERSATION] really"]);

    let result = ConversationEngine::default()
        .run_with(&input, &client, &interlocutor, &MockToolExecutor::default())
        .await
        .unwrap();

    assert_eq!(result.total_turns, 2);
    assert_eq!(result.messages.len(), 4);
    assert_eq!(result.messages[2].content, "Tell me more");
    assert!(result.messages.last().unwrap().is_assistant());
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn test_runaway_tool_calls_are_capped() {
    let input = EngineInput::new(with_lookup(chat_config()), "Go");
    let client = RunawayToolClient::default();

    let result = ConversationEngine::default()
        .run_with(&input, &client, &MockInterlocutor, &MockToolExecutor::default())
        .await
        .unwrap();

    assert_eq!(client.calls.load(Ordering::SeqCst), 11);
    assert_eq!(result.total_turns, 1);

    let assistant = &result.messages[1];
    assert_eq!(assistant.tool_calls.len(), 10);
    assert_eq!(assistant.usage, Some(Usage::new(110, 22, 132)));
    assert_eq!(result.tools_used, vec!["lookup"]);
}

#[tokio::test]
async fn test_cap_follows_engine_setting() {
    let input = EngineInput::new(with_lookup(chat_config()), "Go");
    let client = RunawayToolClient::default();
    let engine = ConversationEngine::default().with_settings(EngineSettings {
        max_tool_iterations: 2,
        ..Default::default()
    });

    engine
        .run_with(&input, &client, &MockInterlocutor, &MockToolExecutor::default())
        .await
        .unwrap();

    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_tokens_absent_when_no_usage_reported() {
    let input = EngineInput::new(chat_config(), "Hello")
        .with_max_turns(2)
        .with_interlocutor_prompt("persona");

    let result = ConversationEngine::default()
        .run_with(&input, &NoUsageClient, &MockInterlocutor, &MockToolExecutor::default())
        .await
        .unwrap();

    assert_eq!(result.total_turns, 2);
    assert!(result.messages.iter().all(|m| m.usage.is_none()));
    assert!(result.tokens.is_none());

    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("tokens").is_none());
}

#[tokio::test]
async fn test_stateful_turn_continues_from_final_response() {
    let config = with_lookup(ProviderConfig::new(
        Provider::OpenAI,
        ApiVariant::Responses,
        "gpt-4o",
    ));
    let input = EngineInput::new(config, "Hello")
        .with_system_prompt("Be brief")
        .with_max_turns(2)
        .with_interlocutor_prompt("persona");
    let client = StatefulClient::default();

    let result = ConversationEngine::default()
        .run_with(&input, &client, &MockInterlocutor, &MockToolExecutor::default())
        .await
        .unwrap();

    let inputs = client.inputs.lock().unwrap();
    assert_eq!(inputs.len(), 3);

    match &inputs[1] {
        ConversationInput::Continuation {
            previous_response_id,
            input: ContinuationInput::ToolOutputs { outputs },
            ..
        } => {
            assert_eq!(previous_response_id.as_deref(), Some("resp_1"));
            assert_eq!(outputs[0].call_id, "call_1");
        }
        other => panic!("unexpected tool-output input: {:?}", other),
    }

    match &inputs[2] {
        ConversationInput::Continuation {
            system,
            previous_response_id,
            input: ContinuationInput::Text { text },
            ..
        } => {
            assert_eq!(previous_response_id.as_deref(), Some("resp_2"));
            assert_eq!(system.as_deref(), Some("Be brief"));
            assert_eq!(text, "Thanks, can you tell me more?");
        }
        other => panic!("unexpected turn-2 input: {:?}", other),
    }

    assert_eq!(result.messages[1].response_id.as_deref(), Some("resp_2"));
    assert_eq!(result.messages[1].usage, Some(Usage::new(10, 10, 20)));
    assert_eq!(result.rendered_prompt, "Be brief");
}

#[tokio::test]
async fn test_stateless_turn_replays_previous_texts() {
    let input = EngineInput::new(chat_config(), "Hello")
        .with_max_turns(2)
        .with_interlocutor_prompt("persona");
    let client = StatefulClient::default();
    let stateless = RecordingChat::new(&client);

    ConversationEngine::default()
        .run_with(&input, &stateless, &MockInterlocutor, &MockToolExecutor::default())
        .await
        .unwrap();

    let inputs = client.inputs.lock().unwrap();
    match &inputs[1] {
        ConversationInput::History { items, .. } => {
            assert_eq!(items.len(), 3);
            assert!(matches!(&items[0], HistoryItem::User { content } if content == "Hello"));
            assert!(matches!(&items[1], HistoryItem::Assistant { content, .. } if content == "echo 1"));
        }
        other => panic!("unexpected turn-2 input: {:?}", other),
    }
}

/// Records inputs on `inner` but answers like a chat completions API
struct RecordingChat<'a> {
    inner: &'a StatefulClient,
}

impl<'a> RecordingChat<'a> {
    fn new(inner: &'a StatefulClient) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LlmClient for RecordingChat<'_> {
    async fn call(
        &self,
        _config: &ProviderConfig,
        input: &ConversationInput,
    ) -> Result<RawProviderResponse> {
        let n = {
            let mut inputs = self.inner.inputs.lock().unwrap();
            inputs.push(input.clone());
            inputs.len()
        };
        Ok(chat_text(n, &format!("echo {}", n), Some((1, 1))))
    }
}

#[tokio::test]
async fn test_provider_error_propagates_without_result() {
    struct FailingClient;

    #[async_trait]
    impl LlmClient for FailingClient {
        async fn call(
            &self,
            _config: &ProviderConfig,
            _input: &ConversationInput,
        ) -> Result<RawProviderResponse> {
            Err(Error::ProviderStatus {
                status_code: 401,
                message: "invalid api key".to_string(),
            })
        }
    }

    let input = EngineInput::new(chat_config(), "Hello");
    let err = ConversationEngine::default()
        .run_with(&input, &FailingClient, &MockInterlocutor, &MockToolExecutor::default())
        .await
        .unwrap_err();

    assert!(err.is_provider());
}
