//! Integration tests for the OpenAI chat completions and responses connectors
//!
//! These tests mock the OpenAI API to verify the connectors' HTTP behavior.

use promptrun_core::{
    Error,
    normalized::FunctionOutput,
    provider::{
        ApiVariant, BuiltinTool, ContinuationInput, ConversationInput, FunctionDefinition,
        HistoryItem, LlmClient, Provider, ProviderConfig, ToolConfig,
    },
};
use promptrun_egress::{
    normalize,
    openai::{OpenAIConfig, OpenAIConnector},
    responses::ResponsesConnector,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn openai_config(server: &MockServer) -> OpenAIConfig {
    OpenAIConfig::new("test-key").with_base_url(server.uri())
}

fn chat_config() -> ProviderConfig {
    ProviderConfig::new(Provider::OpenAI, ApiVariant::ChatCompletions, "gpt-4o")
}

#[tokio::test]
async fn test_chat_send_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [{ "role": "user", "content": "Hello!" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Hello from mock API!" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connector = OpenAIConnector::new(openai_config(&mock_server)).unwrap();
    let raw = connector
        .call(&chat_config(), &ConversationInput::prompt("Hello!"))
        .await
        .unwrap();

    let normalized = normalize(&raw);
    assert_eq!(normalized.text, "Hello from mock API!");
    assert_eq!(normalized.usage.total_tokens, 15);
}

#[tokio::test]
async fn test_chat_sends_organization_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("openai-organization", "org-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "ok" } }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connector =
        OpenAIConnector::new(openai_config(&mock_server).with_organization("org-42")).unwrap();
    connector
        .call(&chat_config(), &ConversationInput::prompt("hi"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_chat_replays_tool_history() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "tools": [{ "type": "function", "function": { "name": "get_weather" } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "It is 20C in Paris" } }]
        })))
        .mount(&mock_server)
        .await;

    let config = chat_config().with_tools(ToolConfig {
        functions: vec![FunctionDefinition {
            name: "get_weather".into(),
            description: Some("Current weather".into()),
            parameters: json!({ "type": "object", "properties": { "city": { "type": "string" } } }),
        }],
        ..Default::default()
    });
    let input = ConversationInput::History {
        system: Some("You are helpful".into()),
        items: vec![
            HistoryItem::User {
                content: "Weather in Paris?".into(),
            },
            HistoryItem::Assistant {
                content: String::new(),
                tool_calls: vec![promptrun_core::normalized::ToolCall::new(
                    "call_1",
                    "get_weather",
                    serde_json::Map::new(),
                )],
            },
            HistoryItem::ToolOutputs {
                outputs: vec![FunctionOutput::new("call_1", "{\"temp\":20}")],
            },
        ],
    };

    let connector = OpenAIConnector::new(openai_config(&mock_server)).unwrap();
    let raw = connector.call(&config, &input).await.unwrap();
    assert_eq!(normalize(&raw).text, "It is 20C in Paris");

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[3]["role"], "tool");
    assert_eq!(messages[3]["tool_call_id"], "call_1");
}

#[tokio::test]
async fn test_chat_http_error_propagates_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Invalid API key", "type": "invalid_request_error" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let connector = OpenAIConnector::new(openai_config(&mock_server)).unwrap();
    let err = connector
        .call(&chat_config(), &ConversationInput::prompt("hi"))
        .await
        .unwrap_err();

    match err {
        Error::ProviderStatus {
            status_code,
            message,
        } => {
            assert_eq!(status_code, 401);
            assert!(message.contains("Invalid API key"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_chat_rate_limit_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "30")
                .set_body_string("slow down"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let connector = OpenAIConnector::new(openai_config(&mock_server)).unwrap();
    let err = connector
        .call(&chat_config(), &ConversationInput::prompt("hi"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::RateLimitExceeded {
            retry_after_secs: Some(30)
        }
    ));
}

#[tokio::test]
async fn test_chat_malformed_payload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{ not json"))
        .mount(&mock_server)
        .await;

    let connector = OpenAIConnector::new(openai_config(&mock_server)).unwrap();
    let err = connector
        .call(&chat_config(), &ConversationInput::prompt("hi"))
        .await
        .unwrap_err();

    assert!(err.is_provider());
    assert!(err.to_string().contains("malformed payload"));
}

#[tokio::test]
async fn test_responses_first_call_and_continuation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_partial_json(json!({ "previous_response_id": "resp_1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_2",
            "status": "completed",
            "output": [{ "type": "message", "role": "assistant", "content": [
                { "type": "output_text", "text": "Second answer", "annotations": [] }
            ]}],
            "usage": { "input_tokens": 8, "output_tokens": 4, "total_tokens": 12 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_partial_json(json!({ "input": "First question" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "status": "completed",
            "output": [
                { "type": "web_search_call", "id": "ws_1", "status": "completed" },
                { "type": "message", "role": "assistant", "content": [
                    { "type": "output_text", "text": "First answer", "annotations": [] }
                ]}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ProviderConfig::new(Provider::OpenAI, ApiVariant::Responses, "gpt-4o")
        .with_tools(ToolConfig {
            builtin: vec![BuiltinTool::WebSearch],
            ..Default::default()
        });
    let connector = ResponsesConnector::new(openai_config(&mock_server)).unwrap();

    let first = normalize(
        &connector
            .call(
                &config,
                &ConversationInput::Continuation {
                    system: None,
                    previous_response_id: None,
                    thread_id: None,
                    input: ContinuationInput::Text {
                        text: "First question".into(),
                    },
                },
            )
            .await
            .unwrap(),
    );
    assert_eq!(first.text, "First answer");
    assert_eq!(first.response_id.as_deref(), Some("resp_1"));
    assert_eq!(first.web_search_results.len(), 1);

    let second = normalize(
        &connector
            .call(
                &config,
                &ConversationInput::Continuation {
                    system: None,
                    previous_response_id: first.response_id.clone(),
                    thread_id: None,
                    input: ContinuationInput::Text {
                        text: "Second question".into(),
                    },
                },
            )
            .await
            .unwrap(),
    );
    assert_eq!(second.text, "Second answer");
    assert_eq!(second.usage.total_tokens, 12);

    let requests = mock_server.received_requests().await.unwrap();
    let first_body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(first_body.get("previous_response_id").is_none());
    assert_eq!(first_body["tools"], json!([{ "type": "web_search_preview" }]));
}

#[tokio::test]
async fn test_responses_failed_status_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_bad",
            "status": "failed",
            "output": []
        })))
        .mount(&mock_server)
        .await;

    let config = ProviderConfig::new(Provider::OpenAI, ApiVariant::Responses, "gpt-4o");
    let connector = ResponsesConnector::new(openai_config(&mock_server)).unwrap();
    let err = connector
        .call(&config, &ConversationInput::prompt("hi"))
        .await
        .unwrap_err();
    assert!(err.is_provider());
    assert!(err.to_string().contains("resp_bad"));
}
