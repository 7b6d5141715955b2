//! OpenAI assistants connector
//!
//! One call creates (or reuses) a thread, starts or resumes a run and polls it
//! until it completes or asks for tool outputs. The continuation handle is the
//! pair (thread id, run id).

use crate::{
    EgressError, Result,
    client::{ProviderResponseHandler, create_client, log_response_headers, parse_body},
    openai::{OpenAIConfig, OrganizationHeader, function_tools},
};
use async_trait::async_trait;
use promptrun_core::{
    normalized::FunctionOutput,
    provider::{
        BuiltinTool, ContinuationInput, ConversationInput, LlmClient, ProviderConfig, ToolConfig,
    },
    raw::{AssistantRun, AssistantRunResult, RawProviderResponse, RunStep, ThreadMessage},
};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

const ASSISTANTS_BETA: &str = "assistants=v2";

/// OpenAI assistants connector
pub struct AssistantsConnector {
    config: OpenAIConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct Thread {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_instructions: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct ToolOutput<'a> {
    tool_call_id: &'a str,
    output: &'a str,
}

#[derive(Debug, Serialize)]
struct SubmitToolOutputsRequest<'a> {
    tool_outputs: Vec<ToolOutput<'a>>,
}

/// What one assistants call is asked to do
#[derive(Debug, PartialEq)]
pub(crate) enum RunAction<'a> {
    /// Post a user message (on a new thread when none is given) and start a run
    StartRun {
        thread_id: Option<&'a str>,
        text: &'a str,
        instructions: Option<&'a str>,
    },
    /// Resume a run waiting for tool outputs
    SubmitOutputs {
        thread_id: &'a str,
        run_id: &'a str,
        outputs: &'a [FunctionOutput],
    },
}

/// Decide which assistants operation serves the input
pub(crate) fn plan_run(input: &ConversationInput) -> Result<RunAction<'_>> {
    match input {
        ConversationInput::Prompt { text } => Ok(RunAction::StartRun {
            thread_id: None,
            text,
            instructions: None,
        }),
        ConversationInput::Continuation {
            system,
            thread_id,
            input: ContinuationInput::Text { text },
            ..
        } => Ok(RunAction::StartRun {
            thread_id: thread_id.as_deref(),
            text,
            instructions: system.as_deref().filter(|s| !s.is_empty()),
        }),
        ConversationInput::Continuation {
            thread_id: Some(thread_id),
            previous_response_id: Some(run_id),
            input: ContinuationInput::ToolOutputs { outputs },
            ..
        } => Ok(RunAction::SubmitOutputs {
            thread_id,
            run_id,
            outputs,
        }),
        ConversationInput::Continuation { .. } => Err(EgressError::ConfigError(
            "tool outputs require both a thread id and a run id".to_string(),
        )),
        ConversationInput::History { .. } => Err(EgressError::ConfigError(
            "the assistants API keeps state in threads and does not accept replayed history"
                .to_string(),
        )),
    }
}

/// Tools attached to a run
pub(crate) fn run_tools(tools: &ToolConfig) -> Vec<Value> {
    let mut converted: Vec<Value> = function_tools(tools)
        .into_iter()
        .filter_map(|t| serde_json::to_value(t).ok())
        .collect();

    for builtin in &tools.builtin {
        match builtin {
            BuiltinTool::CodeInterpreter => converted.push(json!({ "type": "code_interpreter" })),
            BuiltinTool::FileSearch => converted.push(json!({ "type": "file_search" })),
            BuiltinTool::WebSearch => {
                debug!("Web search is not offered by the assistants API, ignoring");
            }
        }
    }

    converted
}

fn is_pending(status: &str) -> bool {
    matches!(status, "queued" | "in_progress" | "cancelling")
}

impl AssistantsConnector {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = create_client(&config.client_config)?;
        Ok(Self { config, client })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.config.url(path))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("OpenAI-Beta", ASSISTANTS_BETA)
            .apply_organization_header(&self.config)
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        log_response_headers("OpenAI Assistants", &response);
        let body = response.provider_body("OpenAI").await?;
        parse_body(&body, "OpenAI")
    }

    async fn create_thread(&self, tools: &ToolConfig) -> Result<String> {
        let mut body = json!({});
        if tools.has_builtin(BuiltinTool::FileSearch) && !tools.vector_store_ids.is_empty() {
            body["tool_resources"] = json!({
                "file_search": { "vector_store_ids": tools.vector_store_ids }
            });
        }

        let thread: Thread = self
            .execute(self.request(Method::POST, "/threads").json(&body))
            .await?;
        debug!(thread_id = %thread.id, "Created assistants thread");
        Ok(thread.id)
    }

    async fn add_message(&self, thread_id: &str, text: &str) -> Result<()> {
        let _: Value = self
            .execute(
                self.request(Method::POST, &format!("/threads/{}/messages", thread_id))
                    .json(&json!({ "role": "user", "content": text })),
            )
            .await?;
        Ok(())
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
        provider: &ProviderConfig,
        instructions: Option<&str>,
    ) -> Result<AssistantRun> {
        let request = CreateRunRequest {
            assistant_id,
            model: &provider.model,
            additional_instructions: instructions,
            temperature: provider.temperature,
            max_completion_tokens: provider.max_tokens,
            tools: run_tools(&provider.tools),
        };
        self.execute(
            self.request(Method::POST, &format!("/threads/{}/runs", thread_id))
                .json(&request),
        )
        .await
    }

    async fn submit_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[FunctionOutput],
    ) -> Result<AssistantRun> {
        let request = SubmitToolOutputsRequest {
            tool_outputs: outputs
                .iter()
                .map(|o| ToolOutput {
                    tool_call_id: &o.call_id,
                    output: &o.output,
                })
                .collect(),
        };
        self.execute(
            self.request(
                Method::POST,
                &format!("/threads/{}/runs/{}/submit_tool_outputs", thread_id, run_id),
            )
            .json(&request),
        )
        .await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<AssistantRun> {
        self.execute(self.request(
            Method::GET,
            &format!("/threads/{}/runs/{}", thread_id, run_id),
        ))
        .await
    }

    /// Poll until the run completes or requires action
    async fn wait_for_run(&self, thread_id: &str, mut run: AssistantRun) -> Result<AssistantRun> {
        let poll = self.config.run_poll;
        let mut attempts = 0;

        while is_pending(&run.status) {
            if attempts >= poll.max_attempts {
                warn!(run_id = %run.id, status = %run.status, attempts, "Gave up waiting for run");
                return Err(EgressError::Timeout(format!(
                    "run {} still '{}' after {} status checks",
                    run.id, run.status, attempts
                )));
            }
            attempts += 1;
            tokio::time::sleep(poll.interval).await;
            run = self.get_run(thread_id, &run.id).await?;
            debug!(run_id = %run.id, status = %run.status, attempts, "Polled run");
        }

        match run.status.as_str() {
            "completed" | "requires_action" => Ok(run),
            status => {
                let message = run
                    .last_error
                    .as_ref()
                    .map(|e| format!("{}: {}", e.code, e.message))
                    .unwrap_or_else(|| "no error details".to_string());
                Err(EgressError::RunFailed {
                    run_id: run.id.clone(),
                    status: status.to_string(),
                    message,
                })
            }
        }
    }

    async fn list_messages(&self, thread_id: &str, run_id: &str) -> Result<Vec<ThreadMessage>> {
        let list: ListResponse<ThreadMessage> = self
            .execute(self.request(
                Method::GET,
                &format!("/threads/{}/messages?run_id={}&order=asc", thread_id, run_id),
            ))
            .await?;
        Ok(list.data)
    }

    async fn list_steps(&self, thread_id: &str, run_id: &str) -> Result<Vec<RunStep>> {
        let list: ListResponse<RunStep> = self
            .execute(self.request(
                Method::GET,
                &format!("/threads/{}/runs/{}/steps?order=asc", thread_id, run_id),
            ))
            .await?;
        Ok(list.data)
    }

    /// Run one assistants call to completion or to a tool-output request
    #[instrument(skip(self, provider, input), fields(model = %provider.model, input = input.kind()))]
    pub async fn send(
        &self,
        provider: &ProviderConfig,
        input: &ConversationInput,
    ) -> Result<AssistantRunResult> {
        let assistant_id = provider.assistant_id.as_deref().ok_or_else(|| {
            EgressError::ConfigError("assistant_id is required for the assistants API".to_string())
        })?;

        let (thread_id, run) = match plan_run(input)? {
            RunAction::StartRun {
                thread_id,
                text,
                instructions,
            } => {
                let thread_id = match thread_id {
                    Some(id) => id.to_string(),
                    None => self.create_thread(&provider.tools).await?,
                };
                self.add_message(&thread_id, text).await?;
                let run = self
                    .create_run(&thread_id, assistant_id, provider, instructions)
                    .await?;
                (thread_id, run)
            }
            RunAction::SubmitOutputs {
                thread_id,
                run_id,
                outputs,
            } => {
                let run = self.submit_outputs(thread_id, run_id, outputs).await?;
                (thread_id.to_string(), run)
            }
        };

        debug!(thread_id = %thread_id, run_id = %run.id, status = %run.status, "Run started");
        let run = self.wait_for_run(&thread_id, run).await?;

        let messages = if run.status == "completed" {
            self.list_messages(&thread_id, &run.id).await?
        } else {
            Vec::new()
        };
        let steps = self.list_steps(&thread_id, &run.id).await?;

        Ok(AssistantRunResult {
            thread_id,
            run,
            messages,
            steps,
        })
    }
}

#[async_trait]
impl LlmClient for AssistantsConnector {
    async fn call(
        &self,
        config: &ProviderConfig,
        input: &ConversationInput,
    ) -> promptrun_core::Result<RawProviderResponse> {
        let result = self.send(config, input).await?;
        Ok(RawProviderResponse::Assistants(result))
    }
}
