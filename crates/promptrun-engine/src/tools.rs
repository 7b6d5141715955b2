//! Tool execution
//!
//! Function calls requested by the model are answered by a `ToolExecutor`.
//! The default executor never runs real code; it returns caller-supplied mock
//! outputs or a success payload echoing the call.

use async_trait::async_trait;
use promptrun_core::normalized::{FunctionOutput, ToolCall};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;

/// Produces the output for one requested function call
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> FunctionOutput;
}

/// Executor answering from per-function mock outputs
#[derive(Debug, Clone, Default)]
pub struct MockToolExecutor {
    outputs: HashMap<String, String>,
}

impl MockToolExecutor {
    pub fn new(outputs: HashMap<String, String>) -> Self {
        Self { outputs }
    }

    pub fn with_output(mut self, function_name: impl Into<String>, output: impl Into<String>) -> Self {
        self.outputs.insert(function_name.into(), output.into());
        self
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(&self, call: &ToolCall) -> FunctionOutput {
        let output = match self.outputs.get(&call.function_name) {
            Some(output) => output.clone(),
            None => json!({
                "status": "success",
                "function": call.function_name,
                "arguments": Value::Object(call.arguments.clone()),
            })
            .to_string(),
        };
        debug!(call_id = %call.id, function = %call.function_name, "Executed mock tool call");
        FunctionOutput::new(&call.id, output)
    }
}
