//! Normalized conversation records
//!
//! Every provider response is translated into these provider-agnostic shapes
//! before the engine looks at it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Role of a conversation message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of a conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,

    /// Text content
    pub content: String,

    /// Turn this message belongs to (1-based)
    pub turn: u32,

    /// Usage aggregated over every provider call of the turn (assistant only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Tool calls executed while producing this message (assistant only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Provider response id of the final response (stateful APIs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>, turn: u32) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            turn,
            usage: None,
            tool_calls: vec![],
            response_id: None,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>, turn: u32) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            turn,
            usage: None,
            tool_calls: vec![],
            response_id: None,
        }
    }

    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn with_response_id(mut self, response_id: Option<String>) -> Self {
        self.response_id = response_id;
        self
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// A model-requested invocation of a caller-defined function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider call identifier, used to correlate the output
    pub id: String,

    /// Name of the function to call
    pub function_name: String,

    /// Parsed arguments
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        function_name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            function_name: function_name.into(),
            arguments,
        }
    }

    /// Arguments re-encoded as a JSON string (the form most wire formats expect)
    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }
}

/// Result of executing one tool call, sent back to the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionOutput {
    /// ID of the tool call this output answers
    pub call_id: String,

    /// Result payload
    pub output: String,
}

impl FunctionOutput {
    pub fn new(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u64,

    /// Number of tokens in the completion
    pub completion_tokens: u64,

    /// Total tokens used
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0 && self.total_tokens == 0
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(rhs.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

impl Sum for Usage {
    fn sum<I: Iterator<Item = Usage>>(iter: I) -> Usage {
        iter.fold(Usage::default(), Add::add)
    }
}

impl<'a> Sum<&'a Usage> for Usage {
    fn sum<I: Iterator<Item = &'a Usage>>(iter: I) -> Usage {
        iter.copied().sum()
    }
}

/// Canonical result of one provider call
///
/// Optional provider fields are normalized to empty lists / zero usage so
/// downstream aggregation can sum unconditionally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    /// Assistant text
    pub text: String,

    /// Token usage for this call
    pub usage: Usage,

    /// User-defined function invocations requested by the model
    pub tool_calls: Vec<ToolCall>,

    /// Provider web-search records
    pub web_search_results: Vec<Value>,

    /// Provider code-execution records
    pub code_interpreter_results: Vec<Value>,

    /// Provider file-search records
    pub file_search_results: Vec<Value>,

    /// Continuation handle (None for stateless APIs)
    pub response_id: Option<String>,

    /// Server-side thread handle (Assistants API only)
    pub thread_id: Option<String>,

    /// Raw provider payload, not interpreted by the engine
    pub raw: Value,
}

impl NormalizedResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}
