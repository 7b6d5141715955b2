//! promptrun conversation engine
//!
//! Drives one conversation against an LLM provider:
//! - `ConversationEngine` runs the turn loop and builds the result record
//! - `ToolLoop` executes requested function calls until the model stops asking
//! - `Interlocutor` produces the simulated user messages for turns 2..N
//! - `aggregate` sums usage over every provider call of a turn

pub mod config;
pub mod interlocutor;
pub mod orchestrator;
pub mod output;
pub mod state;
pub mod tool_loop;
pub mod tools;
pub mod usage;

pub use config::{EngineInput, RenderedPrompts};
pub use interlocutor::{END_MARKER, Interlocutor, LlmInterlocutor, MockInterlocutor};
pub use orchestrator::{ConversationEngine, EngineSettings};
pub use output::{ConversationResult, ConversationStatus};
pub use state::ConversationState;
pub use tool_loop::{LoopTermination, MAX_TOOL_ITERATIONS, ToolLoop, TurnOutcome};
pub use tools::{MockToolExecutor, ToolExecutor};
pub use usage::aggregate;
