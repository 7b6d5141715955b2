//! promptrun core types and traits
//!
//! This crate provides the fundamental types shared by the conversation engine:
//! - Normalized conversation records (messages, tool calls, usage)
//! - Typed raw payloads returned by each provider API
//! - Provider/API selectors, provider configuration and the `LlmClient` trait
//! - Prompt template rendering
//! - Core error types

pub mod error;
pub mod normalized;
pub mod provider;
pub mod raw;
pub mod template;

pub use error::{Error, Result};
