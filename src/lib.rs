//! Orchestration building blocks for LLM-backed applications.
//!
//! The crate provides two tightly coupled pieces:
//! - A uniform chain invocation pipeline ([`chain::call`], [`chain::run`],
//!   [`chain::predict`]) handling memory hydration, input/output key
//!   validation, lifecycle callbacks and memory persistence around any
//!   [`Chain`].
//! - A bounded agent executor ([`Executor`]) that turns an [`Agent`]'s
//!   planning decisions into tool calls and a step history until the agent
//!   declares a final answer.
//!
//! Model backends, concrete tools and memory storage are collaborators
//! behind the [`LanguageModel`], [`Tool`] and [`Memory`] traits.

mod agent;
mod callbacks;
pub mod chain;
mod error;
mod executor;
mod llm;
mod memory;
mod message;
mod options;
mod schema;
mod tool;

pub use agent::Agent;
pub use callbacks::{Handler, TracingHandler};
pub use chain::Chain;
pub use error::{ChainError, Result};
pub use executor::{
    Executor, ParserErrorHandler, DEFAULT_MAX_ITERATIONS, INTERMEDIATE_STEPS_KEY,
};
pub use llm::{
    generate_from_single_prompt, CallOptions, ContentChoice, ContentResponse, FunctionCall,
    FunctionDefinition, LanguageModel, StreamFunc, StubModel, ToolCall, ToolDefinition,
};
pub use memory::{buffer_as_string, ChatMessageHistory, ConversationBuffer, Memory, NoMemory};
pub use message::{Message, MessageRole};
pub use options::ChainCallOptions;
pub use schema::{AgentAction, AgentDecision, AgentFinish, AgentStep, ChainValues};
pub use tool::{name_to_tool, Tool};
