//! banter-core: Core types and traits for banter
//!
//! This crate provides the foundational types and traits used throughout
//! the banter chat agent CLI: messages and tool calls, the provider and
//! tool traits, the reactive agent loop, and the renderer-side primitives
//! (think-block splitting and tool lifecycle tracking).

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod thinking;
pub mod tool;
pub mod tracker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use agent::{ChatAgent, UpdateEvent, UpdateStream, AGENT_NODE, TOOLS_NODE};
pub use error::Error;
pub use message::{Message, Role, ToolCall, Usage};
pub use provider::{CompletionRequest, CompletionResponse, FinishReason, Provider};
pub use thinking::{split_thinking, ThinkingSplit};
pub use tool::{PropertySchema, Tool, ToolDefinition, ToolOutput, ToolParameters, ToolRegistry};
pub use tracker::{InvocationStatus, ToolInvocation, ToolStats, ToolTracker, ToolUsageSummary};

pub type Result<T> = std::result::Result<T, Error>;
