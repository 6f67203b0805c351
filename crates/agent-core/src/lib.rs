//! # agent-core
//!
//! Provider-agnostic LLM abstraction, tool registry and the ReAct reasoning
//! loop that decides when to call a tool and when to answer directly.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Agent                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │  Reasoning  │  │    Tools    │  │   LlmProvider       │  │
//! │  │    Loop     │──│   Registry  │──│   (Strategy)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::{GenerationOptions, LlmProvider};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, AgentReply};
pub use session::{
    MemorySessionStore, SaveOutcome, Session, SessionId, SessionStore, SessionVersion,
};
pub use tool::{ParameterSchema, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
