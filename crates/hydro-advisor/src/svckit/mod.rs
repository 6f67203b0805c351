//! Service Kit - Agent Tools
//!
//! Tools that implement `agent_core::Tool` for the hydroponics assistant.

mod text_to_sql;

pub use text_to_sql::{TextToSqlTool, TOOL_NAME};
