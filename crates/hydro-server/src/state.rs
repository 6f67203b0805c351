//! Application State

use std::sync::Arc;

use agent_core::{GenerationOptions, LlmProvider, MemorySessionStore, ToolRegistry};
use hydro_advisor::{DatasetStore, SchemaSummarizer, TextToSql};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// LLM provider (Ollama)
    pub provider: Arc<dyn LlmProvider>,

    /// Tool registry; holds the `text_to_sql` tool
    pub tools: Arc<ToolRegistry>,

    /// The façade behind `text_to_sql`, also served directly
    pub facade: Arc<TextToSql>,

    pub summarizer: Arc<SchemaSummarizer>,

    /// Chat sessions, dropped on database reset
    pub sessions: Arc<MemorySessionStore>,

    /// Default generation options (model, temperature)
    pub generation: GenerationOptions,

    /// Sample rows per relation in schema summaries
    pub sample_limit: usize,
}

impl AppState {
    pub fn store(&self) -> &Arc<DatasetStore> {
        self.facade.store()
    }
}
