//! Text-to-SQL Tool
//!
//! Exposes [`TextToSql`] to the agent under the name `text_to_sql`.

use std::sync::Arc;

use async_trait::async_trait;

use agent_core::{
    AgentError, ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
};

use crate::facade::TextToSql;
use crate::store::DatasetStore;

pub const TOOL_NAME: &str = "text_to_sql";

pub struct TextToSqlTool {
    facade: Arc<TextToSql>,
}

impl TextToSqlTool {
    pub fn new(facade: Arc<TextToSql>) -> Self {
        Self { facade }
    }

    /// Tool over `store` with the built-in hydroponics rules
    pub fn hydroponics(store: Arc<DatasetStore>) -> Self {
        Self::new(Arc::new(TextToSql::hydroponics(store)))
    }

    pub fn facade(&self) -> &Arc<TextToSql> {
        &self.facade
    }
}

#[async_trait]
impl Tool for TextToSqlTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "Answer a question about hydroponic plants from the local database. \
                Returns the SQL query that was run and its result rows. Covers ideal EC, \
                ideal pH, care schedules, the plant catalog and general knowledge."
                .into(),
            parameters: vec![ParameterSchema::required_string(
                "question",
                "The user's question in natural language, e.g. 'apa EC ideal untuk selada?'",
            )],
            category: Some("data".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let question = call
            .str_arg("question")
            .ok_or_else(|| AgentError::ToolValidation("question must be a string".into()))?
            .to_string();

        let facade = Arc::clone(&self.facade);
        let answer = tokio::task::spawn_blocking(move || facade.answer(&question))
            .await
            .map_err(|e| AgentError::ToolExecution(format!("text_to_sql task failed: {e}")))?;

        let output = serde_json::to_string(&answer)?;
        let data = serde_json::to_value(&answer)?;

        let result = if answer.is_error() {
            ToolResult::failure(TOOL_NAME, output)
        } else {
            ToolResult::success(TOOL_NAME, output)
        };
        Ok(result.with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryWorkbook;
    use agent_core::ToolRegistry;
    use serde_json::json;

    fn tool(dir: &tempfile::TempDir) -> TextToSqlTool {
        let store = Arc::new(DatasetStore::new(
            dir.path().join("hydroponics.db"),
            Arc::new(MemoryWorkbook::sample()),
        ));
        TextToSqlTool::hydroponics(store)
    }

    #[tokio::test]
    async fn test_execute_returns_query_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let call = ToolCall::new(TOOL_NAME).with_argument("question", json!("pH ideal selada?"));

        let result = tool(&dir).execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(
            result.data.unwrap(),
            json!({
                "query": "SELECT ph_min, ph_max FROM plants WHERE common_name = 'Selada'",
                "results": [{"ph_min": 6.0, "ph_max": 7.0}]
            })
        );
        let parsed: serde_json::Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["results"][0]["ph_max"], json!(7.0));
    }

    #[tokio::test]
    async fn test_no_match_is_still_a_success() {
        let dir = tempfile::tempdir().unwrap();
        let call = ToolCall::new(TOOL_NAME).with_argument("question", json!("cuaca besok?"));

        let result = tool(&dir).execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap()["query"], json!("No SQL query generated"));
    }

    #[tokio::test]
    async fn test_registry_rejects_missing_question() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        registry.register(tool(&dir));

        let err = registry.execute(&ToolCall::new(TOOL_NAME)).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolValidation(_)));
    }

    #[tokio::test]
    async fn test_non_string_question_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let call = ToolCall::new(TOOL_NAME).with_argument("question", json!(42));
        let err = tool(&dir).execute(&call).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolValidation(_)));
    }

    #[test]
    fn test_schema() {
        let dir = tempfile::tempdir().unwrap();
        let schema = tool(&dir).schema();
        assert_eq!(schema.name, "text_to_sql");
        assert_eq!(schema.parameters.len(), 1);
        assert!(schema.parameters[0].required);
        assert!(!schema.has_side_effects);
    }
}
