//! Text-to-SQL Façade
//!
//! The single entry point behind the `text_to_sql` tool. Whatever happens,
//! the caller gets a well-formed `{query, results}` answer: a question no
//! rule understands and a query that fails both come back as data.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HydroError;
use crate::resolver::{QueryResolver, Resolution};
use crate::store::{DatasetStore, Row};

/// Query text reported when no rule matched
pub const NO_QUERY_GENERATED: &str = "No SQL query generated";

/// Message row returned when no rule matched
pub const NO_MATCH_MESSAGE: &str =
    "I'm sorry, I don't know how to answer that with my current tools.";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub query: String,
    pub results: Vec<Row>,
    #[serde(skip)]
    failed: bool,
}

impl QueryAnswer {
    fn no_match() -> Self {
        Self {
            query: NO_QUERY_GENERATED.into(),
            results: vec![single_entry("message", NO_MATCH_MESSAGE.into())],
            failed: false,
        }
    }

    fn failed(query: String, error: &HydroError) -> Self {
        Self {
            query,
            results: vec![single_entry("error", error.to_string())],
            failed: true,
        }
    }

    /// Whether a query was generated at all
    pub fn is_match(&self) -> bool {
        self.query != NO_QUERY_GENERATED
    }

    /// Whether execution failed. Not part of the wire format.
    pub fn is_error(&self) -> bool {
        self.failed
    }
}

fn single_entry(key: &str, value: String) -> Row {
    let mut row = Row::new();
    row.insert(key.into(), Value::String(value));
    row
}

pub struct TextToSql {
    store: Arc<DatasetStore>,
    resolver: Arc<QueryResolver>,
}

impl TextToSql {
    pub fn new(store: Arc<DatasetStore>, resolver: Arc<QueryResolver>) -> Self {
        Self { store, resolver }
    }

    /// Façade over `store` with the built-in hydroponics rules
    pub fn hydroponics(store: Arc<DatasetStore>) -> Self {
        Self::new(store, Arc::new(QueryResolver::hydroponics()))
    }

    pub fn store(&self) -> &Arc<DatasetStore> {
        &self.store
    }

    pub fn resolver(&self) -> &QueryResolver {
        &self.resolver
    }

    /// Resolve `question` and run the resulting query.
    ///
    /// Blocks on SQLite; async callers should use a blocking task.
    pub fn answer(&self, question: &str) -> QueryAnswer {
        if let Err(e) = self.store.ensure_initialized() {
            // Execution below reports the missing database as a result row.
            tracing::warn!(error = %e, "Could not build the hydroponics database");
        }

        let resolved = match self.resolver.resolve(question) {
            Resolution::Query(resolved) => resolved,
            Resolution::NoMatch => {
                tracing::debug!(question, "No rule matched");
                return QueryAnswer::no_match();
            }
        };

        match self.store.execute(&resolved.sql) {
            Ok(results) => {
                tracing::info!(rule = %resolved.rule, rows = results.len(), "Answered question");
                QueryAnswer {
                    query: resolved.sql,
                    results,
                    failed: false,
                }
            }
            Err(e) => {
                tracing::warn!(rule = %resolved.rule, query = %resolved.sql, error = %e, "Query failed");
                QueryAnswer::failed(resolved.sql, &e)
            }
        }
    }
}
