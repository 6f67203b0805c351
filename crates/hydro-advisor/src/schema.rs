//! Schema Snapshot & Summarizer
//!
//! The summarizer turns a fresh snapshot of the store into the text that
//! primes the assistant's system prompt. Nothing is cached: the store can be
//! reset mid-session and the next summary has to reflect that.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::store::{DatasetStore, Row};

/// Sample rows per relation when the caller does not say otherwise
pub const DEFAULT_SAMPLE_LIMIT: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RelationSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub sample_rows: Vec<Row>,
}

/// Every relation in the store, in creation order
#[derive(Clone, Debug, Default, Serialize)]
pub struct SchemaSnapshot {
    pub relations: Vec<RelationSchema>,
}

impl SchemaSnapshot {
    pub fn relation(&self, name: &str) -> Option<&RelationSchema> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn relation_names(&self) -> Vec<&str> {
        self.relations.iter().map(|r| r.name.as_str()).collect()
    }

    /// Render as prompt text: one block per relation with its columns and
    /// sample rows as compact JSON.
    pub fn to_prompt_text(&self) -> String {
        if self.relations.is_empty() {
            return "(the database has no tables)".into();
        }

        let mut out = String::new();
        for relation in &self.relations {
            let _ = writeln!(out, "Table `{}`", relation.name);

            let columns: Vec<String> = relation
                .columns
                .iter()
                .map(|c| format!("{} ({})", c.name, c.declared_type))
                .collect();
            let _ = writeln!(out, "  columns: {}", columns.join(", "));

            if relation.sample_rows.is_empty() {
                let _ = writeln!(out, "  sample rows: none");
            } else {
                let _ = writeln!(out, "  sample rows:");
                for row in &relation.sample_rows {
                    let rendered = serde_json::to_string(row).unwrap_or_default();
                    let _ = writeln!(out, "    {rendered}");
                }
            }
            out.push('\n');
        }

        out.trim_end().to_string()
    }
}

/// Describes the live store for the assistant's instructions
pub struct SchemaSummarizer {
    store: Arc<DatasetStore>,
}

impl SchemaSummarizer {
    pub fn new(store: Arc<DatasetStore>) -> Self {
        Self { store }
    }

    /// Bootstrap the store if needed, then snapshot it
    pub fn snapshot(&self, sample_limit: usize) -> Result<SchemaSnapshot> {
        self.store.ensure_initialized()?;
        self.store.schema_snapshot(sample_limit)
    }

    pub fn summarize(&self, sample_limit: usize) -> Result<String> {
        Ok(self.snapshot(sample_limit)?.to_prompt_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{CsvDirectorySource, MemoryWorkbook};

    fn summarizer(dir: &tempfile::TempDir) -> (Arc<DatasetStore>, SchemaSummarizer) {
        let store = Arc::new(DatasetStore::new(
            dir.path().join("hydroponics.db"),
            Arc::new(MemoryWorkbook::sample()),
        ));
        (store.clone(), SchemaSummarizer::new(store))
    }

    #[test]
    fn test_summarize_bootstraps_store() {
        let dir = tempfile::tempdir().unwrap();
        let (store, summarizer) = summarizer(&dir);
        assert!(!store.is_initialized());

        let text = summarizer.summarize(DEFAULT_SAMPLE_LIMIT).unwrap();
        assert!(store.is_initialized());
        assert!(text.contains("Table `plants`"));
        assert!(text.contains("common_name (TEXT)"));
        assert!(text.contains("Table `user_memory`"));
    }

    #[test]
    fn test_sample_limit_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let (_, summarizer) = summarizer(&dir);

        let snapshot = summarizer.snapshot(2).unwrap();
        assert_eq!(snapshot.relation("plants").unwrap().sample_rows.len(), 2);
        assert_eq!(snapshot.relation("user_memory").unwrap().sample_rows.len(), 1);
    }

    #[test]
    fn test_summary_follows_reset() {
        let dir = tempfile::tempdir().unwrap();
        let sheets = dir.path().join("sheets");
        std::fs::create_dir(&sheets).unwrap();
        std::fs::write(sheets.join("plants.csv"), "Common Name,EC Min\nSelada,1.2\n").unwrap();
        std::fs::write(sheets.join("knowledge_base.csv"), "Title,Content\nEC,Kepekatan\n").unwrap();

        let store = Arc::new(
            DatasetStore::new(dir.path().join("h.db"), Arc::new(CsvDirectorySource::new(&sheets)))
                .with_partitions(vec!["plants".into(), "knowledge_base".into()]),
        );
        let summarizer = SchemaSummarizer::new(store.clone());
        let before = summarizer.summarize(1).unwrap();
        assert!(before.contains("Table `knowledge_base`"));

        std::fs::remove_file(sheets.join("knowledge_base.csv")).unwrap();
        let report = store.reset().unwrap();
        assert_eq!(report.failed.len(), 1);

        let after = summarizer.summarize(1).unwrap();
        assert!(after.contains("Table `plants`"));
        assert!(!after.contains("knowledge_base"));
    }

    #[test]
    fn test_empty_snapshot_text() {
        assert_eq!(
            SchemaSnapshot::default().to_prompt_text(),
            "(the database has no tables)"
        );
    }
}
