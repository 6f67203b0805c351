//! Dataset Store
//!
//! SQLite-backed relations seeded from a [`TabularSource`]. One connection
//! sits behind a mutex, so a rebuild can never interleave with a query or a
//! schema read.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::limits::Limit;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use serde_json::Value;

use crate::config::HydroConfig;
use crate::error::{HydroError, Result};
use crate::schema::{ColumnDescriptor, RelationSchema, SchemaSnapshot};
use crate::source::{Cell, CsvDirectorySource, TabularSource, DEFAULT_PARTITIONS};

/// A result row: column name → value, in SELECT order
pub type Row = serde_json::Map<String, Value>;

/// Outcome of a rebuild, one entry per partition
#[derive(Clone, Debug, Default, Serialize)]
pub struct LoadReport {
    pub source: String,
    pub loaded: Vec<LoadedRelation>,
    pub failed: Vec<PartitionFailure>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LoadedRelation {
    pub name: String,
    pub rows: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct PartitionFailure {
    pub partition: String,
    pub reason: String,
}

pub struct DatasetStore {
    db_path: PathBuf,
    source: Arc<dyn TabularSource>,
    partitions: Vec<String>,
    conn: Mutex<Option<Connection>>,
    queries_executed: AtomicU64,
}

impl DatasetStore {
    /// Store at `db_path`, seeded from `source` with the default partitions
    pub fn new(db_path: impl Into<PathBuf>, source: Arc<dyn TabularSource>) -> Self {
        Self {
            db_path: db_path.into(),
            source,
            partitions: DEFAULT_PARTITIONS.iter().map(ToString::to_string).collect(),
            conn: Mutex::new(None),
            queries_executed: AtomicU64::new(0),
        }
    }

    /// Store backed by the CSV workbook directory named in `config`
    pub fn from_config(config: &HydroConfig) -> Self {
        let source = Arc::new(CsvDirectorySource::new(&config.source_dir));
        Self::new(&config.db_path, source).with_partitions(config.partitions.clone())
    }

    pub fn with_partitions(mut self, partitions: Vec<String>) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn partitions(&self) -> &[String] {
        &self.partitions
    }

    /// Whether a database file exists at all
    pub fn is_initialized(&self) -> bool {
        self.db_path.exists()
    }

    /// Number of queries run through [`DatasetStore::execute`]
    pub fn queries_executed(&self) -> u64 {
        self.queries_executed.load(Ordering::Relaxed)
    }

    /// Build the database if, and only if, no database file exists yet.
    ///
    /// Returns the load report when a build happened.
    pub fn ensure_initialized(&self) -> Result<Option<LoadReport>> {
        let mut guard = self.lock();
        if self.db_path.exists() {
            return Ok(None);
        }
        tracing::info!(path = %self.db_path.display(), "Database missing, building from source");
        self.rebuild(&mut guard).map(Some)
    }

    /// Delete the database and rebuild every relation from the source.
    ///
    /// Aborts before touching anything if the source is missing. A partition
    /// that fails to load is logged and reported; the others still load.
    pub fn reset(&self) -> Result<LoadReport> {
        let mut guard = self.lock();
        self.rebuild(&mut guard)
    }

    /// Run a read query and return its rows in execution order
    pub fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        let mut guard = self.lock();
        let conn = self.connection(&mut guard)?;
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(query = sql, "Executing query");
        run_query(conn, sql)
    }

    pub fn relation_exists(&self, name: &str) -> Result<bool> {
        let mut guard = self.lock();
        if !self.db_path.exists() {
            return Ok(false);
        }
        let conn = self.connection(&mut guard)?;
        let found = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Names of all relations, in creation order
    pub fn relation_names(&self) -> Result<Vec<String>> {
        let mut guard = self.lock();
        let conn = self.connection(&mut guard)?;
        list_relations(conn)
    }

    /// Columns and up to `sample_limit` rows of every relation
    pub fn schema_snapshot(&self, sample_limit: usize) -> Result<SchemaSnapshot> {
        let mut guard = self.lock();
        let conn = self.connection(&mut guard)?;

        let mut relations = Vec::new();
        for name in list_relations(conn)? {
            let columns = table_columns(conn, &name)?;
            let sample_rows = run_query(
                conn,
                &format!("SELECT * FROM {} LIMIT {}", quote_ident(&name), sample_limit),
            )?;
            relations.push(RelationSchema {
                name,
                columns,
                sample_rows,
            });
        }

        Ok(SchemaSnapshot { relations })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // A panic mid-query leaves the connection itself usable.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connection<'a>(&self, slot: &'a mut Option<Connection>) -> Result<&'a Connection> {
        if slot.is_none() {
            if !self.db_path.exists() {
                return Err(HydroError::NotInitialized(self.db_path.clone()));
            }
            let conn = Connection::open_with_flags(
                &self.db_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            // ATTACH passes the read-only statement check; allow no attached databases.
            let _ = conn.set_limit(Limit::SQLITE_LIMIT_ATTACHED, 0);
            *slot = Some(conn);
        }
        slot.as_ref()
            .ok_or_else(|| HydroError::NotInitialized(self.db_path.clone()))
    }

    fn rebuild(&self, slot: &mut Option<Connection>) -> Result<LoadReport> {
        let source = self.source.describe();
        if !self.source.is_available() {
            tracing::error!(source = %source, "Source workbook not found, database left unchanged");
            return Err(HydroError::SourceMissing(source));
        }

        // Close before deleting so no handle points at the old file.
        *slot = None;
        if self.db_path.exists() {
            std::fs::remove_file(&self.db_path)?;
            tracing::info!(path = %self.db_path.display(), "Removed existing database");
        }
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(&self.db_path)?;
        let mut report = LoadReport {
            source,
            ..Default::default()
        };

        for partition in &self.partitions {
            match self.load_partition(&mut conn, partition) {
                Ok(rows) => {
                    tracing::info!(relation = %partition, rows, "Loaded relation");
                    report.loaded.push(LoadedRelation {
                        name: partition.clone(),
                        rows,
                    });
                }
                Err(e) => {
                    tracing::error!(partition = %partition, error = %e, "Failed to load partition");
                    report.failed.push(PartitionFailure {
                        partition: partition.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Queries reopen the file read-only.
        drop(conn);
        Ok(report)
    }

    fn load_partition(&self, conn: &mut Connection, partition: &str) -> Result<usize> {
        let table = self.source.read_partition(partition)?;
        let columns = table.normalized_columns();

        if let Some(dup) = columns
            .iter()
            .enumerate()
            .find_map(|(i, c)| columns[..i].contains(c).then_some(c))
        {
            return Err(HydroError::partition(
                partition,
                format!("duplicate column '{dup}' after normalization"),
            ));
        }

        let column_defs: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} {}", quote_ident(c), table.column_type(i).sql_name()))
            .collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let relation = quote_ident(partition);

        let tx = conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {relation}"), [])?;
        tx.execute(
            &format!("CREATE TABLE {relation} ({})", column_defs.join(", ")),
            [],
        )?;
        {
            let mut insert = tx.prepare(&format!("INSERT INTO {relation} VALUES ({placeholders})"))?;
            for row in &table.rows {
                insert.execute(params_from_iter(row.iter().map(sql_value)))?;
            }
        }
        tx.commit()?;

        Ok(table.rows.len())
    }
}

fn run_query(conn: &Connection, sql: &str) -> Result<Vec<Row>> {
    let mut statement = conn.prepare(sql)?;
    if !statement.readonly() {
        return Err(HydroError::NotReadOnly(sql.to_string()));
    }

    let column_names: Vec<String> = statement
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect();

    let mut rows = statement.query([])?;
    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (index, column_name) in column_names.iter().enumerate() {
            let value = row.get::<usize, SqlValue>(index)?;
            record.insert(column_name.clone(), json_value(value));
        }
        results.push(record);
    }

    Ok(results)
}

fn list_relations(conn: &Connection) -> Result<Vec<String>> {
    let mut statement = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let names = statement
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn table_columns(conn: &Connection, relation: &str) -> Result<Vec<ColumnDescriptor>> {
    let mut statement = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(relation)))?;
    let columns = statement
        .query_map([], |row| {
            Ok(ColumnDescriptor {
                name: row.get(1)?,
                declared_type: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_value(cell: &Cell) -> SqlValue {
    match cell {
        Cell::Null => SqlValue::Null,
        Cell::Integer(i) => SqlValue::Integer(*i),
        Cell::Real(f) => SqlValue::Real(*f),
        Cell::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn json_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryWorkbook;
    use serde_json::json;

    fn sample_store(dir: &tempfile::TempDir) -> DatasetStore {
        DatasetStore::new(dir.path().join("hydroponics.db"), Arc::new(MemoryWorkbook::sample()))
    }

    #[test]
    fn test_reset_loads_all_conventional_relations() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);

        let report = store.reset().unwrap();
        assert!(report.is_complete());
        assert_eq!(report.loaded.len(), 4);

        let snapshot = store.schema_snapshot(3).unwrap();
        assert_eq!(
            snapshot.relation_names(),
            vec!["plants", "care_schedule", "knowledge_base", "user_memory"]
        );
    }

    #[test]
    fn test_columns_are_normalized_and_typed() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);
        store.reset().unwrap();

        let snapshot = store.schema_snapshot(0).unwrap();
        let plants = snapshot.relation("plants").unwrap();
        let columns: Vec<(&str, &str)> = plants
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.declared_type.as_str()))
            .collect();
        assert_eq!(
            columns,
            vec![
                ("common_name", "TEXT"),
                ("type", "TEXT"),
                ("ec_min", "REAL"),
                ("ec_max", "REAL"),
                ("ph_min", "REAL"),
                ("ph_max", "REAL"),
                ("notes", "TEXT"),
            ]
        );
        assert!(plants.sample_rows.is_empty());
    }

    #[test]
    fn test_missing_partition_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemoryWorkbook::sample().without_partition("knowledge_base");
        let store = DatasetStore::new(dir.path().join("h.db"), Arc::new(source));

        let report = store.reset().unwrap();
        assert_eq!(report.loaded.len(), 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].partition, "knowledge_base");

        assert!(store.relation_exists("plants").unwrap());
        assert!(store.relation_exists("care_schedule").unwrap());
        assert!(store.relation_exists("user_memory").unwrap());
        assert!(!store.relation_exists("knowledge_base").unwrap());
        assert_eq!(store.execute("SELECT * FROM plants").unwrap().len(), 6);
    }

    #[test]
    fn test_missing_source_leaves_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.db");
        DatasetStore::new(&path, Arc::new(MemoryWorkbook::sample()))
            .reset()
            .unwrap();

        let store = DatasetStore::new(&path, Arc::new(MemoryWorkbook::unavailable()));
        let err = store.reset().unwrap_err();
        assert!(matches!(err, HydroError::SourceMissing(_)));
        assert!(store.relation_exists("plants").unwrap());
    }

    #[test]
    fn test_missing_source_on_first_build_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DatasetStore::new(dir.path().join("h.db"), Arc::new(MemoryWorkbook::unavailable()));

        assert!(store.ensure_initialized().is_err());
        assert!(!store.is_initialized());
        assert!(matches!(
            store.execute("SELECT 1"),
            Err(HydroError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_ensure_initialized_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);

        assert!(store.ensure_initialized().unwrap().is_some());
        assert!(store.ensure_initialized().unwrap().is_none());
    }

    #[test]
    fn test_reset_discards_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.db");
        let store = DatasetStore::new(&path, Arc::new(MemoryWorkbook::sample()));
        store.reset().unwrap();

        let smaller = MemoryWorkbook::new().with_text_partition(
            "plants",
            &["Common Name"],
            &[&["Selada"]],
        );
        let store = DatasetStore::new(&path, Arc::new(smaller));
        store.reset().unwrap();

        assert_eq!(store.relation_names().unwrap(), vec!["plants"]);
        assert_eq!(store.execute("SELECT * FROM plants").unwrap().len(), 1);
    }

    #[test]
    fn test_execute_preserves_select_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);
        store.reset().unwrap();

        let rows = store
            .execute("SELECT ec_max, ec_min FROM plants WHERE common_name = 'Selada'")
            .unwrap();
        assert_eq!(rows.len(), 1);
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ec_max", "ec_min"]);
        assert_eq!(rows[0]["ec_min"], json!(1.2));
    }

    #[test]
    fn test_malformed_query_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);
        store.reset().unwrap();

        assert!(matches!(store.execute("SELEC nonsense"), Err(HydroError::Sqlite(_))));
        let err = store.execute("SELECT * FROM plantz").unwrap_err();
        assert!(err.to_string().contains("no such table"));
    }

    #[test]
    fn test_writes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);
        store.reset().unwrap();

        let err = store.execute("DELETE FROM plants").unwrap_err();
        assert!(matches!(err, HydroError::NotReadOnly(_)));
        assert_eq!(store.execute("SELECT * FROM plants").unwrap().len(), 6);
    }

    #[test]
    fn test_attach_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);
        store.reset().unwrap();

        let other = dir.path().join("other.db");
        let sql = format!("ATTACH DATABASE '{}' AS other", other.display());
        assert!(store.execute(&sql).is_err());
        assert!(!other.exists());
        assert!(store.execute("DETACH DATABASE main").is_err());
        assert_eq!(store.execute("SELECT * FROM plants").unwrap().len(), 6);
    }

    #[test]
    fn test_reset_is_serialized_with_readers() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(&dir);
        store.reset().unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..20 {
                    assert!(store.reset().unwrap().is_complete());
                }
            });
            for _ in 0..3 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let rows = store.execute("SELECT * FROM plants").unwrap();
                        assert_eq!(rows.len(), 6);
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..20 {
                    let snapshot = store.schema_snapshot(1).unwrap();
                    assert_eq!(
                        snapshot.relation_names(),
                        vec!["plants", "care_schedule", "knowledge_base", "user_memory"]
                    );
                }
            });
        });
    }

    #[test]
    fn test_duplicate_normalized_columns_fail_the_partition() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemoryWorkbook::new()
            .with_text_partition("plants", &["Common Name", "common_name"], &[&["a", "b"]])
            .with_text_partition("knowledge_base", &["Title"], &[&["x"]]);
        let store = DatasetStore::new(dir.path().join("h.db"), Arc::new(source))
            .with_partitions(vec!["plants".into(), "knowledge_base".into()]);

        let report = store.reset().unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].reason.contains("duplicate column"));
        assert_eq!(store.relation_names().unwrap(), vec!["knowledge_base"]);
    }
}
