//! Tabular Sources
//!
//! The external workbook the dataset is seeded from. A workbook is a set of
//! named partitions (sheets); each partition becomes one relation.

mod csv_dir;
mod memory;

pub use csv_dir::CsvDirectorySource;
pub use memory::MemoryWorkbook;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Source partitions loaded by default, one relation each
pub const DEFAULT_PARTITIONS: &[&str] = &["plants", "care_schedule", "knowledge_base", "user_memory"];

/// Workbook trait (Strategy pattern)
///
/// Implement this for each source format: CSV directory, in-memory, ...
pub trait TabularSource: Send + Sync {
    /// Whether the workbook itself exists
    fn is_available(&self) -> bool;

    /// Human-readable location, used in logs and errors
    fn describe(&self) -> String;

    /// Read one partition with its header row as given by the source
    fn read_partition(&self, name: &str) -> Result<Table>;
}

/// A single typed cell
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

/// Storage class of a whole column
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// One partition read from a source
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from raw text cells, typing each column the way a
    /// dataframe loader would: all integers, else all numbers, else text.
    /// Empty cells are null and do not affect the column type.
    pub fn from_text_rows(columns: Vec<String>, raw_rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let types: Vec<ColumnType> = (0..width)
            .map(|i| infer_column_type(raw_rows.iter().filter_map(|r| r.get(i))))
            .collect();

        let rows = raw_rows
            .into_iter()
            .map(|raw| {
                (0..width)
                    .map(|i| raw.get(i).map_or(Cell::Null, |v| typed_cell(v, types[i])))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    /// Declared type of column `index`, from its non-null cells
    pub fn column_type(&self, index: usize) -> ColumnType {
        let mut seen = ColumnType::Integer;
        for cell in self.rows.iter().filter_map(|r| r.get(index)) {
            match cell {
                Cell::Null | Cell::Integer(_) => {}
                Cell::Real(_) => seen = ColumnType::Real,
                Cell::Text(_) => return ColumnType::Text,
            }
        }
        seen
    }

    /// Column names normalized for storage
    pub fn normalized_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| normalize_column_name(c)).collect()
    }
}

/// Lowercase a column name and replace each space with `_`, so lookups
/// like `common_name` work whatever the spreadsheet header looked like.
pub fn normalize_column_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

fn infer_column_type<'a>(values: impl Iterator<Item = &'a String>) -> ColumnType {
    let mut column_type = ColumnType::Integer;
    for value in values.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if value.parse::<i64>().is_ok() {
            continue;
        }
        if value.parse::<f64>().is_ok() {
            column_type = ColumnType::Real;
        } else {
            return ColumnType::Text;
        }
    }
    column_type
}

fn typed_cell(raw: &str, column_type: ColumnType) -> Cell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Cell::Null;
    }
    match column_type {
        ColumnType::Integer => trimmed.parse().map_or_else(|_| Cell::Text(raw.into()), Cell::Integer),
        ColumnType::Real => trimmed.parse().map_or_else(|_| Cell::Text(raw.into()), Cell::Real),
        ColumnType::Text => Cell::Text(raw.to_string()),
    }
}
