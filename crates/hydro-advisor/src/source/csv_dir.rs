//! CSV Directory Source
//!
//! A directory stands in for the workbook and `<partition>.csv` for each
//! sheet. Export a spreadsheet sheet-by-sheet to CSV to feed it.

use std::path::{Path, PathBuf};

use super::{Table, TabularSource};
use crate::error::{HydroError, Result};

pub struct CsvDirectorySource {
    dir: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn partition_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }
}

impl TabularSource for CsvDirectorySource {
    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn read_partition(&self, name: &str) -> Result<Table> {
        let path = self.partition_path(name);
        if !path.is_file() {
            return Err(HydroError::partition(
                name,
                format!("sheet file {} not found", path.display()),
            ));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&path)?;

        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        if columns.iter().all(String::is_empty) {
            return Err(HydroError::partition(name, "sheet has no header row"));
        }

        let mut raw_rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            raw_rows.push(record.iter().map(ToString::to_string).collect());
        }

        tracing::debug!(partition = name, rows = raw_rows.len(), path = %path.display(), "Read CSV sheet");
        Ok(Table::from_text_rows(columns, raw_rows))
    }
}
