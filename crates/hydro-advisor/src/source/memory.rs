//! In-Memory Workbook
//!
//! For tests and demos. `sample()` returns a small hydroponics workbook with
//! the four conventional sheets.

use std::collections::HashMap;

use super::{Table, TabularSource};
use crate::error::{HydroError, Result};

#[derive(Clone, Debug)]
pub struct MemoryWorkbook {
    partitions: HashMap<String, Table>,
    available: bool,
}

impl Default for MemoryWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self {
            partitions: HashMap::new(),
            available: true,
        }
    }

    /// A workbook that behaves like a missing file
    pub fn unavailable() -> Self {
        Self {
            partitions: HashMap::new(),
            available: false,
        }
    }

    pub fn with_partition(mut self, name: impl Into<String>, table: Table) -> Self {
        self.partitions.insert(name.into(), table);
        self
    }

    /// Add a partition from text cells, typed like a CSV sheet
    pub fn with_text_partition(self, name: &str, columns: &[&str], rows: &[&[&str]]) -> Self {
        let table = Table::from_text_rows(
            columns.iter().map(ToString::to_string).collect(),
            rows.iter()
                .map(|r| r.iter().map(ToString::to_string).collect())
                .collect(),
        );
        self.with_partition(name, table)
    }

    pub fn without_partition(mut self, name: &str) -> Self {
        self.partitions.remove(name);
        self
    }

    /// Sample workbook with the four conventional sheets. Headers use
    /// spreadsheet-style casing to exercise column normalization.
    pub fn sample() -> Self {
        Self::new()
            .with_text_partition(
                "plants",
                &["Common Name", "Type", "EC Min", "EC Max", "pH Min", "pH Max", "Notes"],
                &[
                    &["Selada", "Sayuran daun", "1.2", "1.8", "6.0", "7.0", "Cocok untuk pemula, panen 30-45 hari"],
                    &["Tomat", "Sayuran buah", "2.0", "5.0", "5.5", "6.5", "Butuh penyangga dan cahaya penuh"],
                    &["Pakcoy", "Sayuran daun", "1.5", "2.0", "6.0", "7.0", "Tumbuh cepat di sistem NFT"],
                    &["Kangkung", "Sayuran daun", "1.5", "2.0", "5.5", "6.5", "Tahan panas"],
                    &["Stroberi", "Buah", "1.0", "1.5", "5.5", "6.2", "Suhu malam sejuk"],
                    &["Cabai", "Sayuran buah", "1.8", "3.2", "5.8", "6.5", "Perlu penyerbukan"],
                ],
            )
            .with_text_partition(
                "care_schedule",
                &["Plant Common Name", "Task", "Frequency Days"],
                &[
                    &["Selada", "Cek EC dan pH larutan", "2"],
                    &["Selada", "Ganti larutan nutrisi", "14"],
                    &["Tomat", "Cek EC dan pH larutan", "2"],
                    &["Tomat", "Pangkas tunas air", "7"],
                    &["Tomat", "Ganti larutan nutrisi", "10"],
                ],
            )
            .with_text_partition(
                "knowledge_base",
                &["Title", "Content"],
                &[
                    &["Apa itu EC", "EC mengukur kepekatan nutrisi terlarut dalam mS/cm."],
                    &["Apa itu pH", "pH menentukan ketersediaan unsur hara bagi akar."],
                    &["Sistem NFT", "Larutan nutrisi mengalir tipis di talang secara terus-menerus."],
                ],
            )
            .with_text_partition(
                "user_memory",
                &["Note", "Created At"],
                &[&["Pengguna menanam selada di rak NFT balkon", "2025-01-05"]],
            )
    }
}

impl TabularSource for MemoryWorkbook {
    fn is_available(&self) -> bool {
        self.available
    }

    fn describe(&self) -> String {
        "in-memory workbook".into()
    }

    fn read_partition(&self, name: &str) -> Result<Table> {
        self.partitions
            .get(name)
            .cloned()
            .ok_or_else(|| HydroError::partition(name, "sheet not found in workbook"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::DEFAULT_PARTITIONS;

    #[test]
    fn test_sample_has_conventional_sheets() {
        let workbook = MemoryWorkbook::sample();
        for name in DEFAULT_PARTITIONS {
            assert!(workbook.read_partition(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn test_without_partition() {
        let workbook = MemoryWorkbook::sample().without_partition("user_memory");
        assert!(workbook.read_partition("user_memory").is_err());
        assert!(workbook.read_partition("plants").is_ok());
    }
}
