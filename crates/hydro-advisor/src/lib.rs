//! # hydro-advisor
//!
//! Data layer and agent tools for a conversational hydroponics assistant.
//!
//! ```text
//!  question ──► QueryResolver ──► SQL ──► DatasetStore (SQLite) ──► {query, results}
//!                                              ▲
//!                 workbook (one CSV per sheet) ┘ rebuilt on reset
//! ```
//!
//! The assistant never writes SQL itself: the `text_to_sql` tool maps a
//! question onto a fixed set of trigger rules, and the schema summary tells
//! the model what the database holds so it knows when the tool is worth
//! calling.

pub mod config;
pub mod error;
pub mod facade;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod store;
pub mod svckit;

pub use config::HydroConfig;
pub use error::{HydroError, Result};
pub use facade::{QueryAnswer, TextToSql, NO_MATCH_MESSAGE, NO_QUERY_GENERATED};
pub use resolver::{QueryResolver, QueryTemplate, Resolution, ResolvedQuery, SpeciesFallback, TriggerRule};
pub use schema::{SchemaSnapshot, SchemaSummarizer, DEFAULT_SAMPLE_LIMIT};
pub use source::{CsvDirectorySource, MemoryWorkbook, Table, TabularSource};
pub use store::{DatasetStore, LoadReport, Row};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::TextToSqlTool;
}

/// System prompt for the hydroponics assistant. `{schema}` is replaced with
/// the schema summary.
pub const HYDRO_ASSISTANT_PROMPT: &str = r#"Kamu adalah Asisten Hidroponik AI yang santai dan ramah.
Pakai bahasa yang sederhana. Bantu pengguna soal jenis tanaman, cara perawatan,
jadwal penyiraman dan pemupukan, serta pengetahuan umum hidroponik.

## Isi Database

{schema}

## Aturan

1. Kalau pertanyaan butuh data, selalu panggil alat `text_to_sql` dengan
   pertanyaan pengguna apa adanya.
2. Jangan pernah mengarang data, angka EC/pH, atau jadwal.
3. Kalau hasil alat berisi `error` atau `message`, jelaskan dengan jujur bahwa
   informasinya tidak tersedia dan tawarkan topik lain yang ada di database.
4. Beri tips atau rekomendasi hanya berdasarkan data yang kamu terima."#;

/// Fill the assistant prompt with a schema summary
pub fn assistant_prompt(schema: &str) -> String {
    HYDRO_ASSISTANT_PROMPT.replace("{schema}", schema)
}
