//! Error Types for the Hydroponic Advisor

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HydroError>;

#[derive(Error, Debug)]
pub enum HydroError {
    #[error("Source workbook not found: {0}")]
    SourceMissing(String),

    #[error("Failed to load partition '{partition}': {reason}")]
    Partition { partition: String, reason: String },

    #[error("Database has not been built yet: {}", .0.display())]
    NotInitialized(PathBuf),

    #[error("Only read queries are allowed: {0}")]
    NotReadOnly(String),

    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HydroError {
    pub fn partition(partition: impl Into<String>, reason: impl ToString) -> Self {
        HydroError::Partition {
            partition: partition.into(),
            reason: reason.to_string(),
        }
    }

    /// Message safe to show to an end user
    pub fn user_message(&self) -> &'static str {
        match self {
            HydroError::SourceMissing(_) => "The hydroponics data file could not be found.",
            HydroError::NotInitialized(_) => "The hydroponics database is not ready yet.",
            HydroError::Sqlite(_) | HydroError::NotReadOnly(_) => {
                "The hydroponics database could not answer that query."
            }
            _ => "Something went wrong while reading the hydroponics data.",
        }
    }
}
