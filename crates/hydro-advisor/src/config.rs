//! Advisor Configuration
//!
//! Read from the environment, with defaults that work from the repository
//! root.

use std::path::PathBuf;

use crate::error::{HydroError, Result};
use crate::schema::DEFAULT_SAMPLE_LIMIT;
use crate::source::DEFAULT_PARTITIONS;

#[derive(Clone, Debug)]
pub struct HydroConfig {
    /// SQLite file holding the relations
    pub db_path: PathBuf,

    /// Directory with one CSV file per partition
    pub source_dir: PathBuf,

    /// Partitions to load, each becoming one relation
    pub partitions: Vec<String>,

    /// Sample rows per relation in the schema summary
    pub sample_limit: usize,
}

impl Default for HydroConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("hydroponics.db"),
            source_dir: PathBuf::from("data/hydro_data"),
            partitions: DEFAULT_PARTITIONS.iter().map(ToString::to_string).collect(),
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

impl HydroConfig {
    /// Read `HYDRO_DB_PATH`, `HYDRO_SOURCE_DIR`, `HYDRO_PARTITIONS`
    /// (comma-separated) and `HYDRO_SAMPLE_LIMIT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let sample_limit = match lookup("HYDRO_SAMPLE_LIMIT") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                HydroError::Config(format!("HYDRO_SAMPLE_LIMIT must be a number: {e}"))
            })?,
            None => defaults.sample_limit,
        };

        let partitions = match lookup("HYDRO_PARTITIONS") {
            Some(raw) => {
                let parsed: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect();
                if parsed.is_empty() {
                    return Err(HydroError::Config("HYDRO_PARTITIONS names no partitions".into()));
                }
                parsed
            }
            None => defaults.partitions,
        };

        Ok(Self {
            db_path: lookup("HYDRO_DB_PATH").map_or(defaults.db_path, PathBuf::from),
            source_dir: lookup("HYDRO_SOURCE_DIR").map_or(defaults.source_dir, PathBuf::from),
            partitions,
            sample_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HydroConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("hydroponics.db"));
        assert_eq!(config.partitions.len(), 4);
        assert_eq!(config.sample_limit, 3);
    }

    #[test]
    fn test_overrides() {
        let config = HydroConfig::from_lookup(lookup(&[
            ("HYDRO_DB_PATH", "/tmp/h.db"),
            ("HYDRO_SOURCE_DIR", "/srv/sheets"),
            ("HYDRO_PARTITIONS", "plants, knowledge_base ,"),
            ("HYDRO_SAMPLE_LIMIT", "5"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/h.db"));
        assert_eq!(config.source_dir, PathBuf::from("/srv/sheets"));
        assert_eq!(config.partitions, vec!["plants", "knowledge_base"]);
        assert_eq!(config.sample_limit, 5);
    }

    #[test]
    fn test_invalid_values() {
        assert!(HydroConfig::from_lookup(lookup(&[("HYDRO_SAMPLE_LIMIT", "three")])).is_err());
        assert!(HydroConfig::from_lookup(lookup(&[("HYDRO_PARTITIONS", " , ")])).is_err());
    }
}
