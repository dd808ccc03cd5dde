//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tabsql_core::infer::DEFAULT_ROW_COUNT;

use crate::error::Result;

/// Write-path policy, fixed when the engine is built.
///
/// Missing fields take their defaults, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stamp `_time_insert` / `_time_update` on written rows, creating the
    /// columns when they are missing.
    pub include_metadata_timestamps: bool,
    /// Add missing columns and widen undersized columns instead of failing.
    pub autoadjust_sql_objects: bool,
    /// Rows sampled when inferring column types.
    pub infer_row_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_metadata_timestamps: false,
            autoadjust_sql_objects: false,
            infer_row_count: DEFAULT_ROW_COUNT,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Enables or disables metadata timestamps.
    #[must_use]
    pub const fn metadata_timestamps(mut self, enabled: bool) -> Self {
        self.include_metadata_timestamps = enabled;
        self
    }

    /// Enables or disables schema auto-adjustment.
    #[must_use]
    pub const fn autoadjust(mut self, enabled: bool) -> Self {
        self.autoadjust_sql_objects = enabled;
        self
    }

    /// Sets the inference sample size.
    #[must_use]
    pub const fn infer_row_count(mut self, rows: usize) -> Self {
        self.infer_row_count = rows;
        self
    }
}
