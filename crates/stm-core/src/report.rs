//! Summary of a finished merge
//!
//! Conflicts are not errors: they end up in the `remarks` column of the
//! output and are listed here. Warnings collect advisory conditions that
//! did not stop the merge.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A non-fatal condition noticed while merging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Invalid UTF-8 in an input was replaced with U+FFFD
    LossyDecode { path: PathBuf },
    /// An input already had a `remarks` column, which was dropped
    RemarksColumnReplaced { path: PathBuf },
    /// Rows without a unifying-field value, grouped together
    NullKeys { rows: usize },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::LossyDecode { path } => write!(
                f,
                "'{}' is not valid UTF-8, undecodable bytes were replaced",
                path.display()
            ),
            Warning::RemarksColumnReplaced { path } => write!(
                f,
                "'{}' already has a remarks column, it was replaced",
                path.display()
            ),
            Warning::NullKeys { rows } => write!(
                f,
                "{} row(s) have no value in the unifying field and were grouped together",
                rows
            ),
        }
    }
}

/// One group that could not be merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Unifying-field value of the group's first row
    pub key: Option<String>,
    /// Number of rows in the group
    pub rows: usize,
    /// Columns holding non-equivalent values
    pub columns: Vec<String>,
    /// Files the group's rows came from, without repeats
    pub sources: Vec<PathBuf>,
}

/// Outcome of one merge run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReport {
    /// Input files, in load order
    pub inputs: Vec<PathBuf>,
    /// Output file, `None` when written to a stream
    pub output: Option<PathBuf>,
    /// Normalized unifying field
    pub unifying_field: String,
    /// Whether fuzzy comparison was used
    pub fuzzy_merge: bool,
    /// Rows across all inputs
    pub rows_read: usize,
    /// Rows in the output
    pub rows_written: usize,
    /// Number of groups
    pub groups: usize,
    /// Groups collapsed into a single row
    pub merged_groups: usize,
    /// Groups emitted unmerged
    pub conflicts: Vec<ConflictRecord>,
    pub warnings: Vec<Warning>,
    /// When the merge finished
    pub finished_at: DateTime<Utc>,
}

impl MergeReport {
    /// Number of groups emitted unmerged
    pub fn conflicted_groups(&self) -> usize {
        self.conflicts.len()
    }

    /// Save the report as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| Error::OutputWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
