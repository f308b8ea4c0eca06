//! Error types for stm-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An input could not be found, read or decoded as a table
    Load,
    /// The merge was asked for something the data cannot provide
    Config,
    /// The output could not be written
    Output,
}

/// Errors that can occur in stm-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read an input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input is not a well-formed table
    #[error("failed to parse table '{path}': {message}")]
    TableParse { path: PathBuf, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Directory traversal error while expanding inputs
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Nothing to merge
    #[error("no input files given")]
    NoInputs,

    /// Unifying field not among the columns of an input
    #[error("unifying field '{field}' not found in '{path}'")]
    UnifyingFieldMissing { field: String, path: PathBuf },

    /// Unknown delimiter name
    #[error("unknown table format '{0}', expected tab, comma or semicolon")]
    UnknownFormat(String),

    /// Failed to create or write the output
    #[error("failed to write '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV serialization error while writing the output
    #[error("CSV error writing '{path}': {source}")]
    CsvWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Which part of the merge this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FileRead { .. }
            | Error::TableParse { .. }
            | Error::Csv { .. }
            | Error::WalkDir(_)
            | Error::Json(_) => ErrorKind::Load,
            Error::NoInputs | Error::UnifyingFieldMissing { .. } | Error::UnknownFormat(_) => {
                ErrorKind::Config
            }
            Error::OutputWrite { .. } | Error::CsvWrite { .. } | Error::Io(_) => ErrorKind::Output,
        }
    }
}
