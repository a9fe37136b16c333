//! Error types for the vertical affinity engine

use thiserror::Error;

/// Errors that can occur while preparing, scoring, or evaluating a cohort
#[derive(Debug, Error)]
pub enum AffinityError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid vertical name: {0:?}")]
    InvalidVertical(String),

    #[error("Duplicate member identifier {member} in {frame}")]
    DuplicateMember { frame: String, member: String },

    #[error("Column {0} is provided by more than one frame")]
    DuplicateColumn(String),

    #[error("Column {column} has {actual} values, frame has {expected} rows")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Feature frame is missing {} schema column(s): {}", .0.len(), .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Cannot summarize an empty frame: {0}")]
    EmptyFrame(String),
}
