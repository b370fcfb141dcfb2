//! Error types for the catalog crate.
//!
//! Every failure while reading the game catalog or a delimited table ends up
//! in [`CatalogError`]. The variants carry enough context (file, line, column)
//! to point at the offending input.

use thiserror::Error;

/// Errors that can occur while loading or parsing catalog data
#[derive(Error, Debug)]
pub enum CatalogError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading or writing a file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The CSV writer failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Line in a data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// A table is missing a column the reader requires
    #[error("Missing column {column} in {file}")]
    MissingColumn { file: String, column: String },

    /// Two records claim the same game id
    #[error("Duplicate game id {0}")]
    DuplicateId(u32),

    /// Data validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, CatalogError>;
