use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading a source file into a [`crate::table::Table`]
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to parse CSV {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to open workbook {}: {source}", .path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("sheet '{sheet}' not found in {}", .path.display())]
    MissingSheet { path: PathBuf, sheet: String },

    #[error("column '{column}' not found in {table}")]
    MissingColumn { table: String, column: String },

    #[error("{0} has no header row")]
    NoHeader(String),
}
