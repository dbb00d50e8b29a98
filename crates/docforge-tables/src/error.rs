//! Error types for table reconstruction

use thiserror::Error;

/// Errors that can occur while reading page extractions or writing tables
#[derive(Error, Debug)]
pub enum TableError {
    /// IO error while reading input or writing output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Page extraction JSON could not be parsed
    #[error("Invalid page extraction: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV output could not be written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook could not be built or written
    #[error("XLSX error: {0}")]
    Xlsx(String),
}

/// Result type for table operations
pub type Result<T> = std::result::Result<T, TableError>;
