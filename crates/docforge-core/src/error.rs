//! Error types for template filling and batch generation.
//!
//! Only conditions that must stop a generation run are represented here.
//! Template and data irregularities (an unterminated `#IF`, an unmapped
//! placeholder, a missing column, a blank CSV row) are tolerated by the engine
//! and reported through outcome structs and the `log` facade instead.

use thiserror::Error;

/// Error types that can occur while reading records, filling templates or
/// writing output.
///
/// # Examples
///
/// ```rust,ignore
/// use docforge_core::{ForgeError, RecordSet};
///
/// match RecordSet::from_csv_path("rows.csv") {
///     Ok(set) => println!("{} records", set.len()),
///     Err(ForgeError::IoError(e)) => eprintln!("File error: {e}"),
///     Err(ForgeError::CsvError(e)) => eprintln!("Bad CSV: {e}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum ForgeError {
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error for mappings, settings or document models.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Malformed CSV input.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// The template could not be read or its structure could not be understood.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// The template package (zip container) is unreadable or unwritable.
    #[error("Zip error: {0}")]
    ZipError(String),

    /// The template markup could not be parsed or written.
    #[error("XML error: {0}")]
    XmlError(String),

    /// The output destination cannot be created or written.
    #[error("Output error: {0}")]
    OutputError(String),

    /// The fixed-layout conversion engine cannot be reached.
    ///
    /// This is fatal for a batch that needs PDF output: the batch aborts
    /// instead of silently producing documents without conversion.
    #[error("Conversion engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The conversion engine was reached but failed on a document.
    #[error("Conversion error: {0}")]
    ConversionError(String),

    /// Invalid configuration (settings, mapping or generation options).
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Result type alias for docforge operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
