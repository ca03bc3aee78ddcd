use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ReconError>;

/// Error type covering caller misconfiguration and the I/O performed by the
/// acquisition and export collaborators.
///
/// Data problems found while reconciling (duplicate keys, disjoint schemas,
/// no usable key) are not errors: they degrade the comparison and are
/// reported through the result metadata instead.
#[derive(Debug, Error)]
pub enum ReconError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when reading or writing CSV fails.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a tolerance threshold is negative or not a number.
    #[error("invalid tolerance {value} for column '{column}'")]
    InvalidTolerance { column: String, value: f64 },

    /// Raised when the registry holds no result under the requested name.
    #[error("comparison '{0}' not found")]
    UnknownComparison(String),

    /// Raised when rendering a stored result fails. The result itself stays
    /// valid and retrievable from the registry.
    #[error("export of comparison '{name}' failed: {source}")]
    Export {
        name: String,
        #[source]
        source: Box<ReconError>,
    },

    /// Raised when a file extension or format name is not recognised.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Raised when a dataset file does not have the expected shape.
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    /// Raised when a workbook does not contain the requested sheet.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when the configuration file or CLI overrides are inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Raised when a verification ceiling on differences is exceeded.
    #[error("comparison '{name}' found {found} differences, at most {allowed} allowed")]
    DifferencesExceeded {
        name: String,
        found: usize,
        allowed: usize,
    },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
