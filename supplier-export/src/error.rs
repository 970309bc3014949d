//! Error types for the supplier export pipeline.
//!
//! One enum per stage, all folded into [`PipelineError`]:
//!
//! - [`ConfigError`] - YAML loading and config validation
//! - [`CsvError`] - reading the order export (CSV or spreadsheet)
//! - [`TransformError`] - filter, computed and rename stages
//! - [`OutputError`] - final shaping, serialization and file write
//! - [`ValidationError`] - checks on the final table
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Config Errors
// =============================================================================

/// Errors while loading or validating a supplier configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed YAML.
    #[error("malformed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document is empty.
    #[error("configuration file is empty; add the supplier rules")]
    Empty,

    /// A key has the wrong shape or an invalid value.
    #[error("invalid key '{key}': {message}")]
    InvalidKey { key: String, message: String },

    /// A filter descriptor is unusable.
    #[error("filter #{index} (column '{column}'): {message}")]
    InvalidFilter {
        index: usize,
        column: String,
        message: String,
    },

    /// Two entries of a rename map collapse into the same target.
    #[error("'{section}' maps both '{first}' and '{second}' to '{target}'")]
    DuplicateTarget {
        section: String,
        target: String,
        first: String,
        second: String,
    },

    /// A computed column formula does not parse.
    #[error("computed column '{column}': {message}")]
    Formula { column: String, message: String },

    /// Unknown `delivery.format`.
    #[error("unsupported delivery format '{0}' (expected csv or xlsx)")]
    UnsupportedFormat(String),
}

// =============================================================================
// Reader Errors
// =============================================================================

/// Errors while loading the order export.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid CSV content.
    #[error("invalid CSV at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// Spreadsheet could not be opened or read.
    #[error("cannot read spreadsheet: {0}")]
    Spreadsheet(String),

    /// File extension is not one we can read.
    #[error("unsupported input file type '{0}' (expected .csv, .xlsx or .xls)")]
    UnsupportedExtension(String),

    /// Empty file.
    #[error("order export is empty")]
    EmptyFile,

    /// Header row names the same column twice.
    #[error("duplicate column '{0}' in header row")]
    DuplicateHeader(String),
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors raised by the filter, computed and rename stages.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Referenced column absent from the table at the point of use.
    #[error("column '{column}' not found")]
    MissingColumn { stage: &'static str, column: String },

    /// Formula evaluation failed on a row.
    #[error("computed column '{column}', row {row}: {message}")]
    Formula {
        row: usize,
        column: String,
        message: String,
    },
}

impl TransformError {
    /// Stage that raised the error.
    pub fn stage(&self) -> &'static str {
        match self {
            TransformError::MissingColumn { stage, .. } => stage,
            TransformError::Formula { .. } => "computed",
        }
    }
}

// =============================================================================
// Output Errors
// =============================================================================

/// Errors raised while shaping and writing the supplier file.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Column named by `output.rename_final` or `output.order` is absent.
    #[error("column '{column}' not found")]
    MissingColumn { column: String },

    /// Final renaming produced two columns with the same name.
    #[error("duplicate output column '{0}' after final rename")]
    DuplicateColumn(String),

    /// Output name is empty or has directory parts.
    #[error("output file name '{0}' must be a plain file name")]
    InvalidFileName(String),

    /// Target file exists and the conflict policy is `fail`.
    #[error("output file '{0}' already exists")]
    AlreadyExists(PathBuf),

    /// Failed to create or write the file.
    #[error("cannot write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),

    /// XLSX serialization failed.
    #[error("XLSX serialization failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors from the final-table checks (`validation` config section).
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A `required` column is not in the output.
    #[error("required column '{0}' is not in the output")]
    MissingColumn(String),

    /// An empty cell in a `required` or `nonempty` column.
    #[error("column '{column}' has an empty value at row {row}")]
    MissingValue { column: String, row: usize },

    /// A `positive_int` column holds zero, a negative or a non-number.
    #[error("column '{column}' must be > 0, got '{value}' at row {row}")]
    NotPositive {
        column: String,
        row: usize,
        value: String,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline error.
///
/// This is the error type returned by [`crate::transform::pipeline::run`].
/// Its display starts with the name of the failing stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("read: {0}")]
    Read(#[from] CsvError),

    #[error("{}: {}", .0.stage(), .0)]
    Transform(#[from] TransformError),

    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("output: {0}")]
    Output(#[from] OutputError),
}

impl PipelineError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config",
            PipelineError::Read(_) => "read",
            PipelineError::Transform(e) => e.stage(),
            PipelineError::Validation(_) => "validation",
            PipelineError::Output(_) => "output",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for reader operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for transformation stages.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for output operations.
pub type OutputResult<T> = Result<T, OutputError>;

/// Result type for pipeline runs.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().starts_with("read:"));
        assert!(pipeline_err.to_string().contains("empty"));

        let transform_err = TransformError::MissingColumn {
            stage: "filter",
            column: "warehouse".into(),
        };
        let pipeline_err: PipelineError = transform_err.into();
        assert_eq!(pipeline_err.to_string(), "filter: column 'warehouse' not found");
        assert_eq!(pipeline_err.stage(), "filter");
    }

    #[test]
    fn test_formula_error_names_row() {
        let err = TransformError::Formula {
            row: 3,
            column: "total".into(),
            message: "division by zero".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("row 3"));
        assert!(msg.contains("total"));
        assert_eq!(PipelineError::from(err).stage(), "computed");
    }

    #[test]
    fn test_duplicate_target_format() {
        let err = ConfigError::DuplicateTarget {
            section: "mappings.rename".into(),
            target: "Item".into(),
            first: "sku".into(),
            second: "variant_sku".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("mappings.rename"));
        assert!(msg.contains("'sku'"));
        assert!(msg.contains("'variant_sku'"));
    }
}
