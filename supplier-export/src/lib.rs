//! # Supplier Export - order exports reshaped into supplier files
//!
//! Reads an e-commerce order export (CSV or spreadsheet), applies a
//! per-supplier YAML config (filters, renames, computed columns, final
//! layout) and writes the CSV or XLSX file that supplier expects.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Order export│────▶│   Parser    │────▶│  Transform  │────▶│   Output    │
//! │ (CSV/XLSX)  │     │  (auto-enc) │     │ (YAML rules)│     │ (CSV/XLSX)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use supplier_export::{run, RunOptions};
//!
//! let summary = run(&RunOptions::new("orders.csv", "configs/acme.yaml", "out"))?;
//! println!("{} rows -> {}", summary.rows_written, summary.path.display());
//! # Ok::<(), supplier_export::PipelineError>(())
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`logs`] - Run log written to stderr
//! - [`models`] - Cells and the in-memory order table
//! - [`config`] - Supplier config loading and validation
//! - [`parser`] - CSV/spreadsheet reading with auto-detection
//! - [`transform`] - Filters, formulas, projection and pipeline
//! - [`output`] - Final layout, serialization and delivery
//! - [`validation`] - Checks on the final table

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Configuration
pub mod config;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod output;

// Validation
pub mod validation;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    CsvError,
    OutputError,
    PipelineError,
    PipelineResult,
    TransformError,
    ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, OrderTable};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::{
    load_config,
    ConflictPolicy,
    DeliveryFormat,
    DeliverySpec,
    Filter,
    OutputSpec,
    Predicate,
    SupplierConfig,
    ValidationRules,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    load_orders,
    normalize_column_name,
    parse_bytes_auto,
    parse_csv_file_auto,
    parse_csv_str,
    parse_spreadsheet,
    ParseResult,
};

// =============================================================================
// Re-exports - Transform & Pipeline
// =============================================================================

pub use transform::{
    apply_filters,
    rename_and_project,
    run,
    run_at,
    transform_table,
    Formula,
    RunOptions,
    RunSummary,
};

// =============================================================================
// Re-exports - Output & Validation
// =============================================================================

pub use output::{deliver, output_file_name, render, shape};
pub use validation::validate_output;
