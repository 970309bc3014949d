//! Transformation module.
//!
//! - Filter: row predicates from the `filters` section
//! - Formula: expression language of computed columns
//! - Projection: computed columns, rename and column selection
//! - Pipeline: end-to-end run from order export to supplier file

pub mod filter;
pub mod formula;
pub mod pipeline;
pub mod projection;

pub use filter::apply_filters;
pub use formula::{Formula, FormulaError};
pub use pipeline::{run, run_at, transform_table, RunOptions, RunSummary};
pub use projection::{apply_computed, project, rename_and_project};
