//! High-level pipeline API: order export in, supplier file out.
//!
//! ```text
//! load config ─▶ read orders ─▶ normalize ─▶ filter ─▶ computed + rename
//!     ─▶ final rename/order ─▶ validate ─▶ serialize ─▶ write (create_new)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use supplier_export::transform::pipeline::{run, RunOptions};
//!
//! let options = RunOptions::new("orders.csv", "configs/acme.yaml", "out");
//! let summary = run(&options)?;
//! println!("{}", summary.path.display());
//! # Ok::<(), supplier_export::PipelineError>(())
//! ```

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};

use crate::config::{load_config, SupplierConfig};
use crate::error::PipelineResult;
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::models::OrderTable;
use crate::output::{deliver, output_file_name, render, shape, with_extension};
use crate::parser::{load_orders, normalize_headers, InputFormat};
use crate::transform::filter::apply_filters;
use crate::transform::projection::rename_and_project;
use crate::validation::validate_output;

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Order export (CSV or spreadsheet).
    pub orders: PathBuf,
    /// Supplier config (YAML).
    pub config: PathBuf,
    /// Directory the supplier file is written to.
    pub outdir: PathBuf,
    /// Explicit output file name, overriding `delivery.filename_pattern`.
    pub output_name: Option<String>,
}

impl RunOptions {
    pub fn new(
        orders: impl Into<PathBuf>,
        config: impl Into<PathBuf>,
        outdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            orders: orders.into(),
            config: config.into(),
            outdir: outdir.into(),
            output_name: None,
        }
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// File actually written (may carry a `-N` suffix).
    pub path: PathBuf,
    pub supplier: String,
    pub rows_read: usize,
    pub rows_written: usize,
    pub columns: Vec<String>,
}

/// Run the whole pipeline with the current local time for file naming.
pub fn run(options: &RunOptions) -> PipelineResult<RunSummary> {
    run_at(options, Local::now().naive_local())
}

/// Same as [`run`], with an explicit clock for `{today}` and `{timestamp}`.
pub fn run_at(options: &RunOptions, now: NaiveDateTime) -> PipelineResult<RunSummary> {
    execute(options, now).inspect_err(|e| log_error(format!("{} stage failed", e.stage())))
}

fn execute(options: &RunOptions, now: NaiveDateTime) -> PipelineResult<RunSummary> {
    log_info(format!("📄 Loading config {}", options.config.display()));
    let config = load_config(&options.config)?;
    let supplier = config.supplier.clone().unwrap_or_else(|| "supplier".to_string());
    log_success(format!("Supplier: {}", supplier));

    log_info(format!("📖 Reading orders {}", options.orders.display()));
    let parsed = load_orders(&options.orders)?;
    match parsed.format {
        InputFormat::Csv => {
            if let Some(encoding) = &parsed.encoding {
                log_success(format!("Detected encoding: {}", encoding));
            }
            if let Some(delimiter) = parsed.delimiter {
                log_success(format!("Detected separator: '{}'", format_delimiter(delimiter)));
            }
        }
        InputFormat::Spreadsheet => log_success("Read first worksheet"),
    }
    let rows_read = parsed.table.row_count();
    log_success(format!(
        "Read {} rows, {} columns",
        rows_read,
        parsed.table.column_count()
    ));

    let table = transform_table(parsed.table, &config)?;

    log_info(format!("💾 Writing {}", config.delivery.format));
    let bytes = render(&table, config.delivery.format)?;
    let file_name = match &options.output_name {
        Some(name) => with_extension(name.clone(), config.delivery.format),
        None => output_file_name(&config.delivery, &supplier, now),
    };
    let path = deliver(&bytes, &options.outdir, &file_name, config.delivery.on_conflict)?;
    if path.file_name().and_then(|n| n.to_str()) != Some(file_name.as_str()) {
        log_warning(format!("{} already exists, wrote {}", file_name, path.display()));
    }
    log_success(format!("Wrote {} rows to {}", table.row_count(), path.display()));

    Ok(RunSummary {
        path,
        supplier,
        rows_read,
        rows_written: table.row_count(),
        columns: table.headers().to_vec(),
    })
}

/// Apply every in-memory stage of `config` to `table`.
///
/// Header normalization, filters, computed columns and renaming, final
/// rename/order, then validation. Nothing is written.
pub fn transform_table(table: OrderTable, config: &SupplierConfig) -> PipelineResult<OrderTable> {
    let table = if config.normalize_headers {
        log_info("🔤 Normalizing headers");
        normalize_headers(table)?
    } else {
        table
    };

    let before = table.row_count();
    let table = if config.filters.is_empty() {
        table
    } else {
        log_info(format!("🔍 Applying {} filter(s)", config.filters.len()));
        let filtered = apply_filters(table, &config.filters)?;
        log_success(format!("Kept {} of {} rows", filtered.row_count(), before));
        filtered
    };
    if table.is_empty() {
        log_warning("No rows left after filtering");
    }

    let table = if config.projects() {
        log_info("🔄 Mapping columns");
        for (from, to) in &config.rename {
            log_info_indent(format!("{} → {}", from, to), 1);
        }
        for column in &config.computed {
            log_info_indent(format!("{} = {}", column.name, column.formula.source()), 1);
        }
        rename_and_project(table, &config.rename, &config.computed)?
    } else {
        table
    };

    let table = shape(&table, &config.output)?;

    if !config.validation.is_empty() {
        log_info("✔️  Validating output");
        validate_output(&table, &config.validation)?;
        log_success("Output valid");
    }

    Ok(table)
}

fn format_delimiter(delimiter: char) -> String {
    match delimiter {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, TransformError, ValidationError};
    use std::fs;

    fn config(yaml: &str) -> SupplierConfig {
        SupplierConfig::from_yaml(yaml).unwrap()
    }

    fn orders() -> OrderTable {
        OrderTable::from_rows(
            vec!["order_id".into(), "status".into(), "sku".into(), "price".into(), "qty".into()],
            vec![
                vec!["1".into(), "paid".into(), "A1".into(), "10".into(), "3".into()],
                vec!["2".into(), "pending".into(), "A2".into(), "5".into(), "1".into()],
            ],
        )
    }

    #[test]
    fn test_transform_table_end_to_end() {
        let cfg = config(
            r#"
filters:
  - { column: status, op: equals, value: paid }
mappings:
  rename: { order_id: PO_Number, sku: Item }
  computed:
    total: "price * qty"
output:
  order: [PO_Number, Item, total]
"#,
        );
        let out = transform_table(orders(), &cfg).unwrap();
        assert_eq!(out.headers(), &["PO_Number", "Item", "total"]);
        assert_eq!(out.to_strings(), vec![vec!["1", "A1", "30"]]);
    }

    #[test]
    fn test_missing_column_in_filter_names_stage() {
        let cfg = config("filters:\n  - { column: warehouse, op: is_not_empty }\n");
        let err = transform_table(orders(), &cfg).unwrap_err();
        assert_eq!(err.stage(), "filter");
        assert!(matches!(
            err,
            PipelineError::Transform(TransformError::MissingColumn { ref column, .. }) if column == "warehouse"
        ));
    }

    #[test]
    fn test_validation_runs_on_final_table() {
        let cfg = config(
            "mappings:\n  rename: { order_id: PO_Number, qty: Qty }\nvalidation:\n  positive_int: [Qty]\n",
        );
        let mut table = orders();
        table.push_row(vec!["3".into(), "paid".into(), "A3".into(), "1".into(), "0".into()]);
        let err = transform_table(table, &cfg).unwrap_err();
        assert_eq!(err.stage(), "validation");
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::NotPositive { row: 3, .. })
        ));
    }

    #[test]
    fn test_normalized_headers() {
        let cfg = config("source:\n  normalize_headers: true\nmappings:\n  rename: { \"Order ID\": PO_Number }\n");
        let table = OrderTable::from_rows(
            vec!["Order ID".into(), "Status".into()],
            vec![vec!["7".into(), "paid".into()]],
        );
        let out = transform_table(table, &cfg).unwrap();
        assert_eq!(out.headers(), &["PO_Number"]);
        assert_eq!(out.to_strings(), vec![vec!["7"]]);
    }

    #[test]
    fn test_run_writes_file_and_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let orders_path = dir.path().join("orders.csv");
        let config_path = dir.path().join("acme.yaml");
        fs::write(&orders_path, "order_id;status;sku\n1;paid;A1\n2;pending;A2\n").unwrap();
        fs::write(
            &config_path,
            "filters:\n  - { column: status, op: equals, value: paid }\nmappings:\n  rename: { order_id: PO_Number, sku: Item }\n",
        )
        .unwrap();

        let options = RunOptions::new(&orders_path, &config_path, dir.path().join("out"));
        let now = NaiveDateTime::parse_from_str("2024-03-15 09:05:07", "%Y-%m-%d %H:%M:%S").unwrap();
        let summary = run_at(&options, now).unwrap();

        assert_eq!(summary.supplier, "acme");
        assert_eq!(summary.path, dir.path().join("out").join("acme_20240315_090507.csv"));
        assert_eq!(summary.rows_read, 2);
        assert_eq!(summary.rows_written, 1);
        assert_eq!(fs::read_to_string(&summary.path).unwrap(), "PO_Number,Item\n1,A1\n");
    }

    #[test]
    fn test_failed_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let orders_path = dir.path().join("orders.csv");
        let config_path = dir.path().join("acme.yaml");
        fs::write(&orders_path, "order_id,status\n1,paid\n").unwrap();
        fs::write(&config_path, "mappings:\n  rename: { warehouse: WH }\n").unwrap();

        let outdir = dir.path().join("out");
        let options = RunOptions::new(&orders_path, &config_path, &outdir).with_output_name("po");
        let err = run(&options).unwrap_err();
        assert_eq!(err.stage(), "rename");
        assert!(!outdir.exists());
    }
}
