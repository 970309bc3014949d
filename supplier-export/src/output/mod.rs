//! Output formatter: final column layout, serialization and file delivery.
//!
//! ```text
//! projected table ──▶ rename_final ──▶ order ──▶ CSV/XLSX bytes ──▶ file (create_new)
//! ```
//!
//! The whole file is serialized in memory before anything touches the disk,
//! and the target is opened with `create_new`, so an existing file is never
//! overwritten and a failed run leaves nothing behind.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, XlsxError};

use crate::config::{ConflictPolicy, DeliveryFormat, DeliverySpec, OutputSpec};
use crate::error::{OutputError, OutputResult};
use crate::models::{Cell, OrderTable};

/// Upper bound on `-N` suffixes tried before giving up.
const MAX_SUFFIX: u32 = 9_999;

const XLSX_MAX_ROWS: usize = 1_048_576;
const XLSX_MAX_COLS: usize = 16_384;

// =============================================================================
// Table shaping
// =============================================================================

/// Apply `output.rename_final` then `output.order`.
pub fn shape(table: &OrderTable, spec: &OutputSpec) -> OutputResult<OrderTable> {
    for (from, _) in &spec.rename_final {
        if !table.has_column(from) {
            return Err(OutputError::MissingColumn { column: from.clone() });
        }
    }

    let finals: HashMap<&str, &str> = spec
        .rename_final
        .iter()
        .map(|(from, to)| (from.as_str(), to.as_str()))
        .collect();
    let mut renamed = table.clone();
    renamed.rename_headers(|h| finals.get(h).map(|to| to.to_string()));

    let mut seen = HashSet::new();
    for h in renamed.headers() {
        if !seen.insert(h.as_str()) {
            return Err(OutputError::DuplicateColumn(h.clone()));
        }
    }

    let Some(order) = &spec.order else {
        return Ok(renamed);
    };

    let mut sources = Vec::with_capacity(order.len());
    let mut missing = Vec::new();
    for name in order {
        match renamed.column_index(name) {
            Some(idx) => sources.push(Some(idx)),
            None if spec.fill_missing => {
                missing.push(name.clone());
                sources.push(None);
            }
            None => return Err(OutputError::MissingColumn { column: name.clone() }),
        }
    }

    if missing.is_empty() {
        let indices: Vec<usize> = sources.into_iter().flatten().collect();
        return Ok(renamed.select(&indices, order.clone()));
    }

    // Missing columns are added empty at the end, then everything is put in order.
    for name in &missing {
        renamed.push_empty_column(name.clone());
    }
    let indices: Vec<usize> = order
        .iter()
        .filter_map(|name| renamed.column_index(name))
        .collect();
    Ok(renamed.select(&indices, order.clone()))
}

// =============================================================================
// Serialization
// =============================================================================

/// Serialize to CSV: UTF-8, comma-delimited, header row, minimal quoting.
pub fn to_csv_bytes(table: &OrderTable) -> OutputResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(table.headers())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|c| c.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| OutputError::Csv(csv::Error::from(e.into_error())))
}

/// Serialize to XLSX: one worksheet, header row, default styling.
pub fn to_xlsx_bytes(table: &OrderTable) -> OutputResult<Vec<u8>> {
    if table.column_count() > XLSX_MAX_COLS || table.row_count() + 1 > XLSX_MAX_ROWS {
        return Err(OutputError::Xlsx(XlsxError::RowColumnLimitError));
    }

    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    let worksheet = workbook.add_worksheet();

    for (col, header) in table.headers().iter().enumerate() {
        worksheet.write_string(0, col as u16, header)?;
    }

    for (r, row) in table.rows().iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                Cell::Date(d) => match excel_date(d.year(), d.month(), d.day()) {
                    Some(dt) => {
                        worksheet.write_datetime_with_format(r, c, &dt, &date_format)?;
                    }
                    None => {
                        worksheet.write_string(r, c, cell.to_string())?;
                    }
                },
                Cell::DateTime(ndt) => match excel_datetime(ndt) {
                    Some(dt) => {
                        worksheet.write_datetime_with_format(r, c, &dt, &datetime_format)?;
                    }
                    None => {
                        worksheet.write_string(r, c, cell.to_string())?;
                    }
                },
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn excel_date(year: i32, month: u32, day: u32) -> Option<ExcelDateTime> {
    let year = u16::try_from(year).ok()?;
    ExcelDateTime::from_ymd(year, month as u8, day as u8).ok()
}

fn excel_datetime(ndt: &NaiveDateTime) -> Option<ExcelDateTime> {
    let date = ndt.date();
    excel_date(date.year(), date.month(), date.day())?
        .and_hms(ndt.hour() as u16, ndt.minute() as u8, f64::from(ndt.second()))
        .ok()
}

/// Serialize in the configured format.
pub fn render(table: &OrderTable, format: DeliveryFormat) -> OutputResult<Vec<u8>> {
    match format {
        DeliveryFormat::Csv => to_csv_bytes(table),
        DeliveryFormat::Xlsx => to_xlsx_bytes(table),
    }
}

// =============================================================================
// File naming and delivery
// =============================================================================

/// Build the output file name from the delivery pattern.
///
/// Placeholders: `{supplier}`, `{today}` (`YYYYMMDD`), `{timestamp}`
/// (`YYYYMMDD_HHMMSS`), `{ext}`. The format's extension is appended when the
/// result has none.
pub fn output_file_name(delivery: &DeliverySpec, supplier: &str, now: NaiveDateTime) -> String {
    let pattern = delivery
        .filename_pattern
        .as_deref()
        .unwrap_or("{supplier}_{timestamp}");
    let supplier: String = supplier
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();

    let name = pattern
        .replace("{supplier}", &supplier)
        .replace("{today}", &now.format("%Y%m%d").to_string())
        .replace("{timestamp}", &now.format("%Y%m%d_%H%M%S").to_string())
        .replace("{ext}", delivery.format.extension());

    with_extension(name, delivery.format)
}

/// Append the format's extension to `name` unless it already has one.
pub fn with_extension(name: String, format: DeliveryFormat) -> String {
    if Path::new(&name).extension().is_some() {
        name
    } else {
        format!("{}.{}", name, format.extension())
    }
}

/// Reject names that would resolve outside the output directory.
pub fn check_file_name(name: &str) -> OutputResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." || name.contains(['/', '\\']) {
        return Err(OutputError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// Create `path` and write `bytes`. `Ok(false)` when the file already exists.
fn create_new(path: &Path, bytes: &[u8]) -> OutputResult<bool> {
    let io_err = |source: io::Error| OutputError::Io { path: path.to_path_buf(), source };

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(io_err(e)),
    };
    if let Err(e) = file.write_all(bytes).and_then(|_| file.flush()) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(io_err(e));
    }
    Ok(true)
}

/// Write `bytes` as `file_name` inside `dir`, honoring the conflict policy.
///
/// `file_name` must be a plain file name. Returns the path actually written.
pub fn deliver(
    bytes: &[u8],
    dir: &Path,
    file_name: &str,
    policy: ConflictPolicy,
) -> OutputResult<PathBuf> {
    check_file_name(file_name)?;
    fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let target = dir.join(file_name);
    if create_new(&target, bytes)? {
        return Ok(target);
    }
    if policy == ConflictPolicy::Fail {
        return Err(OutputError::AlreadyExists(target));
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    for n in 1..=MAX_SUFFIX {
        let candidate = match &ext {
            Some(ext) => dir.join(format!("{}-{}.{}", stem, n, ext)),
            None => dir.join(format!("{}-{}", stem, n)),
        };
        if create_new(&candidate, bytes)? {
            return Ok(candidate);
        }
    }

    Err(OutputError::AlreadyExists(target))
}
