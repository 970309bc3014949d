//! Order export reader with encoding and delimiter auto-detection.
//!
//! CSV files are decoded (UTF-8, Latin-1, Windows-1252, ...) and every field is
//! kept as text, so identifiers such as ZIP codes keep their leading zeros.
//! Spreadsheets (`.xlsx`, `.xlsm`, `.xls`, `.ods`) are read from their first
//! worksheet with native cell types.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::Timelike;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CsvError, CsvResult};
use crate::models::{Cell, OrderTable};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("static regex"));

/// Kind of file the table was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Spreadsheet,
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed table
    pub table: OrderTable,
    pub format: InputFormat,
    /// Detected encoding (CSV only)
    pub encoding: Option<String>,
    /// Detected delimiter (CSV only)
    pub delimiter: Option<char>,
}

// =============================================================================
// Header names
// =============================================================================

/// Lowercase a column name and swap runs of symbols for underscores.
///
/// `"Lineitem SKU"` becomes `"lineitem_sku"`, `"Total (EUR)"` becomes `"total_eur"`.
pub fn normalize_column_name(name: &str) -> String {
    NON_WORD
        .replace_all(name, "_")
        .trim_matches('_')
        .to_lowercase()
}

/// Rewrite every header with [`normalize_column_name`].
///
/// Fails when two headers collapse into the same name.
pub fn normalize_headers(table: OrderTable) -> CsvResult<OrderTable> {
    let names: Vec<String> = table
        .headers()
        .iter()
        .map(|h| normalize_column_name(h))
        .collect();
    check_duplicate_headers(&names)?;
    let indices: Vec<usize> = (0..names.len()).collect();
    Ok(table.select(&indices, names))
}

fn clean_headers(raw: impl IntoIterator<Item = String>) -> CsvResult<Vec<String>> {
    let headers: Vec<String> = raw
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim_start_matches('\u{feff}').trim().to_string();
            if h.is_empty() {
                format!("unnamed_{}", i + 1)
            } else {
                h
            }
        })
        .collect();
    if headers.is_empty() {
        return Err(CsvError::EmptyFile);
    }
    check_duplicate_headers(&headers)?;
    Ok(headers)
}

fn check_duplicate_headers(headers: &[String]) -> CsvResult<()> {
    let mut seen = std::collections::HashSet::new();
    for h in headers {
        if !seen.insert(h.as_str()) {
            return Err(CsvError::DuplicateHeader(h.clone()));
        }
    }
    Ok(())
}

// =============================================================================
// CSV
// =============================================================================

/// Detect the encoding of raw bytes.
///
/// Valid UTF-8 is taken as is; anything else is handed to chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }
    let charset = chardet::detect(bytes).0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        "" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        label => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.into_owned(),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// Blank fields become [`Cell::Empty`], everything else stays text.
///
/// # Example
/// ```
/// use supplier_export::parser::parse_csv_str;
///
/// let table = parse_csv_str("order_id,sku\n1,A1\n2,A2", ',').unwrap();
/// assert_eq!(table.row_count(), 2);
/// assert_eq!(table.get(0, "sku").unwrap().to_string(), "A1");
/// ```
pub fn parse_csv_str(content: &str, delimiter: char) -> CsvResult<OrderTable> {
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let header_record = reader.headers().map_err(csv_parse_error)?.clone();
    let headers = clean_headers(header_record.iter().map(|h| h.to_string()))?;
    let mut table = OrderTable::new(headers);

    for record in reader.records() {
        let record = record.map_err(csv_parse_error)?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        table.push_row(record.iter().map(Cell::text).collect());
    }

    Ok(table)
}

fn csv_parse_error(err: csv::Error) -> CsvError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    CsvError::Parse { line, message: err.to_string() }
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(content.trim_start_matches('\u{feff}'));
    let table = parse_csv_str(&content, delimiter)?;

    Ok(ParseResult {
        table,
        format: InputFormat::Csv,
        encoding: Some(encoding),
        delimiter: Some(delimiter),
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CsvError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_bytes_auto(&bytes)
}

// =============================================================================
// Spreadsheets
// =============================================================================

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) if ndt.time().num_seconds_from_midnight() == 0 => Cell::Date(ndt.date()),
            Some(ndt) => Cell::DateTime(ndt),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.clone()),
        Data::Error(e) => Cell::text(format!("#{:?}", e)),
    }
}

/// Read the first worksheet of a spreadsheet. The first row is the header row.
pub fn parse_spreadsheet<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CsvError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        });
    }
    let mut workbook =
        open_workbook_auto(path).map_err(|e| CsvError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(CsvError::EmptyFile)?
        .map_err(|e| CsvError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or(CsvError::EmptyFile)?;
    let headers = clean_headers(header_row.iter().map(|d| cell_from_data(d).to_string()))?;
    let mut table = OrderTable::new(headers);

    for row in rows {
        let cells: Vec<Cell> = row.iter().map(cell_from_data).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_row(cells);
    }

    Ok(ParseResult {
        table,
        format: InputFormat::Spreadsheet,
        encoding: None,
        delimiter: None,
    })
}

/// Load an order export, choosing the reader from the file extension.
pub fn load_orders<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" | "txt" | "tsv" => parse_csv_file_auto(path),
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => parse_spreadsheet(path),
        other => Err(CsvError::UnsupportedExtension(other.to_string())),
    }
}
