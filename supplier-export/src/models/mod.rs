//! Domain models for the supplier export pipeline.
//!
//! - [`Cell`] - a single scalar value from an order export
//! - [`OrderTable`] - ordered columns plus rows aligned to them
//!
//! A table is produced once by the reader and every stage returns a new one,
//! so a failing stage never leaves a half-mutated table behind.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

// =============================================================================
// Cell
// =============================================================================

/// A scalar value held by one row/column position.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Build a text cell, mapping blank strings to [`Cell::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    /// Empty cells and whitespace-only text.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the cell. Text is parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Date view of the cell, accepting the common export layouts.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::DateTime(dt) => Some(dt.date()),
            Cell::Text(s) => parse_date(s.trim()),
            _ => None,
        }
    }
}

/// Parse the date part of the layouts that show up in order exports.
///
/// Shopify writes `2024-03-15 10:22:31 +0100`; spreadsheets re-saved by hand
/// tend to use `2024-03-15`, `2024/03/15` or `15/03/2024`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    None
}

/// Format a number the way a spreadsheet user expects: no trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => f.write_str(&format_number(*n)),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

// =============================================================================
// OrderTable
// =============================================================================

/// In-memory order export: column names plus rows aligned to them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl OrderTable {
    /// Create a table with the given headers and no rows.
    pub fn new(headers: Vec<String>) -> Self {
        Self { headers, rows: Vec::new() }
    }

    /// Create a table from headers and rows. Short rows are padded with
    /// empty cells, long rows are truncated.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Self::new(headers);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Append a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `(row, column name)`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Keep the rows for which `keep` returns true, preserving order.
    pub fn retain_rows<F>(self, mut keep: F) -> Self
    where
        F: FnMut(&[Cell]) -> bool,
    {
        let rows = self.rows.into_iter().filter(|r| keep(r)).collect();
        Self { headers: self.headers, rows }
    }

    /// Build a new table whose columns are taken from `sources` (indices into
    /// this table) and named `names`.
    pub fn select(&self, sources: &[usize], names: Vec<String>) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|r| sources.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Self { headers: names, rows }
    }

    /// Rename headers in place according to `rename(old) -> Some(new)`.
    pub fn rename_headers<F>(&mut self, mut rename: F)
    where
        F: FnMut(&str) -> Option<String>,
    {
        for header in &mut self.headers {
            if let Some(new) = rename(header) {
                *header = new;
            }
        }
    }

    /// Append a column. `values` must have one cell per row.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Cell>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.headers.push(name.into());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    /// Append a column filled with empty cells.
    pub fn push_empty_column(&mut self, name: impl Into<String>) {
        let values = vec![Cell::Empty; self.rows.len()];
        self.push_column(name, values);
    }

    /// Rows rendered as display strings.
    pub fn to_strings(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }
}
