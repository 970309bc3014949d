//! Checks on the final table before it is written.
//!
//! - `required`: the column exists and has no empty cell
//! - `nonempty`: if the column exists, it has no empty cell
//! - `positive_int`: if the column exists, every non-empty cell is a number > 0
//!
//! The first offending row is reported (1-based, header excluded).

use crate::config::ValidationRules;
use crate::error::ValidationError;
use crate::models::{Cell, OrderTable};

/// Run every rule against `table`, stopping at the first failure.
pub fn validate_output(table: &OrderTable, rules: &ValidationRules) -> Result<(), ValidationError> {
    for column in &rules.required {
        let cells = table
            .column(column)
            .ok_or_else(|| ValidationError::MissingColumn(column.clone()))?;
        check_nonempty(column, &cells)?;
    }

    for column in &rules.nonempty {
        if let Some(cells) = table.column(column) {
            check_nonempty(column, &cells)?;
        }
    }

    for column in &rules.positive_int {
        if let Some(cells) = table.column(column) {
            check_positive(column, &cells)?;
        }
    }

    Ok(())
}

fn check_nonempty(column: &str, cells: &[&Cell]) -> Result<(), ValidationError> {
    match cells.iter().position(|c| c.is_empty()) {
        Some(idx) => Err(ValidationError::MissingValue {
            column: column.to_string(),
            row: idx + 1,
        }),
        None => Ok(()),
    }
}

fn check_positive(column: &str, cells: &[&Cell]) -> Result<(), ValidationError> {
    for (idx, cell) in cells.iter().enumerate() {
        if cell.is_empty() {
            continue;
        }
        if !cell.as_number().is_some_and(|n| n > 0.0) {
            return Err(ValidationError::NotPositive {
                column: column.to_string(),
                row: idx + 1,
                value: cell.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> OrderTable {
        OrderTable::from_rows(
            vec!["PO_Number".into(), "Item".into(), "Qty".into()],
            vec![
                vec!["1".into(), "A1".into(), "3".into()],
                vec!["2".into(), "".into(), Cell::Number(1.0)],
            ],
        )
    }

    fn rules(required: &[&str], nonempty: &[&str], positive_int: &[&str]) -> ValidationRules {
        let owned = |v: &[&str]| -> Vec<String> { v.iter().map(|s| s.to_string()).collect() };
        ValidationRules {
            required: owned(required),
            nonempty: owned(nonempty),
            positive_int: owned(positive_int),
        }
    }

    #[test]
    fn test_no_rules_passes() {
        assert!(validate_output(&table(), &ValidationRules::default()).is_ok());
    }

    #[test]
    fn test_required_column_must_exist() {
        let err = validate_output(&table(), &rules(&["Supplier_SKU"], &[], &[])).unwrap_err();
        assert!(matches!(err, ValidationError::MissingColumn(ref c) if c == "Supplier_SKU"));
    }

    #[test]
    fn test_required_reports_first_empty_row() {
        let err = validate_output(&table(), &rules(&["PO_Number", "Item"], &[], &[])).unwrap_err();
        match err {
            ValidationError::MissingValue { column, row } => {
                assert_eq!(column, "Item");
                assert_eq!(row, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nonempty_skips_absent_columns() {
        assert!(validate_output(&table(), &rules(&[], &["Notes"], &[])).is_ok());
        assert!(validate_output(&table(), &rules(&[], &["Item"], &[])).is_err());
    }

    #[test]
    fn test_positive_int() {
        assert!(validate_output(&table(), &rules(&[], &[], &["Qty", "Notes"])).is_ok());

        let mut t = table();
        t.push_row(vec!["3".into(), "A3".into(), "0".into()]);
        let err = validate_output(&t, &rules(&[], &[], &["Qty"])).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NotPositive { row: 3, ref value, .. } if value == "0"
        ));

        let mut t = table();
        t.push_row(vec!["3".into(), "A3".into(), "many".into()]);
        assert!(validate_output(&t, &rules(&[], &[], &["Qty"])).is_err());
    }
}
