//! Rename/projection stage.
//!
//! Computed columns are evaluated first, against the source column names.
//! Then the table is projected: renamed columns (in source order) followed by
//! computed columns. Columns that are neither renamed nor computed are dropped.

use std::collections::HashMap;

use crate::config::ComputedColumn;
use crate::error::{TransformError, TransformResult};
use crate::models::{Cell, OrderTable};

/// Append the computed columns to `table`, evaluated row by row.
///
/// A formula can reference source columns and computed columns declared
/// before it. References are resolved before evaluation starts; row errors
/// carry the 1-based data row index.
pub fn apply_computed(table: OrderTable, computed: &[ComputedColumn]) -> TransformResult<OrderTable> {
    let mut table = table;

    for column in computed {
        for name in column.formula.columns() {
            if !table.has_column(name) {
                return Err(TransformError::MissingColumn {
                    stage: "computed",
                    column: name.to_string(),
                });
            }
        }

        let values = {
            let index: HashMap<&str, usize> = table
                .headers()
                .iter()
                .enumerate()
                .map(|(i, h)| (h.as_str(), i))
                .collect();

            table
                .rows()
                .iter()
                .enumerate()
                .map(|(row_idx, row)| {
                    let lookup = |name: &str| index.get(name).map(|&i| &row[i]);
                    column.formula.evaluate(&lookup).map_err(|e| TransformError::Formula {
                        row: row_idx + 1,
                        column: column.name.clone(),
                        message: e.message,
                    })
                })
                .collect::<TransformResult<Vec<Cell>>>()?
        };

        if let Some(existing) = table.column_index(&column.name) {
            // Overwriting a source column: rebuild without it, then append.
            let keep: Vec<usize> = (0..table.column_count()).filter(|&i| i != existing).collect();
            let names = keep.iter().map(|&i| table.headers()[i].clone()).collect();
            table = table.select(&keep, names);
        }
        table.push_column(column.name.clone(), values);
    }

    Ok(table)
}

/// Rename the mapped columns and drop everything that is neither renamed nor
/// listed in `keep`.
///
/// An empty `rename` together with an empty `keep` is a pass-through.
pub fn project(
    table: &OrderTable,
    rename: &[(String, String)],
    keep: &[&str],
) -> TransformResult<OrderTable> {
    if rename.is_empty() && keep.is_empty() {
        return Ok(table.clone());
    }

    for (from, _) in rename {
        if !table.has_column(from) {
            return Err(TransformError::MissingColumn {
                stage: "rename",
                column: from.clone(),
            });
        }
    }

    let targets: HashMap<&str, &str> = rename
        .iter()
        .map(|(from, to)| (from.as_str(), to.as_str()))
        .collect();

    let mut sources = Vec::new();
    let mut names = Vec::new();
    for (i, header) in table.headers().iter().enumerate() {
        if let Some(to) = targets.get(header.as_str()) {
            sources.push(i);
            names.push(to.to_string());
        }
    }
    for name in keep {
        let idx = table.column_index(name).ok_or_else(|| TransformError::MissingColumn {
            stage: "rename",
            column: name.to_string(),
        })?;
        if !targets.contains_key(name) {
            sources.push(idx);
            names.push(name.to_string());
        }
    }

    Ok(table.select(&sources, names))
}

/// Run the whole stage: computed columns, then rename + projection.
pub fn rename_and_project(
    table: OrderTable,
    rename: &[(String, String)],
    computed: &[ComputedColumn],
) -> TransformResult<OrderTable> {
    let with_computed = apply_computed(table, computed)?;
    let keep: Vec<&str> = computed.iter().map(|c| c.name.as_str()).collect();
    project(&with_computed, rename, &keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::formula::Formula;

    fn orders() -> OrderTable {
        OrderTable::from_rows(
            vec!["order_id".into(), "status".into(), "sku".into(), "price".into(), "qty".into()],
            vec![
                vec!["1".into(), "paid".into(), "A1".into(), "10".into(), "3".into()],
                vec!["2".into(), "paid".into(), "A2".into(), "2.5".into(), "4".into()],
            ],
        )
    }

    fn computed(name: &str, src: &str) -> ComputedColumn {
        ComputedColumn { name: name.into(), formula: Formula::parse(src).unwrap() }
    }

    fn rename(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    #[test]
    fn test_rename_drops_unmapped_columns() {
        let out = rename_and_project(
            orders(),
            &rename(&[("sku", "Item"), ("order_id", "PO_Number")]),
            &[],
        )
        .unwrap();
        // source order wins over mapping order
        assert_eq!(out.headers(), &["PO_Number".to_string(), "Item".to_string()]);
        assert_eq!(out.to_strings(), vec![vec!["1", "A1"], vec!["2", "A2"]]);
    }

    #[test]
    fn test_computed_total() {
        let out = rename_and_project(orders(), &[], &[computed("total", "price * qty")]).unwrap();
        assert_eq!(out.headers(), &["total".to_string()]);
        assert_eq!(out.get(0, "total"), Some(&Cell::Number(30.0)));
        assert_eq!(out.get(1, "total").unwrap().to_string(), "10");
    }

    #[test]
    fn test_computed_uses_names_before_rename() {
        let out = rename_and_project(
            orders(),
            &rename(&[("sku", "Item")]),
            &[computed("label", "concat(sku, 'x', qty)")],
        )
        .unwrap();
        assert_eq!(out.headers(), &["Item".to_string(), "label".to_string()]);
        assert_eq!(out.get(0, "label").unwrap().to_string(), "A1 x 3");
    }

    #[test]
    fn test_computed_can_chain() {
        let out = apply_computed(
            orders(),
            &[computed("total", "price * qty"), computed("with_tax", "round(total * 1.2, 2)")],
        )
        .unwrap();
        assert_eq!(out.get(0, "with_tax"), Some(&Cell::Number(36.0)));
    }

    #[test]
    fn test_computed_overwrites_source_column() {
        let out = apply_computed(orders(), &[computed("sku", "lower(sku)")]).unwrap();
        assert_eq!(out.column_count(), 5);
        assert_eq!(out.headers().last().map(String::as_str), Some("sku"));
        assert_eq!(out.get(0, "sku").unwrap().to_string(), "a1");
    }

    #[test]
    fn test_computed_missing_column() {
        let err = apply_computed(orders(), &[computed("w", "warehouse & '-1'")]).unwrap_err();
        assert!(matches!(
            err,
            TransformError::MissingColumn { stage: "computed", ref column } if column == "warehouse"
        ));
    }

    #[test]
    fn test_formula_error_reports_row() {
        let mut table = orders();
        table.push_row(vec!["3".into(), "paid".into(), "A3".into(), "free".into(), "1".into()]);
        let err = apply_computed(table, &[computed("total", "price * qty")]).unwrap_err();
        match err {
            TransformError::Formula { row, column, message } => {
                assert_eq!(row, 3);
                assert_eq!(column, "total");
                assert!(message.contains("'free'"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rename_missing_column() {
        let err = rename_and_project(orders(), &rename(&[("warehouse", "WH")]), &[]).unwrap_err();
        assert!(matches!(
            err,
            TransformError::MissingColumn { stage: "rename", ref column } if column == "warehouse"
        ));
    }

    #[test]
    fn test_pass_through_without_mappings() {
        let out = rename_and_project(orders(), &[], &[]).unwrap();
        assert_eq!(out, orders());
    }
}
