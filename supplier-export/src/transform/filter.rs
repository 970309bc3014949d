//! Filter stage: keep the rows every configured predicate accepts.

use crate::config::{Filter, Predicate};
use crate::error::{TransformError, TransformResult};
use crate::models::{Cell, OrderTable};

impl Filter {
    /// Whether `cell` satisfies this filter.
    pub fn matches(&self, cell: &Cell) -> bool {
        let fold = |s: &str| {
            if self.case_insensitive {
                s.trim().to_lowercase()
            } else {
                s.trim().to_string()
            }
        };
        let text = fold(&cell.to_string());

        match &self.predicate {
            Predicate::Equals(value) => text == fold(value),
            Predicate::NotEquals(value) => text != fold(value),
            Predicate::OneOf(values) => values.iter().any(|v| fold(v) == text),
            Predicate::NotOneOf(values) => !values.iter().any(|v| fold(v) == text),
            Predicate::IsEmpty => cell.is_empty(),
            Predicate::IsNotEmpty => !cell.is_empty(),
            Predicate::Compare(op, rhs) => cell.as_number().is_some_and(|lhs| op.holds(lhs, *rhs)),
        }
    }
}

/// Return the rows of `table` for which all `filters` hold.
///
/// Row order is preserved. Every filter column is resolved before any row is
/// looked at, so a missing column fails the stage without producing a table.
pub fn apply_filters(table: OrderTable, filters: &[Filter]) -> TransformResult<OrderTable> {
    if filters.is_empty() {
        return Ok(table);
    }

    let resolved = filters
        .iter()
        .map(|f| {
            table
                .column_index(&f.column)
                .map(|idx| (idx, f))
                .ok_or_else(|| TransformError::MissingColumn {
                    stage: "filter",
                    column: f.column.clone(),
                })
        })
        .collect::<TransformResult<Vec<_>>>()?;

    Ok(table.retain_rows(|row| resolved.iter().all(|(idx, f)| f.matches(&row[*idx]))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompareOp;

    fn orders() -> OrderTable {
        OrderTable::from_rows(
            vec!["order_id".into(), "status".into(), "fulfillment".into(), "qty".into()],
            vec![
                vec!["1".into(), "paid".into(), "".into(), "2".into()],
                vec!["2".into(), "pending".into(), "fulfilled".into(), "1".into()],
                vec!["3".into(), "PAID".into(), "fulfilled".into(), "0".into()],
                vec!["4".into(), "paid".into(), "partial".into(), "n/a".into()],
            ],
        )
    }

    fn filter(column: &str, predicate: Predicate) -> Filter {
        Filter { column: column.into(), predicate, case_insensitive: false }
    }

    fn ids(table: &OrderTable) -> Vec<String> {
        table
            .column("order_id")
            .unwrap()
            .into_iter()
            .map(|c| c.to_string())
            .collect()
    }

    #[test]
    fn test_equals_is_case_sensitive_by_default() {
        let out = apply_filters(orders(), &[filter("status", Predicate::Equals("paid".into()))]).unwrap();
        assert_eq!(ids(&out), vec!["1", "4"]);
    }

    #[test]
    fn test_case_insensitive_one_of() {
        let mut f = filter("status", Predicate::OneOf(vec!["Paid".into()]));
        f.case_insensitive = true;
        let out = apply_filters(orders(), &[f]).unwrap();
        assert_eq!(ids(&out), vec!["1", "3", "4"]);
    }

    #[test]
    fn test_filters_are_anded() {
        let filters = [
            filter("status", Predicate::Equals("paid".into())),
            filter("fulfillment", Predicate::NotOneOf(vec!["fulfilled".into(), "partial".into()])),
        ];
        let out = apply_filters(orders(), &filters).unwrap();
        assert_eq!(ids(&out), vec!["1"]);
    }

    #[test]
    fn test_empty_predicates() {
        let out = apply_filters(orders(), &[filter("fulfillment", Predicate::IsEmpty)]).unwrap();
        assert_eq!(ids(&out), vec!["1"]);
        let out = apply_filters(orders(), &[filter("fulfillment", Predicate::IsNotEmpty)]).unwrap();
        assert_eq!(ids(&out), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_numeric_comparison_skips_non_numbers() {
        let out = apply_filters(orders(), &[filter("qty", Predicate::Compare(CompareOp::Gte, 1.0))]).unwrap();
        assert_eq!(ids(&out), vec!["1", "2"]);
        let out = apply_filters(orders(), &[filter("qty", Predicate::Compare(CompareOp::Lt, 1.0))]).unwrap();
        assert_eq!(ids(&out), vec!["3"]);
    }

    #[test]
    fn test_not_equals_keeps_other_rows() {
        let out = apply_filters(orders(), &[filter("status", Predicate::NotEquals("paid".into()))]).unwrap();
        assert_eq!(ids(&out), vec!["2", "3"]);
    }

    #[test]
    fn test_filtering_is_idempotent_and_never_grows() {
        let filters = [filter("status", Predicate::OneOf(vec!["paid".into(), "pending".into()]))];
        let before = orders();
        let once = apply_filters(before.clone(), &filters).unwrap();
        let twice = apply_filters(once.clone(), &filters).unwrap();
        assert_eq!(once, twice);
        assert!(once.row_count() <= before.row_count());
    }

    #[test]
    fn test_missing_column_names_stage_and_column() {
        let err = apply_filters(orders(), &[filter("warehouse", Predicate::IsEmpty)]).unwrap_err();
        match err {
            TransformError::MissingColumn { stage, column } => {
                assert_eq!(stage, "filter");
                assert_eq!(column, "warehouse");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_filters_is_identity() {
        let out = apply_filters(orders(), &[]).unwrap();
        assert_eq!(out, orders());
    }
}
