//! Bounds compiler
//!
//! Each clause becomes one range over the index keys. Only a contiguous
//! leading run of index columns may be constrained: equality columns first,
//! then at most one range column.

use std::cmp::Ordering;

use crate::models::Value;
use crate::tuple::{compare_values, KeyPart, Tuple};
use super::{BoundsError, ColumnPredicate, RangeEnd, ScanBound, WhereClause};

/// Compile OR-ed clauses into one bound per clause, in clause order
///
/// `columns` are the index's declared columns. Bound tuples are padded with
/// sentinels up to that many components.
pub fn compile_bounds(columns: &[String], clauses: &[WhereClause]) -> Result<Vec<ScanBound>, BoundsError> {
    clauses.iter().map(|clause| compile_clause(columns, clause)).collect()
}

fn compile_clause(columns: &[String], clause: &WhereClause) -> Result<ScanBound, BoundsError> {
    // Every predicate must name an index column and must not mix eq with ranges
    for (column, predicate) in clause.predicates() {
        if !columns.iter().any(|c| c == column) {
            return Err(BoundsError::UnknownColumn { column: column.to_string() });
        }

        if predicate.eq.is_some() && predicate.has_range() {
            return Err(BoundsError::ConflictingPredicates { column: column.to_string() });
        }
    }

    // Walk the index columns to find the usable prefix
    let mut equals: Vec<Value> = Vec::new();
    let mut range: Option<&ColumnPredicate> = None;

    for column in columns {
        let predicate = match clause.predicate(column) {
            Some(predicate) => predicate,
            None => break,
        };

        match predicate.effective_eq() {
            Some(value) => equals.push(value.clone()),
            None => {
                range = Some(predicate);
                break;
            }
        }
    }

    let prefix_len = equals.len() + usize::from(range.is_some());

    for (column, _) in clause.predicates() {
        let position = columns.iter().position(|c| c == column).unwrap_or(columns.len());
        if position >= prefix_len {
            return Err(BoundsError::PrefixViolation { column: column.to_string() });
        }
    }

    if prefix_len == 0 {
        return Err(BoundsError::EmptyPrefix);
    }

    let width = columns.len();
    let prefix = Tuple::from_values(equals);

    let predicate = match range {
        Some(predicate) => predicate,
        None => {
            // Exact match on the equality prefix, any trailing values
            return Ok(ScanBound::new(
                Some(RangeEnd::new(prefix.clone().padded(width, KeyPart::Min), true)),
                Some(RangeEnd::new(prefix.padded(width, KeyPart::Max), true)),
                true,
            ));
        }
    };

    let lower = match tighter_lower(predicate) {
        Some((value, inclusive)) => Some(side(&prefix, value, inclusive, width, !inclusive)),
        None if !prefix.is_empty() => Some(RangeEnd::new(prefix.clone().padded(width, KeyPart::Min), true)),
        None => None,
    };

    let upper = match tighter_upper(predicate) {
        Some((value, inclusive)) => Some(side(&prefix, value, inclusive, width, inclusive)),
        None if !prefix.is_empty() => Some(RangeEnd::new(prefix.clone().padded(width, KeyPart::Max), true)),
        None => None,
    };

    Ok(ScanBound::new(lower, upper, false))
}

/// Build one side: prefix, then the range value, then sentinels
///
/// `fill_max` selects MAX padding (gt, lte) over MIN padding (gte, lt).
fn side(prefix: &Tuple, value: &Value, inclusive: bool, width: usize, fill_max: bool) -> RangeEnd {
    let mut parts = prefix.parts().to_vec();
    parts.push(KeyPart::Value(value.clone()));

    let fill = if fill_max { KeyPart::Max } else { KeyPart::Min };
    RangeEnd::new(Tuple(parts).padded(width, fill), inclusive)
}

/// The stricter of `gt` and `gte`; the flag is true for `gte`
fn tighter_lower(predicate: &ColumnPredicate) -> Option<(&Value, bool)> {
    match (&predicate.gt, &predicate.gte) {
        (Some(gt), Some(gte)) => {
            if compare_values(gt, gte) != Ordering::Less {
                Some((gt, false))
            } else {
                Some((gte, true))
            }
        }
        (Some(gt), None) => Some((gt, false)),
        (None, Some(gte)) => Some((gte, true)),
        (None, None) => None,
    }
}

/// The stricter of `lt` and `lte`; the flag is true for `lte`
fn tighter_upper(predicate: &ColumnPredicate) -> Option<(&Value, bool)> {
    match (&predicate.lt, &predicate.lte) {
        (Some(lt), Some(lte)) => {
            if compare_values(lt, lte) != Ordering::Greater {
                Some((lt, false))
            } else {
                Some((lte, true))
            }
        }
        (Some(lt), None) => Some((lt, false)),
        (None, Some(lte)) => Some((lte, true)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn columns() -> Vec<String> {
        vec!["id".to_string(), "title".to_string(), "author".to_string()]
    }

    fn tuple(parts: Vec<KeyPart>) -> Tuple {
        Tuple(parts)
    }

    fn v(value: impl Into<Value>) -> KeyPart {
        KeyPart::Value(value.into())
    }

    fn compile_one(clause: WhereClause) -> Result<ScanBound, BoundsError> {
        let mut bounds = compile_bounds(&columns(), &[clause])?;
        assert_eq!(bounds.len(), 1);
        Ok(bounds.remove(0))
    }

    #[test]
    fn test_eq_on_first_column() {
        let bound = compile_one(WhereClause::new().eq("id", 1)).unwrap();

        assert!(bound.is_equality());
        assert_eq!(bound.lower(), Some(&RangeEnd::new(tuple(vec![v(1), KeyPart::Min, KeyPart::Min]), true)));
        assert_eq!(bound.upper(), Some(&RangeEnd::new(tuple(vec![v(1), KeyPart::Max, KeyPart::Max]), true)));
    }

    #[test]
    fn test_lt_on_first_column() {
        let bound = compile_one(WhereClause::new().lt("id", 1)).unwrap();

        assert_eq!(bound.lower(), None);
        assert_eq!(bound.upper(), Some(&RangeEnd::new(tuple(vec![v(1), KeyPart::Min, KeyPart::Min]), false)));
    }

    #[test]
    fn test_gt_on_first_column() {
        let bound = compile_one(WhereClause::new().gt("id", 5)).unwrap();

        assert_eq!(bound.lower(), Some(&RangeEnd::new(tuple(vec![v(5), KeyPart::Max, KeyPart::Max]), false)));
        assert_eq!(bound.upper(), None);
    }

    #[test]
    fn test_eq_then_lt() {
        let bound = compile_one(WhereClause::new().eq("id", 1).lt("title", "wow")).unwrap();

        assert!(!bound.is_equality());
        assert_eq!(bound.lower(), Some(&RangeEnd::new(tuple(vec![v(1), KeyPart::Min, KeyPart::Min]), true)));
        assert_eq!(bound.upper(), Some(&RangeEnd::new(tuple(vec![v(1), v("wow"), KeyPart::Min]), false)));
    }

    #[test]
    fn test_eq_then_gte_adds_upper() {
        let bound = compile_one(WhereClause::new().eq("id", 1).gte("title", "m")).unwrap();

        assert_eq!(bound.lower(), Some(&RangeEnd::new(tuple(vec![v(1), v("m"), KeyPart::Min]), true)));
        assert_eq!(bound.upper(), Some(&RangeEnd::new(tuple(vec![v(1), KeyPart::Max, KeyPart::Max]), true)));
    }

    #[test]
    fn test_lte_fills_max() {
        let bound = compile_one(WhereClause::new().gte("id", 1).lte("id", 4)).unwrap();

        assert_eq!(bound.lower(), Some(&RangeEnd::new(tuple(vec![v(1), KeyPart::Min, KeyPart::Min]), true)));
        assert_eq!(bound.upper(), Some(&RangeEnd::new(tuple(vec![v(4), KeyPart::Max, KeyPart::Max]), true)));
    }

    #[test]
    fn test_pinned_range_is_equality() {
        // gte and lte on the same value extend the prefix like eq
        let bound = compile_one(WhereClause::new().gte("id", 2).lte("id", 2).gt("title", "a")).unwrap();

        assert_eq!(bound.lower(), Some(&RangeEnd::new(tuple(vec![v(2), v("a"), KeyPart::Max]), false)));
        assert_eq!(bound.upper(), Some(&RangeEnd::new(tuple(vec![v(2), KeyPart::Max, KeyPart::Max]), true)));
    }

    #[test]
    fn test_tighter_side_wins() {
        let bound = compile_one(WhereClause::new().gt("id", 3).gte("id", 1).lt("id", 9).lte("id", 9)).unwrap();

        assert_eq!(bound.lower(), Some(&RangeEnd::new(tuple(vec![v(3), KeyPart::Max, KeyPart::Max]), false)));
        assert_eq!(bound.upper(), Some(&RangeEnd::new(tuple(vec![v(9), KeyPart::Min, KeyPart::Min]), false)));
    }

    #[test]
    fn test_or_yields_one_bound_per_clause() {
        let clauses = vec![WhereClause::new().eq("id", 1), WhereClause::new().eq("id", 2)];
        let bounds = compile_bounds(&columns(), &clauses).unwrap();

        assert_eq!(bounds.len(), 2);
        assert_eq!(bounds[1].lower().map(|end| end.key().clone()), Some(tuple(vec![v(2), KeyPart::Min, KeyPart::Min])));

        // No clauses, no bounds
        assert!(compile_bounds(&columns(), &[]).unwrap().is_empty());
    }

    #[rstest]
    #[case::skips_leading_column(WhereClause::new().eq("title", "wow"), BoundsError::PrefixViolation { column: "title".to_string() })]
    #[case::eq_and_range(WhereClause::new().eq("id", 1).gte("id", 5), BoundsError::ConflictingPredicates { column: "id".to_string() })]
    #[case::unknown_column(WhereClause::new().eq("year", 1965), BoundsError::UnknownColumn { column: "year".to_string() })]
    #[case::after_range_column(WhereClause::new().gt("id", 1).eq("title", "a"), BoundsError::PrefixViolation { column: "title".to_string() })]
    #[case::gap(WhereClause::new().eq("id", 1).eq("author", "x"), BoundsError::PrefixViolation { column: "author".to_string() })]
    #[case::empty(WhereClause::new(), BoundsError::EmptyPrefix)]
    fn test_rejected(#[case] clause: WhereClause, #[case] expected: BoundsError) {
        let err = compile_one(clause).unwrap_err();

        assert_eq!(err, expected);
        assert!(err.to_string().starts_with("cannot compile bounds"));
    }
}
