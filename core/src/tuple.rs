//! Value and tuple ordering
//!
//! A single total order over column values, extended with the two bound-only
//! sentinels `Min` and `Max`. The index trees, the bounds compiler and the
//! row-level predicate checks all compare through this module.
//!
//! Value order: null < number < text. Booleans rank inside the numeric class
//! as 0 and 1, `-0.0` equals `0.0`, and NaN sorts above every other number.

use std::cmp::Ordering;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::models::Value;

/// One component of an index key or scan bound
#[derive(Clone, PartialEq)]
pub enum KeyPart {
    /// Sorts before every value; only appears in scan bounds
    Min,

    /// A stored column value
    Value(Value),

    /// Sorts after every value; only appears in scan bounds
    Max,
}

impl Debug for KeyPart {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            KeyPart::Min => write!(f, "MIN"),
            KeyPart::Value(v) => write!(f, "{}", v),
            KeyPart::Max => write!(f, "MAX"),
        }
    }
}

impl From<Value> for KeyPart {
    fn from(value: Value) -> Self {
        KeyPart::Value(value)
    }
}

/// Rank of a value class in the total order
fn class_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Boolean(_) | Value::Number(_) => 1,
        Value::Text(_) => 2,
    }
}

/// Fold negative zero and every NaN payload before a total comparison
fn canonical(n: f64) -> f64 {
    if n == 0.0 {
        0.0
    } else if n.is_nan() {
        f64::NAN
    } else {
        n
    }
}

/// Compare two column values
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = class_rank(a).cmp(&class_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => canonical(x).total_cmp(&canonical(y)),
            // Same class rank guarantees both sides are numeric here
            _ => Ordering::Equal,
        },
    }
}

/// Compare two key parts, sentinels included
pub fn compare_parts(a: &KeyPart, b: &KeyPart) -> Ordering {
    match (a, b) {
        (KeyPart::Min, KeyPart::Min) | (KeyPart::Max, KeyPart::Max) => Ordering::Equal,
        (KeyPart::Min, _) | (_, KeyPart::Max) => Ordering::Less,
        (_, KeyPart::Min) | (KeyPart::Max, _) => Ordering::Greater,
        (KeyPart::Value(x), KeyPart::Value(y)) => compare_values(x, y),
    }
}

/// Compare two tuples position by position; on a shared prefix the shorter
/// tuple sorts first
pub fn compare_tuples(a: &[KeyPart], b: &[KeyPart]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = compare_parts(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    a.len().cmp(&b.len())
}

/// An index key, ordered with `compare_tuples`
#[derive(Clone)]
pub struct Tuple(pub Vec<KeyPart>);

impl Tuple {
    /// Build a tuple from stored values
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Tuple(values.into_iter().map(KeyPart::Value).collect())
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the tuple has no components
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Components of the tuple
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Extend the tuple with `fill` up to `width` components
    pub fn padded(mut self, width: usize, fill: KeyPart) -> Self {
        while self.0.len() < width {
            self.0.push(fill.clone());
        }
        self
    }
}

impl Debug for Tuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        compare_tuples(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for Tuple {}

impl PartialOrd for Tuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tuple {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_tuples(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Boolean),
            any::<f64>().prop_map(Value::Number),
            (-3i32..3).prop_map(Value::from),
            "[a-c]{0,3}".prop_map(Value::Text),
        ]
    }

    fn part_strategy() -> impl Strategy<Value = KeyPart> {
        prop_oneof![
            1 => Just(KeyPart::Min),
            8 => value_strategy().prop_map(KeyPart::Value),
            1 => Just(KeyPart::Max),
        ]
    }

    #[test]
    fn test_class_order() {
        let null = Value::Null;
        let number = Value::Number(-1e9);
        let text = Value::from("");

        assert_eq!(compare_values(&null, &number), Ordering::Less);
        assert_eq!(compare_values(&number, &text), Ordering::Less);
        assert_eq!(compare_values(&null, &text), Ordering::Less);
    }

    #[test]
    fn test_booleans_rank_as_numbers() {
        assert_eq!(compare_values(&Value::Boolean(true), &Value::Number(1.0)), Ordering::Equal);
        assert_eq!(compare_values(&Value::Boolean(false), &Value::Number(0.5)), Ordering::Less);
        assert_eq!(compare_values(&Value::Boolean(true), &Value::Number(2.0)), Ordering::Less);
    }

    #[test]
    fn test_zero_and_nan() {
        assert_eq!(compare_values(&Value::Number(-0.0), &Value::Number(0.0)), Ordering::Equal);
        assert_eq!(compare_values(&Value::Number(f64::NAN), &Value::Number(f64::INFINITY)), Ordering::Greater);
    }

    #[test]
    fn test_sentinels() {
        let v = KeyPart::Value(Value::Null);
        assert_eq!(compare_parts(&KeyPart::Min, &v), Ordering::Less);
        assert_eq!(compare_parts(&KeyPart::Max, &v), Ordering::Greater);
        assert_eq!(compare_parts(&KeyPart::Min, &KeyPart::Max), Ordering::Less);
        assert_eq!(compare_parts(&KeyPart::Min, &KeyPart::Min), Ordering::Equal);
        assert_eq!(compare_parts(&KeyPart::Max, &KeyPart::Max), Ordering::Equal);
    }

    #[test]
    fn test_prefix_sorts_before_completion() {
        let prefix = Tuple::from_values(vec![Value::from("a")]);
        let full = Tuple::from_values(vec![Value::from("a"), Value::Null]);
        let next = Tuple::from_values(vec![Value::from("b")]);

        assert!(prefix < full);
        assert!(full < next);

        // Padding with MAX lands after every completion of the prefix
        let upper = prefix.clone().padded(2, KeyPart::Max);
        assert!(full < upper);
        assert!(upper < next);
    }

    proptest! {
        #[test]
        fn prop_reflexive(a in value_strategy()) {
            prop_assert_eq!(compare_values(&a, &a), Ordering::Equal);
        }

        #[test]
        fn prop_antisymmetric(a in value_strategy(), b in value_strategy()) {
            prop_assert_eq!(compare_values(&a, &b), compare_values(&b, &a).reverse());
        }

        #[test]
        fn prop_transitive(a in part_strategy(), b in part_strategy(), c in part_strategy()) {
            let ab = compare_parts(&a, &b);
            let bc = compare_parts(&b, &c);
            if ab != Ordering::Greater && bc != Ordering::Greater {
                prop_assert_ne!(compare_parts(&a, &c), Ordering::Greater);
            }
            if ab == Ordering::Equal && bc == Ordering::Equal {
                prop_assert_eq!(compare_parts(&a, &c), Ordering::Equal);
            }
        }

        #[test]
        fn prop_sentinels_bracket_values(v in value_strategy()) {
            let part = KeyPart::Value(v);
            prop_assert_eq!(compare_parts(&part, &KeyPart::Min), Ordering::Greater);
            prop_assert_eq!(compare_parts(&part, &KeyPart::Max), Ordering::Less);
        }

        #[test]
        fn prop_tuple_antisymmetric(
            a in proptest::collection::vec(part_strategy(), 0..4),
            b in proptest::collection::vec(part_strategy(), 0..4),
        ) {
            prop_assert_eq!(compare_tuples(&a, &b), compare_tuples(&b, &a).reverse());
        }
    }
}
