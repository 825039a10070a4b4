//! Mutation records
//!
//! An `Op` describes one completed insert, update or delete. Ops are built
//! once the mutation has been applied and are never modified afterwards.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use serde::{Serialize, Deserialize};

use super::record::Record;

/// Type of mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    /// Insert
    Insert,

    /// Update
    Update,

    /// Delete
    Delete,
}

/// One completed mutation
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
    /// A record was inserted
    Insert {
        /// Table the record belongs to
        table: String,

        /// The stored record
        new_value: Record,
    },

    /// A record was replaced
    Update {
        /// Table the record belongs to
        table: String,

        /// The record before the update
        old_value: Record,

        /// The record after the update
        new_value: Record,
    },

    /// A record was removed
    Delete {
        /// Table the record belonged to
        table: String,

        /// The record before removal
        old_value: Record,
    },
}

impl Debug for Op {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Op::Insert { table, new_value } => {
                write!(f, "Insert({}/{})", table, new_value.id)
            }
            Op::Update { table, new_value, .. } => {
                write!(f, "Update({}/{})", table, new_value.id)
            }
            Op::Delete { table, old_value } => {
                write!(f, "Delete({}/{})", table, old_value.id)
            }
        }
    }
}

impl Op {
    /// Get the type of the mutation
    pub fn operation_type(&self) -> OperationType {
        match self {
            Op::Insert { .. } => OperationType::Insert,
            Op::Update { .. } => OperationType::Update,
            Op::Delete { .. } => OperationType::Delete,
        }
    }

    /// Table the mutation touched
    pub fn table(&self) -> &str {
        match self {
            Op::Insert { table, .. } | Op::Update { table, .. } | Op::Delete { table, .. } => table,
        }
    }

    /// Identifier of the affected record
    pub fn record_id(&self) -> &str {
        match self {
            Op::Insert { new_value, .. } | Op::Update { new_value, .. } => &new_value.id,
            Op::Delete { old_value, .. } => &old_value.id,
        }
    }

    /// The record before the mutation, if there was one
    pub fn old_value(&self) -> Option<&Record> {
        match self {
            Op::Insert { .. } => None,
            Op::Update { old_value, .. } | Op::Delete { old_value, .. } => Some(old_value),
        }
    }

    /// The record after the mutation, if it still exists
    pub fn new_value(&self) -> Option<&Record> {
        match self {
            Op::Insert { new_value, .. } | Op::Update { new_value, .. } => Some(new_value),
            Op::Delete { .. } => None,
        }
    }
}

/// Collect the distinct tables touched by a batch of ops, in first-seen order
pub fn affected_tables(ops: &[Op]) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();

    for op in ops {
        if !tables.iter().any(|t| t == op.table()) {
            tables.push(op.table().to_string());
        }
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_accessors() {
        let before = Record::new("1").with("name", "Alice");
        let after = Record::new("1").with("name", "AliceUpdated");

        let op = Op::Update {
            table: "users".to_string(),
            old_value: before.clone(),
            new_value: after.clone(),
        };

        assert_eq!(op.operation_type(), OperationType::Update);
        assert_eq!(op.table(), "users");
        assert_eq!(op.record_id(), "1");
        assert_eq!(op.old_value(), Some(&before));
        assert_eq!(op.new_value(), Some(&after));

        let op = Op::Delete { table: "users".to_string(), old_value: before };
        assert!(op.new_value().is_none());
    }

    #[test]
    fn test_affected_tables() {
        let ops = vec![
            Op::Insert { table: "users".to_string(), new_value: Record::new("1") },
            Op::Insert { table: "posts".to_string(), new_value: Record::new("p1") },
            Op::Delete { table: "users".to_string(), old_value: Record::new("2") },
        ];

        assert_eq!(affected_tables(&ops), vec!["users".to_string(), "posts".to_string()]);
    }

    #[test]
    fn test_op_serialization() {
        let op = Op::Insert { table: "users".to_string(), new_value: Record::new("1").with("age", 30) };
        let json = serde_json::to_value(&op).unwrap();

        assert_eq!(json["type"], "insert");
        assert_eq!(json["new_value"]["id"], "1");
    }
}
