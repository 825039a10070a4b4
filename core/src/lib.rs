//! # Tuplestore Core
//!
//! Core data structures and engine for Tuplestore, an embeddable store of
//! records reachable through declared multi-column indexes.
//! This crate provides value ordering, bounds compilation, the in-memory
//! table store, the effect protocol with its two executors, transactions
//! and change notification.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bounds;
pub mod config;
pub mod driver;
pub mod effect;
pub mod error;
pub mod models;
pub mod notify;
pub mod schema;
pub mod store;
pub mod tuple;

/// Re-export common types for ease of use
pub use bounds::{compile_bounds, BoundsError, ColumnPredicate, ScanBound, WhereClause};
pub use config::StoreConfig;
pub use driver::{Driver, DriverTx};
pub use effect::{in_transaction, once, run_async, run_sync, Effect, Reply, Scope, Script, Session, Step, Transaction};
pub use error::{Result, StoreError};
pub use models::{Op, OperationType, Record, Value, ID_COLUMN};
pub use notify::{NotificationMode, Notifier, Observed, SubscriptionId};
pub use schema::{declare_table, Catalog, IndexDef, IndexKind, IndexSpec, TableDef, TableSpec};
pub use store::{DeferredDriver, MemoryDriver};
pub use tuple::{compare_values, KeyPart, Tuple};

/// Version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_config_driven_session() {
        let mut config = StoreConfig::testing();
        config.tables.push(TableSpec {
            name: "notes".to_string(),
            indexes: [
                ("ids".to_string(), IndexSpec::equality(["id"])),
                ("by_tag".to_string(), IndexSpec::range(["tag"])),
            ]
            .into_iter()
            .collect(),
        });

        let session = Session::from_config(Arc::new(config.memory_driver()), &config).unwrap();
        session.load_tables().unwrap().wait().unwrap();

        session.insert("notes", &[Record::new("n1").with("tag", "rust")]).unwrap().wait().unwrap();
        let found = session
            .scan("notes", "by_tag", &[WhereClause::new().eq("tag", "rust")], None)
            .unwrap()
            .wait()
            .unwrap();

        assert_eq!(found.len(), 1);
        assert!(!VERSION.is_empty());
    }
}
