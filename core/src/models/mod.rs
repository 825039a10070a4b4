//! Data models for the tuple store
//!
//! This module provides data structures for column values, records,
//! and the mutation records handed to subscribers.

mod value;
mod record;
mod op;

pub use value::Value;
pub use record::{Record, ID_COLUMN};
pub use op::{Op, OperationType, affected_tables};
