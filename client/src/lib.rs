//! Client library for Tuplestore
//!
//! This library provides a fluent query builder and typed model
//! collections on top of the `tuplestore-core` scopes.

pub mod error;
pub mod model;
pub mod query;

pub use error::{ClientError, Result};
pub use model::{Collection, Model};
pub use query::{Filter, Query, ScanRequest};
