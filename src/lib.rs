/// Tuplestore - An embeddable, transactional, multi-index tuple store
///
/// This is the root crate that provides workspace-level documentation.
/// Actual implementation is in the subcrates:
/// - `tuplestore-core`: Ordering, bounds compilation, the in-memory driver, transactions and change notification
/// - `tuplestore-client`: Query builder and typed model collections

/// Returns the version of the package.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
