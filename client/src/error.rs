//! Error types for the client crate

use thiserror::Error;
use tuplestore_core::StoreError;

/// Error type for client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Error raised by the store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Model could not be converted to or from a record
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Query could not be built
    #[error("Query error: {0}")]
    Query(String),
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for StoreError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Store(inner) => inner,
            other => StoreError::InvalidRecord(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_round_trip() {
        let err: ClientError = StoreError::UnknownTable("books".to_string()).into();
        assert_eq!(err.to_string(), "Store error: Unknown table: books");

        let back: StoreError = err.into();
        assert!(matches!(back, StoreError::UnknownTable(ref t) if t == "books"));
    }

    #[test]
    fn test_json_error_becomes_invalid_record() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let back: StoreError = ClientError::from(json_err).into();

        assert!(matches!(back, StoreError::InvalidRecord(_)));
    }
}
