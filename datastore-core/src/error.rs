//! Error types and result types for data store operations.
//!
//! Every fallible operation in this crate returns [`DataStoreResult<T>`]. Errors are
//! `Clone` because a single failed backend fetch may be delivered to several callers
//! that were coalesced onto the same in-flight request.

use serde_json::{Error as SerdeJsonError, Value};
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with the data store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataStoreError {
    /// The named resource was never registered with the store.
    #[error("{0} is not a registered resource!")]
    NonexistentResource(String),
    /// An argument did not satisfy an operation's preconditions.
    #[error("{0}")]
    IllegalArgument(String),
    /// The requested record does not exist.
    /// The first argument is the resource name, the second is the record id.
    #[error("Record {1} not found in resource {0}")]
    NotFound(String, String),
    /// The adapter does not implement the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// Serialization/deserialization error when converting records.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The persistence adapter rejected the request. The payload is passed through untouched.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    /// A failure in the store's own machinery.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl DataStoreError {
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        DataStoreError::IllegalArgument(message.into())
    }

    /// Returns the adapter payload if this error came from a persistence adapter.
    pub fn adapter_error(&self) -> Option<&AdapterError> {
        match self {
            DataStoreError::Adapter(err) => Some(err),
            _ => None,
        }
    }
}

/// An error reported by a persistence adapter.
///
/// `data` holds whatever the backend answered with (a response body, a structured
/// error document, ...). The store never rewrites it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Adapter error: {message}")]
pub struct AdapterError {
    /// Transport-level status code, when the backend has one.
    pub status: Option<u16>,
    /// Human readable description.
    pub message: String,
    /// Raw error payload from the backend.
    pub data: Value,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into(), data: Value::Null }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }
}

/// A specialized `Result` type for data store operations.
pub type DataStoreResult<T> = Result<T, DataStoreError>;

impl From<SerdeJsonError> for DataStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DataStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn adapter_error_keeps_payload() {
        let err: DataStoreError = AdapterError::new("request failed")
            .with_status(404)
            .with_data("Not Found")
            .into();

        let adapter = err.adapter_error().unwrap();
        assert_eq!(adapter.status, Some(404));
        assert_eq!(adapter.data, json!("Not Found"));
        assert_eq!(err.to_string(), "Adapter error: request failed");
    }

    #[test]
    fn nonexistent_resource_message() {
        let err = DataStoreError::NonexistentResource("does not exist".into());
        assert_eq!(err.to_string(), "does not exist is not a registered resource!");
    }
}
