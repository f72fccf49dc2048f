use thiserror::Error;
use tracing::error;

/// Error type for every document store operation.
///
/// A missing document is never an error: reads return `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An identifier could not be built or parsed.
    #[error("malformed identifier {id:?}: {reason}")]
    MalformedIdentifier { id: String, reason: String },

    /// A document was read into a model type of another collection.
    #[error("document {id} belongs to collection {actual}, expected {expected}")]
    CollectionMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    /// The backend could not be reached during setup.
    #[error("{backend} connection failed: {message}")]
    Connection {
        backend: &'static str,
        message: String,
    },

    /// The backend driver rejected an operation.
    #[error("{backend} {operation} failed for {id}: {message}")]
    Driver {
        backend: &'static str,
        operation: &'static str,
        id: String,
        message: String,
    },

    /// A raw backend document did not have the expected shape.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Model serialization/deserialization error.
    #[error("model serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl StoreError {
    pub(crate) fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::MalformedIdentifier {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a driver failure, logging it with its operation and document id.
    pub(crate) fn driver(
        backend: &'static str,
        operation: &'static str,
        id: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        let id = id.into();
        let message = message.to_string();
        error!(backend, operation, id = %id, error = %message, "driver operation failed");
        StoreError::Driver {
            backend,
            operation,
            id,
            message,
        }
    }
}

impl From<::config::ConfigError> for StoreError {
    fn from(err: ::config::ConfigError) -> Self {
        StoreError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
