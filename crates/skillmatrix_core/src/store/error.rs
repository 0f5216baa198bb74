//! Error taxonomy shared by every storage connector.
//!
//! # Responsibility
//! - Wrap backend-native failures into a small set of stable error kinds.
//! - Keep the concrete cause available through `Error::source`.
//!
//! # Invariants
//! - Connectors never swallow backend errors from save/read/delete paths.
//! - `StoreError::kind()` is the only contract callers match on; variants
//!   may grow without changing the kind mapping.

use std::error::Error;
use std::fmt::{Display, Formatter};

use super::BackendKind;

pub type StoreResult<T> = Result<T, StoreError>;

/// Stable, inspectable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Key or filter match absent.
    NotFound,
    /// Backend call failed for reasons unrelated to absence.
    Storage,
    /// Value could not be encoded to or decoded from the backend format.
    Serialization,
    /// Operation is not meaningful for this backend.
    UnsupportedOperation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Storage => "storage",
            Self::Serialization => "serialization",
            Self::UnsupportedOperation => "unsupported_operation",
        }
    }
}

/// Storage-layer error returned by all `DataAccess` implementations.
#[derive(Debug)]
pub enum StoreError {
    NotFound {
        collection: String,
        key: String,
    },
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    /// Failure reported by a backend client that has no richer error type.
    Backend {
        backend: BackendKind,
        message: String,
    },
    Serialization(String),
    /// Collection or field name that cannot be expressed in query syntax.
    InvalidField(String),
    Unsupported {
        backend: BackendKind,
        operation: &'static str,
    },
}

impl StoreError {
    pub fn not_found(collection: &str, key: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            key: key.to_string(),
        }
    }

    pub fn backend(backend: BackendKind, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    pub fn unsupported(backend: BackendKind, operation: &'static str) -> Self {
        Self::Unsupported { backend, operation }
    }

    /// Returns the stable error kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Sqlite(rusqlite::Error::QueryReturnedNoRows) => ErrorKind::NotFound,
            Self::Sqlite(_) | Self::Io(_) | Self::Backend { .. } => ErrorKind::Storage,
            Self::Serialization(_) | Self::InvalidField(_) => ErrorKind::Serialization,
            Self::Unsupported { .. } => ErrorKind::UnsupportedOperation,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { collection, key } => {
                write!(f, "record not found: {collection}/{key}")
            }
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Backend { backend, message } => {
                write!(f, "{} backend error: {message}", backend.as_str())
            }
            Self::Serialization(message) => write!(f, "serialization failed: {message}"),
            Self::InvalidField(name) => write!(f, "invalid collection or field name: `{name}`"),
            Self::Unsupported { backend, operation } => write!(
                f,
                "operation `{operation}` is not supported by the {} backend",
                backend.as_str()
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, StoreError};
    use crate::store::BackendKind;

    #[test]
    fn maps_variants_to_stable_kinds() {
        assert_eq!(
            StoreError::not_found("skills", "a").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            StoreError::backend(BackendKind::WideColumn, "timeout").kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            StoreError::InvalidField("a b".to_string()).kind(),
            ErrorKind::Serialization
        );
        assert_eq!(
            StoreError::unsupported(BackendKind::ObjectStore, "filtered_read_all").kind(),
            ErrorKind::UnsupportedOperation
        );
    }

    #[test]
    fn no_rows_from_sqlite_counts_as_not_found() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(err.is_not_found());
    }

    #[test]
    fn display_names_backend_and_operation() {
        let message =
            StoreError::unsupported(BackendKind::ObjectStore, "filtered_read_all").to_string();
        assert!(message.contains("filtered_read_all"));
        assert!(message.contains("object_store"));
    }
}
