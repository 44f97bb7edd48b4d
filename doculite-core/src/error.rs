use std::fmt;
use std::io;

/// Error taxonomy for the collection engine.
///
/// Variants correspond to the kinds (not names) enumerated for error
/// handling: closed-handle, type-mismatch, not-found, malformed-filter,
/// I/O-failure, and internal (unexpected resolver failure).
#[derive(Debug, Clone)]
pub enum CollectionError {
    /// Any operation attempted on a closed collection.
    Closed,
    /// Primary key not a string, or primary-key mismatch in `set`.
    TypeMismatch(String),
    /// Requested id or index does not exist.
    NotFound(String),
    /// Filter fails grammar/validation rules.
    MalformedFilter(String),
    /// Underlying sink could not be read or written.
    Io(String),
    /// Unexpected resolver failure; propagated fatally to preserve debuggability.
    Internal(String),
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::Closed => write!(f, "collection is closed"),
            CollectionError::TypeMismatch(msg) => write!(f, "type mismatch: {}", msg),
            CollectionError::NotFound(msg) => write!(f, "not found: {}", msg),
            CollectionError::MalformedFilter(msg) => write!(f, "malformed filter: {}", msg),
            CollectionError::Io(msg) => write!(f, "I/O error: {}", msg),
            CollectionError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for CollectionError {}

impl From<io::Error> for CollectionError {
    fn from(err: io::Error) -> Self {
        CollectionError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CollectionError {
    fn from(err: serde_json::Error) -> Self {
        CollectionError::Internal(format!("JSON error: {}", err))
    }
}

impl From<CollectionError> for io::Error {
    fn from(err: CollectionError) -> Self {
        match err {
            CollectionError::Closed => io::Error::new(io::ErrorKind::Other, err.to_string()),
            CollectionError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            CollectionError::TypeMismatch(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            CollectionError::MalformedFilter(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            CollectionError::Io(msg) => io::Error::new(io::ErrorKind::Other, msg),
            CollectionError::Internal(msg) => io::Error::new(io::ErrorKind::Other, msg),
        }
    }
}

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Builder for attaching operation/path context to an error message.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    operation: String,
    key: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn build(self, error: CollectionError) -> CollectionError {
        let mut message = format!("{}: {}", self.operation, error);
        if let Some(key) = &self.key {
            message = format!("{} (id: {})", message, key);
        }
        match error {
            CollectionError::Closed => CollectionError::Closed,
            CollectionError::TypeMismatch(_) => CollectionError::TypeMismatch(message),
            CollectionError::NotFound(_) => CollectionError::NotFound(message),
            CollectionError::MalformedFilter(_) => CollectionError::MalformedFilter(message),
            CollectionError::Io(_) => CollectionError::Io(message),
            CollectionError::Internal(_) => CollectionError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let err = CollectionError::NotFound("a".into());
        assert!(err.to_string().contains('a'));
    }

    #[test]
    fn io_error_conversion_preserves_kind() {
        let err: io::Error = CollectionError::NotFound("x".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn error_context_adds_key() {
        let err = ErrorContext::new("get")
            .with_key("doc-1")
            .build(CollectionError::NotFound("missing".into()));
        assert!(err.to_string().contains("doc-1"));
        assert!(err.to_string().contains("get"));
    }
}
