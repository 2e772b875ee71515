//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Failure class reported by an embedding provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingErrorKind {
    /// Credentials rejected; never retried
    Authentication,
    /// Provider throttled the request
    RateLimited,
    /// Network-level failure (timeout, connect, TLS)
    Transport,
    /// Provider answered with a payload we cannot use
    InvalidResponse,
}

impl std::fmt::Display for EmbeddingErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Transport => write!(f, "transport"),
            Self::InvalidResponse => write!(f, "invalid_response"),
        }
    }
}

/// Failure class reported by a vector store adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Could not reach the backend
    Connect,
    /// Collection create/describe/drop failure
    Schema,
    /// Insert/upsert failure
    Insert,
    /// Scalar-filter query failure
    Query,
    /// Vector search failure
    Search,
}

impl std::fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Schema => write!(f, "schema"),
            Self::Insert => write!(f, "insert"),
            Self::Query => write!(f, "query"),
            Self::Search => write!(f, "search"),
        }
    }
}

/// Main error type for the codectx engine
#[derive(Error, Debug)]
pub enum Error {
    /// Input path is missing, not a directory, or unreadable
    #[error("Path error: {message}")]
    Path {
        /// Description of the path problem
        message: String,
    },

    /// The codebase is already being indexed
    #[error("Codebase '{root}' is already being indexed")]
    AlreadyIndexing {
        /// Root path of the conflicting codebase
        root: String,
    },

    /// The codebase is already indexed and force was not requested
    #[error("Codebase '{root}' is already indexed")]
    AlreadyIndexed {
        /// Root path of the conflicting codebase
        root: String,
    },

    /// The codebase is not indexed
    #[error("Codebase '{root}' is not indexed")]
    NotIndexed {
        /// Root path that was queried
        root: String,
    },

    /// An ancestor of the requested path is already indexed or indexing
    #[error("Path '{root}' is covered by indexed ancestor '{ancestor}'")]
    SubtreeCovered {
        /// Path the caller asked about
        root: String,
        /// Registered ancestor that already covers it
        ancestor: String,
    },

    /// Registry says indexed but the backend has no collection
    #[error("Collection '{collection}' is missing from the vector store; re-index to recover")]
    CollectionMissing {
        /// Name of the missing collection
        collection: String,
    },

    /// The backend refused to create another collection
    ///
    /// Carries the backend's canonical message verbatim; never retried.
    #[error("{message}")]
    CollectionLimitReached {
        /// Canonical message from the external service
        message: String,
    },

    /// Embedding provider operation error
    #[error("Embedding error ({kind}): {message}")]
    Embedding {
        /// Failure class
        kind: EmbeddingErrorKind,
        /// Description of the embedding failure
        message: String,
    },

    /// Vector store operation error
    #[error("Vector store error ({kind}): {message}")]
    Store {
        /// Failure class
        kind: StoreErrorKind,
        /// Description of the store failure
        message: String,
    },

    /// Splitter failed on a file; callers log and skip the file
    #[error("Split error: {message}")]
    Split {
        /// Description of the splitter failure
        message: String,
    },

    /// Cooperative cancellation was observed
    #[error("Indexing cancelled")]
    IndexCancelled,

    /// Cross-process lock acquisition failure
    #[error("Lock error: {message}")]
    Lock {
        /// Description of the lock failure
        message: String,
    },

    /// I/O operation error
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing or serialization error
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

impl Error {
    /// Create a path error
    pub fn path<S: Into<String>>(message: S) -> Self {
        Self::Path {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a lock error
    pub fn lock<S: Into<String>>(message: S) -> Self {
        Self::Lock {
            message: message.into(),
        }
    }

    /// Create a split error
    pub fn split<S: Into<String>>(message: S) -> Self {
        Self::Split {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with source
    pub fn io_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Embedding error creation methods
impl Error {
    /// Create an embedding error with an explicit failure class
    pub fn embedding<S: Into<String>>(kind: EmbeddingErrorKind, message: S) -> Self {
        Self::Embedding {
            kind,
            message: message.into(),
        }
    }

    /// Authentication failure (non-retryable)
    pub fn embedding_auth<S: Into<String>>(message: S) -> Self {
        Self::embedding(EmbeddingErrorKind::Authentication, message)
    }

    /// Rate-limit response from the provider
    pub fn embedding_rate_limited<S: Into<String>>(message: S) -> Self {
        Self::embedding(EmbeddingErrorKind::RateLimited, message)
    }

    /// Network-level failure
    pub fn embedding_transport<S: Into<String>>(message: S) -> Self {
        Self::embedding(EmbeddingErrorKind::Transport, message)
    }

    /// Malformed provider payload
    pub fn embedding_invalid_response<S: Into<String>>(message: S) -> Self {
        Self::embedding(EmbeddingErrorKind::InvalidResponse, message)
    }

    /// Whether this error may be retried with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Embedding {
                kind: EmbeddingErrorKind::RateLimited | EmbeddingErrorKind::Transport,
                ..
            }
        )
    }
}

// Store error creation methods
impl Error {
    /// Create a store error with an explicit failure class
    pub fn store<S: Into<String>>(kind: StoreErrorKind, message: S) -> Self {
        Self::Store {
            kind,
            message: message.into(),
        }
    }

    /// Backend unreachable
    pub fn store_connect<S: Into<String>>(message: S) -> Self {
        Self::store(StoreErrorKind::Connect, message)
    }

    /// Collection schema operation failed
    pub fn store_schema<S: Into<String>>(message: S) -> Self {
        Self::store(StoreErrorKind::Schema, message)
    }

    /// Insert failed
    pub fn store_insert<S: Into<String>>(message: S) -> Self {
        Self::store(StoreErrorKind::Insert, message)
    }

    /// Scalar query failed
    pub fn store_query<S: Into<String>>(message: S) -> Self {
        Self::store(StoreErrorKind::Query, message)
    }

    /// Vector search failed
    pub fn store_search<S: Into<String>>(message: S) -> Self {
        Self::store(StoreErrorKind::Search, message)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(Error::embedding_rate_limited("slow down").is_retryable());
        assert!(Error::embedding_transport("connection reset").is_retryable());
        assert!(!Error::embedding_auth("bad key").is_retryable());
        assert!(!Error::embedding_invalid_response("no data field").is_retryable());
        assert!(!Error::store_insert("boom").is_retryable());
    }

    #[test]
    fn collection_limit_message_is_verbatim() {
        let e = Error::CollectionLimitReached {
            message: "Your account has reached its collection limit.".into(),
        };
        assert_eq!(
            e.to_string(),
            "Your account has reached its collection limit."
        );
    }
}
