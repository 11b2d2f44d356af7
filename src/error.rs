//! Error types for typed error handling.
//!
//! Validation errors are always raised before any I/O. Engine errors are
//! passed through unmodified; nothing in this crate retries or swallows a
//! failure.

use crate::encoding::CodecError;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Store errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Key passed to an operation is empty.
    #[error("passed key is empty")]
    EmptyKey,

    /// Value passed to an operation is absent.
    #[error("passed value is empty")]
    EmptyValue,

    /// Bucket name passed to an operation is empty.
    #[error("bucket name is empty")]
    EmptyBucketName,

    /// The backend batches a single key/value pair per call.
    #[error("multiple kv pair not supported")]
    MultipleKvNotSupported,

    /// Bucket, table or tree does not exist.
    #[error("bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    /// Key does not exist (only raised by backends that signal it).
    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    /// Cloud table store was configured without a table name.
    #[error("table name is required")]
    MissingTableName,

    /// Cache store was configured without a network address.
    #[error("invalid redis address specified")]
    InvalidAddress,

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation is not available on this backend.
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// Store was closed.
    #[error("store is closed")]
    Closed,

    /// Value could not be encoded or stored bytes could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// redb error.
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    /// sled error.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Redis command error.
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Redis connection pool error.
    #[cfg(feature = "redis")]
    #[error("redis initialization failed: {0}")]
    Pool(#[from] r2d2::Error),

    /// DynamoDB service or transport error.
    #[cfg(feature = "dynamodb")]
    #[error("dynamodb error: {0}")]
    DynamoDb(#[source] Box<aws_sdk_dynamodb::Error>),

    /// DynamoDB request could not be built.
    #[cfg(feature = "dynamodb")]
    #[error("dynamodb request error: {0}")]
    DynamoDbBuild(#[from] aws_sdk_dynamodb::error::BuildError),

    /// Stored item lacks a string key or a binary value attribute.
    #[error("item '{key}' in table '{table}' has no string key or binary value")]
    MalformedItem { table: String, key: String },

    /// DynamoDB left part of a batch unwritten.
    #[error("{count} batch items were not processed")]
    UnprocessedItems { count: usize },

    /// Table did not become active in time.
    #[error("table '{table}' not active after {timeout_secs}s")]
    TableNotReady { table: String, timeout_secs: u64 },

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Blocking task panicked or was cancelled.
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a bucket not found error.
    pub fn bucket_not_found(bucket: impl Into<String>) -> Self {
        Self::BucketNotFound {
            bucket: bucket.into(),
        }
    }

    /// Create a key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Returns true for the not-found family (bucket or key).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BucketNotFound { .. } | Self::KeyNotFound { .. })
    }

    /// Returns true for errors raised by input validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyKey | Self::EmptyValue | Self::EmptyBucketName
        )
    }
}

// redb splits its errors per stage; they all fold into `redb::Error`.
macro_rules! redb_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Error {
                fn from(err: $ty) -> Self {
                    Self::Redb(err.into())
                }
            }
        )*
    };
}

redb_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

#[cfg(feature = "dynamodb")]
impl<E, R> From<aws_sdk_dynamodb::error::SdkError<E, R>> for Error
where
    aws_sdk_dynamodb::Error: From<aws_sdk_dynamodb::error::SdkError<E, R>>,
{
    fn from(err: aws_sdk_dynamodb::error::SdkError<E, R>) -> Self {
        Self::DynamoDb(Box::new(err.into()))
    }
}
