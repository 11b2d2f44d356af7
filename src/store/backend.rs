//! Backend trait for the KV store.
//!
//! Defines the interface that all KV storage backends must implement,
//! enabling pluggable storage (redb, sled, DynamoDB, Redis).

use crate::error::{Error, Result};
use crate::types::{ScanOutput, StoreInfo};
use async_trait::async_trait;

/// Backend trait for key-value storage.
///
/// Backends move raw bytes; encoding is the caller's concern (see
/// [`KvStore`](super::KvStore)). All backends must be thread-safe
/// (`Send + Sync`) for use with tokio, and every operation validates its
/// input before touching the engine.
///
/// # Not-found signaling
///
/// `get` reports a missing key as `Ok(None)` on every backend. `delete` does
/// not agree across backends: redb, sled and DynamoDB treat a missing key as
/// a no-op, while Redis returns [`Error::KeyNotFound`]. Callers must not
/// assume either behavior.
#[async_trait]
pub trait KvBackend: Send + Sync + 'static {
    /// Short backend identifier (e.g. `"redb"`).
    fn name(&self) -> &'static str;

    /// Stores a value, creating the bucket if the engine requires it.
    ///
    /// Overwrites any existing value for the key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyKey`] for an empty key, or the engine error.
    async fn set(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<()>;

    /// Stores several key/value pairs.
    ///
    /// A failure aborts the batch with whatever atomicity the engine offers;
    /// there is no rollback beyond that.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyKey`] if any key is empty,
    /// [`Error::MultipleKvNotSupported`] on backends that batch one pair per
    /// call, or the engine error.
    async fn batch_set(&self, bucket: &str, items: Vec<(String, Vec<u8>)>) -> Result<()>;

    /// Retrieves the stored bytes for a key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyKey`] for an empty key, [`Error::BucketNotFound`]
    /// on backends with explicit buckets, or the engine error.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Removes a key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyKey`] for an empty key, or the engine error.
    /// See the trait docs for missing-key behavior.
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Returns every key of a bucket with its raw stored bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyBucketName`] for an empty bucket, or the engine error.
    async fn scan(&self, bucket: &str) -> Result<ScanOutput>;

    /// Releases engine resources. Later operations fail with [`Error::Closed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to flush on close.
    async fn close(&self) -> Result<()>;

    /// Drops a whole bucket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] unless the backend overrides it.
    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let _ = bucket;
        Err(self.unsupported("delete_bucket"))
    }

    /// Deletes items of `bucket` older than the configured TTL.
    ///
    /// Returns the number of expired entries consumed. Backends without
    /// TTL bookkeeping return `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn reap(&self, bucket: &str) -> Result<usize> {
        let _ = bucket;
        Ok(0)
    }

    /// Reports the storage namespace and its on-disk size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] unless the backend overrides it.
    async fn info(&self) -> Result<StoreInfo> {
        Err(self.unsupported("info"))
    }

    #[doc(hidden)]
    fn unsupported(&self, operation: &'static str) -> Error {
        Error::Unsupported {
            backend: self.name(),
            operation,
        }
    }
}
