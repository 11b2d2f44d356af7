//! High-level `KvStore` wrapper over backend implementations.
//!
//! Binds a `KvBackend` to a `Codec` so callers store and load typed values.

use super::backend::KvBackend;
use super::open_backend;
use crate::config::StoreConfig;
use crate::encoding::Codec;
use crate::error::Result;
use crate::types::{ScanOutput, StoreInfo};
use crate::validation::{check_batch, check_key};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Typed key-value store.
///
/// Values are encoded with the store's codec before they reach the backend
/// and decoded on the way back. Keys are validated before anything is
/// encoded, so an invalid call never costs a serialization.
///
/// # Thread Safety
///
/// `KvStore` is `Clone` and can be shared across tasks. The underlying
/// backend handles concurrent access.
///
/// # Example
///
/// ```ignore
/// use unikv::{Codec, KvStore, SledBackend, SledOptions};
///
/// let store = KvStore::new(SledBackend::open(&SledOptions::at("data"))?, Codec::Json);
/// store.batch_set("b", &["foo1", "foo2"], &["bar1", "bar2"]).await?;
/// let value: Option<String> = store.get("b", "foo1").await?;
/// ```
#[derive(Clone)]
pub struct KvStore {
    backend: Arc<dyn KvBackend>,
    codec: Codec,
}

impl KvStore {
    /// Creates a store over `backend` using `codec`.
    pub fn new<B: KvBackend>(backend: B, codec: Codec) -> Self {
        Self {
            backend: Arc::new(backend),
            codec,
        }
    }

    /// Creates a store from a boxed backend.
    pub fn from_boxed(backend: Box<dyn KvBackend>, codec: Codec) -> Self {
        Self {
            backend: Arc::from(backend),
            codec,
        }
    }

    /// Opens the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend options are invalid or the engine
    /// cannot be opened or reached.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let backend = open_backend(&config.backend).await?;
        Ok(Self::from_boxed(backend, config.codec))
    }

    /// The codec values are stored with.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Short identifier of the underlying backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Encodes and stores a value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyKey`](crate::Error::EmptyKey) for an empty key,
    /// a codec error if the value cannot be encoded, or the backend error.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        bucket: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        check_key(key)?;
        let bytes = self.codec.marshal(value)?;
        self.backend.set(bucket, key, bytes).await
    }

    /// Encodes and stores `values[i]` under `keys[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyKey`](crate::Error::EmptyKey) for an empty key,
    /// [`Error::EmptyValue`](crate::Error::EmptyValue) when a key has no
    /// value at its position, a codec error, or the backend error. Nothing
    /// is written if validation or encoding fails.
    pub async fn batch_set<T: Serialize>(
        &self,
        bucket: &str,
        keys: &[&str],
        values: &[T],
    ) -> Result<()> {
        check_batch(keys, values)?;
        let items = keys
            .iter()
            .zip(values)
            .map(|(key, value)| Ok(((*key).to_string(), self.codec.marshal(value)?)))
            .collect::<Result<Vec<_>>>()?;
        self.backend.batch_set(bucket, items).await
    }

    /// Loads and decodes a value.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyKey`](crate::Error::EmptyKey) for an empty key,
    /// a codec error if the stored bytes do not decode as `T`, or the backend
    /// error.
    pub async fn get<T: DeserializeOwned>(&self, bucket: &str, key: &str) -> Result<Option<T>> {
        check_key(key)?;
        match self.backend.get(bucket, key).await? {
            Some(bytes) => Ok(Some(self.codec.unmarshal(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Removes a key. Missing-key behavior depends on the backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyKey`](crate::Error::EmptyKey) for an empty key,
    /// or the backend error.
    pub async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.backend.delete(bucket, key).await
    }

    /// Drops a whole bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not support it or the bucket
    /// does not exist.
    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.backend.delete_bucket(bucket).await
    }

    /// Returns every key of a bucket with its encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyBucketName`](crate::Error::EmptyBucketName) for
    /// an empty bucket, or the backend error.
    pub async fn scan(&self, bucket: &str) -> Result<ScanOutput> {
        self.backend.scan(bucket).await
    }

    /// Returns every key of a bucket with its decoded value.
    ///
    /// # Errors
    ///
    /// Same as [`scan`](Self::scan), plus a codec error for any value that
    /// does not decode as `T`.
    pub async fn scan_decoded<T: DeserializeOwned>(
        &self,
        bucket: &str,
    ) -> Result<Vec<(String, T)>> {
        let output = self.backend.scan(bucket).await?;
        output
            .keys
            .into_iter()
            .zip(output.values)
            .map(|(key, bytes)| Ok((key, self.codec.unmarshal(&bytes)?)))
            .collect()
    }

    /// Sweeps expired items of `bucket` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn reap(&self, bucket: &str) -> Result<usize> {
        self.backend.reap(bucket).await
    }

    /// Reports the storage namespace and its on-disk size.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not support it.
    pub async fn info(&self) -> Result<StoreInfo> {
        self.backend.info().await
    }

    /// Closes the backend. Clones of this store are closed too.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to flush.
    pub async fn close(&self) -> Result<()> {
        self.backend.close().await
    }
}
