//! Sled-backed KV storage backend.
//!
//! Embedded log-structured storage. Each bucket is a sled tree opened on
//! demand; the empty bucket name maps to the default tree.

use super::backend::KvBackend;
use super::run_blocking;
use crate::config::SledOptions;
use crate::error::{Error, Result};
use crate::types::{ScanOutput, StoreInfo};
use crate::validation::{check_bucket_name, check_key};
use async_trait::async_trait;
use parking_lot::RwLock;
use sled::{Batch, Db, Tree};
use std::path::PathBuf;
use std::sync::Arc;

/// Sled-backed key-value storage backend.
///
/// With `write_sync` every mutation is flushed before returning; otherwise
/// sled flushes on its own background interval.
#[derive(Clone)]
pub struct SledBackend {
    inner: Arc<Inner>,
}

struct Inner {
    db: RwLock<Option<Db>>,
    path: PathBuf,
    write_sync: bool,
}

impl SledBackend {
    /// Opens or creates a sled database directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or is locked by
    /// another process.
    pub fn open(options: &SledOptions) -> Result<Self> {
        let db = sled::Config::new().path(&options.path).open()?;

        tracing::debug!(
            path = %options.path.display(),
            write_sync = options.write_sync,
            "Opened sled KV backend"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                db: RwLock::new(Some(db)),
                path: options.path.clone(),
                write_sync: options.write_sync,
            }),
        })
    }

    fn db(&self) -> Result<Db> {
        self.inner.db.read().clone().ok_or(Error::Closed)
    }

    fn tree(&self, bucket: &str) -> Result<Tree> {
        let db = self.db()?;
        if bucket.is_empty() {
            return Ok((*db).clone());
        }
        Ok(db.open_tree(bucket)?)
    }

    fn flush_if_sync(&self, tree: &Tree) -> Result<()> {
        if self.inner.write_sync {
            tree.flush()?;
        }
        Ok(())
    }

    fn set_sync(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<()> {
        let tree = self.tree(bucket)?;
        tree.insert(key, value)?;
        self.flush_if_sync(&tree)
    }

    fn batch_set_sync(&self, bucket: &str, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        let tree = self.tree(bucket)?;
        let mut batch = Batch::default();
        for (key, value) in items {
            batch.insert(key.into_bytes(), value);
        }
        tree.apply_batch(batch)?;
        self.flush_if_sync(&tree)
    }

    fn get_sync(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let tree = self.tree(bucket)?;
        Ok(tree.get(key)?.map(|value| value.to_vec()))
    }

    fn delete_sync(&self, bucket: &str, key: &str) -> Result<()> {
        let tree = self.tree(bucket)?;
        tree.remove(key)?;
        self.flush_if_sync(&tree)
    }

    fn scan_sync(&self, bucket: &str) -> Result<ScanOutput> {
        let tree = self.tree(bucket)?;
        let mut output = ScanOutput::default();
        for item in tree.iter() {
            let (key, value) = item?;
            output.push(String::from_utf8_lossy(&key).into_owned(), value.to_vec());
        }
        Ok(output)
    }

    fn delete_bucket_sync(&self, bucket: &str) -> Result<()> {
        if !self.db()?.drop_tree(bucket)? {
            return Err(Error::bucket_not_found(bucket));
        }
        Ok(())
    }

    fn info_sync(&self) -> Result<StoreInfo> {
        let db = self.db()?;
        let name = self
            .inner
            .path
            .file_name()
            .map_or_else(|| self.inner.path.display().to_string(), |n| {
                n.to_string_lossy().into_owned()
            });
        Ok(StoreInfo {
            name,
            size: db.size_on_disk()?,
        })
    }
}

#[async_trait]
impl KvBackend for SledBackend {
    fn name(&self) -> &'static str {
        "sled"
    }

    async fn set(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<()> {
        check_key(key)?;
        let backend = self.clone();
        let (bucket, key) = (bucket.to_string(), key.to_string());
        run_blocking(move || backend.set_sync(&bucket, &key, value)).await
    }

    async fn batch_set(&self, bucket: &str, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        for (key, _) in &items {
            check_key(key)?;
        }
        if items.is_empty() {
            return Ok(());
        }
        let backend = self.clone();
        let bucket = bucket.to_string();
        run_blocking(move || backend.batch_set_sync(&bucket, items)).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        let backend = self.clone();
        let (bucket, key) = (bucket.to_string(), key.to_string());
        run_blocking(move || backend.get_sync(&bucket, &key)).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        check_key(key)?;
        let backend = self.clone();
        let (bucket, key) = (bucket.to_string(), key.to_string());
        run_blocking(move || backend.delete_sync(&bucket, &key)).await
    }

    async fn scan(&self, bucket: &str) -> Result<ScanOutput> {
        check_bucket_name(bucket)?;
        let backend = self.clone();
        let bucket = bucket.to_string();
        run_blocking(move || backend.scan_sync(&bucket)).await
    }

    async fn close(&self) -> Result<()> {
        let backend = self.clone();
        let closed = run_blocking(move || {
            let Some(db) = backend.inner.db.write().take() else {
                return Ok(false);
            };
            db.flush()?;
            Ok(true)
        })
        .await?;
        if closed {
            tracing::debug!(path = %self.inner.path.display(), "Closed sled KV backend");
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        check_bucket_name(bucket)?;
        let backend = self.clone();
        let bucket = bucket.to_string();
        run_blocking(move || backend.delete_bucket_sync(&bucket)).await
    }

    async fn info(&self) -> Result<StoreInfo> {
        let backend = self.clone();
        run_blocking(move || backend.info_sync()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(tmp: &TempDir, write_sync: bool) -> SledBackend {
        SledBackend::open(&SledOptions {
            path: tmp.path().join("db"),
            write_sync,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let backend = open(&tmp, false);

        backend.set("a", "key", b"from a".to_vec()).await.unwrap();
        backend.set("b", "key", b"from b".to_vec()).await.unwrap();

        assert_eq!(backend.get("a", "key").await.unwrap(), Some(b"from a".to_vec()));
        assert_eq!(backend.get("b", "key").await.unwrap(), Some(b"from b".to_vec()));
        assert_eq!(backend.get("c", "key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_default_tree_for_empty_bucket() {
        let tmp = TempDir::new().unwrap();
        let backend = open(&tmp, false);

        backend.set("", "key", b"v".to_vec()).await.unwrap();
        assert_eq!(backend.get("", "key").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(backend.get("other", "key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_set_multiple() {
        let tmp = TempDir::new().unwrap();
        let backend = open(&tmp, true);

        backend
            .batch_set(
                "b",
                vec![
                    ("foo1".to_string(), b"bar1".to_vec()),
                    ("foo2".to_string(), b"bar2".to_vec()),
                ],
            )
            .await
            .unwrap();

        let output = backend.scan("b").await.unwrap();
        assert_eq!(output.keys, vec!["foo1", "foo2"]);
        assert_eq!(output.values, vec![b"bar1".to_vec(), b"bar2".to_vec()]);
    }

    #[tokio::test]
    async fn test_batch_set_rejects_empty_key_before_writing() {
        let tmp = TempDir::new().unwrap();
        let backend = open(&tmp, false);

        let err = backend
            .batch_set(
                "b",
                vec![
                    ("foo1".to_string(), b"bar1".to_vec()),
                    (String::new(), b"bar2".to_vec()),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyKey));
        assert!(backend.scan("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_noop() {
        let tmp = TempDir::new().unwrap();
        let backend = open(&tmp, true);
        backend.delete("b", "missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_bucket() {
        let tmp = TempDir::new().unwrap();
        let backend = open(&tmp, false);

        backend.set("b", "key", b"v".to_vec()).await.unwrap();
        backend.delete_bucket("b").await.unwrap();
        assert!(backend.scan("b").await.unwrap().is_empty());

        assert!(matches!(
            backend.delete_bucket("never").await,
            Err(Error::BucketNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_reap_is_noop() {
        let tmp = TempDir::new().unwrap();
        let backend = open(&tmp, false);
        backend.set("b", "key", b"v".to_vec()).await.unwrap();
        assert_eq!(backend.reap("b").await.unwrap(), 0);
        assert!(backend.get("b", "key").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_info_and_close() {
        let tmp = TempDir::new().unwrap();
        let backend = open(&tmp, true);
        backend.set("b", "key", b"v".to_vec()).await.unwrap();

        let info = backend.info().await.unwrap();
        assert_eq!(info.name, "db");
        assert!(info.size > 0);

        backend.close().await.unwrap();
        assert!(matches!(backend.get("b", "key").await, Err(Error::Closed)));
        backend.close().await.unwrap();
    }
}
