//! Redb-backed KV storage backend.
//!
//! Provides persistent single-file storage with ACID guarantees. Buckets
//! are tables under a root namespace (`<root>/<bucket>`). When a TTL is
//! configured each write also records `<timestamp>|<key> -> key` in the
//! companion table `<root>/<bucket>_ttlBucket`, which `reap` sweeps on
//! demand. Nothing expires on its own.

use super::backend::KvBackend;
use super::run_blocking;
use crate::config::{DEFAULT_ROOT_BUCKET, RedbOptions};
use crate::error::{Error, Result};
use crate::types::{ScanOutput, StoreInfo};
use crate::validation::{check_bucket_name, check_key};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use parking_lot::RwLock;
use redb::{
    Database, Key, ReadOnlyTable, ReadTransaction, ReadableDatabase, ReadableTable,
    TableDefinition, TableError, TableHandle, Value, WriteTransaction,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Suffix of the per-bucket TTL bookkeeping table.
pub(crate) const TTL_SUFFIX: &str = "_ttlBucket";

/// Separates the timestamp from the key in TTL records.
const TTL_SEPARATOR: char = '|';

fn items_table(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

/// Fixed-width RFC 3339 UTC timestamp; sorts lexicographically in time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Redb-backed key-value storage backend.
///
/// # Thread Safety
///
/// `RedbBackend` is `Clone` and can be shared across threads. redb
/// serializes writers internally; readers run concurrently.
#[derive(Clone)]
pub struct RedbBackend {
    inner: Arc<Inner>,
}

struct Inner {
    db: RwLock<Option<Database>>,
    path: PathBuf,
    root: String,
    ttl: Option<Duration>,
}

impl RedbBackend {
    /// Opens or creates a redb database at `options.path`.
    ///
    /// Creates parent directories if needed. Empty option fields fall back
    /// to their defaults; a zero TTL disables expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory cannot be created
    /// - Database file cannot be opened or created (permissions, disk full, etc.)
    pub fn open(options: RedbOptions) -> Result<Self> {
        let path = options.path.as_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("creating KV directory {}", parent.display()), e)
            })?;
        }

        let db = Database::create(path)?;
        Ok(Self::with_database(db, options))
    }

    /// Wraps an already opened database.
    ///
    /// `options.path` is only used by [`info`](KvBackend::info) to report
    /// the file size.
    pub fn with_database(db: Database, options: RedbOptions) -> Self {
        let root = if options.root_bucket.is_empty() {
            DEFAULT_ROOT_BUCKET.to_string()
        } else {
            options.root_bucket
        };
        let ttl = options.ttl.filter(|d| !d.is_zero());

        tracing::debug!(
            path = %options.path.display(),
            root = %root,
            ttl_enabled = ttl.is_some(),
            "Opened redb KV backend"
        );

        Self {
            inner: Arc::new(Inner {
                db: RwLock::new(Some(db)),
                path: options.path,
                root,
                ttl,
            }),
        }
    }

    /// Returns the options this backend runs with.
    pub fn options(&self) -> RedbOptions {
        RedbOptions {
            path: self.inner.path.clone(),
            root_bucket: self.inner.root.clone(),
            ttl: self.inner.ttl,
        }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn table_name(&self, bucket: &str) -> String {
        format!("{}/{bucket}", self.inner.root)
    }

    fn ttl_table_name(&self, bucket: &str) -> String {
        format!("{}/{bucket}{TTL_SUFFIX}", self.inner.root)
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let guard = self.inner.db.read();
        let db = guard.as_ref().ok_or(Error::Closed)?;
        f(db)
    }

    /// Writes one pair (plus its TTL record) in a single transaction.
    fn set_sync(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        self.with_db(|db| {
            let write_txn = db.begin_write()?;
            {
                let name = self.table_name(bucket);
                let mut table = write_txn.open_table(items_table(&name))?;
                table.insert(key, value)?;
            }

            if self.inner.ttl.is_some() {
                let name = self.ttl_table_name(bucket);
                let mut table = write_txn.open_table(items_table(&name))?;
                let record = format!("{}{TTL_SEPARATOR}{key}", timestamp(Utc::now()));
                table.insert(record.as_str(), key.as_bytes())?;
            }

            write_txn.commit()?;
            Ok(())
        })
    }

    fn get_sync(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_db(|db| {
            let read_txn = db.begin_read()?;
            let name = self.table_name(bucket);
            let table = open_existing(&read_txn, items_table(&name), bucket)?;
            let value = table.get(key)?.map(|guard| guard.value().to_vec());
            Ok(value)
        })
    }

    fn delete_sync(&self, bucket: &str, key: &str) -> Result<()> {
        self.with_db(|db| {
            let write_txn = db.begin_write()?;
            let name = self.table_name(bucket);
            if !table_exists(&write_txn, &name)? {
                write_txn.abort()?;
                return Err(Error::bucket_not_found(bucket));
            }
            {
                let mut table = write_txn.open_table(items_table(&name))?;
                table.remove(key)?;
            }
            write_txn.commit()?;
            Ok(())
        })
    }

    fn delete_bucket_sync(&self, bucket: &str) -> Result<()> {
        self.with_db(|db| {
            let write_txn = db.begin_write()?;
            let name = self.table_name(bucket);
            if !write_txn.delete_table(items_table(&name))? {
                write_txn.abort()?;
                return Err(Error::bucket_not_found(bucket));
            }
            let ttl_name = self.ttl_table_name(bucket);
            write_txn.delete_table(items_table(&ttl_name))?;
            write_txn.commit()?;
            Ok(())
        })
    }

    fn scan_sync(&self, bucket: &str) -> Result<ScanOutput> {
        self.with_db(|db| {
            let read_txn = db.begin_read()?;
            let name = self.table_name(bucket);
            let table = open_existing(&read_txn, items_table(&name), bucket)?;

            let mut output = ScanOutput::default();
            for item in table.iter()? {
                let (key, value) = item?;
                output.push(key.value().to_string(), value.value().to_vec());
            }
            Ok(output)
        })
    }

    /// Deletes items whose TTL record is at or before `now - ttl`, together
    /// with the consumed records, in one write transaction.
    fn reap_sync(&self, bucket: &str) -> Result<usize> {
        let Some(ttl) = self.inner.ttl else {
            return Ok(0);
        };
        let Some(cutoff) = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return Ok(0);
        };
        let max = timestamp(cutoff);

        self.with_db(|db| {
            let write_txn = db.begin_write()?;
            let name = self.table_name(bucket);
            let ttl_name = self.ttl_table_name(bucket);

            if !table_exists(&write_txn, &name)? {
                write_txn.abort()?;
                return Err(Error::bucket_not_found(bucket));
            }
            if !table_exists(&write_txn, &ttl_name)? {
                write_txn.abort()?;
                return Ok(0);
            }

            let mut expired = Vec::new();
            {
                let table = write_txn.open_table(items_table(&ttl_name))?;
                for item in table.iter()? {
                    let (record, key) = item?;
                    let record = record.value();
                    let written_at = record
                        .split_once(TTL_SEPARATOR)
                        .map_or(record, |(at, _)| at);
                    if written_at > max.as_str() {
                        break;
                    }
                    expired.push((
                        record.to_string(),
                        String::from_utf8_lossy(key.value()).into_owned(),
                    ));
                }
            }

            if expired.is_empty() {
                write_txn.abort()?;
                return Ok(0);
            }

            {
                let mut items = write_txn.open_table(items_table(&name))?;
                let mut records = write_txn.open_table(items_table(&ttl_name))?;
                for (record, key) in &expired {
                    items.remove(key.as_str())?;
                    records.remove(record.as_str())?;
                }
            }
            write_txn.commit()?;

            tracing::debug!(bucket, count = expired.len(), "Reaped expired KV entries");
            Ok(expired.len())
        })
    }

    fn info_sync(&self) -> Result<StoreInfo> {
        self.with_db(|_| {
            let meta = std::fs::metadata(&self.inner.path).map_err(|e| {
                Error::io(format!("reading {}", self.inner.path.display()), e)
            })?;
            Ok(StoreInfo {
                name: self.inner.root.clone(),
                size: meta.len(),
            })
        })
    }
}

/// Opens a table for reading, mapping a missing table to `BucketNotFound`.
fn open_existing<K: Key + 'static, V: Value + 'static>(
    read_txn: &ReadTransaction,
    definition: TableDefinition<'_, K, V>,
    bucket: &str,
) -> Result<ReadOnlyTable<K, V>> {
    match read_txn.open_table(definition) {
        Ok(table) => Ok(table),
        Err(TableError::TableDoesNotExist(_)) => Err(Error::bucket_not_found(bucket)),
        Err(e) => Err(e.into()),
    }
}

fn table_exists(write_txn: &WriteTransaction, name: &str) -> Result<bool> {
    Ok(write_txn
        .list_tables()?
        .any(|handle| handle.name() == name))
}

#[async_trait]
impl KvBackend for RedbBackend {
    fn name(&self) -> &'static str {
        "redb"
    }

    async fn set(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<()> {
        check_key(key)?;
        check_bucket_name(bucket)?;
        let backend = self.clone();
        let (bucket, key) = (bucket.to_string(), key.to_string());
        run_blocking(move || backend.set_sync(&bucket, &key, &value)).await
    }

    // redb commits one pair per batch call; larger batches are refused
    // before anything is written. There is no default table, so every
    // operation needs a bucket name.
    async fn batch_set(&self, bucket: &str, mut items: Vec<(String, Vec<u8>)>) -> Result<()> {
        for (key, _) in &items {
            check_key(key)?;
        }
        check_bucket_name(bucket)?;
        if items.len() > 1 {
            return Err(Error::MultipleKvNotSupported);
        }
        let Some((key, value)) = items.pop() else {
            return Ok(());
        };
        let backend = self.clone();
        let bucket = bucket.to_string();
        run_blocking(move || backend.set_sync(&bucket, &key, &value)).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        check_bucket_name(bucket)?;
        let backend = self.clone();
        let (bucket, key) = (bucket.to_string(), key.to_string());
        run_blocking(move || backend.get_sync(&bucket, &key)).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        check_key(key)?;
        check_bucket_name(bucket)?;
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
        // Waits for in-flight transactions to release the handle; dropping
        // the database flushes and releases the file lock.
        let backend = self.clone();
        let closed = run_blocking(move || Ok(backend.inner.db.write().take().is_some())).await?;
        if closed {
            tracing::debug!(path = %self.inner.path.display(), "Closed redb KV backend");
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        check_bucket_name(bucket)?;
        let backend = self.clone();
        let bucket = bucket.to_string();
        run_blocking(move || backend.delete_bucket_sync(&bucket)).await
    }

    async fn reap(&self, bucket: &str) -> Result<usize> {
        check_bucket_name(bucket)?;
        let backend = self.clone();
        let bucket = bucket.to_string();
        run_blocking(move || backend.reap_sync(&bucket)).await
    }

    async fn info(&self) -> Result<StoreInfo> {
        let backend = self.clone();
        run_blocking(move || backend.info_sync()).await
    }
}
