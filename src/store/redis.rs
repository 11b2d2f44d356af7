//! Redis-backed KV storage backend.
//!
//! Keys live in one flat keyspace as `<len>:bucket:key`, where `<len>` is the
//! bucket's byte length. The length keeps bucket prefixes from overlapping,
//! so `a` never sees the keys of `a:b`. Connections come from an owned r2d2
//! pool.

use super::backend::KvBackend;
use super::run_blocking;
use crate::config::RedisOptions;
use crate::error::{Error, Result};
use crate::types::ScanOutput;
use crate::validation::{check_bucket_name, check_key};
use async_trait::async_trait;
use parking_lot::RwLock;
use r2d2::{Pool, PooledConnection};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const BUCKET_SEPARATOR: char = ':';
const SCAN_COUNT: usize = 256;
const MGET_CHUNK: usize = 512;

type Connection = PooledConnection<redis::Client>;

/// Redis-backed key-value storage backend.
///
/// Unlike the embedded backends, deleting a missing key fails with
/// [`Error::KeyNotFound`].
#[derive(Clone)]
pub struct RedisBackend {
    inner: Arc<Inner>,
}

struct Inner {
    pool: RwLock<Option<Pool<redis::Client>>>,
    address: String,
}

impl RedisBackend {
    /// Builds the connection pool and verifies the server answers `PING`.
    ///
    /// Blocks until the pool holds its idle connections; call it through
    /// `spawn_blocking` from async code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] for an empty address, or a pool or
    /// command error if the server is unreachable.
    pub fn connect(options: &RedisOptions) -> Result<Self> {
        if options.address.is_empty() {
            return Err(Error::InvalidAddress);
        }

        let client = redis::Client::open(options.url())?;
        let max_size = options.max_active_connections.max(1);
        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(options.max_idle_connections.min(max_size)))
            .connection_timeout(Duration::from_secs(options.connect_timeout_secs))
            .build(client)?;

        let mut conn = pool.get()?;
        redis::cmd("PING").query::<String>(&mut *conn)?;

        tracing::debug!(
            address = %options.address,
            database = options.database,
            max_size,
            "Connected Redis KV backend"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                pool: RwLock::new(Some(pool)),
                address: options.address.clone(),
            }),
        })
    }

    fn conn(&self) -> Result<Connection> {
        let pool = self.inner.pool.read().clone().ok_or(Error::Closed)?;
        Ok(pool.get()?)
    }

    fn set_sync(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut conn = self.conn()?;
        redis::cmd("SET").arg(key).arg(value).query::<()>(&mut *conn)?;
        Ok(())
    }

    fn batch_set_sync(&self, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        let mut conn = self.conn()?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in items {
            pipe.cmd("SET").arg(key).arg(value).ignore();
        }
        pipe.query::<()>(&mut *conn)?;
        Ok(())
    }

    fn get_sync(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn()?;
        Ok(redis::cmd("GET").arg(key).query(&mut *conn)?)
    }

    fn delete_sync(&self, key: &str, display_key: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let removed: i64 = redis::cmd("DEL").arg(key).query(&mut *conn)?;
        if removed == 0 {
            return Err(Error::key_not_found(display_key));
        }
        Ok(())
    }

    fn scan_sync(&self, bucket: &str) -> Result<ScanOutput> {
        let mut conn = self.conn()?;
        let prefix = bucket_prefix(bucket);
        let pattern = format!("{}*", escape_glob(&prefix));

        // SCAN may report a key more than once.
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query(&mut *conn)?;
            for key in batch {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        let mut output = ScanOutput::default();
        for chunk in keys.chunks(MGET_CHUNK) {
            let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET").arg(chunk).query(&mut *conn)?;
            for (key, value) in chunk.iter().zip(values) {
                // Deleted between SCAN and MGET.
                let Some(value) = value else { continue };
                let name = key.strip_prefix(&prefix).unwrap_or(key);
                output.push(name.to_string(), value);
            }
        }
        Ok(output)
    }
}

/// `<len>:bucket:`; no bucket's prefix is a prefix of another's.
fn bucket_prefix(bucket: &str) -> String {
    format!("{}{BUCKET_SEPARATOR}{bucket}{BUCKET_SEPARATOR}", bucket.len())
}

fn full_key(bucket: &str, key: &str) -> String {
    let mut full = bucket_prefix(bucket);
    full.push_str(key);
    full
}

/// Escapes glob metacharacters so a bucket name matches literally.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl KvBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn set(&self, bucket: &str, key: &str, value: Vec<u8>) -> Result<()> {
        check_key(key)?;
        let backend = self.clone();
        let key = full_key(bucket, key);
        run_blocking(move || backend.set_sync(&key, value)).await
    }

    async fn batch_set(&self, bucket: &str, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        for (key, _) in &items {
            check_key(key)?;
        }
        if items.is_empty() {
            return Ok(());
        }
        let backend = self.clone();
        let items = items
            .into_iter()
            .map(|(key, value)| (full_key(bucket, &key), value))
            .collect();
        run_blocking(move || backend.batch_set_sync(items)).await
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        check_key(key)?;
        let backend = self.clone();
        let key = full_key(bucket, key);
        run_blocking(move || backend.get_sync(&key)).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        check_key(key)?;
        let backend = self.clone();
        let (full, key) = (full_key(bucket, key), key.to_string());
        run_blocking(move || backend.delete_sync(&full, &key)).await
    }

    async fn scan(&self, bucket: &str) -> Result<ScanOutput> {
        check_bucket_name(bucket)?;
        let backend = self.clone();
        let bucket = bucket.to_string();
        run_blocking(move || backend.scan_sync(&bucket)).await
    }

    async fn close(&self) -> Result<()> {
        // Dropping the pool closes its idle connections.
        let backend = self.clone();
        let closed = run_blocking(move || Ok(backend.inner.pool.write().take().is_some())).await?;
        if closed {
            tracing::debug!(address = %self.inner.address, "Closed Redis KV backend");
        }
        Ok(())
    }
}
