//! Key-value stores with pluggable backends.
//!
//! Every backend implements [`KvBackend`] over raw bytes; [`KvStore`] binds
//! one backend to a [`Codec`](crate::Codec) and exposes a typed API.
//!
//! - **RedbBackend**: embedded single-file store with optional TTL sweeping
//! - **SledBackend**: embedded log-structured store
//! - **DynamoDbBackend**: managed cloud tables (feature `dynamodb`)
//! - **RedisBackend**: remote cache with an owned connection pool (feature `redis`)
//!
//! # Example
//!
//! ```ignore
//! use unikv::{Codec, KvStore, RedbBackend, RedbOptions};
//!
//! let backend = RedbBackend::open(RedbOptions::at("data.redb"))?;
//! let store = KvStore::new(backend, Codec::Json);
//! store.set("users", "alice", &User { age: 30 }).await?;
//! let user: Option<User> = store.get("users", "alice").await?;
//! ```

mod backend;
#[cfg(feature = "dynamodb")]
mod dynamodb;
mod redb;
#[cfg(feature = "redis")]
mod redis;
mod sled;
#[allow(clippy::module_inception)]
mod store;

#[cfg(test)]
mod tests;

pub use backend::KvBackend;
#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbBackend;
pub use redb::RedbBackend;
#[cfg(feature = "redis")]
pub use redis::RedisBackend;
pub use sled::SledBackend;
pub use store::KvStore;

use crate::config::BackendConfig;
use crate::error::{Error, Result};

/// Opens the backend selected by `config`.
///
/// Mandatory options are validated before any connection is attempted.
///
/// # Errors
///
/// Returns an error if the options are invalid, the backend was compiled
/// out, or the engine cannot be reached.
pub async fn open_backend(config: &BackendConfig) -> Result<Box<dyn KvBackend>> {
    tracing::debug!(backend = config.kind(), "Opening KV backend");
    match config {
        BackendConfig::Redb(opts) => {
            let opts = opts.clone();
            let backend = run_blocking(move || RedbBackend::open(opts)).await?;
            Ok(Box::new(backend))
        },
        BackendConfig::Sled(opts) => {
            let opts = opts.clone();
            let backend = run_blocking(move || SledBackend::open(&opts)).await?;
            Ok(Box::new(backend))
        },
        #[cfg(feature = "dynamodb")]
        BackendConfig::DynamoDb(opts) => Ok(Box::new(DynamoDbBackend::connect(opts).await?)),
        #[cfg(feature = "redis")]
        BackendConfig::Redis(opts) => {
            let opts = opts.clone();
            let backend = run_blocking(move || RedisBackend::connect(&opts)).await?;
            Ok(Box::new(backend))
        },
        #[allow(unreachable_patterns)]
        other => Err(Error::Config(format!(
            "built without the `{}` feature",
            other.kind()
        ))),
    }
}

/// Runs a blocking engine call off the async runtime.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
