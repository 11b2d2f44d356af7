//! unikv: one key-value API over several storage engines.
//!
//! A [`KvStore`] pairs a [`KvBackend`] with a [`Codec`]. Backends:
//!
//! - [`RedbBackend`] - embedded single-file store with TTL sweeping
//! - [`SledBackend`] - embedded log-structured store
//! - `DynamoDbBackend` - managed cloud tables (feature `dynamodb`)
//! - `RedisBackend` - remote cache over an owned connection pool (feature `redis`)
//!
//! Every operation validates its input before any I/O and surfaces engine
//! failures unmodified through [`Error`].

pub mod commands;
pub mod config;
pub mod encoding;
pub mod error;
pub mod store;
pub mod types;
pub mod validation;

pub use config::{
    BackendConfig, DynamoDbOptions, RedbOptions, RedisOptions, SledOptions, StoreConfig,
};
pub use encoding::{Codec, CodecError, RawError};
pub use error::{Error, Result};
#[cfg(feature = "dynamodb")]
pub use store::DynamoDbBackend;
#[cfg(feature = "redis")]
pub use store::RedisBackend;
pub use store::{KvBackend, KvStore, RedbBackend, SledBackend, open_backend};
pub use types::{ScanOutput, StoreInfo};
