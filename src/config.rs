//! Configuration types for unikv stores.
//!
//! A [`StoreConfig`] selects exactly one backend and the codec used to
//! serialize values. It is usually loaded from a TOML file:
//!
//! ```toml
//! codec = "json"
//!
//! [backend]
//! type = "redb"
//! path = "/var/lib/unikv/data.redb"
//! root_bucket = "app"
//! ttl_secs = 3600
//! ```
//!
//! Backend option structs carry the same defaults whether they come from
//! TOML or from `Default::default()`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::encoding::Codec;
use crate::error::{Error, Result};

/// Default redb database file.
pub const DEFAULT_REDB_PATH: &str = "unikv.redb";
/// Default root namespace inside the redb file.
pub const DEFAULT_ROOT_BUCKET: &str = "unikv";
/// Default sled directory.
pub const DEFAULT_SLED_PATH: &str = "unikv.sled";
/// Default provisioned read capacity for created tables.
pub const DEFAULT_READ_CAPACITY_UNITS: i64 = 5;
/// Default provisioned write capacity for created tables.
pub const DEFAULT_WRITE_CAPACITY_UNITS: i64 = 5;
/// Default bound on waiting for a created table to become active.
pub const DEFAULT_TABLE_CREATION_TIMEOUT_SECS: u64 = 15;
/// Default idle connections kept in the redis pool.
pub const DEFAULT_MAX_IDLE_CONNECTIONS: u32 = 8;
/// Default maximum connections in the redis pool.
pub const DEFAULT_MAX_ACTIVE_CONNECTIONS: u32 = 64;
/// Default redis connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
/// Default redis transport.
pub const DEFAULT_NETWORK: &str = "tcp";

/// Root configuration: one backend plus a codec.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub codec: Codec,
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Backend selection, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Redb(RedbOptions),
    Sled(SledOptions),
    DynamoDb(DynamoDbOptions),
    Redis(RedisOptions),
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Redb(RedbOptions::default())
    }
}

impl BackendConfig {
    /// Backend identifier, matching the `type` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Redb(_) => "redb",
            Self::Sled(_) => "sled",
            Self::DynamoDb(_) => "dynamodb",
            Self::Redis(_) => "redis",
        }
    }
}

impl StoreConfig {
    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - Required fields are missing or have invalid types
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::io(format!("reading config file {}", path.display()), e)
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not a valid configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Builder-style codec override.
    #[must_use]
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }
}

/// Embedded single-file store (redb).
#[derive(Debug, Clone, Deserialize)]
pub struct RedbOptions {
    #[serde(default = "default_redb_path")]
    pub path: PathBuf,
    /// Root namespace holding one table per bucket.
    #[serde(default = "default_root_bucket")]
    pub root_bucket: String,
    /// Item time-to-live; `None` means items never expire.
    #[serde(default, rename = "ttl_secs", deserialize_with = "deserialize_ttl_secs")]
    pub ttl: Option<Duration>,
}

impl Default for RedbOptions {
    fn default() -> Self {
        Self {
            path: default_redb_path(),
            root_bucket: default_root_bucket(),
            ttl: None,
        }
    }
}

impl RedbOptions {
    /// Options for a database file at `path`, other fields defaulted.
    pub fn at<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Builder-style TTL override. A zero duration disables expiry.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl.filter(|d| !d.is_zero());
        self
    }
}

/// Embedded log-structured store (sled).
#[derive(Debug, Clone, Deserialize)]
pub struct SledOptions {
    #[serde(default = "default_sled_path")]
    pub path: PathBuf,
    /// Flush to disk after every write instead of on sled's background timer.
    #[serde(default)]
    pub write_sync: bool,
}

impl Default for SledOptions {
    fn default() -> Self {
        Self {
            path: default_sled_path(),
            write_sync: false,
        }
    }
}

impl SledOptions {
    /// Options for a database directory at `path`, other fields defaulted.
    pub fn at<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Managed cloud table store (DynamoDB).
#[derive(Debug, Clone, Deserialize)]
pub struct DynamoDbOptions {
    #[serde(default)]
    pub region: Option<String>,
    /// Default table, used when an operation passes an empty bucket. Required.
    #[serde(default)]
    pub table_name: String,
    #[serde(default = "default_read_capacity_units")]
    pub read_capacity_units: i64,
    #[serde(default = "default_write_capacity_units")]
    pub write_capacity_units: i64,
    /// Custom endpoint, e.g. DynamoDB Local.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default = "default_table_creation_timeout_secs")]
    pub table_creation_timeout_secs: u64,
}

impl Default for DynamoDbOptions {
    fn default() -> Self {
        Self {
            region: None,
            table_name: String::new(),
            read_capacity_units: default_read_capacity_units(),
            write_capacity_units: default_write_capacity_units(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            table_creation_timeout_secs: default_table_creation_timeout_secs(),
        }
    }
}

/// Remote cache store (Redis).
#[derive(Debug, Clone, Deserialize)]
pub struct RedisOptions {
    /// `host:port`, a socket path for `network = "unix"`, or a full URL. Required.
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub database: i64,
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: u32,
    #[serde(default = "default_max_active_connections")]
    pub max_active_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            address: String::new(),
            network: default_network(),
            database: 0,
            max_idle_connections: default_max_idle_connections(),
            max_active_connections: default_max_active_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl RedisOptions {
    /// Options for a server at `address`, other fields defaulted.
    pub fn at(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Connection URL understood by the redis client.
    #[must_use]
    pub fn url(&self) -> String {
        if self.address.contains("://") {
            return self.address.clone();
        }
        match self.network.as_str() {
            "unix" => format!("redis+unix://{}?db={}", self.address, self.database),
            _ => format!("redis://{}/{}", self.address, self.database),
        }
    }
}

fn default_redb_path() -> PathBuf {
    PathBuf::from(DEFAULT_REDB_PATH)
}

fn default_root_bucket() -> String {
    DEFAULT_ROOT_BUCKET.to_string()
}

fn default_sled_path() -> PathBuf {
    PathBuf::from(DEFAULT_SLED_PATH)
}

fn default_read_capacity_units() -> i64 {
    DEFAULT_READ_CAPACITY_UNITS
}

fn default_write_capacity_units() -> i64 {
    DEFAULT_WRITE_CAPACITY_UNITS
}

fn default_table_creation_timeout_secs() -> u64 {
    DEFAULT_TABLE_CREATION_TIMEOUT_SECS
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

fn default_max_idle_connections() -> u32 {
    DEFAULT_MAX_IDLE_CONNECTIONS
}

fn default_max_active_connections() -> u32 {
    DEFAULT_MAX_ACTIVE_CONNECTIONS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

/// Seconds (fractions allowed) to an optional duration; zero or negative means never.
fn deserialize_ttl_secs<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = Option::<f64>::deserialize(deserializer)?;
    match secs {
        Some(s) if s > 0.0 => Duration::try_from_secs_f64(s)
            .map(Some)
            .map_err(|e| D::Error::custom(format!("ttl_secs {s}: {e}"))),
        _ => Ok(None),
    }
}
