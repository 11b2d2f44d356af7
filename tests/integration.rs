//! End-to-end tests for unikv through the public API.
//!
//! Backends are built from TOML configuration exactly as the CLI does. The
//! network backends are only exercised for their construction-time checks;
//! live round-trips live next to each backend behind `#[ignore]`.
//!
//! ```bash
//! cargo test --test integration
//! ```

use std::time::Duration;
use tempfile::TempDir;
use unikv::{BackendConfig, Codec, Error, KvStore, RedbOptions, StoreConfig, open_backend};

// =============================================================================
// Helpers
// =============================================================================

fn redb_config(tmp: &TempDir, extra: &str) -> StoreConfig {
    let path = tmp.path().join("store.redb").display().to_string();
    let toml = format!("codec = \"json\"\n\n[backend]\ntype = \"redb\"\npath = {path:?}\n{extra}");
    StoreConfig::from_toml_str(&toml).unwrap()
}

// =============================================================================
// Configuration to store
// =============================================================================

#[tokio::test]
async fn test_ttl_from_config_expires_items() {
    let tmp = TempDir::new().unwrap();
    let config = redb_config(&tmp, "ttl_secs = 0.000000001\n");
    let store = KvStore::open(&config).await.unwrap();

    store.set("sessions", "a", "1").await.unwrap();
    store.set("sessions", "b", "2").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert_eq!(store.reap("sessions").await.unwrap(), 2);
    assert!(store.scan("sessions").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ttl_disabled_keeps_old_items() {
    let tmp = TempDir::new().unwrap();
    let config = redb_config(&tmp, "ttl_secs = 0\n");
    let store = KvStore::open(&config).await.unwrap();

    store.set("sessions", "a", "1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert_eq!(store.reap("sessions").await.unwrap(), 0);
    assert_eq!(
        store.get::<String>("sessions", "a").await.unwrap().as_deref(),
        Some("1")
    );
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let config = redb_config(&tmp, "root_bucket = \"app\"\n");

    let store = KvStore::open(&config).await.unwrap();
    store.set("users", "alice", &vec![1u32, 2, 3]).await.unwrap();
    store.close().await.unwrap();
    assert!(matches!(
        store.get::<Vec<u32>>("users", "alice").await,
        Err(Error::Closed)
    ));

    let reopened = KvStore::open(&config).await.unwrap();
    assert_eq!(
        reopened.get::<Vec<u32>>("users", "alice").await.unwrap(),
        Some(vec![1, 2, 3])
    );
    assert_eq!(reopened.info().await.unwrap().name, "app");
}

#[tokio::test]
async fn test_codec_is_part_of_the_store() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("raw.redb");
    let backend = open_backend(&BackendConfig::Redb(RedbOptions::at(&path)))
        .await
        .unwrap();
    let raw = KvStore::from_boxed(backend, Codec::Raw);

    raw.set("files", "readme", b"# unikv".as_slice()).await.unwrap();
    let output = raw.scan("files").await.unwrap();
    assert_eq!(output.values, vec![b"# unikv".to_vec()]);

    let err = raw.set("files", "readme", &42u8).await.unwrap_err();
    assert!(matches!(err, Error::Codec(_)));
}

// =============================================================================
// Construction errors
// =============================================================================

#[test]
fn test_unknown_codec_rejected() {
    let err = StoreConfig::from_toml_str("codec = \"xml\"\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[cfg(feature = "dynamodb")]
#[tokio::test]
async fn test_dynamodb_requires_table_name() {
    let config = StoreConfig::from_toml_str("[backend]\ntype = \"dynamodb\"\n").unwrap();
    let err = KvStore::open(&config).await.err().unwrap();
    assert!(matches!(err, Error::MissingTableName));
}

#[cfg(feature = "redis")]
#[tokio::test]
async fn test_redis_requires_address() {
    let config = StoreConfig::from_toml_str("[backend]\ntype = \"redis\"\n").unwrap();
    let err = KvStore::open(&config).await.err().unwrap();
    assert!(matches!(err, Error::InvalidAddress));
}
