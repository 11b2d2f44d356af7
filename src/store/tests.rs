//! Contract tests for `KvStore` over the embedded backends.

use super::*;
use crate::config::{RedbOptions, SledOptions, StoreConfig};
use crate::encoding::Codec;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    age: u32,
    tags: Vec<String>,
}

fn profile() -> Profile {
    Profile {
        name: "alice".to_string(),
        age: 30,
        tags: vec!["admin".to_string()],
    }
}

fn redb_store(tmp: &TempDir, codec: Codec) -> KvStore {
    let backend = RedbBackend::open(RedbOptions::at(tmp.path().join("kv.redb"))).unwrap();
    KvStore::new(backend, codec)
}

fn sled_store(tmp: &TempDir, codec: Codec) -> KvStore {
    let backend = SledBackend::open(&SledOptions::at(tmp.path().join("kv.sled"))).unwrap();
    KvStore::new(backend, codec)
}

/// One store per embedded backend, each in its own directory.
fn embedded_stores(codec: Codec) -> Vec<(TempDir, KvStore)> {
    let redb_dir = TempDir::new().unwrap();
    let redb = redb_store(&redb_dir, codec);
    let sled_dir = TempDir::new().unwrap();
    let sled = sled_store(&sled_dir, codec);
    vec![(redb_dir, redb), (sled_dir, sled)]
}

#[tokio::test]
async fn test_set_then_get_for_every_codec() {
    for codec in [Codec::Json, Codec::Binary] {
        for (_tmp, store) in embedded_stores(codec) {
            store.set("users", "alice", &profile()).await.unwrap();
            let loaded: Option<Profile> = store.get("users", "alice").await.unwrap();
            assert_eq!(loaded, Some(profile()), "{} / {codec}", store.backend_name());
        }
    }

    for (_tmp, store) in embedded_stores(Codec::Raw) {
        store.set("blobs", "b1", &vec![0u8, 1, 255]).await.unwrap();
        let loaded: Option<Vec<u8>> = store.get("blobs", "b1").await.unwrap();
        assert_eq!(loaded, Some(vec![0u8, 1, 255]), "{}", store.backend_name());
    }
}

#[tokio::test]
async fn test_get_never_written_key() {
    for (_tmp, store) in embedded_stores(Codec::Json) {
        store.set("b", "present", "value").await.unwrap();
        let loaded: Option<Profile> = store.get("b", "absent").await.unwrap();
        assert!(loaded.is_none(), "{}", store.backend_name());
    }
}

#[tokio::test]
async fn test_delete_then_get() {
    for (_tmp, store) in embedded_stores(Codec::Json) {
        store.set("b", "foo", "bar").await.unwrap();
        store.delete("b", "foo").await.unwrap();
        let loaded: Option<String> = store.get("b", "foo").await.unwrap();
        assert!(loaded.is_none(), "{}", store.backend_name());

        // Missing keys are a no-op on the embedded backends.
        store.delete("b", "foo").await.unwrap();
    }
}

#[tokio::test]
async fn test_empty_key_has_no_side_effect() {
    for (_tmp, store) in embedded_stores(Codec::Json) {
        store.set("b", "foo", "bar").await.unwrap();
        let before = store.scan("b").await.unwrap();

        assert!(matches!(store.set("b", "", "x").await, Err(Error::EmptyKey)));
        assert!(matches!(
            store.get::<String>("b", "").await,
            Err(Error::EmptyKey)
        ));
        assert!(matches!(store.delete("b", "").await, Err(Error::EmptyKey)));
        assert!(matches!(
            store.batch_set("b", &["ok", ""], &["x", "y"]).await,
            Err(Error::EmptyKey)
        ));

        assert_eq!(store.scan("b").await.unwrap(), before, "{}", store.backend_name());
    }
}

#[tokio::test]
async fn test_batch_set_missing_value() {
    let tmp = TempDir::new().unwrap();
    let store = sled_store(&tmp, Codec::Json);

    let err = store.batch_set("b", &["foo1", "foo2"], &["bar1"]).await.unwrap_err();
    assert!(matches!(err, Error::EmptyValue));
    assert!(store.scan("b").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_scan_returns_encoded_values_in_order() {
    for (_tmp, store) in embedded_stores(Codec::Json) {
        store.set("b", "foo1", "bar1").await.unwrap();
        store.set("b", "foo2", "bar2").await.unwrap();

        let output = store.scan("b").await.unwrap();
        assert_eq!(output.keys, vec!["foo1", "foo2"]);
        assert_eq!(
            output.values,
            vec![
                Codec::Json.marshal("bar1").unwrap(),
                Codec::Json.marshal("bar2").unwrap(),
            ]
        );

        let decoded: Vec<(String, String)> = store.scan_decoded("b").await.unwrap();
        assert_eq!(
            decoded,
            vec![
                ("foo1".to_string(), "bar1".to_string()),
                ("foo2".to_string(), "bar2".to_string()),
            ]
        );

        assert!(matches!(store.scan("").await, Err(Error::EmptyBucketName)));
    }
}

#[tokio::test]
async fn test_batch_set_restricted_to_one_pair() {
    let tmp = TempDir::new().unwrap();
    let store = redb_store(&tmp, Codec::Json);

    let err = store
        .batch_set("b", &["foo1", "foo2"], &["bar1", "bar2"])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MultipleKvNotSupported));
    assert!(matches!(
        store.scan("b").await,
        Err(Error::BucketNotFound { .. })
    ));

    store.batch_set("b", &["foo1"], &["bar1"]).await.unwrap();
    let loaded: Option<String> = store.get("b", "foo1").await.unwrap();
    assert_eq!(loaded.as_deref(), Some("bar1"));
}

#[tokio::test]
async fn test_batch_set_many_pairs_on_sled() {
    let tmp = TempDir::new().unwrap();
    let store = sled_store(&tmp, Codec::Binary);

    let keys: Vec<String> = (0..50).map(|i| format!("key{i:02}")).collect();
    let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    let values: Vec<u64> = (0..50).collect();
    store.batch_set("numbers", &key_refs, &values).await.unwrap();

    let decoded: Vec<(String, u64)> = store.scan_decoded("numbers").await.unwrap();
    assert_eq!(decoded.len(), 50);
    assert_eq!(decoded[49], ("key49".to_string(), 49));
}

#[tokio::test]
async fn test_codec_errors() {
    let tmp = TempDir::new().unwrap();
    let raw = redb_store(&tmp, Codec::Raw);

    let err = raw.set("b", "text", "not bytes").await.unwrap_err();
    assert!(matches!(err, Error::Codec(_)));
    assert!(matches!(raw.scan("b").await, Err(Error::BucketNotFound { .. })));

    let other_tmp = TempDir::new().unwrap();
    let json = sled_store(&other_tmp, Codec::Json);
    json.set("b", "name", "alice").await.unwrap();
    let err = json.get::<u64>("b", "name").await.unwrap_err();
    assert!(matches!(err, Error::Codec(_)));
}

#[tokio::test]
async fn test_reap_through_store() {
    let tmp = TempDir::new().unwrap();
    let options =
        RedbOptions::at(tmp.path().join("ttl.redb")).with_ttl(Some(Duration::from_nanos(1)));
    let store = KvStore::new(RedbBackend::open(options).unwrap(), Codec::Json);

    store.set("sessions", "s1", "token").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert_eq!(store.reap("sessions").await.unwrap(), 1);
    let loaded: Option<String> = store.get("sessions", "s1").await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn test_delete_bucket_and_info() {
    for (_tmp, store) in embedded_stores(Codec::Json) {
        store.set("b", "foo", "bar").await.unwrap();
        assert!(store.info().await.unwrap().size > 0);

        store.delete_bucket("b").await.unwrap();
        assert!(matches!(
            store.delete_bucket("b").await,
            Err(Error::BucketNotFound { .. })
        ));
    }
}

#[tokio::test]
async fn test_close_is_shared_by_clones() {
    for (_tmp, store) in embedded_stores(Codec::Json) {
        let clone = store.clone();
        store.close().await.unwrap();
        assert!(matches!(clone.set("b", "k", "v").await, Err(Error::Closed)));
    }
}

#[tokio::test]
async fn test_open_from_config() {
    let tmp = TempDir::new().unwrap();
    let toml = format!(
        "codec = \"binary\"\n\n[backend]\ntype = \"sled\"\npath = {:?}\nwrite_sync = true\n",
        tmp.path().join("configured").display().to_string()
    );
    let config = StoreConfig::from_toml_str(&toml).unwrap();

    let store = KvStore::open(&config).await.unwrap();
    assert_eq!(store.backend_name(), "sled");
    assert_eq!(store.codec(), Codec::Binary);

    store.set("b", "n", &7u32).await.unwrap();
    assert_eq!(store.get::<u32>("b", "n").await.unwrap(), Some(7));
}

#[tokio::test]
async fn test_open_backend_redb_default_root() {
    let tmp = TempDir::new().unwrap();
    let config = crate::config::BackendConfig::Redb(RedbOptions::at(tmp.path().join("x.redb")));
    let backend = open_backend(&config).await.unwrap();
    assert_eq!(backend.name(), "redb");
    assert_eq!(backend.info().await.unwrap().name, "unikv");
}
