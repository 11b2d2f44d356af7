//! Mutating commands.

use crate::encoding::Codec;
use crate::store::KvStore;
use anyhow::Result;

/// Stores one text value.
pub async fn set(store: &KvStore, bucket: &str, key: &str, value: &str) -> Result<()> {
    match store.codec() {
        Codec::Raw => store.set(bucket, key, value.as_bytes()).await?,
        _ => store.set(bucket, key, value).await?,
    }
    Ok(())
}

/// Stores several `(key, value)` pairs in one backend batch.
pub async fn batch_set(store: &KvStore, bucket: &str, pairs: &[(String, String)]) -> Result<()> {
    let keys: Vec<&str> = pairs.iter().map(|(key, _)| key.as_str()).collect();
    match store.codec() {
        Codec::Raw => {
            let values: Vec<&[u8]> = pairs.iter().map(|(_, value)| value.as_bytes()).collect();
            store.batch_set(bucket, &keys, &values).await?;
        },
        _ => {
            let values: Vec<&str> = pairs.iter().map(|(_, value)| value.as_str()).collect();
            store.batch_set(bucket, &keys, &values).await?;
        },
    }
    println!("Stored {} item(s) in {bucket}", pairs.len());
    Ok(())
}

/// Removes one key.
pub async fn delete(store: &KvStore, bucket: &str, key: &str) -> Result<()> {
    store.delete(bucket, key).await?;
    Ok(())
}

/// Drops a whole bucket.
pub async fn delete_bucket(store: &KvStore, bucket: &str) -> Result<()> {
    store.delete_bucket(bucket).await?;
    println!("Deleted bucket {bucket}");
    Ok(())
}

/// Sweeps expired items and prints how many were removed.
pub async fn reap(store: &KvStore, bucket: &str) -> Result<()> {
    let removed = store.reap(bucket).await?;
    println!("Reaped {removed} expired item(s) from {bucket}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SledOptions;
    use crate::store::SledBackend;
    use tempfile::TempDir;

    fn store(tmp: &TempDir, codec: Codec) -> KvStore {
        let backend = SledBackend::open(&SledOptions::at(tmp.path().join("cli"))).unwrap();
        KvStore::new(backend, codec)
    }

    #[tokio::test]
    async fn test_raw_values_are_stored_verbatim() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, Codec::Raw);

        set(&store, "b", "k", "hello").await.unwrap();
        let output = store.scan("b").await.unwrap();
        assert_eq!(output.values, vec![b"hello".to_vec()]);
    }

    #[tokio::test]
    async fn test_batch_set_with_text_codec() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp, Codec::Json);

        let pairs = vec![
            ("foo1".to_string(), "bar1".to_string()),
            ("foo2".to_string(), "bar2".to_string()),
        ];
        batch_set(&store, "b", &pairs).await.unwrap();

        let decoded: Vec<(String, String)> = store.scan_decoded("b").await.unwrap();
        assert_eq!(decoded, pairs);

        delete(&store, "b", "foo1").await.unwrap();
        assert_eq!(store.get::<String>("b", "foo1").await.unwrap(), None);
        assert_eq!(store.reap("b").await.unwrap(), 0);
    }
}
