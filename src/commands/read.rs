//! Read-only commands.

use super::decode_text;
use crate::encoding::Codec;
use crate::store::KvStore;
use anyhow::{Context, Result, bail};

/// Prints the value stored under `key`. A missing key is an error.
pub async fn get(store: &KvStore, bucket: &str, key: &str) -> Result<()> {
    let value = match store.codec() {
        Codec::Raw => store
            .get::<Vec<u8>>(bucket, key)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
        _ => store.get::<String>(bucket, key).await?,
    };

    match value {
        Some(value) => {
            println!("{value}");
            Ok(())
        },
        None => bail!("Key not found: {bucket}/{key}"),
    }
}

/// Prints every `key<TAB>value` pair of a bucket.
pub async fn scan(store: &KvStore, bucket: &str) -> Result<()> {
    let output = store.scan(bucket).await?;
    for (key, bytes) in output.iter() {
        let value = decode_text(store.codec(), bytes)
            .with_context(|| format!("Failed to decode value of '{key}'"))?;
        println!("{key}\t{value}");
    }
    tracing::debug!(bucket, count = output.len(), "Scanned bucket");
    Ok(())
}

/// Prints the storage namespace and size as JSON.
pub async fn info(store: &KvStore) -> Result<()> {
    let info = store.info().await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
