//! Shared output types.

use serde::Serialize;

/// Keys and raw stored bytes of a bucket, as returned by `scan`.
///
/// `keys[i]` pairs with `values[i]`. Values are the codec-encoded bytes,
/// exactly as the backend stored them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutput {
    pub keys: Vec<String>,
    pub values: Vec<Vec<u8>>,
}

impl ScanOutput {
    pub(crate) fn push(&mut self, key: String, value: Vec<u8>) {
        self.keys.push(key);
        self.values.push(value);
    }

    /// Number of scanned items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the bucket had no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates over `(key, raw value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.keys
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Vec::as_slice))
    }
}

/// Storage namespace name and on-disk size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreInfo {
    pub name: String,
    pub size: u64,
}
