//! Input validation shared by every backend.
//!
//! All checks run before any I/O so an invalid call never touches the
//! underlying engine.

use crate::error::{Error, Result};

/// Rejects an empty key.
pub fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::EmptyKey);
    }
    Ok(())
}

/// Rejects an absent value.
pub fn check_value<T: ?Sized>(value: Option<&T>) -> Result<()> {
    match value {
        Some(_) => Ok(()),
        None => Err(Error::EmptyValue),
    }
}

/// Rejects an empty key first, then an absent value.
pub fn check_key_and_value<T: ?Sized>(key: &str, value: Option<&T>) -> Result<()> {
    check_key(key)?;
    check_value(value)
}

/// Rejects an empty bucket name.
pub fn check_bucket_name(bucket: &str) -> Result<()> {
    if bucket.is_empty() {
        return Err(Error::EmptyBucketName);
    }
    Ok(())
}

/// Validates every key of a batch against its positional value.
///
/// A key without a matching value counts as an absent value.
pub fn check_batch<K: AsRef<str>, V>(keys: &[K], values: &[V]) -> Result<()> {
    for (i, key) in keys.iter().enumerate() {
        check_key_and_value(key.as_ref(), values.get(i))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key_and_value() {
        let cases: [(&str, Option<&str>, Option<Error>); 4] = [
            ("foo", Some("bar"), None),
            ("", Some("bar"), Some(Error::EmptyKey)),
            ("foo", None, Some(Error::EmptyValue)),
            // key is checked first
            ("", None, Some(Error::EmptyKey)),
        ];

        for (key, value, expected) in cases {
            let result = check_key_and_value(key, value);
            match expected {
                None => assert!(result.is_ok(), "{key:?}/{value:?}"),
                Some(Error::EmptyKey) => assert!(matches!(result, Err(Error::EmptyKey))),
                Some(Error::EmptyValue) => assert!(matches!(result, Err(Error::EmptyValue))),
                Some(other) => panic!("unexpected case {other}"),
            }
        }
    }

    #[test]
    fn test_check_bucket_name() {
        assert!(check_bucket_name("b").is_ok());
        assert!(matches!(check_bucket_name(""), Err(Error::EmptyBucketName)));
    }

    #[test]
    fn test_check_batch() {
        assert!(check_batch(&["a", "b"], &[1, 2]).is_ok());
        assert!(matches!(
            check_batch(&["a", ""], &[1, 2]),
            Err(Error::EmptyKey)
        ));
        assert!(matches!(
            check_batch(&["a", "b"], &[1]),
            Err(Error::EmptyValue)
        ));
        // extra values are ignored
        assert!(check_batch::<&str, i32>(&["a"], &[1, 2]).is_ok());
    }
}
