//! Pluggable value serialization.
//!
//! A [`Codec`] turns a value into the bytes a backend stores and back. It is
//! chosen per store instance and is independent of the backend; adapters
//! never look inside the encoded bytes.
//!
//! - [`Codec::Json`]: text encoding via `serde_json` (default)
//! - [`Codec::Binary`]: compact binary encoding via `bincode`
//! - [`Codec::Raw`]: passthrough for byte sequences only

mod raw;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use raw::RawError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Value serialization strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Json,
    Binary,
    Raw,
}

/// Serialization failure.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Value could not be encoded.
    #[error("failed to marshal value with {codec} codec: {source}")]
    Marshal {
        codec: Codec,
        #[source]
        source: BoxError,
    },

    /// Stored bytes do not match the requested shape.
    #[error("failed to unmarshal {codec} data: {source}")]
    Unmarshal {
        codec: Codec,
        #[source]
        source: BoxError,
    },
}

impl CodecError {
    fn marshal(codec: Codec, source: impl Into<BoxError>) -> Self {
        Self::Marshal {
            codec,
            source: source.into(),
        }
    }

    fn unmarshal(codec: Codec, source: impl Into<BoxError>) -> Self {
        Self::Unmarshal {
            codec,
            source: source.into(),
        }
    }

    /// The codec that failed.
    #[must_use]
    pub fn codec(&self) -> Codec {
        match self {
            Self::Marshal { codec, .. } | Self::Unmarshal { codec, .. } => *codec,
        }
    }
}

impl Codec {
    /// Encodes a value into bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Marshal`] if the value cannot be represented by
    /// this codec. The raw codec rejects anything that is not a byte sequence.
    pub fn marshal<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Json => serde_json::to_vec(value).map_err(|e| CodecError::marshal(self, e)),
            Self::Binary => bincode::serialize(value).map_err(|e| CodecError::marshal(self, e)),
            Self::Raw => raw::to_bytes(value).map_err(|e| CodecError::marshal(self, e)),
        }
    }

    /// Decodes bytes into a value of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Unmarshal`] if the bytes do not decode into `T`.
    pub fn unmarshal<T: DeserializeOwned>(self, data: &[u8]) -> Result<T, CodecError> {
        match self {
            Self::Json => serde_json::from_slice(data).map_err(|e| CodecError::unmarshal(self, e)),
            Self::Binary => bincode::deserialize(data).map_err(|e| CodecError::unmarshal(self, e)),
            Self::Raw => raw::from_bytes(data.to_vec()).map_err(|e| CodecError::unmarshal(self, e)),
        }
    }

    /// Lowercase codec name as used in configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Binary => "binary",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestStruct {
        foo: String,
        bar: f64,
        baz: i64,
    }

    fn sample() -> TestStruct {
        TestStruct {
            foo: "foostring".to_string(),
            bar: 42.0,
            baz: 123,
        }
    }

    #[test]
    fn test_json_marshal() {
        let data = Codec::Json.marshal(&sample()).unwrap();
        assert_eq!(data, br#"{"foo":"foostring","bar":42.0,"baz":123}"#);
    }

    #[test]
    fn test_json_unmarshal() {
        let input = br#"{"foo":"foostring","bar":42,"baz":123}"#;
        let actual: TestStruct = Codec::Json.unmarshal(input).unwrap();
        assert_eq!(actual, sample());
    }

    #[test]
    fn test_json_unmarshal_wrong_shape() {
        let err = Codec::Json.unmarshal::<TestStruct>(b"\"bar\"").unwrap_err();
        assert!(matches!(err, CodecError::Unmarshal { codec: Codec::Json, .. }));
    }

    #[test]
    fn test_binary_struct() {
        let data = Codec::Binary.marshal(&sample()).unwrap();
        let actual: TestStruct = Codec::Binary.unmarshal(&data).unwrap();
        assert_eq!(actual, sample());
    }

    #[test]
    fn test_binary_truncated_data() {
        let data = Codec::Binary.marshal(&sample()).unwrap();
        let err = Codec::Binary
            .unmarshal::<TestStruct>(&data[..data.len() / 2])
            .unwrap_err();
        assert_eq!(err.codec(), Codec::Binary);
    }

    #[test]
    fn test_raw_marshal_bytes() {
        let input = serde_json::to_vec(&sample()).unwrap();
        let actual = Codec::Raw.marshal(&input).unwrap();
        assert_eq!(actual, input);
    }

    #[test]
    fn test_raw_marshal_rejects_non_bytes() {
        let err = Codec::Raw.marshal("foo").unwrap_err();
        match err {
            CodecError::Marshal { codec, source } => {
                assert_eq!(codec, Codec::Raw);
                assert!(matches!(
                    source.downcast_ref::<RawError>(),
                    Some(RawError::NotBytes)
                ));
            },
            other => panic!("expected marshal error, got {other}"),
        }

        assert!(Codec::Raw.marshal(&sample()).is_err());
        assert!(Codec::Raw.marshal(&vec![1u32, 2, 3]).is_err());
    }

    #[test]
    fn test_raw_unmarshal_bytes() {
        let input = serde_json::to_vec(&sample()).unwrap();
        let actual: Vec<u8> = Codec::Raw.unmarshal(&input).unwrap();
        assert_eq!(actual, input);
    }

    #[test]
    fn test_raw_unmarshal_into_string_fails() {
        let err = Codec::Raw.unmarshal::<String>(b"bar").unwrap_err();
        assert!(matches!(err, CodecError::Unmarshal { codec: Codec::Raw, .. }));
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(Codec::default(), Codec::Json);
        assert_eq!(Codec::Binary.to_string(), "binary");
        let parsed: Codec = serde_json::from_str("\"raw\"").unwrap();
        assert_eq!(parsed, Codec::Raw);
    }

    proptest! {
        /// Invariant: raw codec round-trip is identity for byte sequences.
        #[test]
        fn raw_round_trip_is_identity(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let encoded = Codec::Raw.marshal(&bytes).unwrap();
            prop_assert_eq!(&encoded, &bytes);
            let decoded: Vec<u8> = Codec::Raw.unmarshal(&encoded).unwrap();
            prop_assert_eq!(decoded, bytes);
        }

        /// Invariant: structured codecs preserve strings.
        #[test]
        fn structured_codecs_preserve_strings(s in ".*") {
            for codec in [Codec::Json, Codec::Binary] {
                let encoded = codec.marshal(&s).unwrap();
                let decoded: String = codec.unmarshal(&encoded).unwrap();
                prop_assert_eq!(&decoded, &s);
            }
        }
    }
}
