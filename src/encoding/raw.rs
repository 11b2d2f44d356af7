//! Raw byte passthrough codec.
//!
//! Stores byte sequences unchanged. Only values that serialize as bytes or
//! as a sequence of `u8` are accepted (`Vec<u8>`, `&[u8]`, `[u8; N]`, byte
//! buffer newtypes); everything else fails with [`RawError::NotBytes`].

use serde::de::value::SeqDeserializer;
use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::ser::{self, Impossible, Serialize, Serializer};
use std::fmt::Display;

/// Raw codec failure.
#[derive(Debug, thiserror::Error)]
pub enum RawError {
    /// Input to marshal is not a byte sequence.
    #[error("input to marshal not bytes")]
    NotBytes,

    /// Stored bytes cannot become the requested type.
    #[error("{0}")]
    Message(String),
}

impl ser::Error for RawError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Message(msg.to_string())
    }
}

impl de::Error for RawError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::Message(msg.to_string())
    }
}

pub(super) fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, RawError> {
    value.serialize(ByteSink)
}

pub(super) fn from_bytes<T: DeserializeOwned>(data: Vec<u8>) -> Result<T, RawError> {
    T::deserialize(ByteSource(data))
}

macro_rules! reject {
    ($($method:ident($($arg:ty),*) -> $ret:ty;)*) => {
        $(
            fn $method(self, $(_: $arg),*) -> Result<$ret, RawError> {
                Err(RawError::NotBytes)
            }
        )*
    };
}

/// Accepts a whole value, producing its bytes.
struct ByteSink;

impl Serializer for ByteSink {
    type Ok = Vec<u8>;
    type Error = RawError;
    type SerializeSeq = ByteSeq;
    type SerializeTuple = ByteSeq;
    type SerializeTupleStruct = Impossible<Vec<u8>, RawError>;
    type SerializeTupleVariant = Impossible<Vec<u8>, RawError>;
    type SerializeMap = Impossible<Vec<u8>, RawError>;
    type SerializeStruct = Impossible<Vec<u8>, RawError>;
    type SerializeStructVariant = Impossible<Vec<u8>, RawError>;

    fn serialize_bytes(self, v: &[u8]) -> Result<Vec<u8>, RawError> {
        Ok(v.to_vec())
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<ByteSeq, RawError> {
        Ok(ByteSeq(Vec::with_capacity(len.unwrap_or(0))))
    }

    fn serialize_tuple(self, len: usize) -> Result<ByteSeq, RawError> {
        Ok(ByteSeq(Vec::with_capacity(len)))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Vec<u8>, RawError> {
        value.serialize(self)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Vec<u8>, RawError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Vec<u8>, RawError> {
        Err(RawError::NotBytes)
    }

    reject! {
        serialize_bool(bool) -> Vec<u8>;
        serialize_i8(i8) -> Vec<u8>;
        serialize_i16(i16) -> Vec<u8>;
        serialize_i32(i32) -> Vec<u8>;
        serialize_i64(i64) -> Vec<u8>;
        serialize_u8(u8) -> Vec<u8>;
        serialize_u16(u16) -> Vec<u8>;
        serialize_u32(u32) -> Vec<u8>;
        serialize_u64(u64) -> Vec<u8>;
        serialize_f32(f32) -> Vec<u8>;
        serialize_f64(f64) -> Vec<u8>;
        serialize_char(char) -> Vec<u8>;
        serialize_str(&str) -> Vec<u8>;
        serialize_none() -> Vec<u8>;
        serialize_unit() -> Vec<u8>;
        serialize_unit_struct(&'static str) -> Vec<u8>;
        serialize_unit_variant(&'static str, u32, &'static str) -> Vec<u8>;
        serialize_tuple_struct(&'static str, usize) -> Impossible<Vec<u8>, RawError>;
        serialize_tuple_variant(&'static str, u32, &'static str, usize)
            -> Impossible<Vec<u8>, RawError>;
        serialize_map(Option<usize>) -> Impossible<Vec<u8>, RawError>;
        serialize_struct(&'static str, usize) -> Impossible<Vec<u8>, RawError>;
        serialize_struct_variant(&'static str, u32, &'static str, usize)
            -> Impossible<Vec<u8>, RawError>;
    }
}

/// Collects a `u8` sequence.
struct ByteSeq(Vec<u8>);

impl ser::SerializeSeq for ByteSeq {
    type Ok = Vec<u8>;
    type Error = RawError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), RawError> {
        self.0.push(value.serialize(ByteElement)?);
        Ok(())
    }

    fn end(self) -> Result<Vec<u8>, RawError> {
        Ok(self.0)
    }
}

impl ser::SerializeTuple for ByteSeq {
    type Ok = Vec<u8>;
    type Error = RawError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), RawError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Vec<u8>, RawError> {
        Ok(self.0)
    }
}

/// Accepts exactly one `u8`.
struct ByteElement;

impl Serializer for ByteElement {
    type Ok = u8;
    type Error = RawError;
    type SerializeSeq = Impossible<u8, RawError>;
    type SerializeTuple = Impossible<u8, RawError>;
    type SerializeTupleStruct = Impossible<u8, RawError>;
    type SerializeTupleVariant = Impossible<u8, RawError>;
    type SerializeMap = Impossible<u8, RawError>;
    type SerializeStruct = Impossible<u8, RawError>;
    type SerializeStructVariant = Impossible<u8, RawError>;

    fn serialize_u8(self, v: u8) -> Result<u8, RawError> {
        Ok(v)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<u8, RawError> {
        Err(RawError::NotBytes)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _value: &T,
    ) -> Result<u8, RawError> {
        Err(RawError::NotBytes)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<u8, RawError> {
        Err(RawError::NotBytes)
    }

    reject! {
        serialize_bool(bool) -> u8;
        serialize_i8(i8) -> u8;
        serialize_i16(i16) -> u8;
        serialize_i32(i32) -> u8;
        serialize_i64(i64) -> u8;
        serialize_u16(u16) -> u8;
        serialize_u32(u32) -> u8;
        serialize_u64(u64) -> u8;
        serialize_f32(f32) -> u8;
        serialize_f64(f64) -> u8;
        serialize_char(char) -> u8;
        serialize_str(&str) -> u8;
        serialize_bytes(&[u8]) -> u8;
        serialize_none() -> u8;
        serialize_unit() -> u8;
        serialize_unit_struct(&'static str) -> u8;
        serialize_unit_variant(&'static str, u32, &'static str) -> u8;
        serialize_seq(Option<usize>) -> Impossible<u8, RawError>;
        serialize_tuple(usize) -> Impossible<u8, RawError>;
        serialize_tuple_struct(&'static str, usize) -> Impossible<u8, RawError>;
        serialize_tuple_variant(&'static str, u32, &'static str, usize) -> Impossible<u8, RawError>;
        serialize_map(Option<usize>) -> Impossible<u8, RawError>;
        serialize_struct(&'static str, usize) -> Impossible<u8, RawError>;
        serialize_struct_variant(&'static str, u32, &'static str, usize)
            -> Impossible<u8, RawError>;
    }
}

/// Hands stored bytes to a visitor as a byte buffer or a `u8` sequence.
struct ByteSource(Vec<u8>);

impl<'de> Deserializer<'de> for ByteSource {
    type Error = RawError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RawError> {
        let mut seq = SeqDeserializer::<_, RawError>::new(self.0.into_iter());
        let value = visitor.visit_seq(&mut seq)?;
        seq.end()?;
        Ok(value)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RawError> {
        visitor.visit_byte_buf(self.0)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RawError> {
        visitor.visit_byte_buf(self.0)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, RawError> {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, RawError> {
        visitor.visit_newtype_struct(self)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        unit unit_struct seq tuple tuple_struct map struct enum identifier ignored_any
    }
}
