//! Codec Engine: type-directed conversion between domain values and the
//! Value Model.
//!
//! Every type that crosses the bus implements [`Codec`], usually through
//! `#[derive(Codec)]`. The implementation carries the type's
//! [`TypeDescriptor`] together with its encode/decode glue, so descriptors are
//! compile-time artifacts and no per-type code is written by hand.
//!
//! ```ignore
//! #[derive(Codec)]
//! struct Divide {
//!     a: i64,
//!     b: i64,
//! }
//!
//! #[derive(Codec)]
//! enum Shape {
//!     Circle { radius: f64 },
//!     Square { side: f64 },
//! }
//! // Shape::Circle { radius: 1.0 } <=> {"#class": "Circle", "radius": 1.0}
//! ```

mod cache;
mod conform;
mod descriptor;
mod error;
mod impls;

use crate::value::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

pub use cache::DescriptorCache;
pub use conform::{conform, conform_output};
pub use descriptor::{
    EnumDescriptor, FieldDescriptor, PrimitiveKind, RecordDescriptor, TypeDescriptor,
    UnionDescriptor,
};
pub use error::{DecodeError, DescriptorError, EncodeError};
pub use verticore_derive::Codec;

/// Discriminator key injected into tagged-union values.
pub const CLASS_FIELD: &str = "#class";

/// A type that can be encoded to and decoded from a [`Value`].
pub trait Codec: Sized + Send + Sync + 'static {
    /// Declared structure of the type.
    fn descriptor() -> TypeDescriptor;

    fn encode(&self) -> Result<Value, EncodeError>;

    fn decode(value: &Value) -> Result<Self, DecodeError>;

    /// Keys masked before a value of this type is logged.
    fn redacted_fields() -> &'static [&'static str] {
        &[]
    }
}

/// Encode a domain value.
pub fn encode<T: Codec>(value: &T) -> Result<Value, EncodeError> {
    value.encode()
}

/// Decode a domain value.
pub fn decode<T: Codec>(value: &Value) -> Result<T, DecodeError> {
    T::decode(value)
}

/// Resolved descriptor of `T`, with generic parameters substituted.
pub fn descriptor_of<T: Codec>() -> TypeDescriptor {
    T::descriptor().resolved()
}

/// Static name of a generic type parameter.
pub trait ParamName: 'static {
    const NAME: &'static str;
}

/// Placeholder for a type parameter inside a declared descriptor.
///
/// `#[derive(Codec)]` substitutes it for bare type parameters when building
/// the declared descriptor; it never holds data and refuses to encode or
/// decode.
pub struct Generic<P>(PhantomData<fn() -> P>);

impl<P: ParamName> Codec for Generic<P> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::GenericParam(P::NAME.to_string())
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        Err(EncodeError::non_encodable(format!(
            "unresolved generic parameter {}",
            P::NAME
        )))
    }

    fn decode(_value: &Value) -> Result<Self, DecodeError> {
        Err(DecodeError::unresolved(P::NAME))
    }
}

// Placeholders must satisfy whatever bounds a container puts on its
// parameters (map keys, set elements).
impl<P> Default for Generic<P> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<P> Clone for Generic<P> {
    fn clone(&self) -> Self {
        Self(PhantomData)
    }
}

impl<P> fmt::Debug for Generic<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Generic")
    }
}

impl<P> PartialEq for Generic<P> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<P> Eq for Generic<P> {}

impl<P> PartialOrd for Generic<P> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for Generic<P> {
    fn cmp(&self, _other: &Self) -> std::cmp::Ordering {
        std::cmp::Ordering::Equal
    }
}

impl<P> Hash for Generic<P> {
    fn hash<H: Hasher>(&self, _state: &mut H) {}
}

/// Helpers called by `#[derive(Codec)]` expansions.
#[doc(hidden)]
pub mod derive_support {
    use super::{Codec, DecodeError, EncodeError, CLASS_FIELD};
    use crate::value::{kind_name, Map, Value};

    static NULL: Value = Value::Null;

    pub fn expect_object<'a>(
        value: &'a Value,
        type_name: &str,
    ) -> Result<&'a Map<String, Value>, DecodeError> {
        value
            .as_object()
            .ok_or_else(|| DecodeError::mismatch(format!("{type_name} object"), kind_name(value)))
    }

    pub fn expect_unit(value: &Value, type_name: &str) -> Result<(), DecodeError> {
        match value {
            Value::Null | Value::Object(_) => Ok(()),
            other => Err(DecodeError::mismatch(type_name, kind_name(other))),
        }
    }

    pub fn expect_enum_name<'a>(value: &'a Value, type_name: &str) -> Result<&'a str, DecodeError> {
        value
            .as_str()
            .ok_or_else(|| DecodeError::mismatch(format!("{type_name} name"), kind_name(value)))
    }

    pub fn expect_tag<'a>(
        object: &'a Map<String, Value>,
        type_name: &str,
    ) -> Result<&'a str, DecodeError> {
        match object.get(CLASS_FIELD) {
            None => Err(DecodeError::missing_discriminator(type_name)),
            Some(Value::String(tag)) => Ok(tag),
            Some(other) => Err(DecodeError::mismatch("string", kind_name(other))
                .within_field(CLASS_FIELD)),
        }
    }

    pub fn require_field<T: Codec>(
        object: &Map<String, Value>,
        record: &str,
        field: &str,
    ) -> Result<(), DecodeError> {
        if object.contains_key(field) {
            Ok(())
        } else {
            Err(DecodeError::missing_field(
                record,
                field,
                T::descriptor().to_string(),
            ))
        }
    }

    /// Absent fields decode as `null`.
    pub fn decode_field<T: Codec>(
        object: &Map<String, Value>,
        field: &str,
    ) -> Result<T, DecodeError> {
        T::decode(object.get(field).unwrap_or(&NULL)).map_err(|e| e.within_field(field))
    }

    pub fn encode_field<T: Codec>(
        object: &mut Map<String, Value>,
        field: &str,
        value: &T,
    ) -> Result<(), EncodeError> {
        let encoded = value.encode().map_err(|e| e.within_field(field))?;
        object.insert(field.to_string(), encoded);
        Ok(())
    }
}
