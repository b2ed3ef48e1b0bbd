//! Built-in `Codec` implementations for std and chrono types.

use super::{Codec, DecodeError, EncodeError, PrimitiveKind, TypeDescriptor};
use crate::value::{kind_name, Map, Number, Value};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

/// Read an integral JSON number, accepting floats with a zero fraction.
pub(crate) fn integral(value: &Value, kind: PrimitiveKind) -> Result<i128, DecodeError> {
    let Value::Number(number) = value else {
        return Err(DecodeError::mismatch(kind.name(), kind_name(value)));
    };
    let wide = if let Some(i) = number.as_i64() {
        i128::from(i)
    } else if let Some(u) = number.as_u64() {
        i128::from(u)
    } else {
        match number.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e20 => f as i128,
            _ => {
                return Err(DecodeError::mismatch(
                    kind.name(),
                    format!("non-integral number {number}"),
                ))
            }
        }
    };
    match kind.integer_range() {
        Some((min, max)) if wide < min || wide > max => {
            Err(DecodeError::out_of_range(kind.name(), wide.to_string()))
        }
        _ => Ok(wide),
    }
}

pub(crate) fn float_value(f: f64) -> Result<Value, EncodeError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| EncodeError::non_encodable(format!("non-finite number {f}")))
}

impl Codec for bool {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Primitive(PrimitiveKind::Bool)
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        Ok(Value::Bool(*self))
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        value
            .as_bool()
            .ok_or_else(|| DecodeError::mismatch("boolean", kind_name(value)))
    }
}

macro_rules! integer_codec {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Codec for $ty {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::Primitive(PrimitiveKind::$kind)
            }

            fn encode(&self) -> Result<Value, EncodeError> {
                Ok(Value::from(*self))
            }

            fn decode(value: &Value) -> Result<Self, DecodeError> {
                let wide = integral(value, PrimitiveKind::$kind)?;
                <$ty>::try_from(wide).map_err(|_| {
                    DecodeError::out_of_range(PrimitiveKind::$kind.name(), wide.to_string())
                })
            }
        }
    )*};
}

integer_codec! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
}

impl Codec for f64 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Primitive(PrimitiveKind::F64)
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        float_value(*self)
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        value
            .as_f64()
            .ok_or_else(|| DecodeError::mismatch("f64", kind_name(value)))
    }
}

impl Codec for f32 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Primitive(PrimitiveKind::F32)
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        float_value(f64::from(*self))
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        let wide = value
            .as_f64()
            .ok_or_else(|| DecodeError::mismatch("f32", kind_name(value)))?;
        if wide.abs() > f64::from(f32::MAX) {
            return Err(DecodeError::out_of_range("f32", wide.to_string()));
        }
        Ok(wide as f32)
    }
}

impl Codec for String {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Primitive(PrimitiveKind::String)
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        Ok(Value::String(self.clone()))
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| DecodeError::mismatch("string", kind_name(value)))
    }
}

impl Codec for char {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Primitive(PrimitiveKind::Char)
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        Ok(Value::String(self.to_string()))
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        let text = value
            .as_str()
            .ok_or_else(|| DecodeError::mismatch("char", kind_name(value)))?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(DecodeError::mismatch(
                "char",
                format!("string of length {}", text.chars().count()),
            )),
        }
    }
}

impl Codec for () {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Unit
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        Ok(Value::Object(Map::new()))
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null | Value::Object(_) => Ok(()),
            other => Err(DecodeError::mismatch("unit", kind_name(other))),
        }
    }
}

impl<T: Codec> Codec for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::nullable(T::descriptor())
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        match self {
            Some(inner) => inner.encode(),
            None => Ok(Value::Null),
        }
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Null => Ok(None),
            other => T::decode(other).map(Some),
        }
    }
}

fn encode_seq<'a, T: Codec>(items: impl Iterator<Item = &'a T>) -> Result<Value, EncodeError> {
    items
        .enumerate()
        .map(|(i, item)| item.encode().map_err(|e| e.within_index(i)))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn decode_seq<'a, T: Codec>(
    value: &'a Value,
    expected: impl FnOnce() -> String,
) -> Result<impl Iterator<Item = Result<T, DecodeError>> + 'a, DecodeError> {
    let items = value
        .as_array()
        .ok_or_else(|| DecodeError::mismatch(expected(), kind_name(value)))?;
    Ok(items
        .iter()
        .enumerate()
        .map(|(i, item)| T::decode(item).map_err(|e| e.within_index(i))))
}

macro_rules! collection_codec {
    ($($coll:ident<T $(: $bound:ident $(+ $more:ident)*)?>),* $(,)?) => {$(
        impl<T: Codec $(+ $bound $(+ $more)*)?> Codec for $coll<T> {
            fn descriptor() -> TypeDescriptor {
                TypeDescriptor::collection(T::descriptor())
            }

            fn encode(&self) -> Result<Value, EncodeError> {
                encode_seq(self.iter())
            }

            fn decode(value: &Value) -> Result<Self, DecodeError> {
                decode_seq::<T>(value, || Self::descriptor().to_string())?.collect()
            }
        }
    )*};
}

collection_codec! {
    Vec<T>,
    VecDeque<T>,
    HashSet<T: Eq + Hash>,
    BTreeSet<T: Ord>,
}

fn encode_entries<'a, K: Codec, V: Codec>(
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) -> Result<Value, EncodeError> {
    entries
        .enumerate()
        .map(|(i, (key, value))| {
            let key = key.encode().map_err(|e| e.within_index(0).within_index(i))?;
            let value = value.encode().map_err(|e| e.within_index(1).within_index(i))?;
            Ok(Value::Array(vec![key, value]))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Decode an array of `[key, value]` pairs, calling `insert` for each; a
/// `false` return marks a duplicate key.
fn decode_entries<K: Codec, V: Codec>(
    value: &Value,
    expected: impl FnOnce() -> String,
    mut insert: impl FnMut(K, V) -> bool,
) -> Result<(), DecodeError> {
    let entries = value
        .as_array()
        .ok_or_else(|| DecodeError::mismatch(expected(), kind_name(value)))?;
    for (i, entry) in entries.iter().enumerate() {
        let (raw_key, raw_value) = pair_elements(entry).map_err(|e| e.within_index(i))?;
        let key = K::decode(raw_key).map_err(|e| e.within_index(0).within_index(i))?;
        let value = V::decode(raw_value).map_err(|e| e.within_index(1).within_index(i))?;
        if !insert(key, value) {
            return Err(DecodeError::duplicate_key(raw_key.to_string()).within_index(i));
        }
    }
    Ok(())
}

fn pair_elements(value: &Value) -> Result<(&Value, &Value), DecodeError> {
    match value {
        Value::Array(items) if items.len() == 2 => Ok((&items[0], &items[1])),
        Value::Array(items) => Err(DecodeError::arity(2, items.len())),
        other => Err(DecodeError::mismatch("pair", kind_name(other))),
    }
}

impl<K: Codec + Eq + Hash, V: Codec> Codec for HashMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(K::descriptor(), V::descriptor())
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        encode_entries(self.iter())
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        let mut map = HashMap::new();
        decode_entries(value, || Self::descriptor().to_string(), |k, v| {
            map.insert(k, v).is_none()
        })?;
        Ok(map)
    }
}

impl<K: Codec + Ord, V: Codec> Codec for BTreeMap<K, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(K::descriptor(), V::descriptor())
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        encode_entries(self.iter())
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        let mut map = BTreeMap::new();
        decode_entries(value, || Self::descriptor().to_string(), |k, v| {
            map.insert(k, v).is_none()
        })?;
        Ok(map)
    }
}

impl<A: Codec, B: Codec> Codec for (A, B) {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Pair(Box::new(A::descriptor()), Box::new(B::descriptor()))
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        Ok(Value::Array(vec![
            self.0.encode().map_err(|e| e.within_index(0))?,
            self.1.encode().map_err(|e| e.within_index(1))?,
        ]))
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        let (a, b) = pair_elements(value)?;
        Ok((
            A::decode(a).map_err(|e| e.within_index(0))?,
            B::decode(b).map_err(|e| e.within_index(1))?,
        ))
    }
}

impl<A: Codec, B: Codec, C: Codec> Codec for (A, B, C) {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Triple(
            Box::new(A::descriptor()),
            Box::new(B::descriptor()),
            Box::new(C::descriptor()),
        )
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        Ok(Value::Array(vec![
            self.0.encode().map_err(|e| e.within_index(0))?,
            self.1.encode().map_err(|e| e.within_index(1))?,
            self.2.encode().map_err(|e| e.within_index(2))?,
        ]))
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        let items = match value {
            Value::Array(items) if items.len() == 3 => items,
            Value::Array(items) => return Err(DecodeError::arity(3, items.len())),
            other => return Err(DecodeError::mismatch("triple", kind_name(other))),
        };
        Ok((
            A::decode(&items[0]).map_err(|e| e.within_index(0))?,
            B::decode(&items[1]).map_err(|e| e.within_index(1))?,
            C::decode(&items[2]).map_err(|e| e.within_index(2))?,
        ))
    }
}

impl<T: Codec> Codec for Box<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        self.as_ref().encode()
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        T::decode(value).map(Box::new)
    }

    fn redacted_fields() -> &'static [&'static str] {
        T::redacted_fields()
    }
}

impl<T: Codec> Codec for Arc<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        self.as_ref().encode()
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        T::decode(value).map(Arc::new)
    }

    fn redacted_fields() -> &'static [&'static str] {
        T::redacted_fields()
    }
}

impl Codec for Value {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Json
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        Ok(self.clone())
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        Ok(value.clone())
    }
}

impl Codec for Map<String, Value> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Json
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        Ok(Value::Object(self.clone()))
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        value
            .as_object()
            .cloned()
            .ok_or_else(|| DecodeError::mismatch("object", kind_name(value)))
    }
}

impl Codec for DateTime<Utc> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Primitive(PrimitiveKind::Timestamp)
    }

    fn encode(&self) -> Result<Value, EncodeError> {
        Ok(Value::from(self.timestamp_millis()))
    }

    fn decode(value: &Value) -> Result<Self, DecodeError> {
        let millis = integral(value, PrimitiveKind::Timestamp)?;
        i64::try_from(millis)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| DecodeError::out_of_range("timestamp", millis.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::json;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_integer_accepts_zero_fraction_float() {
        assert_eq!(i32::decode(&json!(4.0)).unwrap(), 4);
        assert!(matches!(
            i32::decode(&json!(4.5)),
            Err(DecodeError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_integer_range_checked() {
        assert!(matches!(
            u8::decode(&json!(256)),
            Err(DecodeError::OutOfRange { .. })
        ));
        assert!(matches!(
            u32::decode(&json!(-1)),
            Err(DecodeError::OutOfRange { .. })
        ));
        assert_eq!(u64::decode(&json!(u64::MAX)).unwrap(), u64::MAX);
    }

    #[test]
    fn test_non_finite_float_not_encodable() {
        assert!(f64::NAN.encode().is_err());
        assert!(f64::INFINITY.encode().is_err());
        assert_eq!(1.5f64.encode().unwrap(), json!(1.5));
    }

    #[test]
    fn test_unit_encodes_empty_object() {
        assert_eq!(().encode().unwrap(), json!({}));
        assert!(<()>::decode(&json!(null)).is_ok());
        assert!(<()>::decode(&json!([])).is_err());
    }

    #[test]
    fn test_char_requires_single_character() {
        assert_eq!(char::decode(&json!("x")).unwrap(), 'x');
        assert!(char::decode(&json!("xy")).is_err());
        assert!(char::decode(&json!("")).is_err());
    }

    #[test]
    fn test_map_encodes_as_pairs() {
        let mut map = BTreeMap::new();
        map.insert(2i64, "two".to_string());
        map.insert(1i64, "one".to_string());
        let encoded = map.encode().unwrap();
        assert_eq!(encoded, json!([[1, "one"], [2, "two"]]));
        assert_eq!(BTreeMap::<i64, String>::decode(&encoded).unwrap(), map);
    }

    #[test]
    fn test_map_duplicate_key_rejected() {
        let err = HashMap::<i64, String>::decode(&json!([[1, "a"], [1, "b"]])).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateKey { .. }));
        assert_eq!(err.path(), "$[1]");
    }

    #[test]
    fn test_collection_fails_on_first_bad_element() {
        let err = Vec::<i64>::decode(&json!([1, 2, "three", "four"])).unwrap_err();
        assert_eq!(err.path(), "$[2]");
    }

    #[test]
    fn test_tuple_arity() {
        assert_eq!(<(i64, String)>::decode(&json!([1, "a"])).unwrap(), (1, "a".to_string()));
        assert!(matches!(
            <(i64, String)>::decode(&json!([1])),
            Err(DecodeError::Arity { expected: 2, found: 1, .. })
        ));
        assert!(<(i64, i64, i64)>::decode(&json!([1, 2, 3])).is_ok());
    }

    #[test]
    fn test_timestamp_is_epoch_millis() {
        let instant = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(instant.encode().unwrap(), json!(1_700_000_000_123i64));
        assert_eq!(DateTime::<Utc>::decode(&json!(1_700_000_000_123i64)).unwrap(), instant);
    }

    #[test]
    fn test_option_null() {
        assert_eq!(Option::<i64>::decode(&json!(null)).unwrap(), None);
        assert_eq!(Option::<i64>::decode(&json!(3)).unwrap(), Some(3));
        assert_eq!(None::<i64>.encode().unwrap(), json!(null));
    }
}
