//! Descriptor-driven decoding over raw values.
//!
//! Used where no static type exists (handlers registered with explicit
//! descriptors, result checking of raw handlers). Accepts exactly the values
//! the static codec accepts and fails with the same errors; the output is the
//! normalized form the static codec would re-encode (declared field order,
//! unknown keys dropped, integral floats as integers).

use super::impls::{float_value, integral};
use super::{
    DecodeError, EncodeError, PrimitiveKind, RecordDescriptor, TypeDescriptor, CLASS_FIELD,
};
use crate::value::{kind_name, Map, Value};

/// Validate `value` against `descriptor` and return its normalized form.
pub fn conform(value: &Value, descriptor: &TypeDescriptor) -> Result<Value, DecodeError> {
    match descriptor {
        TypeDescriptor::Unit => match value {
            Value::Null | Value::Object(_) => Ok(Value::Object(Map::new())),
            other => Err(DecodeError::mismatch("unit", kind_name(other))),
        },
        TypeDescriptor::Json => Ok(value.clone()),
        TypeDescriptor::Primitive(kind) => conform_primitive(value, *kind),
        TypeDescriptor::Nullable(inner) => match value {
            Value::Null => Ok(Value::Null),
            other => conform(other, inner),
        },
        TypeDescriptor::Record(record) => {
            conform_record(value, record).map(Value::Object)
        }
        TypeDescriptor::Enum(e) => {
            let name = value.as_str().ok_or_else(|| {
                DecodeError::mismatch(format!("{} name", e.name), kind_name(value))
            })?;
            if e.variants.iter().any(|v| v == name) {
                Ok(value.clone())
            } else {
                Err(DecodeError::unknown_variant(&e.name, name))
            }
        }
        TypeDescriptor::Collection(element) => {
            let items = value
                .as_array()
                .ok_or_else(|| DecodeError::mismatch(descriptor.to_string(), kind_name(value)))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| conform(item, element).map_err(|e| e.within_index(i)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        TypeDescriptor::Map(key, val) => {
            let entries = value
                .as_array()
                .ok_or_else(|| DecodeError::mismatch(descriptor.to_string(), kind_name(value)))?;
            let mut seen: Vec<Value> = Vec::with_capacity(entries.len());
            let mut out = Vec::with_capacity(entries.len());
            for (i, entry) in entries.iter().enumerate() {
                let items = fixed_array(entry, 2, "pair").map_err(|e| e.within_index(i))?;
                let k = conform(&items[0], key).map_err(|e| e.within_index(0).within_index(i))?;
                let v = conform(&items[1], val).map_err(|e| e.within_index(1).within_index(i))?;
                if seen.contains(&k) {
                    return Err(DecodeError::duplicate_key(items[0].to_string()).within_index(i));
                }
                seen.push(k.clone());
                out.push(Value::Array(vec![k, v]));
            }
            Ok(Value::Array(out))
        }
        TypeDescriptor::Pair(a, b) => {
            let items = fixed_array(value, 2, "pair")?;
            Ok(Value::Array(vec![
                conform(&items[0], a).map_err(|e| e.within_index(0))?,
                conform(&items[1], b).map_err(|e| e.within_index(1))?,
            ]))
        }
        TypeDescriptor::Triple(a, b, c) => {
            let items = fixed_array(value, 3, "triple")?;
            Ok(Value::Array(vec![
                conform(&items[0], a).map_err(|e| e.within_index(0))?,
                conform(&items[1], b).map_err(|e| e.within_index(1))?,
                conform(&items[2], c).map_err(|e| e.within_index(2))?,
            ]))
        }
        TypeDescriptor::TaggedUnion(union) => {
            let object = value.as_object().ok_or_else(|| {
                DecodeError::mismatch(format!("{} object", union.name), kind_name(value))
            })?;
            let tag = match object.get(CLASS_FIELD) {
                None => return Err(DecodeError::missing_discriminator(&union.name)),
                Some(Value::String(tag)) => tag,
                Some(other) => {
                    return Err(DecodeError::mismatch("string", kind_name(other))
                        .within_field(CLASS_FIELD))
                }
            };
            let variant = union
                .variant(tag)
                .ok_or_else(|| DecodeError::unknown_variant(&union.name, tag.as_str()))?;
            let fields = conform_record(value, variant)?;
            let mut out = Map::new();
            out.insert(CLASS_FIELD.to_string(), Value::String(tag.clone()));
            out.extend(fields);
            Ok(Value::Object(out))
        }
        TypeDescriptor::GenericParam(name) => Err(DecodeError::unresolved(name)),
    }
}

/// Check a handler's raw result against its declared result descriptor.
pub fn conform_output(value: &Value, descriptor: &TypeDescriptor) -> Result<Value, EncodeError> {
    conform(value, descriptor).map_err(EncodeError::Mismatch)
}

fn fixed_array<'a>(value: &'a Value, len: usize, what: &str) -> Result<&'a [Value], DecodeError> {
    match value {
        Value::Array(items) if items.len() == len => Ok(items.as_slice()),
        Value::Array(items) => Err(DecodeError::arity(len, items.len())),
        other => Err(DecodeError::mismatch(what, kind_name(other))),
    }
}

fn conform_record(value: &Value, record: &RecordDescriptor) -> Result<Map<String, Value>, DecodeError> {
    let object = value.as_object().ok_or_else(|| {
        DecodeError::mismatch(format!("{} object", record.name), kind_name(value))
    })?;
    if let Some(missing) = record
        .fields
        .iter()
        .find(|field| !field.optional && !object.contains_key(&field.name))
    {
        return Err(DecodeError::missing_field(
            &record.name,
            &missing.name,
            missing.descriptor.to_string(),
        ));
    }
    let mut out = Map::new();
    for field in &record.fields {
        let Some(raw) = object.get(&field.name) else {
            continue;
        };
        let normalized = conform(raw, &field.descriptor).map_err(|e| e.within_field(&field.name))?;
        // Optional fields that are null are omitted, as on encode.
        if field.optional && normalized.is_null() {
            continue;
        }
        out.insert(field.name.clone(), normalized);
    }
    Ok(out)
}

fn conform_primitive(value: &Value, kind: PrimitiveKind) -> Result<Value, DecodeError> {
    match kind {
        PrimitiveKind::Bool => match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(DecodeError::mismatch(kind.name(), kind_name(other))),
        },
        PrimitiveKind::String => match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(DecodeError::mismatch(kind.name(), kind_name(other))),
        },
        PrimitiveKind::Char => {
            let text = value
                .as_str()
                .ok_or_else(|| DecodeError::mismatch(kind.name(), kind_name(value)))?;
            let count = text.chars().count();
            if count == 1 {
                Ok(value.clone())
            } else {
                Err(DecodeError::mismatch(
                    kind.name(),
                    format!("string of length {count}"),
                ))
            }
        }
        PrimitiveKind::F32 | PrimitiveKind::F64 => {
            let f = value
                .as_f64()
                .ok_or_else(|| DecodeError::mismatch(kind.name(), kind_name(value)))?;
            if kind == PrimitiveKind::F32 && f.abs() > f64::from(f32::MAX) {
                return Err(DecodeError::out_of_range(kind.name(), f.to_string()));
            }
            if value.is_f64() {
                float_value(f).map_err(|_| DecodeError::mismatch(kind.name(), "non-finite number"))
            } else {
                Ok(value.clone())
            }
        }
        PrimitiveKind::I8
        | PrimitiveKind::I16
        | PrimitiveKind::I32
        | PrimitiveKind::I64
        | PrimitiveKind::U8
        | PrimitiveKind::U16
        | PrimitiveKind::U32
        | PrimitiveKind::U64
        | PrimitiveKind::Timestamp => {
            let wide = integral(value, kind)?;
            if let Ok(signed) = i64::try_from(wide) {
                Ok(Value::from(signed))
            } else {
                u64::try_from(wide)
                    .map(Value::from)
                    .map_err(|_| DecodeError::out_of_range(kind.name(), wide.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FieldDescriptor, UnionDescriptor};
    use crate::value::json;
    use pretty_assertions::assert_eq;

    fn int() -> TypeDescriptor {
        TypeDescriptor::Primitive(PrimitiveKind::I64)
    }

    fn string() -> TypeDescriptor {
        TypeDescriptor::Primitive(PrimitiveKind::String)
    }

    fn pair_record() -> TypeDescriptor {
        TypeDescriptor::record(
            "Pair",
            vec![
                FieldDescriptor::required("a", int()),
                FieldDescriptor::required("b", string()),
            ],
        )
    }

    #[test]
    fn test_missing_field_identified() {
        let err = conform(&json!({"a": "x"}), &pair_record()).unwrap_err();
        assert_eq!(err.missing_field_name(), Some("b"));
    }

    #[test]
    fn test_record_normalized() {
        let out = conform(&json!({"b": "hi", "extra": 1, "a": 2.0}), &pair_record()).unwrap();
        assert_eq!(serde_json::to_string(&out).unwrap(), r#"{"a":2,"b":"hi"}"#);
    }

    #[test]
    fn test_nullable_null_vs_omitted() {
        let required = TypeDescriptor::record(
            "R",
            vec![FieldDescriptor::required("x", TypeDescriptor::nullable(int()))],
        );
        assert_eq!(conform(&json!({"x": null}), &required).unwrap(), json!({"x": null}));
        assert!(matches!(
            conform(&json!({}), &required),
            Err(DecodeError::MissingField { .. })
        ));

        let optional = TypeDescriptor::record(
            "O",
            vec![FieldDescriptor::optional("x", TypeDescriptor::nullable(int()))],
        );
        assert_eq!(conform(&json!({"x": null}), &optional).unwrap(), json!({}));
        assert_eq!(conform(&json!({}), &optional).unwrap(), json!({}));
    }

    #[test]
    fn test_union_by_discriminator() {
        let shape = TypeDescriptor::TaggedUnion(UnionDescriptor {
            name: "Shape".to_string(),
            type_args: Vec::new(),
            variants: vec![
                RecordDescriptor {
                    name: "Circle".to_string(),
                    type_args: Vec::new(),
                    fields: vec![FieldDescriptor::required("r", int())],
                },
                RecordDescriptor {
                    name: "Dot".to_string(),
                    type_args: Vec::new(),
                    fields: Vec::new(),
                },
            ],
        });
        // Structurally a Circle, but the discriminator is authoritative.
        let out = conform(&json!({"#class": "Dot", "r": 1}), &shape).unwrap();
        assert_eq!(out, json!({"#class": "Dot"}));

        assert!(matches!(
            conform(&json!({"r": 1}), &shape),
            Err(DecodeError::MissingDiscriminator { .. })
        ));
        assert!(matches!(
            conform(&json!({"#class": "Square"}), &shape),
            Err(DecodeError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_generic_param_unresolved() {
        let err = conform(&json!(1), &TypeDescriptor::GenericParam("T".to_string())).unwrap_err();
        assert!(matches!(err, DecodeError::Unresolved { .. }));
    }

    #[test]
    fn test_output_mismatch_is_encode_error() {
        let err = conform_output(&json!({"a": 1}), &pair_record()).unwrap_err();
        assert!(matches!(err, EncodeError::Mismatch(_)));
    }
}
