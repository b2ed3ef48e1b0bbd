//! Type descriptors: structural descriptions of static types.
//!
//! Descriptors are produced by `Codec::descriptor()` (usually derived) or built
//! by hand for handlers registered over raw values. Generic records carry
//! `GenericParam` leaves plus the concrete type arguments of the instantiation;
//! [`TypeDescriptor::resolved`] substitutes them.

use super::error::DescriptorError;
use super::CLASS_FIELD;
use std::collections::HashSet;
use std::fmt;

/// Primitive leaf kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Char,
    /// Instant encoded as epoch milliseconds.
    Timestamp,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "boolean",
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::String => "string",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Timestamp => "timestamp",
        }
    }

    /// Inclusive range for integral kinds.
    pub fn integer_range(self) -> Option<(i128, i128)> {
        let range = match self {
            PrimitiveKind::I8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            PrimitiveKind::I16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            PrimitiveKind::I32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            PrimitiveKind::I64 | PrimitiveKind::Timestamp => {
                (i128::from(i64::MIN), i128::from(i64::MAX))
            }
            PrimitiveKind::U8 => (0, i128::from(u8::MAX)),
            PrimitiveKind::U16 => (0, i128::from(u16::MAX)),
            PrimitiveKind::U32 => (0, i128::from(u32::MAX)),
            PrimitiveKind::U64 => (0, i128::from(u64::MAX)),
            _ => return None,
        };
        Some(range)
    }
}

/// One declared field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: String,
    pub descriptor: TypeDescriptor,
    /// Field may be omitted entirely (not just `null`).
    pub optional: bool,
}

impl FieldDescriptor {
    pub fn required(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            optional: true,
        }
    }
}

/// Named record with fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordDescriptor {
    pub name: String,
    /// Concrete type arguments, by parameter name.
    pub type_args: Vec<(String, TypeDescriptor)>,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Enumeration encoded by canonical variant name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumDescriptor {
    pub name: String,
    pub variants: Vec<String>,
}

/// Discriminated union; every variant is a record named by its tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnionDescriptor {
    pub name: String,
    pub type_args: Vec<(String, TypeDescriptor)>,
    pub variants: Vec<RecordDescriptor>,
}

impl UnionDescriptor {
    pub fn variant(&self, tag: &str) -> Option<&RecordDescriptor> {
        self.variants.iter().find(|v| v.name == tag)
    }
}

/// Structural description of a target static type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// No payload; encodes as `{}`.
    Unit,
    /// Any value, passed through untouched.
    Json,
    Primitive(PrimitiveKind),
    Nullable(Box<TypeDescriptor>),
    Record(RecordDescriptor),
    Enum(EnumDescriptor),
    Collection(Box<TypeDescriptor>),
    /// Encoded as an array of `[key, value]` pairs.
    Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
    Pair(Box<TypeDescriptor>, Box<TypeDescriptor>),
    Triple(Box<TypeDescriptor>, Box<TypeDescriptor>, Box<TypeDescriptor>),
    TaggedUnion(UnionDescriptor),
    GenericParam(String),
}

impl TypeDescriptor {
    pub fn nullable(inner: TypeDescriptor) -> Self {
        Self::Nullable(Box::new(inner))
    }

    pub fn collection(element: TypeDescriptor) -> Self {
        Self::Collection(Box::new(element))
    }

    pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    pub fn record(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self::Record(RecordDescriptor {
            name: name.into(),
            type_args: Vec::new(),
            fields,
        })
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Nullable(_) | Self::Json)
    }

    /// Substitute every `GenericParam` with the type argument supplied by the
    /// closest enclosing generic record or union.
    pub fn resolved(&self) -> TypeDescriptor {
        self.resolve_in(&[])
    }

    fn resolve_in(&self, env: &[(String, TypeDescriptor)]) -> TypeDescriptor {
        match self {
            Self::Unit | Self::Json | Self::Primitive(_) | Self::Enum(_) => self.clone(),
            Self::GenericParam(name) => env
                .iter()
                .find(|(param, _)| param == name)
                .map(|(_, arg)| arg.clone())
                .unwrap_or_else(|| self.clone()),
            Self::Nullable(inner) => Self::Nullable(Box::new(inner.resolve_in(env))),
            Self::Collection(inner) => Self::Collection(Box::new(inner.resolve_in(env))),
            Self::Map(key, value) => {
                Self::Map(Box::new(key.resolve_in(env)), Box::new(value.resolve_in(env)))
            }
            Self::Pair(a, b) => Self::Pair(Box::new(a.resolve_in(env)), Box::new(b.resolve_in(env))),
            Self::Triple(a, b, c) => Self::Triple(
                Box::new(a.resolve_in(env)),
                Box::new(b.resolve_in(env)),
                Box::new(c.resolve_in(env)),
            ),
            Self::Record(record) => Self::Record(resolve_record(record, env)),
            Self::TaggedUnion(union) => {
                let args = resolve_args(&union.type_args, env);
                let scope = if args.is_empty() { env } else { &args };
                Self::TaggedUnion(UnionDescriptor {
                    name: union.name.clone(),
                    variants: union
                        .variants
                        .iter()
                        .map(|variant| resolve_record(variant, scope))
                        .collect(),
                    type_args: args,
                })
            }
        }
    }

    /// Reject descriptors that cannot drive encoding or decoding.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let reject = |reason: String| Err(DescriptorError::new(self.to_string(), reason));
        match self {
            Self::Unit | Self::Json | Self::Primitive(_) => Ok(()),
            Self::GenericParam(name) => reject(format!("unresolved generic parameter {name}")),
            Self::Nullable(inner) if matches!(inner.as_ref(), Self::Nullable(_)) => {
                reject("nested nullable cannot tell an inner null from an outer one".to_string())
            }
            Self::Nullable(inner) | Self::Collection(inner) => inner.validate(),
            Self::Map(a, b) | Self::Pair(a, b) => {
                a.validate()?;
                b.validate()
            }
            Self::Triple(a, b, c) => {
                a.validate()?;
                b.validate()?;
                c.validate()
            }
            Self::Enum(e) => {
                if e.variants.is_empty() {
                    return reject("enum has no variants".to_string());
                }
                match first_duplicate(e.variants.iter().map(String::as_str)) {
                    Some(dup) => reject(format!("duplicate variant {dup}")),
                    None => Ok(()),
                }
            }
            Self::Record(record) => validate_record(record, false)
                .map_err(|reason| DescriptorError::new(self.to_string(), reason)),
            Self::TaggedUnion(union) => {
                if union.variants.is_empty() {
                    return reject("tagged union has no variants".to_string());
                }
                if let Some(dup) = first_duplicate(union.variants.iter().map(|v| v.name.as_str())) {
                    return reject(format!("duplicate variant {dup}"));
                }
                for variant in &union.variants {
                    validate_record(variant, true)
                        .map_err(|reason| DescriptorError::new(self.to_string(), reason))?;
                }
                Ok(())
            }
        }
    }
}

fn resolve_args(
    args: &[(String, TypeDescriptor)],
    env: &[(String, TypeDescriptor)],
) -> Vec<(String, TypeDescriptor)> {
    args.iter()
        .map(|(name, arg)| (name.clone(), arg.resolve_in(env)))
        .collect()
}

fn resolve_record(record: &RecordDescriptor, env: &[(String, TypeDescriptor)]) -> RecordDescriptor {
    let args = resolve_args(&record.type_args, env);
    let scope = if args.is_empty() { env } else { &args };
    RecordDescriptor {
        name: record.name.clone(),
        fields: record
            .fields
            .iter()
            .map(|field| FieldDescriptor {
                name: field.name.clone(),
                descriptor: field.descriptor.resolve_in(scope),
                optional: field.optional,
            })
            .collect(),
        type_args: args,
    }
}

fn validate_record(record: &RecordDescriptor, in_union: bool) -> Result<(), String> {
    if let Some(dup) = first_duplicate(record.fields.iter().map(|f| f.name.as_str())) {
        return Err(format!("duplicate field {dup} in {}", record.name));
    }
    if in_union && record.field(CLASS_FIELD).is_some() {
        return Err(format!("variant {} declares reserved field {CLASS_FIELD}", record.name));
    }
    for field in &record.fields {
        if field.optional && !field.descriptor.is_nullable() {
            return Err(format!(
                "optional field {} of {} must be nullable",
                field.name, record.name
            ));
        }
        field.descriptor.validate().map_err(|e| e.reason)?;
    }
    Ok(())
}

fn first_duplicate<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    names.into_iter().find(|name| !seen.insert(*name))
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[(String, TypeDescriptor)]) -> fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    write!(f, "<")?;
    for (i, (_, arg)) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ">")
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "unit"),
            Self::Json => write!(f, "json"),
            Self::Primitive(kind) => write!(f, "{}", kind.name()),
            Self::Nullable(inner) => write!(f, "{inner}?"),
            Self::Record(record) => {
                write!(f, "{}", record.name)?;
                write_args(f, &record.type_args)
            }
            Self::Enum(e) => write!(f, "{}", e.name),
            Self::Collection(inner) => write!(f, "List<{inner}>"),
            Self::Map(key, value) => write!(f, "Map<{key}, {value}>"),
            Self::Pair(a, b) => write!(f, "({a}, {b})"),
            Self::Triple(a, b, c) => write!(f, "({a}, {b}, {c})"),
            Self::TaggedUnion(union) => {
                write!(f, "{}", union.name)?;
                write_args(f, &union.type_args)
            }
            Self::GenericParam(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> TypeDescriptor {
        TypeDescriptor::Primitive(PrimitiveKind::I64)
    }

    fn string() -> TypeDescriptor {
        TypeDescriptor::Primitive(PrimitiveKind::String)
    }

    fn page_of(arg: TypeDescriptor) -> TypeDescriptor {
        TypeDescriptor::Record(RecordDescriptor {
            name: "Page".to_string(),
            type_args: vec![("T".to_string(), arg)],
            fields: vec![
                FieldDescriptor::required(
                    "items",
                    TypeDescriptor::collection(TypeDescriptor::GenericParam("T".to_string())),
                ),
                FieldDescriptor::required("total", int()),
            ],
        })
    }

    #[test]
    fn test_resolved_substitutes_params() {
        let resolved = page_of(string()).resolved();
        let TypeDescriptor::Record(record) = &resolved else {
            panic!("expected record");
        };
        assert_eq!(
            record.field("items").unwrap().descriptor,
            TypeDescriptor::collection(string())
        );
        assert!(resolved.validate().is_ok());
        assert_eq!(resolved.to_string(), "Page<string>");
    }

    #[test]
    fn test_nested_generic_scopes() {
        // Page<Page<i64>>: the inner record resolves T against its own args.
        let resolved = page_of(page_of(int())).resolved();
        let TypeDescriptor::Record(outer) = &resolved else {
            panic!("expected record");
        };
        let TypeDescriptor::Collection(inner) = &outer.field("items").unwrap().descriptor else {
            panic!("expected collection");
        };
        let TypeDescriptor::Record(inner) = inner.as_ref() else {
            panic!("expected record");
        };
        assert_eq!(
            inner.field("items").unwrap().descriptor,
            TypeDescriptor::collection(int())
        );
    }

    #[test]
    fn test_nested_nullable_rejected() {
        let nested = TypeDescriptor::nullable(TypeDescriptor::nullable(int()));
        let err = nested.validate().unwrap_err();
        assert!(err.reason.contains("nested nullable"), "{}", err.reason);

        let list = TypeDescriptor::nullable(TypeDescriptor::collection(TypeDescriptor::nullable(int())));
        assert!(list.validate().is_ok());
    }

    #[test]
    fn test_unresolved_param_rejected() {
        let free = TypeDescriptor::record(
            "Box",
            vec![FieldDescriptor::required(
                "inner",
                TypeDescriptor::GenericParam("T".to_string()),
            )],
        );
        let err = free.resolved().validate().unwrap_err();
        assert!(err.reason.contains("unresolved generic parameter T"));
    }

    #[test]
    fn test_duplicate_fields_rejected() {
        let dup = TypeDescriptor::record(
            "Dup",
            vec![
                FieldDescriptor::required("a", int()),
                FieldDescriptor::required("a", string()),
            ],
        );
        assert!(dup.validate().is_err());
    }

    #[test]
    fn test_optional_field_must_be_nullable() {
        let bad = TypeDescriptor::record("Bad", vec![FieldDescriptor::optional("a", int())]);
        assert!(bad.validate().is_err());

        let good = TypeDescriptor::record(
            "Good",
            vec![FieldDescriptor::optional("a", TypeDescriptor::nullable(int()))],
        );
        assert!(good.validate().is_ok());
    }

    #[test]
    fn test_empty_union_rejected() {
        let empty = TypeDescriptor::TaggedUnion(UnionDescriptor {
            name: "Shape".to_string(),
            type_args: Vec::new(),
            variants: Vec::new(),
        });
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeDescriptor::nullable(int()).to_string(), "i64?");
        assert_eq!(
            TypeDescriptor::map(string(), TypeDescriptor::collection(int())).to_string(),
            "Map<string, List<i64>>"
        );
        assert_eq!(
            TypeDescriptor::Pair(Box::new(int()), Box::new(string())).to_string(),
            "(i64, string)"
        );
    }
}
