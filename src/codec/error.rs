//! Codec error types.
//!
//! Decode and encode errors carry the JSON path of the offending value
//! (`$.items[2].name`), built up as the error unwinds through records and
//! collections.

use thiserror::Error;

/// Inbound value does not match the expected type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("${path}: missing required field `{field}` of {record} (expected {expected})")]
    MissingField {
        path: String,
        record: String,
        field: String,
        expected: String,
    },

    #[error("${path}: expected {expected}, found {found}")]
    Mismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("${path}: unknown {type_name} variant `{value}`")]
    UnknownVariant {
        path: String,
        type_name: String,
        value: String,
    },

    #[error("${path}: {type_name} value has no `#class` discriminator")]
    MissingDiscriminator { path: String, type_name: String },

    #[error("${path}: {value} is out of range for {expected}")]
    OutOfRange {
        path: String,
        expected: String,
        value: String,
    },

    #[error("${path}: expected {expected} elements, found {found}")]
    Arity {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("${path}: duplicate map key {key}")]
    DuplicateKey { path: String, key: String },

    #[error("${path}: unresolved generic parameter {param}")]
    Unresolved { path: String, param: String },
}

impl DecodeError {
    pub fn missing_field(
        record: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::MissingField {
            path: String::new(),
            record: record.into(),
            field: field.into(),
            expected: expected.into(),
        }
    }

    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::Mismatch {
            path: String::new(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unknown_variant(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            path: String::new(),
            type_name: type_name.into(),
            value: value.into(),
        }
    }

    pub fn missing_discriminator(type_name: impl Into<String>) -> Self {
        Self::MissingDiscriminator {
            path: String::new(),
            type_name: type_name.into(),
        }
    }

    pub fn out_of_range(expected: impl Into<String>, value: impl Into<String>) -> Self {
        Self::OutOfRange {
            path: String::new(),
            expected: expected.into(),
            value: value.into(),
        }
    }

    pub fn arity(expected: usize, found: usize) -> Self {
        Self::Arity {
            path: String::new(),
            expected,
            found,
        }
    }

    pub fn duplicate_key(key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            path: String::new(),
            key: key.into(),
        }
    }

    pub fn unresolved(param: impl Into<String>) -> Self {
        Self::Unresolved {
            path: String::new(),
            param: param.into(),
        }
    }

    /// JSON path of the offending value, relative to the decoded root.
    pub fn path(&self) -> String {
        format!("${}", self.path_ref())
    }

    /// Name of the missing field, for `MissingField` errors.
    pub fn missing_field_name(&self) -> Option<&str> {
        match self {
            Self::MissingField { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Prefix the path with an object key.
    pub fn within_field(mut self, field: &str) -> Self {
        self.path_mut().insert_str(0, &format!(".{field}"));
        self
    }

    /// Prefix the path with an array index.
    pub fn within_index(mut self, index: usize) -> Self {
        self.path_mut().insert_str(0, &format!("[{index}]"));
        self
    }

    fn path_ref(&self) -> &str {
        match self {
            Self::MissingField { path, .. }
            | Self::Mismatch { path, .. }
            | Self::UnknownVariant { path, .. }
            | Self::MissingDiscriminator { path, .. }
            | Self::OutOfRange { path, .. }
            | Self::Arity { path, .. }
            | Self::DuplicateKey { path, .. }
            | Self::Unresolved { path, .. } => path,
        }
    }

    fn path_mut(&mut self) -> &mut String {
        match self {
            Self::MissingField { path, .. }
            | Self::Mismatch { path, .. }
            | Self::UnknownVariant { path, .. }
            | Self::MissingDiscriminator { path, .. }
            | Self::OutOfRange { path, .. }
            | Self::Arity { path, .. }
            | Self::DuplicateKey { path, .. }
            | Self::Unresolved { path, .. } => path,
        }
    }
}

/// Handler produced a value that cannot be encoded, or that does not match
/// its declared result type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("non-encodable value at ${path}: {reason}")]
    NonEncodable { path: String, reason: String },

    #[error("result does not match its declared type: {0}")]
    Mismatch(DecodeError),
}

impl EncodeError {
    pub fn non_encodable(reason: impl Into<String>) -> Self {
        Self::NonEncodable {
            path: String::new(),
            reason: reason.into(),
        }
    }

    pub fn within_field(self, field: &str) -> Self {
        match self {
            Self::NonEncodable { path, reason } => Self::NonEncodable {
                path: format!(".{field}{path}"),
                reason,
            },
            Self::Mismatch(inner) => Self::Mismatch(inner.within_field(field)),
        }
    }

    pub fn within_index(self, index: usize) -> Self {
        match self {
            Self::NonEncodable { path, reason } => Self::NonEncodable {
                path: format!("[{index}]{path}"),
                reason,
            },
            Self::Mismatch(inner) => Self::Mismatch(inner.within_index(index)),
        }
    }
}

/// Descriptor that cannot drive encoding or decoding. Raised at registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("non-encodable type {descriptor}: {reason}")]
pub struct DescriptorError {
    pub descriptor: String,
    pub reason: String,
}

impl DescriptorError {
    pub fn new(descriptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            reason: reason.into(),
        }
    }
}
