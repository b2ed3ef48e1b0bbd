//! Address naming scheme and static entity schemas.
//!
//! Storage addresses follow `verticore.db.<entity>.<op>`. An entity that
//! references another one additionally serves
//! `verticore.db.<entity>.read.for.<target>`, one address per reference,
//! registered once at start-up from the schema.

use crate::codec::{FieldDescriptor, PrimitiveKind, TypeDescriptor};
use crate::types::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DB_PREFIX: &str = "verticore.db";
pub const DEBUG_PREFIX: &str = "verticore.debug";

/// Field every stored record carries.
pub const ID_FIELD: &str = "id";

/// Diagnostics addresses.
pub mod debug {
    pub const PING: &str = "verticore.debug.ping";
    pub const ECHO: &str = "verticore.debug.echo";
    pub const ADDRESSES: &str = "verticore.debug.addresses";
    pub const STATS: &str = "verticore.debug.stats";
}

/// Storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbOp {
    Create,
    Read,
    Update,
    Delete,
    Find,
    Count,
}

impl DbOp {
    pub const ALL: [DbOp; 6] = [
        DbOp::Create,
        DbOp::Read,
        DbOp::Update,
        DbOp::Delete,
        DbOp::Find,
        DbOp::Count,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DbOp::Create => "create",
            DbOp::Read => "read",
            DbOp::Update => "update",
            DbOp::Delete => "delete",
            DbOp::Find => "find",
            DbOp::Count => "count",
        }
    }
}

/// `verticore.db.<entity>.<op>`
pub fn db(entity: &str, op: DbOp) -> String {
    format!("{DB_PREFIX}.{entity}.{}", op.as_str())
}

/// `verticore.db.<entity>.read.for.<target>`
pub fn read_for(entity: &str, target: &str) -> String {
    format!("{}.for.{target}", db(entity, DbOp::Read))
}

/// Scalar type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    Integer,
    Number,
    String,
    Timestamp,
    Json,
}

impl FieldType {
    pub fn descriptor(self) -> TypeDescriptor {
        match self {
            FieldType::Bool => TypeDescriptor::Primitive(PrimitiveKind::Bool),
            FieldType::Integer => TypeDescriptor::Primitive(PrimitiveKind::I64),
            FieldType::Number => TypeDescriptor::Primitive(PrimitiveKind::F64),
            FieldType::String => TypeDescriptor::Primitive(PrimitiveKind::String),
            FieldType::Timestamp => TypeDescriptor::Primitive(PrimitiveKind::Timestamp),
            FieldType::Json => TypeDescriptor::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default)]
    pub required: bool,
}

/// Foreign key: `field` holds the id of a `target` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub field: String,
    pub target: String,
}

/// Static description of one stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    pub fields: Vec<EntityField>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType, required: bool) -> Self {
        self.fields.push(EntityField {
            name: name.into(),
            ty,
            required,
        });
        self
    }

    /// Declare an integer field referencing `target`.
    pub fn reference(mut self, field: impl Into<String>, target: impl Into<String>) -> Self {
        let field = field.into();
        if !self.fields.iter().any(|f| f.name == field) {
            self.fields.push(EntityField {
                name: field.clone(),
                ty: FieldType::Integer,
                required: true,
            });
        }
        self.references.push(Reference {
            field,
            target: target.into(),
        });
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains('.') {
            return Err(Error::illegal_state(format!(
                "invalid entity name {:?}",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name == ID_FIELD {
                return Err(Error::illegal_state(format!(
                    "entity {} must not declare the {ID_FIELD} field",
                    self.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::illegal_state(format!(
                    "entity {} declares field {} twice",
                    self.name, field.name
                )));
            }
        }
        let mut targets = HashSet::new();
        for reference in &self.references {
            let declared = self.fields.iter().find(|f| f.name == reference.field);
            if !matches!(declared, Some(f) if f.ty == FieldType::Integer) {
                return Err(Error::illegal_state(format!(
                    "reference {}.{} must be a declared integer field",
                    self.name, reference.field
                )));
            }
            if !targets.insert(reference.target.as_str()) {
                return Err(Error::illegal_state(format!(
                    "entity {} references {} twice",
                    self.name, reference.target
                )));
            }
        }
        Ok(())
    }

    fn id_field(required: bool) -> FieldDescriptor {
        let id = TypeDescriptor::Primitive(PrimitiveKind::U64);
        if required {
            FieldDescriptor::required(ID_FIELD, id)
        } else {
            FieldDescriptor::optional(ID_FIELD, TypeDescriptor::nullable(id))
        }
    }

    fn optional_field(field: &EntityField) -> FieldDescriptor {
        FieldDescriptor::optional(&field.name, TypeDescriptor::nullable(field.ty.descriptor()))
    }

    /// Full record: `id` (absent before creation) plus declared fields.
    pub fn record_descriptor(&self) -> TypeDescriptor {
        let mut fields = vec![Self::id_field(false)];
        fields.extend(self.fields.iter().map(|field| {
            if field.required {
                FieldDescriptor::required(&field.name, field.ty.descriptor())
            } else {
                Self::optional_field(field)
            }
        }));
        TypeDescriptor::record(&self.name, fields)
    }

    /// Partial update: `id` plus any subset of fields.
    pub fn patch_descriptor(&self) -> TypeDescriptor {
        let mut fields = vec![Self::id_field(true)];
        fields.extend(self.fields.iter().map(Self::optional_field));
        TypeDescriptor::record(format!("{}Patch", self.name), fields)
    }

    /// Query by example: any subset of fields, `id` included.
    pub fn filter_descriptor(&self) -> TypeDescriptor {
        let mut fields = vec![Self::id_field(false)];
        fields.extend(self.fields.iter().map(Self::optional_field));
        TypeDescriptor::record(format!("{}Filter", self.name), fields)
    }

    /// Every address a store for this entity serves.
    pub fn addresses(&self) -> Vec<String> {
        DbOp::ALL
            .iter()
            .map(|op| db(&self.name, *op))
            .chain(
                self.references
                    .iter()
                    .map(|reference| read_for(&self.name, &reference.target)),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> EntitySchema {
        EntitySchema::new("submission")
            .field("revision", FieldType::String, true)
            .field("note", FieldType::String, false)
            .reference("project_id", "project")
            .reference("author_id", "denizen")
    }

    #[test]
    fn test_address_scheme() {
        assert_eq!(db("project", DbOp::Create), "verticore.db.project.create");
        assert_eq!(
            read_for("submission", "project"),
            "verticore.db.submission.read.for.project"
        );
    }

    #[test]
    fn test_computed_addresses_per_reference() {
        let addresses = submission().addresses();
        assert_eq!(addresses.len(), 8);
        assert!(addresses.contains(&"verticore.db.submission.read.for.project".to_string()));
        assert!(addresses.contains(&"verticore.db.submission.read.for.denizen".to_string()));
    }

    #[test]
    fn test_validate() {
        assert!(submission().validate().is_ok());
        assert!(EntitySchema::new("a.b").validate().is_err());
        assert!(EntitySchema::new("x")
            .field("id", FieldType::Integer, true)
            .validate()
            .is_err());
        assert!(EntitySchema::new("x")
            .reference("p", "project")
            .reference("q", "project")
            .validate()
            .is_err());

        let mut dangling = EntitySchema::new("x");
        dangling.references.push(Reference {
            field: "missing".to_string(),
            target: "y".to_string(),
        });
        assert!(dangling.validate().is_err());
    }

    #[test]
    fn test_descriptors_are_valid() {
        let schema = submission();
        for descriptor in [
            schema.record_descriptor(),
            schema.patch_descriptor(),
            schema.filter_descriptor(),
        ] {
            descriptor.validate().unwrap();
        }
    }

    #[test]
    fn test_schema_from_json() {
        let schema: EntitySchema = serde_json::from_str(
            r#"{"name": "project", "fields": [{"name": "title", "type": "string", "required": true}]}"#,
        )
        .unwrap();
        assert_eq!(schema.fields[0].ty, FieldType::String);
        assert!(schema.references.is_empty());
    }
}
