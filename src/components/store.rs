//! In-memory entity store.
//!
//! One component per [`EntitySchema`]. Handlers are raw: their descriptors
//! are computed from the schema, so inbound bodies are conformed (type
//! checked, unknown keys dropped) before they reach the table. Table access
//! runs on the worker pool.

use crate::address::{self, DbOp, EntitySchema, ID_FIELD};
use crate::bus::{Component, Registrar, RequestContext};
use crate::codec::{descriptor_of, Codec, TypeDescriptor};
use crate::types::{Error, Result};
use crate::value::{Map, Value};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Argument of read, delete and the per-reference lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Codec)]
pub struct EntityId {
    pub id: u64,
}

/// Reply to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Codec)]
pub struct CountReply {
    pub count: u64,
}

type Record = Map<String, Value>;

#[derive(Debug, Default)]
struct Table {
    next_id: u64,
    rows: BTreeMap<u64, Record>,
}

#[derive(Debug)]
pub struct EntityStoreComponent {
    name: String,
    schema: EntitySchema,
    table: RwLock<Table>,
}

type StoreOp = fn(&EntityStoreComponent, Value) -> Result<Value>;

impl EntityStoreComponent {
    pub fn new(schema: EntitySchema) -> Result<Self> {
        schema.validate()?;
        Ok(Self {
            name: format!("store:{}", schema.name),
            schema,
            table: RwLock::new(Table::default()),
        })
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    fn read_table(&self) -> Result<RwLockReadGuard<'_, Table>> {
        self.table
            .read()
            .map_err(|_| Error::internal(format!("{} table lock poisoned", self.schema.name)))
    }

    fn write_table(&self) -> Result<RwLockWriteGuard<'_, Table>> {
        self.table
            .write()
            .map_err(|_| Error::internal(format!("{} table lock poisoned", self.schema.name)))
    }

    fn not_found(&self, id: u64) -> Error {
        Error::not_found(format!("{} {} not found", self.schema.name, id))
    }

    // =========================================================================
    // Operations (run on the worker pool)
    // =========================================================================

    fn create(&self, body: Value) -> Result<Value> {
        let fields = into_record(body)?;
        if fields.contains_key(ID_FIELD) {
            return Err(Error::bad_request(format!(
                "{} ids are assigned by the store",
                self.schema.name
            )));
        }

        let mut table = self.write_table()?;
        table.next_id += 1;
        let id = table.next_id;

        let mut record = Record::new();
        record.insert(ID_FIELD.to_string(), Value::from(id));
        record.extend(fields);
        table.rows.insert(id, record.clone());
        tracing::debug!("Created {} {}", self.schema.name, id);
        Ok(Value::Object(record))
    }

    fn read(&self, body: Value) -> Result<Value> {
        let EntityId { id } = EntityId::decode(&body)?;
        let table = self.read_table()?;
        table
            .rows
            .get(&id)
            .cloned()
            .map(Value::Object)
            .ok_or_else(|| self.not_found(id))
    }

    /// Merge the patch into the stored row. The patch arrives conformed, so
    /// an explicit `null` reads as "field not sent" and leaves the stored
    /// value in place; a patch cannot clear a field.
    fn update(&self, body: Value) -> Result<Value> {
        let mut patch = into_record(body)?;
        let id = patch
            .remove(ID_FIELD)
            .and_then(|id| id.as_u64())
            .ok_or_else(|| Error::bad_request(format!("{} update needs an id", self.schema.name)))?;

        let mut table = self.write_table()?;
        let row = table.rows.get_mut(&id).ok_or_else(|| self.not_found(id))?;
        for (field, value) in patch {
            row.insert(field, value);
        }
        tracing::debug!("Updated {} {}", self.schema.name, id);
        Ok(Value::Object(row.clone()))
    }

    fn delete(&self, body: Value) -> Result<Value> {
        let EntityId { id } = EntityId::decode(&body)?;
        let mut table = self.write_table()?;
        let removed = table.rows.remove(&id).ok_or_else(|| self.not_found(id))?;
        tracing::debug!("Deleted {} {}", self.schema.name, id);
        Ok(Value::Object(removed))
    }

    fn find(&self, body: Value) -> Result<Value> {
        let filter = into_record(body)?;
        let table = self.read_table()?;
        let found = table
            .rows
            .values()
            .filter(|row| matches(row, &filter))
            .cloned()
            .map(Value::Object)
            .collect();
        Ok(Value::Array(found))
    }

    fn count(&self, body: Value) -> Result<Value> {
        let filter = into_record(body)?;
        let table = self.read_table()?;
        let count = table.rows.values().filter(|row| matches(row, &filter)).count();
        Ok(CountReply {
            count: count as u64,
        }
        .encode()?)
    }

    fn read_for(&self, field: &str, body: Value) -> Result<Value> {
        let EntityId { id } = EntityId::decode(&body)?;
        let wanted = Value::from(id);
        let table = self.read_table()?;
        let found = table
            .rows
            .values()
            .filter(|row| row.get(field) == Some(&wanted))
            .cloned()
            .map(Value::Object)
            .collect();
        Ok(Value::Array(found))
    }

    fn offload(
        store: &Arc<Self>,
        op: StoreOp,
    ) -> impl Fn(Value, RequestContext) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static
    {
        let store = Arc::clone(store);
        move |body: Value, ctx: RequestContext| -> BoxFuture<'static, Result<Value>> {
            let store = Arc::clone(&store);
            Box::pin(async move { ctx.run_blocking(move || op(&store, body)).await })
        }
    }
}

impl Component for EntityStoreComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn register(self: Arc<Self>, registrar: &mut Registrar<'_>) -> Result<()> {
        let entity = self.schema.name.clone();
        let record = self.schema.record_descriptor();
        let records = TypeDescriptor::collection(record.clone());
        let patch = self.schema.patch_descriptor();
        let filter = self.schema.filter_descriptor();
        let id = descriptor_of::<EntityId>();
        let count = CountReply::descriptor();

        let operations: [(DbOp, &TypeDescriptor, &TypeDescriptor, StoreOp); 6] = [
            (DbOp::Create, &record, &record, Self::create),
            (DbOp::Read, &id, &record, Self::read),
            (DbOp::Update, &patch, &record, Self::update),
            (DbOp::Delete, &id, &record, Self::delete),
            (DbOp::Find, &filter, &records, Self::find),
            (DbOp::Count, &filter, &count, Self::count),
        ];
        for (op, argument, result, run) in operations {
            registrar.handle_raw(
                address::db(&entity, op),
                argument.clone(),
                result.clone(),
                Self::offload(&self, run),
            )?;
        }

        for reference in &self.schema.references {
            let store = Arc::clone(&self);
            let field = reference.field.clone();
            registrar.handle_raw(
                address::read_for(&entity, &reference.target),
                id.clone(),
                records.clone(),
                move |body: Value, ctx: RequestContext| {
                    let store = Arc::clone(&store);
                    let field = field.clone();
                    async move {
                        ctx.run_blocking(move || store.read_for(&field, body))
                            .await
                    }
                },
            )?;
        }
        Ok(())
    }
}

fn into_record(body: Value) -> Result<Record> {
    match body {
        Value::Object(record) => Ok(record),
        Value::Null => Ok(Record::new()),
        other => Err(Error::bad_request(format!(
            "expected an object, found {}",
            crate::value::kind_name(&other)
        ))),
    }
}

/// Query by example: every filter field equals the row's field.
fn matches(row: &Record, filter: &Record) -> bool {
    filter.iter().all(|(field, value)| row.get(field) == Some(value))
}
