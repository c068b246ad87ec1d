//! Record types and shared record handles.

use crate::Fields;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A server-owned record: a flat set of named JSON fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Fields,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record holding the given fields.
    pub fn from_fields(fields: Fields) -> Self {
        Self { fields }
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field value, returning the previous one.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// All fields of the record.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Consume the record, returning its fields.
    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Fields> for Record {
    fn from(fields: Fields) -> Self {
        Self::from_fields(fields)
    }
}

/// Copy every field of `source` onto `target`.
///
/// Fields present only on `target` are left alone, so local additions survive
/// a merge unless the server sends the same field.
pub fn merge_fields_into(target: &mut Record, source: &Record) {
    for (field, value) in &source.fields {
        target.fields.insert(field.clone(), value.clone());
    }
}

/// Model constructor: turns raw payload fields into a record.
pub type Model = Arc<dyn Fn(Fields) -> Record + Send + Sync>;

/// The default model constructor, a shallow field copy.
pub fn default_model() -> Model {
    Arc::new(Record::from_fields)
}

/// A shared handle to a cached record.
///
/// Cloning the handle does not clone the record. Every clone observes updates
/// made by reconciliation, which writes through the lock instead of replacing
/// the record.
#[derive(Clone)]
pub struct ItemRef(Arc<RwLock<Record>>);

impl ItemRef {
    /// Wrap a record in a new handle.
    pub fn new(record: Record) -> Self {
        Self(Arc::new(RwLock::new(record)))
    }

    /// Lock the record for reading.
    ///
    /// Do not hold the guard across an await point that may settle a request
    /// on the same collection.
    pub fn read(&self) -> RwLockReadGuard<'_, Record> {
        self.0.read()
    }

    /// Lock the record for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Record> {
        self.0.write()
    }

    /// Clone a single field value.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.0.read().get(field).cloned()
    }

    /// Set a single field value.
    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.write().set(field, value)
    }

    /// Clone the current state of the record.
    pub fn snapshot(&self) -> Record {
        self.0.read().clone()
    }

    /// Merge `source` into this record in place.
    pub fn merge(&self, source: &Record) {
        merge_fields_into(&mut self.0.write(), source);
    }

    /// Whether both handles point at the same record.
    pub fn ptr_eq(&self, other: &ItemRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ItemRef").field(&*self.0.read()).finish()
    }
}
