//! Reconciliation of server payloads into the local cache.
//!
//! # Algorithm
//!
//! For each incoming record:
//! 1. Build a record through the model constructor and derive its key
//! 2. If the index holds the key, merge into that record in place
//! 3. Else if a placeholder is pending for the key, merge into it, promote it
//!    into the index and append it to the ordered list
//! 4. Else index the new record and append it
//!
//! A full snapshot ([`Reconciler::apply_all`]) additionally evicts every
//! record whose key the payload did not mention. Only feed it complete
//! listings: a filtered listing evicts everything outside the filter.

use crate::error::{Error, Result};
use crate::index::KeyIndex;
use crate::key::{Key, KeyValue};
use crate::pending::{PendingRegistry, Promotion};
use crate::record::{ItemRef, Model};
use crate::Fields;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a single incoming record was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Applied {
    /// Merged into a record already in the index
    Updated,
    /// Merged into a pending placeholder, which joined the index
    Promoted,
    /// New record added to the index
    Inserted,
}

/// Counts produced by a full-snapshot reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub promoted: usize,
    pub evicted: usize,
}

impl ReconcileSummary {
    fn record(&mut self, applied: Applied) {
        match applied {
            Applied::Updated => self.updated += 1,
            Applied::Promoted => self.promoted += 1,
            Applied::Inserted => self.inserted += 1,
        }
    }
}

/// Applies server data to an index, a pending registry and an ordered list.
///
/// The reconciler borrows the cache state for the duration of one settlement;
/// it holds no state of its own.
pub struct Reconciler<'a> {
    key: &'a Key,
    model: &'a Model,
    index: &'a mut KeyIndex<ItemRef>,
    pending: &'a mut PendingRegistry,
    items: &'a mut Vec<ItemRef>,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over borrowed cache state.
    pub fn new(
        key: &'a Key,
        model: &'a Model,
        index: &'a mut KeyIndex<ItemRef>,
        pending: &'a mut PendingRegistry,
        items: &'a mut Vec<ItemRef>,
    ) -> Self {
        Self {
            key,
            model,
            index,
            pending,
            items,
        }
    }

    /// Apply one record payload and return the canonical record for its key.
    pub fn apply_one(&mut self, data: Value) -> Result<ItemRef> {
        let fields = expect_object(data)?;
        Ok(self.apply_fields(fields).0)
    }

    /// Apply a complete listing and evict every record it does not mention.
    ///
    /// The payload is validated up front; a malformed listing leaves the cache
    /// untouched.
    pub fn apply_all(&mut self, data: Value) -> Result<ReconcileSummary> {
        let rows = match data {
            Value::Array(rows) => rows,
            other => {
                return Err(Error::InvalidPayload(format!(
                    "expected an array of records, got {}",
                    json_type_name(&other)
                )))
            }
        };
        let rows = rows
            .into_iter()
            .map(expect_object)
            .collect::<Result<Vec<_>>>()?;

        let mut summary = ReconcileSummary::default();
        let mut confirmed: KeyIndex<()> = KeyIndex::new();

        for fields in rows {
            let (item, applied) = self.apply_fields(fields);
            summary.record(applied);
            let key = self.key.key_of(item.read().fields());
            confirmed.store(&key, ());
        }

        summary.evicted = self.evict_unconfirmed(&confirmed);

        tracing::debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            promoted = summary.promoted,
            evicted = summary.evicted,
            "Reconciled full listing"
        );

        Ok(summary)
    }

    /// Remove the record addressed by `fields`. No-op if it is not indexed.
    pub fn remove_one(&mut self, fields: &Fields) -> Option<ItemRef> {
        let key = self.key.key_of(fields);
        let removed = self.index.remove(&key)?;
        self.items.retain(|item| !item.ptr_eq(&removed));
        tracing::debug!(key = %key, "Removed record");
        Some(removed)
    }

    fn apply_fields(&mut self, fields: Fields) -> (ItemRef, Applied) {
        let incoming = (self.model)(fields);
        let key = self.key.key_of(incoming.fields());

        if let Some(existing) = self.index.lookup(&key) {
            existing.merge(&incoming);
            let existing = existing.clone();
            // A placeholder can only coexist with an indexed record if the
            // index was filled behind its back; the indexed record wins.
            self.pending.remove(&key);
            return (existing, Applied::Updated);
        }

        match self.pending.promote(&key, &incoming, self.index) {
            Some(Promotion::Promoted(item)) => {
                self.items.push(item.clone());
                (item, Applied::Promoted)
            }
            Some(Promotion::AlreadyIndexed(item)) => (item, Applied::Updated),
            None => {
                let item = ItemRef::new(incoming);
                self.index.store(&key, item.clone());
                self.items.push(item.clone());
                (item, Applied::Inserted)
            }
        }
    }

    fn evict_unconfirmed(&mut self, confirmed: &KeyIndex<()>) -> usize {
        let mut evicted: Vec<KeyValue> = Vec::new();
        let key = self.key;

        self.items.retain(|item| {
            let item_key = key.key_of(item.read().fields());
            if confirmed.contains(&item_key) {
                true
            } else {
                evicted.push(item_key);
                false
            }
        });

        for item_key in &evicted {
            self.index.remove(item_key);
        }
        evicted.len()
    }
}

fn expect_object(data: Value) -> Result<Fields> {
    match data {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::InvalidPayload(format!(
            "expected a record object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
