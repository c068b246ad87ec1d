//! Placeholder records requested before the server produced them.

use crate::index::KeyIndex;
use crate::key::KeyValue;
use crate::record::{ItemRef, Record};

/// Outcome of promoting a pending key into the main index.
#[derive(Debug, Clone)]
pub enum Promotion {
    /// The placeholder moved into the index and must be appended to the
    /// ordered list.
    Promoted(ItemRef),
    /// The index already held a record for the key. Incoming data was merged
    /// into that record and the placeholder was dropped.
    AlreadyIndexed(ItemRef),
}

impl Promotion {
    pub fn item(&self) -> &ItemRef {
        match self {
            Promotion::Promoted(item) | Promotion::AlreadyIndexed(item) => item,
        }
    }
}

/// Registry of placeholder records, keyed like the main index.
#[derive(Default)]
pub struct PendingRegistry {
    entries: KeyIndex<ItemRef>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: &KeyValue) -> Option<&ItemRef> {
        self.entries.lookup(key)
    }

    pub fn store(&mut self, key: &KeyValue, item: ItemRef) -> Option<ItemRef> {
        self.entries.store(key, item)
    }

    pub fn remove(&mut self, key: &KeyValue) -> Option<ItemRef> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move the placeholder at `key` into `index`, merging `incoming` onto it.
    ///
    /// Returns `None` when no placeholder exists for `key`. If `index` gained
    /// its own record for the key in the meantime, that record keeps its
    /// identity and receives the merge.
    pub fn promote(
        &mut self,
        key: &KeyValue,
        incoming: &Record,
        index: &mut KeyIndex<ItemRef>,
    ) -> Option<Promotion> {
        let placeholder = self.entries.remove(key)?;

        if let Some(existing) = index.lookup(key) {
            existing.merge(incoming);
            return Some(Promotion::AlreadyIndexed(existing.clone()));
        }

        placeholder.merge(incoming);
        index.store(key, placeholder.clone());
        Some(Promotion::Promoted(placeholder))
    }
}
