//! Nested key index.
//!
//! Each key field is one level of the index. A composite key `[number, letter]`
//! is stored as `number -> letter -> value`.

use crate::key::{KeyPart, KeyValue};
use std::collections::HashMap;

struct Node<T> {
    value: Option<T>,
    children: HashMap<KeyPart, Node<T>>,
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            value: None,
            children: HashMap::new(),
        }
    }
}

/// Mapping from a [`KeyValue`] path to a value.
pub struct KeyIndex<T> {
    root: Node<T>,
    len: usize,
}

impl<T> KeyIndex<T> {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            root: Node::new(),
            len: 0,
        }
    }

    /// Look up the value at `key`. Absent if any level is missing.
    pub fn lookup(&self, key: &KeyValue) -> Option<&T> {
        let mut node = &self.root;
        for part in key.parts() {
            node = node.children.get(part)?;
        }
        node.value.as_ref()
    }

    /// Store `value` at `key`, creating intermediate levels as needed.
    ///
    /// Returns the value previously stored at that path.
    pub fn store(&mut self, key: &KeyValue, value: T) -> Option<T> {
        let mut node = &mut self.root;
        for part in key.parts() {
            node = node.children.entry(part.clone()).or_insert_with(Node::new);
        }
        let previous = node.value.replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Remove the value at `key`.
    ///
    /// Intermediate levels are left in place even when they become empty.
    pub fn remove(&mut self, key: &KeyValue) -> Option<T> {
        let mut node = &mut self.root;
        for part in key.parts() {
            node = node.children.get_mut(part)?;
        }
        let removed = node.value.take();
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    pub fn contains(&self, key: &KeyValue) -> bool {
        self.lookup(key).is_some()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for KeyIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
