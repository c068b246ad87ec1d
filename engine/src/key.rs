//! Key derivation for single and composite record keys.
//!
//! A [`Key`] names the ordered fields that identify a record. [`Key::key_of`]
//! reads those fields off a record (or a partial record) and produces a
//! [`KeyValue`], the path used by [`crate::KeyIndex`].

use crate::error::{Error, Result};
use crate::record::{ItemRef, Record};
use crate::Fields;
use serde_json::Value;
use std::fmt;

/// One component of a key value.
///
/// Values compare by their textual form, so the number `1` and the string
/// `"1"` address the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    /// The key field was absent from the input.
    Missing,
    /// Textual form of the field value.
    Text(String),
}

impl KeyPart {
    /// Derive a key part from an optional field value.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None => KeyPart::Missing,
            Some(Value::String(s)) => KeyPart::Text(s.clone()),
            Some(other) => KeyPart::Text(other.to_string()),
        }
    }

    /// Whether the field was present.
    pub fn is_present(&self) -> bool {
        matches!(self, KeyPart::Text(_))
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Missing => write!(f, "<missing>"),
            KeyPart::Text(text) => write!(f, "{}", text),
        }
    }
}

/// A concrete key: the ordered values of a record's key fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyValue(Vec<KeyPart>);

impl KeyValue {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Whether every key field was present.
    pub fn is_complete(&self) -> bool {
        self.0.iter().all(KeyPart::is_present)
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

/// Input accepted wherever a record is addressed by key.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// A bare key value. Only meaningful for single-field keys; on composite
    /// keys it addresses the first key field.
    Scalar(Value),
    /// A full or partial record.
    Fields(Fields),
}

impl From<Value> for Selector {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Selector::Fields(fields),
            other => Selector::Scalar(other),
        }
    }
}

impl From<Fields> for Selector {
    fn from(fields: Fields) -> Self {
        Selector::Fields(fields)
    }
}

impl From<Record> for Selector {
    fn from(record: Record) -> Self {
        Selector::Fields(record.into_fields())
    }
}

impl From<&Record> for Selector {
    fn from(record: &Record) -> Self {
        Selector::Fields(record.fields().clone())
    }
}

impl From<&ItemRef> for Selector {
    fn from(item: &ItemRef) -> Self {
        Selector::Fields(item.read().fields().clone())
    }
}

impl From<&str> for Selector {
    fn from(value: &str) -> Self {
        Selector::Scalar(Value::String(value.to_string()))
    }
}

impl From<String> for Selector {
    fn from(value: String) -> Self {
        Selector::Scalar(Value::String(value))
    }
}

macro_rules! scalar_selector {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Selector {
                fn from(value: $ty) -> Self {
                    Selector::Scalar(Value::from(value))
                }
            }
        )*
    };
}

scalar_selector!(i32, i64, u32, u64, bool);

/// The declared key of a collection: one or more field names, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    fields: Vec<String>,
}

impl Key {
    /// Create a key from an ordered list of field names.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(Error::EmptyKey);
        }
        Ok(Self { fields })
    }

    /// Create a single-field key.
    pub fn single(field: impl Into<String>) -> Self {
        Self {
            fields: vec![field.into()],
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }

    /// Read the key fields off a record or partial record.
    ///
    /// Absent fields yield [`KeyPart::Missing`] in their position.
    pub fn key_of(&self, fields: &Fields) -> KeyValue {
        KeyValue(
            self.fields
                .iter()
                .map(|name| KeyPart::from_value(fields.get(name)))
                .collect(),
        )
    }

    /// Turn a selector into record fields.
    ///
    /// A bare scalar is wrapped into an object under the first key field.
    /// Objects pass through unchanged.
    pub fn normalize(&self, selector: Selector) -> Fields {
        match selector {
            Selector::Fields(fields) => fields,
            Selector::Scalar(value) => {
                let mut fields = Fields::new();
                fields.insert(self.fields[0].clone(), value);
                fields
            }
        }
    }
}

impl Default for Key {
    fn default() -> Self {
        Self::single("id")
    }
}
