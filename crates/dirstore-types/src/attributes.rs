//! Attribute bundles.
//!
//! An [`Attributes`] bundle maps attribute ids to ordered, multi-valued
//! [`AttrValue`] lists. Bundles are stored next to every bound name and mark
//! directories as contexts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::duplicate::Duplicate;

/// A single attribute value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Bytes(Vec<u8>),
}

impl AttrValue {
    /// The string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer payload, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Ordered attribute bundle: attribute id -> values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    entries: BTreeMap<String, Vec<AttrValue>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style single-valued insert.
    pub fn with(mut self, id: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.put(id, value);
        self
    }

    /// Replace all values of `id` with a single value. Returns the previous
    /// values, if any.
    pub fn put(
        &mut self,
        id: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> Option<Vec<AttrValue>> {
        self.entries.insert(id.into(), vec![value.into()])
    }

    /// Append a value to `id`, creating the attribute if needed.
    pub fn add(&mut self, id: impl Into<String>, value: impl Into<AttrValue>) {
        self.entries.entry(id.into()).or_default().push(value.into());
    }

    pub fn get(&self, id: &str) -> Option<&[AttrValue]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    /// First value of `id`.
    pub fn first(&self, id: &str) -> Option<&AttrValue> {
        self.entries.get(id).and_then(|values| values.first())
    }

    pub fn remove(&mut self, id: &str) -> Option<Vec<AttrValue>> {
        self.entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[AttrValue])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl Duplicate for Attributes {
    fn duplicate(&self) -> Self {
        self.clone()
    }
}
