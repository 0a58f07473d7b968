// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Key/value normalization
//!
//! Every dict-like parameter a session accepts arrives as a [`KeyValues`]:
//! an ordered mapping, a sequence of `(key, value)` pairs, a view that can
//! list its items, or a plain string. [`normalize`] turns the first three
//! into an [`OrderedMap`] and rejects the string with a `Type` error.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Error, Result};

/// Insertion-ordered mapping used for every session attribute
pub type OrderedMap<K, V> = IndexMap<K, V>;

/// Anything that can list its `(key, value)` items.
///
/// Implemented for [`reqwest::header::HeaderMap`] so a prepared header map
/// can be passed wherever headers are accepted.
pub trait ItemsView<K, V>: Send + Sync {
    /// Snapshot of the items, in iteration order. Fails when an item has
    /// no representation as `(K, V)`.
    fn items(&self) -> Result<Vec<(K, V)>>;
}

/// A dict-like input in one of the accepted shapes
pub enum KeyValues<K, V> {
    /// Ordered mapping, used as-is
    Map(OrderedMap<K, V>),
    /// Sequence of pairs, later duplicates overwrite earlier values but keep
    /// the first-seen position
    Pairs(Vec<(K, V)>),
    /// Object exposing an items view, iterated once
    Items(Arc<dyn ItemsView<K, V>>),
    /// Plain string. Never merged key-wise and not convertible to a mapping.
    Text(String),
}

impl<K, V> KeyValues<K, V> {
    /// Wrap an items view
    pub fn items<I>(view: I) -> Self
    where
        I: ItemsView<K, V> + 'static,
    {
        KeyValues::Items(Arc::new(view))
    }

    /// Whether this is the plain-string shape
    pub fn is_text(&self) -> bool {
        matches!(self, KeyValues::Text(_))
    }

    /// The string, for the plain-string shape
    pub fn as_text(&self) -> Option<&str> {
        match self {
            KeyValues::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the input holds nothing.
    ///
    /// An items view is never reported empty: finding out would mean
    /// iterating it a second time.
    pub fn is_empty(&self) -> bool {
        match self {
            KeyValues::Map(m) => m.is_empty(),
            KeyValues::Pairs(p) => p.is_empty(),
            KeyValues::Items(_) => false,
            KeyValues::Text(s) => s.is_empty(),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            KeyValues::Map(_) => "mapping",
            KeyValues::Pairs(_) => "pair sequence",
            KeyValues::Items(_) => "items view",
            KeyValues::Text(_) => "string",
        }
    }
}

impl<K: Hash + Eq, V> KeyValues<K, V> {
    /// Convert into an ordered mapping
    pub fn into_map(self) -> Result<OrderedMap<K, V>> {
        match self {
            KeyValues::Map(map) => Ok(map),
            KeyValues::Pairs(pairs) => Ok(pairs.into_iter().collect()),
            KeyValues::Items(view) => Ok(view.items()?.into_iter().collect()),
            KeyValues::Text(_) => Err(Error::type_error(
                "cannot build a mapping from a string; expected a mapping, \
                 a sequence of pairs or an items view",
            )),
        }
    }
}

/// Normalize an optional dict-like input. Absent input becomes an empty map.
pub fn normalize<K: Hash + Eq, V>(input: Option<KeyValues<K, V>>) -> Result<OrderedMap<K, V>> {
    match input {
        None => Ok(OrderedMap::new()),
        Some(kv) => kv.into_map(),
    }
}

/// Normalize a JSON value: `null`, an object, or an array of `[key, value]`
/// pairs with string keys.
pub fn normalize_json(value: Value) -> Result<OrderedMap<String, Value>> {
    match value {
        Value::Null => Ok(OrderedMap::new()),
        Value::Object(obj) => Ok(obj.into_iter().collect()),
        Value::Array(items) => {
            let mut map = OrderedMap::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Array(mut pair) if pair.len() == 2 => {
                        let value = pair.pop().unwrap_or(Value::Null);
                        match pair.pop() {
                            Some(Value::String(key)) => {
                                map.insert(key, value);
                            }
                            other => {
                                return Err(Error::type_error(format!(
                                    "pair key must be a string, got {}",
                                    json_kind(other.as_ref().unwrap_or(&Value::Null))
                                )))
                            }
                        }
                    }
                    other => {
                        return Err(Error::type_error(format!(
                            "expected a 2-element [key, value] pair, got {}",
                            json_kind(&other)
                        )))
                    }
                }
            }
            Ok(map)
        }
        other => Err(Error::type_error(format!(
            "cannot build a mapping from a JSON {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl<K: Clone, V: Clone> Clone for KeyValues<K, V> {
    fn clone(&self) -> Self {
        match self {
            KeyValues::Map(m) => KeyValues::Map(m.clone()),
            KeyValues::Pairs(p) => KeyValues::Pairs(p.clone()),
            KeyValues::Items(v) => KeyValues::Items(Arc::clone(v)),
            KeyValues::Text(s) => KeyValues::Text(s.clone()),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for KeyValues<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValues::Map(m) => f.debug_tuple("Map").field(m).finish(),
            KeyValues::Pairs(p) => f.debug_tuple("Pairs").field(p).finish(),
            KeyValues::Items(_) => f.write_str("Items(..)"),
            KeyValues::Text(s) => f.debug_tuple("Text").field(s).finish(),
        }
    }
}

impl<K, V> Default for KeyValues<K, V> {
    fn default() -> Self {
        KeyValues::Map(OrderedMap::new())
    }
}

impl<K, V> From<OrderedMap<K, V>> for KeyValues<K, V> {
    fn from(map: OrderedMap<K, V>) -> Self {
        KeyValues::Map(map)
    }
}

impl<K, V> From<Vec<(K, V)>> for KeyValues<K, V> {
    fn from(pairs: Vec<(K, V)>) -> Self {
        KeyValues::Pairs(pairs)
    }
}

impl<K, V> From<String> for KeyValues<K, V> {
    fn from(s: String) -> Self {
        KeyValues::Text(s)
    }
}

impl<K, V> From<&str> for KeyValues<K, V> {
    fn from(s: &str) -> Self {
        KeyValues::Text(s.to_string())
    }
}

impl<K, V> fmt::Display for KeyValues<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.shape())
    }
}
