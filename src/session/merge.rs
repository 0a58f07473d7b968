// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Merging per-call values with session defaults

use std::fmt::Debug;
use std::hash::Hash;

use super::normalize::{KeyValues, OrderedMap};
use crate::error::{Error, Result};

/// A per-call value for one key.
///
/// `Unset` removes the key from the merged result, which is how a single
/// call drops a session-level default. A key that is simply not mentioned
/// inherits the session value.
#[derive(Debug, Clone, PartialEq)]
pub enum Override<V> {
    /// Use this value
    Set(V),
    /// Remove the key for this call
    Unset,
}

impl<V> Override<V> {
    /// The value, unless unset
    pub fn value(&self) -> Option<&V> {
        match self {
            Override::Set(v) => Some(v),
            Override::Unset => None,
        }
    }

    /// Consume into the value, unless unset
    pub fn into_value(self) -> Option<V> {
        match self {
            Override::Set(v) => Some(v),
            Override::Unset => None,
        }
    }

    /// Whether this is the delete marker
    pub fn is_unset(&self) -> bool {
        matches!(self, Override::Unset)
    }

    /// Map the contained value
    pub fn map<U, F: FnOnce(V) -> U>(self, f: F) -> Override<U> {
        match self {
            Override::Set(v) => Override::Set(f(v)),
            Override::Unset => Override::Unset,
        }
    }
}

impl<V> From<V> for Override<V> {
    fn from(value: V) -> Self {
        Override::Set(value)
    }
}

/// Dict-like input whose values may carry the delete marker
pub type Overrides<K, V> = KeyValues<K, Override<V>>;

/// Merge a per-call value into a session default.
///
/// Rules, in order:
/// 1. empty or absent default: the call value is returned untouched
/// 2. a plain-string call value is returned untouched
/// 3. empty or absent call value: the default is returned
/// 4. a plain-string default cannot be merged into, the call value wins
/// 5. otherwise the call's keys are laid over a copy of the default, and
///    keys set to [`Override::Unset`] are removed
pub fn merge<K, V>(
    local: Option<Overrides<K, V>>,
    default: Option<Overrides<K, V>>,
) -> Result<Option<Overrides<K, V>>>
where
    K: Hash + Eq + Clone + Debug,
{
    let default = match default {
        Some(d) if !d.is_empty() => d,
        _ => return Ok(local),
    };

    if local.as_ref().is_some_and(KeyValues::is_text) {
        return Ok(local);
    }

    let local = match local {
        Some(l) if !l.is_empty() => l,
        _ => return Ok(Some(default)),
    };

    if default.is_text() {
        return Ok(Some(local));
    }

    let mut merged = default.into_map()?;
    let local = local.into_map()?;

    let mut dead = Vec::new();
    for (key, value) in local {
        if value.is_unset() {
            dead.push(key.clone());
        }
        merged.insert(key, value);
    }

    for key in dead {
        if merged.shift_remove(&key).is_none() {
            return Err(Error::key_not_found(format!("{:?}", key)));
        }
    }

    Ok(Some(KeyValues::Map(merged)))
}

/// Plain override for scalar attributes: the call value wins when present.
pub fn merge_scalar<T>(local: Option<T>, default: Option<T>) -> Option<T> {
    local.or(default)
}

/// View a session mapping as overrides, for use as a merge default
pub fn as_overrides<K, V>(map: &OrderedMap<K, V>) -> Overrides<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    KeyValues::Map(
        map.iter()
            .map(|(k, v)| (k.clone(), Override::Set(v.clone())))
            .collect(),
    )
}

/// Collapse merged overrides into concrete values, dropping unset keys
pub fn resolve<K, V>(input: Option<Overrides<K, V>>) -> Result<OrderedMap<K, V>>
where
    K: Hash + Eq,
{
    let map = match input {
        Some(kv) => kv.into_map()?,
        None => return Ok(OrderedMap::new()),
    };
    Ok(map
        .into_iter()
        .filter_map(|(k, v)| v.into_value().map(|v| (k, v)))
        .collect())
}
