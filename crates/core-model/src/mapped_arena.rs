// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A wrapper around a `typed_generational_arena::Arena` that also provides lookup by name.
//!
//! Entities, generated input types and enum types are all referred to by name in declarations
//! (`venue: Venue`, `type: "CreateConcertInput"`) but by index once built. `MappedArena` keeps
//! both views: an arena for stable indices and a map from name to index.

use std::collections::HashMap;
use std::ops;

use serde::{Deserialize, Serialize};

use typed_generational_arena::{Arena, IgnoreGeneration, Index};

pub type SerializableSlab<T> = Arena<T, usize, IgnoreGeneration>;
pub type SerializableSlabIndex<T> = Index<T, usize, IgnoreGeneration>;

/// A placeholder index for values whose target is resolved in a later pass.
///
/// Using it before resolution panics on index, which surfaces ordering bugs early.
pub fn shallow_index<T>() -> SerializableSlabIndex<T> {
    SerializableSlabIndex::from_idx(usize::MAX)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MappedArena<V> {
    values: SerializableSlab<V>,
    map: HashMap<String, SerializableSlabIndex<V>>,
    /// Names in insertion order (the arena alone doesn't remember names)
    names: Vec<String>,
}

impl<V> MappedArena<V> {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get_id(&self, key: &str) -> Option<SerializableSlabIndex<V>> {
        self.map.get(key).copied()
    }

    pub fn get_by_key(&self, key: &str) -> Option<&V> {
        self.get_id(key).map(|id| &self[id])
    }

    /// Add a value under `key` unless one is already present, returning the index of the value
    /// stored under `key` either way.
    pub fn add(&mut self, key: &str, value: V) -> SerializableSlabIndex<V> {
        if let Some(existing) = self.get_id(key) {
            return existing;
        }

        let id = self.values.insert(value);
        self.map.insert(key.to_string(), id);
        self.names.push(key.to_string());
        id
    }

    /// Store `value` under `key`, replacing any existing value in place (its index is kept).
    pub fn upsert(&mut self, key: &str, value: V) -> SerializableSlabIndex<V> {
        match self.get_id(key) {
            Some(existing) => {
                self.values[existing] = value;
                existing
            }
            None => self.add(key, value),
        }
    }

    pub fn iter(&self) -> typed_generational_arena::Iter<'_, V, usize, IgnoreGeneration> {
        self.values.iter()
    }

    /// Values paired with their names, in insertion order.
    pub fn named_values(&self) -> impl Iterator<Item = (&str, &V)> {
        self.names
            .iter()
            .filter_map(|name| self.get_by_key(name).map(|value| (name.as_str(), value)))
    }
}

impl<V> Default for MappedArena<V> {
    fn default() -> Self {
        MappedArena {
            values: SerializableSlab::new(),
            map: HashMap::default(),
            names: Vec::new(),
        }
    }
}

impl<V> ops::Index<SerializableSlabIndex<V>> for MappedArena<V> {
    type Output = V;

    #[inline]
    fn index(&self, id: SerializableSlabIndex<V>) -> &V {
        &self.values[id]
    }
}

impl<V> ops::IndexMut<SerializableSlabIndex<V>> for MappedArena<V> {
    #[inline]
    fn index_mut(&mut self, id: SerializableSlabIndex<V>) -> &mut V {
        &mut self.values[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_keeps_first_value() {
        let mut arena = MappedArena::default();

        let first = arena.add("Concert", 1);
        let second = arena.add("Concert", 2);

        assert_eq!(first, second);
        assert_eq!(arena.get_by_key("Concert"), Some(&1));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut arena = MappedArena::default();

        let venue = arena.add("Venue", "shallow");
        arena.add("Concert", "concert");
        let replaced = arena.upsert("Venue", "expanded");

        assert_eq!(venue, replaced);
        assert_eq!(arena[venue], "expanded");

        let names: Vec<_> = arena.named_values().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Venue", "Concert"]);
    }
}
