// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::debug;

use crate::config::InputTypeConfig;

static EMPTY_CONFIG: LazyLock<Arc<InputTypeConfig>> =
    LazyLock::new(|| Arc::new(InputTypeConfig::default()));

/// Input type name to the configuration that produced the type.
///
/// Written while schemas are built and read while nested payloads are executed. Create one per
/// mutation system and share it (`Arc`) between the builder and the resolvers.
#[derive(Debug, Default)]
pub struct TypeMetaRegistry {
    entries: RwLock<HashMap<String, Arc<InputTypeConfig>>>,
}

impl TypeMetaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `config` under `name`. The last registration wins.
    pub fn register(&self, name: &str, config: InputTypeConfig) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = entries.get(name) {
            if existing.as_ref() != &config {
                debug!(type_name = name, "Replacing the configuration of an input type");
            }
        }

        entries.insert(name.to_string(), Arc::new(config));
    }

    /// The configuration registered under `name`, or the empty configuration.
    pub fn get(&self, name: &str) -> Arc<InputTypeConfig> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_else(|| EMPTY_CONFIG.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtraEntry;

    #[test]
    fn unknown_names_are_empty() {
        let registry = TypeMetaRegistry::new();

        assert!(registry.get("CreateConcertInput").is_empty());
        assert!(!registry.contains("CreateConcertInput"));
        assert!(registry.is_empty());
    }

    #[test_log::test]
    fn last_write_wins() {
        let registry = TypeMetaRegistry::new();

        let first = InputTypeConfig::new().auto_context("organizer", "user");
        let second =
            InputTypeConfig::new().many_to_many_extra("artists", "add", ExtraEntry::id());

        registry.register("CreateConcertInput", first.clone());
        registry.register("CreateConcertInput", first.clone());
        assert_eq!(registry.get("CreateConcertInput").as_ref(), &first);

        registry.register("CreateConcertInput", second.clone());
        assert_eq!(registry.get("CreateConcertInput").as_ref(), &second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn shared_between_threads() {
        let registry = Arc::new(TypeMetaRegistry::new());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry.register(&format!("Type{i}"), InputTypeConfig::new());
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 4);
    }
}
