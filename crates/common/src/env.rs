// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::Arc;

pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn enabled(&self, key: &str, default_value: bool) -> Result<bool, EnvError> {
        match self.get(key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" | "enabled" | "enable" => Ok(true),
                "false" | "0" | "no" | "off" | "disabled" | "disable" => Ok(false),
                _ => Err(EnvError::InvalidBoolean {
                    key: key.to_string(),
                    value,
                }),
            },
            None => Ok(default_value),
        }
    }

    fn get_or_else(&self, key: &str, default_value: &str) -> String {
        self.get(key).unwrap_or(default_value.to_string())
    }

    fn get_usize(&self, key: &str) -> Result<Option<usize>, EnvError> {
        self.get(key)
            .map(|value| {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| EnvError::InvalidNumber {
                        key: key.to_string(),
                        value,
                    })
            })
            .transpose()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error(
        "Invalid value for {key}: {value}. Expected true, 1, yes, on, enabled, enable OR false, 0, no, off, disabled, disable"
    )]
    InvalidBoolean { key: String, value: String },

    #[error("Invalid value for {key}: {value}. Expected a non-negative integer")]
    InvalidNumber { key: String, value: String },
}

pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Default)]
pub struct MapEnvironment {
    values: HashMap<String, String>,
    fallback: Option<Arc<dyn Environment>>,
}

impl Environment for MapEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| self.fallback.as_ref().and_then(|fb| fb.get(key)))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for MapEnvironment {
    fn from(values: [(&str, &str); N]) -> Self {
        Self {
            values: HashMap::from_iter(
                values
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string())),
            ),
            fallback: None,
        }
    }
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_fallback(fallback: Arc<dyn Environment>) -> Self {
        Self {
            values: HashMap::new(),
            fallback: Some(fallback),
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookups() {
        let env = MapEnvironment::from([("FLAG", "Yes"), ("SIZE", "25"), ("BAD", "many")]);

        assert!(env.enabled("FLAG", false).unwrap());
        assert!(!env.enabled("MISSING", false).unwrap());
        assert!(env.enabled("BAD", true).is_err());

        assert_eq!(env.get_usize("SIZE").unwrap(), Some(25));
        assert_eq!(env.get_usize("MISSING").unwrap(), None);
        assert!(env.get_usize("BAD").is_err());
    }

    #[test]
    fn fallback_is_consulted_last() {
        let base = Arc::new(MapEnvironment::from([("A", "base"), ("B", "base")]));
        let mut env = MapEnvironment::new_with_fallback(base);
        env.set("A", "override");

        assert_eq!(env.get("A").as_deref(), Some("override"));
        assert_eq!(env.get("B").as_deref(), Some("base"));
        assert_eq!(env.get_or_else("C", "default"), "default");
    }
}
