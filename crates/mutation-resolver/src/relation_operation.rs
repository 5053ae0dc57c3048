// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::{Val, ValObject};
use indexmap::IndexMap;
use mutation_builder::config::{ExtraEntry, InputTypeConfig, Operation, TargetType};
use mutation_builder::naming::extra_field_name;
use mutation_builder::type_meta_registry::TypeMetaRegistry;

use crate::error::MutationExecutionError;

/// One relationship operation requested by a payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOperation {
    pub key: String,
    pub operation: Operation,
    /// The payload field the values came from
    pub input_field: String,
    pub values: Vec<Val>,
    /// Configuration for nested payloads; `None` when the values are bare identifiers
    pub nested_config: Option<InputTypeConfig>,
}

impl PlannedOperation {
    pub fn takes_ids(&self) -> bool {
        self.nested_config.is_none()
    }
}

/// The configuration to execute a nested payload of `entry` with: the configuration registered
/// for its input type, with the entry's own auto-context fields and extras mixed in.
pub fn nested_config(entry: &ExtraEntry, registry: &TypeMetaRegistry) -> Option<InputTypeConfig> {
    match &entry.target {
        TargetType::Id => None,
        TargetType::Named(type_name) => Some(registry.get(type_name).merge(&entry.config)),
        TargetType::Auto => Some(entry.config.clone()),
    }
}

/// Collect the operations the payload requests on the collection field `field`.
///
/// Only operations whose input field is present (and not null) in the payload are planned. A
/// single value where a list is expected is taken as a one-element list.
pub fn plan_operations(
    field: &str,
    entries: &IndexMap<String, ExtraEntry>,
    payload: &ValObject,
    registry: &TypeMetaRegistry,
) -> Result<Vec<PlannedOperation>, MutationExecutionError> {
    let mut planned = vec![];

    for (key, entry) in entries {
        let operation = entry.canonical_operation(key).ok_or_else(|| {
            MutationExecutionError::Generic(format!(
                "Unknown operation '{key}' on relationship '{field}'"
            ))
        })?;
        let input_field = extra_field_name(field, key, operation);

        let values = match payload.get(&input_field) {
            None | Some(Val::Null) => continue,
            Some(Val::List(values)) => values.clone(),
            Some(value) => vec![value.clone()],
        };

        planned.push(PlannedOperation {
            key: key.clone(),
            operation,
            input_field,
            values,
            nested_config: nested_config(entry, registry),
        });
    }

    Ok(planned)
}
