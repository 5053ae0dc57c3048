// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use async_trait::async_trait;
use common::context::RequestContext;
use common::value::{Val, ValObject};
use core_model::types::EntityType;
use graph_store::Record;
use indexmap::IndexMap;

use crate::error::MutationExecutionError;

/// Replaces the default coercion of one payload field: receives the raw value, the payload it
/// came from and the request context, and returns the value to store.
pub type FieldHandler =
    Arc<dyn Fn(&Val, &ValObject, &RequestContext) -> Result<Val, MutationExecutionError> + Send + Sync>;

/// Checks one top-level payload field before anything is written.
pub type FieldValidator =
    Arc<dyn Fn(&Val, &ValObject, &RequestContext) -> Result<(), MutationExecutionError> + Send + Sync>;

/// Field handlers by field name. Handlers apply at every nesting level of a mutation.
#[derive(Clone, Default)]
pub struct FieldHandlers {
    handlers: IndexMap<String, FieldHandler>,
}

impl FieldHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, field: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Val, &ValObject, &RequestContext) -> Result<Val, MutationExecutionError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(field.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldHandler> {
        self.handlers.get(field)
    }
}

#[derive(Clone, Default)]
pub struct FieldValidators {
    validators: IndexMap<String, FieldValidator>,
}

impl FieldValidators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, field: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Val, &ValObject, &RequestContext) -> Result<(), MutationExecutionError>
            + Send
            + Sync
            + 'static,
    {
        self.validators.insert(field.into(), Arc::new(validator));
        self
    }

    /// Run the validator of every field present in `payload`, in payload order.
    pub fn validate(
        &self,
        payload: &ValObject,
        context: &RequestContext,
    ) -> Result<(), MutationExecutionError> {
        for (field, value) in payload {
            if let Some(validator) = self.validators.get(field) {
                validator(value, payload, context)?;
            }
        }
        Ok(())
    }
}

/// Lifecycle hooks of a mutation. Every method has a pass-through default.
///
/// Hooks run in this order: `before_mutate`, `get_permissions`, `check_permissions`, field
/// validators, `validate`, then (inside the transaction) `before_save` on the top-level row, and
/// finally `after_mutate` once the transaction has committed.
#[async_trait]
pub trait MutationHooks: Send + Sync {
    /// Rewrite the mutation arguments before anything else looks at them.
    async fn before_mutate(
        &self,
        arguments: ValObject,
        _context: &RequestContext,
    ) -> Result<ValObject, MutationExecutionError> {
        Ok(arguments)
    }

    fn get_permissions(
        &self,
        _arguments: &ValObject,
        _context: &RequestContext,
        declared: &[String],
    ) -> Vec<String> {
        declared.to_vec()
    }

    fn check_permissions(
        &self,
        context: &RequestContext,
        permissions: &[String],
    ) -> Result<(), MutationExecutionError> {
        if context.user().has_perms(permissions) {
            Ok(())
        } else {
            Err(MutationExecutionError::Authorization)
        }
    }

    async fn validate(
        &self,
        _arguments: &ValObject,
        _context: &RequestContext,
    ) -> Result<(), MutationExecutionError> {
        Ok(())
    }

    /// Adjust the attributes of the top-level row right before they are written. `inputs` is
    /// the row's payload, with input fields the entity doesn't have replaced by their field
    /// handler's result.
    async fn before_save(
        &self,
        _entity: &EntityType,
        values: Record,
        _inputs: &ValObject,
        _context: &RequestContext,
    ) -> Result<Record, MutationExecutionError> {
        Ok(values)
    }

    async fn after_mutate(&self, _result: &Val, _context: &RequestContext) {}
}

/// Hooks that keep every default.
pub struct DefaultHooks;

#[async_trait]
impl MutationHooks for DefaultHooks {}
