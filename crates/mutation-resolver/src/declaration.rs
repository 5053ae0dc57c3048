// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use common::context::RequestContext;
use common::value::{Val, ValObject};
use core_model::types::EntityType;
use heck::ToLowerCamelCase;
use mutation_builder::config::InputTypeConfig;
use mutation_builder::mutation_kind::MutationKind;
use mutation_builder::types::InputField;

use crate::error::MutationExecutionError;
use crate::hooks::{DefaultHooks, FieldHandlers, FieldValidators, MutationHooks};

/// Everything needed to compile and serve one mutation.
#[derive(Clone)]
pub struct MutationDeclaration {
    pub kind: MutationKind,
    pub entity: String,
    /// Overrides the generated mutation name (`createConcert`, ...)
    pub name: Option<String>,
    pub config: InputTypeConfig,
    pub permissions: Vec<String>,
    pub login_required: bool,
    pub return_field_name: Option<String>,
    pub custom_fields: Vec<InputField>,
    pub field_handlers: FieldHandlers,
    pub field_validators: FieldValidators,
    pub hooks: Arc<dyn MutationHooks>,
}

impl MutationDeclaration {
    pub fn new(kind: MutationKind, entity: impl Into<String>) -> Self {
        Self {
            kind,
            entity: entity.into(),
            name: None,
            config: InputTypeConfig::default(),
            permissions: vec![],
            login_required: false,
            return_field_name: None,
            custom_fields: vec![],
            field_handlers: FieldHandlers::new(),
            field_validators: FieldValidators::new(),
            hooks: Arc::new(DefaultHooks),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_config(mut self, config: InputTypeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_permissions<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        permissions: I,
    ) -> Self {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn login_required(mut self) -> Self {
        self.login_required = true;
        self
    }

    pub fn with_return_field(mut self, name: impl Into<String>) -> Self {
        self.return_field_name = Some(name.into());
        self
    }

    pub fn with_custom_field(mut self, field: InputField) -> Self {
        self.custom_fields.push(field);
        self
    }

    pub fn with_handler<F>(mut self, field: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Val, &ValObject, &RequestContext) -> Result<Val, MutationExecutionError>
            + Send
            + Sync
            + 'static,
    {
        self.field_handlers = self.field_handlers.with(field, handler);
        self
    }

    pub fn with_validator<F>(mut self, field: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Val, &ValObject, &RequestContext) -> Result<(), MutationExecutionError>
            + Send
            + Sync
            + 'static,
    {
        self.field_validators = self.field_validators.with(field, validator);
        self
    }

    pub fn with_hooks(mut self, hooks: impl MutationHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// The output field carrying the mutated row(s): the entity name in lower camel case,
    /// pluralized for batch mutations.
    pub fn return_field(&self, entity: &EntityType) -> String {
        if let Some(name) = &self.return_field_name {
            return name.clone();
        }

        let name = entity.name.to_lower_camel_case();
        if self.kind.is_batch() {
            pluralizer::pluralize(&name, 2, false)
        } else {
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use core_model::test_support::concert_model;

    use super::*;

    #[test]
    fn return_fields() {
        let model = concert_model();
        let concert = model.entity("Concert").unwrap();

        assert_eq!(
            MutationDeclaration::new(MutationKind::Create, "Concert").return_field(concert),
            "concert"
        );
        assert_eq!(
            MutationDeclaration::new(MutationKind::BatchCreate, "Concert").return_field(concert),
            "concerts"
        );
        assert_eq!(
            MutationDeclaration::new(MutationKind::Update, "Concert")
                .with_return_field("show")
                .return_field(concert),
            "show"
        );
    }
}
