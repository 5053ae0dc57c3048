// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The family of generated mutations and the arguments each takes.

use heck::{ToLowerCamelCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};

use core_model::types::{EntityType, FieldKind, ScalarType};

use crate::config::InputTypeConfig;
use crate::error::ModelBuildingError;
use crate::field_converter::convert;
use crate::input_schema_builder::InputSchemaBuilder;
use crate::types::{FieldType, InputField, InputType};

pub const ID_ARGUMENT: &str = "id";
pub const IDS_ARGUMENT: &str = "ids";
pub const INPUT_ARGUMENT: &str = "input";
pub const FILTER_ARGUMENT: &str = "filter";
pub const DATA_ARGUMENT: &str = "data";

pub const IN_LOOKUP: &str = "__in";
pub const IS_NULL_LOOKUP: &str = "__isnull";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    /// Update where every input field is optional
    Patch,
    Delete,
    BatchCreate,
    BatchUpdate,
    BatchPatch,
    BatchDelete,
    FilterUpdate,
    FilterDelete,
}

impl MutationKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            MutationKind::Create => "Create",
            MutationKind::Update => "Update",
            MutationKind::Patch => "Patch",
            MutationKind::Delete => "Delete",
            MutationKind::BatchCreate => "BatchCreate",
            MutationKind::BatchUpdate => "BatchUpdate",
            MutationKind::BatchPatch => "BatchPatch",
            MutationKind::BatchDelete => "BatchDelete",
            MutationKind::FilterUpdate => "FilterUpdate",
            MutationKind::FilterDelete => "FilterDelete",
        }
    }

    /// Mutation field name (`createConcert`, `batchDeleteConcert`, ...)
    pub fn mutation_name(&self, entity: &str) -> String {
        format!("{}{entity}", self.prefix()).to_lower_camel_case()
    }

    /// Input type name (`CreateConcertInput`, `PatchConcertInput`, ...)
    pub fn input_type_name(&self, entity: &str) -> String {
        format!("{}{entity}Input", self.prefix())
    }

    pub fn has_input_type(&self) -> bool {
        !matches!(
            self,
            MutationKind::Delete | MutationKind::BatchDelete | MutationKind::FilterDelete
        )
    }

    pub fn is_batch(&self) -> bool {
        matches!(
            self,
            MutationKind::BatchCreate
                | MutationKind::BatchUpdate
                | MutationKind::BatchPatch
                | MutationKind::BatchDelete
        )
    }

    pub fn is_filter(&self) -> bool {
        matches!(self, MutationKind::FilterUpdate | MutationKind::FilterDelete)
    }

    /// Whether top-level input fields are all optional
    pub fn all_fields_optional(&self) -> bool {
        matches!(
            self,
            MutationKind::Patch | MutationKind::BatchPatch | MutationKind::FilterUpdate
        )
    }

    /// Batch updates identify each row through the input's own key
    fn inputs_carry_key(&self) -> bool {
        matches!(self, MutationKind::BatchUpdate | MutationKind::BatchPatch)
    }
}

/// A compiled mutation's external shape.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MutationSignature {
    pub name: String,
    pub kind: MutationKind,
    pub entity: String,
    pub arguments: Vec<InputField>,
    pub input_type_name: Option<String>,
    pub filter_type_name: Option<String>,
}

/// Build the input types of one mutation and describe its arguments.
///
/// `custom_fields` are appended to the input type as declared. The executor never stores them
/// itself: a field handler registered under the same name runs on them, and `before_save` sees
/// the handler's result.
pub fn build_mutation(
    builder: &mut InputSchemaBuilder,
    kind: MutationKind,
    name: Option<&str>,
    entity: &EntityType,
    config: &InputTypeConfig,
    custom_fields: &[InputField],
) -> Result<MutationSignature, ModelBuildingError> {
    let mutation_name = name
        .map(str::to_string)
        .unwrap_or_else(|| kind.mutation_name(&entity.name));
    let type_prefix = match name {
        Some(name) => name.to_upper_camel_case(),
        None => format!("{}{}", kind.prefix(), entity.name),
    };

    let input_type_name = if kind.has_input_type() {
        let type_name = format!("{type_prefix}Input");
        build_input(builder, kind, &type_name, entity, config, custom_fields)?;
        Some(type_name)
    } else {
        None
    };

    let filter_type_name = if kind.is_filter() {
        let type_name = format!("{type_prefix}FilterInput");
        filter_type(builder, &type_name, entity, config)?;
        Some(type_name)
    } else {
        None
    };

    let arguments = match (kind, &input_type_name, &filter_type_name) {
        (MutationKind::Create, Some(input), _) => {
            vec![InputField::new(INPUT_ARGUMENT, FieldType::input(input))]
        }
        (MutationKind::Update | MutationKind::Patch, Some(input), _) => vec![
            InputField::new(ID_ARGUMENT, FieldType::id()),
            InputField::new(INPUT_ARGUMENT, FieldType::input(input)),
        ],
        (MutationKind::Delete, _, _) => vec![InputField::new(ID_ARGUMENT, FieldType::id())],
        (
            MutationKind::BatchCreate | MutationKind::BatchUpdate | MutationKind::BatchPatch,
            Some(input),
            _,
        ) => vec![InputField::new(
            INPUT_ARGUMENT,
            FieldType::input(input).list_of(),
        )],
        (MutationKind::BatchDelete, _, _) => {
            vec![InputField::new(IDS_ARGUMENT, FieldType::id().list_of())]
        }
        (MutationKind::FilterUpdate, Some(input), Some(filter)) => vec![
            InputField::new(FILTER_ARGUMENT, FieldType::input(filter)),
            InputField::new(DATA_ARGUMENT, FieldType::input(input)),
        ],
        (MutationKind::FilterDelete, _, Some(filter)) => {
            vec![InputField::new(FILTER_ARGUMENT, FieldType::input(filter))]
        }
        _ => {
            return Err(ModelBuildingError::Generic(format!(
                "Unable to determine the arguments of mutation '{mutation_name}'"
            )));
        }
    };

    Ok(MutationSignature {
        name: mutation_name,
        kind,
        entity: entity.name.clone(),
        arguments,
        input_type_name,
        filter_type_name,
    })
}

fn build_input(
    builder: &mut InputSchemaBuilder,
    kind: MutationKind,
    type_name: &str,
    entity: &EntityType,
    config: &InputTypeConfig,
    custom_fields: &[InputField],
) -> Result<(), ModelBuildingError> {
    let mut config = config.clone();
    if kind.inputs_carry_key() {
        config.retain_primary_key = true;
        config.required_fields.push(entity.pk_field.clone());
    }

    let built = builder.build(entity, &config, type_name)?;

    let mut fields = built.fields;
    if kind.all_fields_optional() {
        for field in &mut fields {
            field.field_type = field.field_type.clone().optional();
        }
    }
    fields.extend(custom_fields.iter().cloned());

    builder.register_input_type(
        InputType {
            name: type_name.to_string(),
            fields,
            entity: Some(entity.name.clone()),
            description: entity.doc_comments.clone(),
        },
        built.config,
    );

    Ok(())
}

/// A filter of `field`, `field__in` and `field__isnull` lookups over the entity's own columns.
/// Choice enums the lookups refer to are registered along with it.
fn filter_type(
    builder: &mut InputSchemaBuilder,
    type_name: &str,
    entity: &EntityType,
    config: &InputTypeConfig,
) -> Result<(), ModelBuildingError> {
    let mut fields = vec![];

    for field in &entity.fields {
        let filterable = matches!(
            field.kind,
            FieldKind::Scalar(_)
                | FieldKind::Choice(_)
                | FieldKind::ForeignKey(_)
                | FieldKind::OneToOneForward(_)
        );
        if !filterable || (config.skips(&field.name) && !entity.is_pk(field)) {
            continue;
        }

        let Some(converted) = convert(entity, field, Some(true), None)? else {
            continue;
        };
        if let Some(enum_type) = converted.enum_type {
            builder.add_enum_type(enum_type);
        }

        fields.push(InputField::new(
            &field.name,
            converted.field_type.clone().optional(),
        ));
        fields.push(InputField::new(
            format!("{}{IN_LOOKUP}", field.name),
            converted.field_type.list_of().optional(),
        ));
        fields.push(InputField::new(
            format!("{}{IS_NULL_LOOKUP}", field.name),
            FieldType::scalar(ScalarType::Boolean.graphql_name()).optional(),
        ));
    }

    builder.add_argument_type(InputType {
        name: type_name.to_string(),
        fields,
        entity: None,
        description: None,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use core_model::test_support::concert_model;

    use super::*;
    use crate::type_meta_registry::TypeMetaRegistry;

    fn arguments_sdl(signature: &MutationSignature) -> Vec<String> {
        signature
            .arguments
            .iter()
            .map(|argument| format!("{}: {}", argument.name, argument.field_type.sdl()))
            .collect()
    }

    #[test]
    fn names() {
        assert_eq!(MutationKind::Create.mutation_name("Concert"), "createConcert");
        assert_eq!(
            MutationKind::BatchDelete.mutation_name("Concert"),
            "batchDeleteConcert"
        );
        assert_eq!(
            MutationKind::FilterUpdate.input_type_name("Concert"),
            "FilterUpdateConcertInput"
        );
        assert_eq!(MutationKind::Patch.input_type_name("Concert"), "PatchConcertInput");
    }

    #[test]
    fn arguments_per_kind() {
        let model = concert_model();
        let mut builder = InputSchemaBuilder::new(&model, Arc::new(TypeMetaRegistry::new()));
        let concert = model.entity("Concert").unwrap();
        let config = InputTypeConfig::new();

        let mut signature = |kind| {
            build_mutation(&mut builder, kind, None, concert, &config, &[]).unwrap()
        };

        assert_eq!(
            arguments_sdl(&signature(MutationKind::Create)),
            vec!["input: CreateConcertInput!"]
        );
        assert_eq!(
            arguments_sdl(&signature(MutationKind::Patch)),
            vec!["id: ID!", "input: PatchConcertInput!"]
        );
        assert_eq!(arguments_sdl(&signature(MutationKind::Delete)), vec!["id: ID!"]);
        assert_eq!(
            arguments_sdl(&signature(MutationKind::BatchUpdate)),
            vec!["input: [BatchUpdateConcertInput!]!"]
        );
        assert_eq!(
            arguments_sdl(&signature(MutationKind::BatchDelete)),
            vec!["ids: [ID!]!"]
        );
        assert_eq!(
            arguments_sdl(&signature(MutationKind::FilterUpdate)),
            vec![
                "filter: FilterUpdateConcertFilterInput!",
                "data: FilterUpdateConcertInput!"
            ]
        );

        let schema = builder.finalize().unwrap();

        let patch = schema.input_type("PatchConcertInput").unwrap();
        assert!(patch.fields.iter().all(|field| !field.field_type.is_required()));

        let batch_update = schema.input_type("BatchUpdateConcertInput").unwrap();
        assert_eq!(
            batch_update.field("id").unwrap().field_type.sdl(),
            "ID!"
        );

        let filter = schema.input_type("FilterUpdateConcertFilterInput").unwrap();
        let names: Vec<_> = filter.fields.iter().map(|field| field.name.as_str()).collect();
        assert_eq!(&names[..3], &["id", "id__in", "id__isnull"]);
        assert!(names.contains(&"venue__in"));
        assert!(!names.contains(&"artists"));
        assert_eq!(
            filter.field("status__in").unwrap().field_type.sdl(),
            "[Concert_status!]"
        );
    }

    #[test]
    fn custom_names_and_fields() {
        let model = concert_model();
        let mut builder = InputSchemaBuilder::new(&model, Arc::new(TypeMetaRegistry::new()));

        let signature = build_mutation(
            &mut builder,
            MutationKind::Create,
            Some("publishConcert"),
            model.entity("Concert").unwrap(),
            &InputTypeConfig::new().only(["title"]),
            &[InputField::new("notify_artists", FieldType::scalar("Boolean").optional())],
        )
        .unwrap();

        assert_eq!(signature.name, "publishConcert");
        assert_eq!(
            signature.input_type_name.as_deref(),
            Some("PublishConcertInput")
        );

        let schema = builder.finalize().unwrap();
        let names: Vec<_> = schema
            .input_type("PublishConcertInput")
            .unwrap()
            .fields
            .iter()
            .map(|field| field.name.clone())
            .collect();
        assert_eq!(names, vec!["title", "notify_artists"]);
    }

    #[test]
    fn filter_only_mutations_define_their_enums() {
        let model = concert_model();
        let mut builder = InputSchemaBuilder::new(&model, Arc::new(TypeMetaRegistry::new()));

        build_mutation(
            &mut builder,
            MutationKind::FilterDelete,
            None,
            model.entity("Concert").unwrap(),
            &InputTypeConfig::new(),
            &[],
        )
        .unwrap();

        let schema = builder.finalize().unwrap();
        let filter = schema.input_type("FilterDeleteConcertFilterInput").unwrap();
        assert_eq!(filter.field("status").unwrap().field_type.sdl(), "Concert_status");
        assert!(schema.enum_type("Concert_status").is_some());
        assert!(schema.to_sdl().contains("enum Concert_status {"));
    }
}
