// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Recursive synthesis of input types.
//!
//! Building the input type of an entity may require nested input types for its relations (for
//! example `CreateConcertInputAddConcertArtists` to create artists while creating a concert),
//! which in turn may require further nested types. The builder threads a [`SchemaBuilding`]
//! through the recursion: a type that is already built, or is being built further up the
//! recursion, is referenced by name rather than rebuilt, which keeps cyclic models finite.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use core_model::mapped_arena::MappedArena;
use core_model::model::DomainModel;
use core_model::types::{EntityField, EntityType, FieldKind};

use crate::config::{ExtraEntry, InputTypeConfig, Operation, RelationshipExtras, TargetType};
use crate::error::ModelBuildingError;
use crate::field_converter::{convert, is_required};
use crate::naming::{extra_field_name, nested_type_name};
use crate::schema::InputSchema;
use crate::type_meta_registry::TypeMetaRegistry;
use crate::types::{EnumType, FieldType, InputField, InputType, InputTypeRef};

/// Operation key used to name nested types of foreign-key and one-to-one extras
const SINGLE_RELATION_OPERATION: &str = "create";

#[derive(Debug, Default)]
pub struct SchemaBuilding {
    pub input_types: MappedArena<InputType>,
    pub enum_types: MappedArena<EnumType>,
    in_progress: HashSet<String>,
}

/// The fields of one input type, along with its configuration with every `Auto` extra resolved
/// to a named type.
#[derive(Debug, Clone)]
pub struct BuiltInput {
    pub fields: Vec<InputField>,
    pub config: InputTypeConfig,
}

pub struct InputSchemaBuilder<'a> {
    model: &'a DomainModel,
    registry: Arc<TypeMetaRegistry>,
    building: SchemaBuilding,
}

impl<'a> InputSchemaBuilder<'a> {
    pub fn new(model: &'a DomainModel, registry: Arc<TypeMetaRegistry>) -> Self {
        Self {
            model,
            registry,
            building: SchemaBuilding::default(),
        }
    }

    pub fn model(&self) -> &'a DomainModel {
        self.model
    }

    pub fn registry(&self) -> &Arc<TypeMetaRegistry> {
        &self.registry
    }

    /// Whether `name` is built (or being built)
    pub fn is_defined(&self, name: &str) -> bool {
        self.building.input_types.contains_key(name) || self.building.in_progress.contains(name)
    }

    /// Build the input type `name` for `entity` and register it, unless a type by that name
    /// already exists.
    pub fn build_input_type(
        &mut self,
        name: &str,
        entity: &EntityType,
        config: &InputTypeConfig,
    ) -> Result<(), ModelBuildingError> {
        if self.is_defined(name) {
            return Ok(());
        }

        self.building.in_progress.insert(name.to_string());
        let built = self.build(entity, config, name);
        self.building.in_progress.remove(name);
        let built = built?;

        self.register_input_type(
            InputType {
                name: name.to_string(),
                fields: built.fields,
                entity: Some(entity.name.clone()),
                description: entity.doc_comments.clone(),
            },
            built.config,
        );

        Ok(())
    }

    /// Add a type to the schema and its configuration to the registry.
    pub fn register_input_type(&mut self, input_type: InputType, config: InputTypeConfig) {
        debug!(type_name = %input_type.name, "Registering input type");
        self.registry.register(&input_type.name, config);
        let name = input_type.name.clone();
        self.building.input_types.upsert(&name, input_type);
    }

    /// Add a type that only shapes arguments (such as a filter); it has no configuration.
    pub fn add_argument_type(&mut self, input_type: InputType) {
        let name = input_type.name.clone();
        self.building.input_types.upsert(&name, input_type);
    }

    pub fn add_enum_type(&mut self, enum_type: EnumType) {
        let name = enum_type.name.clone();
        self.building.enum_types.add(&name, enum_type);
    }

    /// The ordered input fields of `entity` under `config`.
    ///
    /// Nested types required by `Auto` extras are built (and registered) along the way, named
    /// after `parent_type_name`.
    pub fn build(
        &mut self,
        entity: &EntityType,
        config: &InputTypeConfig,
        parent_type_name: &str,
    ) -> Result<BuiltInput, ModelBuildingError> {
        validate_extras(entity, config)?;

        let mut resolved = config.clone();
        let mut fields: IndexMap<String, InputField> = IndexMap::new();

        // Direct fields
        for field in &entity.fields {
            if (entity.is_pk(field) && !config.retain_primary_key)
                || config.skips(&field.name)
                || field.is_hidden()
            {
                continue;
            }

            let target = match &field.kind {
                FieldKind::ForeignKey(_) => config.foreign_key_extras.get(&field.name),
                FieldKind::OneToOneForward(_) | FieldKind::OneToOneReverse(_) => {
                    config.one_to_one_extras.get(&field.name)
                }
                _ => None,
            }
            .and_then(|entry| {
                resolved_type_name(entry, parent_type_name, SINGLE_RELATION_OPERATION, entity, field)
            });

            let converted = convert(
                entity,
                field,
                config.requiredness_override(&field.name),
                target.as_deref(),
            )?;

            if let Some(converted) = converted {
                if let Some(enum_type) = converted.enum_type {
                    self.add_enum_type(enum_type);
                }
                fields.insert(
                    field.name.clone(),
                    described(InputField::new(&field.name, converted.field_type), field),
                );
            }
        }

        // Foreign-key and one-to-one extras replace the plain field
        for (extras, resolved_extras) in [
            (&config.foreign_key_extras, &mut resolved.foreign_key_extras),
            (&config.one_to_one_extras, &mut resolved.one_to_one_extras),
        ] {
            for (field_name, entry) in extras {
                let field = entity_field(entity, field_name)?;
                let resolved_entry = self.resolve_entry(
                    entity,
                    field,
                    SINGLE_RELATION_OPERATION,
                    Operation::Add,
                    entry,
                    parent_type_name,
                )?;

                let converted = convert(
                    entity,
                    field,
                    Some(is_required(field, config.requiredness_override(field_name))),
                    resolved_entry.target.type_name(),
                )?;
                if let Some(converted) = converted {
                    fields.insert(
                        field_name.clone(),
                        described(InputField::new(field_name, converted.field_type), field),
                    );
                }

                resolved_extras.insert(field_name.clone(), resolved_entry);
            }
        }

        // Collection extras add one input per operation
        for (extras, resolved_extras) in [
            (&config.many_to_many_extras, &mut resolved.many_to_many_extras),
            (&config.many_to_one_extras, &mut resolved.many_to_one_extras),
        ] {
            for (field_name, entries) in extras {
                let field = entity_field(entity, field_name)?;
                let mut resolved_entries = IndexMap::new();

                for (key, entry) in entries {
                    let operation = canonical_operation(entity, field, key, entry)?;
                    let resolved_entry = self.resolve_entry(
                        entity,
                        field,
                        key,
                        operation,
                        entry,
                        parent_type_name,
                    )?;

                    let element_type = match resolved_entry.target.type_name() {
                        Some(type_name) => FieldType::input(type_name),
                        None => FieldType::id(),
                    };
                    let required = operation == Operation::Exact
                        && is_required(field, config.requiredness_override(field_name));

                    let input_name = extra_field_name(field_name, key, operation);
                    fields.insert(
                        input_name.clone(),
                        described(
                            InputField::new(
                                input_name,
                                element_type.list_of().with_requiredness(required),
                            ),
                            field,
                        ),
                    );

                    resolved_entries.insert(key.clone(), resolved_entry);
                }

                resolved_extras.insert(field_name.clone(), resolved_entries);
            }
        }

        for (field_name, field_type) in &config.field_types {
            if let Some(field) = fields.get_mut(field_name) {
                field.field_type = field_type.clone();
            }
        }

        Ok(BuiltInput {
            fields: fields.into_values().collect(),
            config: resolved,
        })
    }

    /// Resolve the target of one extra, building its nested type if needed.
    fn resolve_entry(
        &mut self,
        entity: &EntityType,
        field: &EntityField,
        key: &str,
        operation: Operation,
        entry: &ExtraEntry,
        parent_type_name: &str,
    ) -> Result<ExtraEntry, ModelBuildingError> {
        let type_name = match &entry.target {
            TargetType::Id => return Ok(entry.clone()),
            TargetType::Named(type_name) => {
                if has_auto_extras(&entry.config) {
                    return Err(ModelBuildingError::AutoExtraOnNamedType {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                        type_name: type_name.clone(),
                    });
                }
                return Ok(entry.clone());
            }
            TargetType::Auto => entry
                .type_name
                .clone()
                .unwrap_or_else(|| nested_type_name(parent_type_name, key, &entity.name, &field.name)),
        };

        let nested_config = if self.is_defined(&type_name) {
            debug!(%type_name, "Reusing input type");
            without_auto_extras(&entry.config)
        } else {
            let Some(relation) = field.relation() else {
                return Err(ModelBuildingError::ExtraKindMismatch {
                    entity: entity.name.clone(),
                    field: field.name.clone(),
                    expected: "relation".to_string(),
                    actual: field.kind.kind_name().to_string(),
                });
            };
            let related = self.model.related_entity(relation);

            let mut nested_config = entry.config.clone();
            if let Some(reciprocal) = &relation.reciprocal {
                nested_config.exclude_fields.push(reciprocal.clone());
            }
            let upserts = matches!(field.kind, FieldKind::ManyToOneReverse(_))
                && operation != Operation::Remove;
            if operation == Operation::Update || operation == Operation::Remove || upserts {
                nested_config.retain_primary_key = true;
                nested_config.optional_fields.push(related.pk_field.clone());
            }

            self.building.in_progress.insert(type_name.clone());
            let built = self.build(related, &nested_config, &type_name);
            self.building.in_progress.remove(&type_name);
            let built = built?;

            self.register_input_type(
                InputType {
                    name: type_name.clone(),
                    fields: built.fields,
                    entity: Some(related.name.clone()),
                    description: related.doc_comments.clone(),
                },
                built.config.clone(),
            );

            built.config
        };

        Ok(ExtraEntry {
            target: TargetType::Named(type_name),
            operation: entry.operation.clone(),
            type_name: entry.type_name.clone(),
            config: nested_config,
        })
    }

    /// Check that every referenced input type exists and produce the finished schema.
    pub fn finalize(self) -> Result<InputSchema, ModelBuildingError> {
        let SchemaBuilding {
            input_types,
            enum_types,
            ..
        } = self.building;

        for (_, input_type) in input_types.named_values() {
            for field in &input_type.fields {
                let defined = match field.field_type.base() {
                    InputTypeRef::Input(type_name) => input_types.contains_key(type_name),
                    InputTypeRef::Enum(type_name) => enum_types.contains_key(type_name),
                    InputTypeRef::Scalar(_) | InputTypeRef::Id => true,
                };
                if !defined {
                    return Err(ModelBuildingError::MissingType {
                        type_name: field.field_type.base().name().to_string(),
                        referenced_by: input_type.name.clone(),
                    });
                }
            }
        }

        Ok(InputSchema::new(input_types, enum_types))
    }
}

fn described(mut input: InputField, field: &EntityField) -> InputField {
    input.description = field.doc_comments.clone();
    input
}

fn entity_field<'e>(
    entity: &'e EntityType,
    field_name: &str,
) -> Result<&'e EntityField, ModelBuildingError> {
    entity
        .field(field_name)
        .ok_or_else(|| ModelBuildingError::UnknownExtraField {
            entity: entity.name.clone(),
            field: field_name.to_string(),
        })
}

fn canonical_operation(
    entity: &EntityType,
    field: &EntityField,
    key: &str,
    entry: &ExtraEntry,
) -> Result<Operation, ModelBuildingError> {
    entry
        .canonical_operation(key)
        .ok_or_else(|| ModelBuildingError::UnresolvableOperation {
            entity: entity.name.clone(),
            field: field.name.clone(),
            operation: entry.operation.clone().unwrap_or_else(|| key.to_string()),
        })
}

/// The input type an extra's payload uses, if not `ID`
fn resolved_type_name(
    entry: &ExtraEntry,
    parent_type_name: &str,
    key: &str,
    entity: &EntityType,
    field: &EntityField,
) -> Option<String> {
    match &entry.target {
        TargetType::Id => None,
        TargetType::Named(name) => Some(name.clone()),
        TargetType::Auto => Some(
            entry
                .type_name
                .clone()
                .unwrap_or_else(|| nested_type_name(parent_type_name, key, &entity.name, &field.name)),
        ),
    }
}

fn validate_extras(entity: &EntityType, config: &InputTypeConfig) -> Result<(), ModelBuildingError> {
    fn check_kind(
        entity: &EntityType,
        field_name: &str,
        expected: &str,
        accepts: fn(&FieldKind) -> bool,
    ) -> Result<(), ModelBuildingError> {
        let field = entity_field(entity, field_name)?;
        if accepts(&field.kind) {
            Ok(())
        } else {
            Err(ModelBuildingError::ExtraKindMismatch {
                entity: entity.name.clone(),
                field: field_name.to_string(),
                expected: expected.to_string(),
                actual: field.kind.kind_name().to_string(),
            })
        }
    }

    fn check_operations(
        entity: &EntityType,
        extras: &RelationshipExtras,
    ) -> Result<(), ModelBuildingError> {
        for (field_name, entries) in extras {
            let field = entity_field(entity, field_name)?;
            for (key, entry) in entries {
                canonical_operation(entity, field, key, entry)?;
            }
        }
        Ok(())
    }

    for field_name in config.many_to_many_extras.keys() {
        check_kind(entity, field_name, "many-to-many", |kind| {
            matches!(kind, FieldKind::ManyToMany(..))
        })?;
    }
    for field_name in config.many_to_one_extras.keys() {
        check_kind(entity, field_name, "many-to-one", |kind| {
            matches!(kind, FieldKind::ManyToOneReverse(_))
        })?;
    }
    for field_name in config.foreign_key_extras.keys() {
        check_kind(entity, field_name, "foreign key", |kind| {
            matches!(kind, FieldKind::ForeignKey(_))
        })?;
    }
    for field_name in config.one_to_one_extras.keys() {
        check_kind(entity, field_name, "one-to-one", |kind| {
            matches!(
                kind,
                FieldKind::OneToOneForward(_) | FieldKind::OneToOneReverse(_)
            )
        })?;
    }

    check_operations(entity, &config.many_to_many_extras)?;
    check_operations(entity, &config.many_to_one_extras)
}

fn is_auto(entry: &ExtraEntry) -> bool {
    matches!(entry.target, TargetType::Auto)
}

fn has_auto_extras(config: &InputTypeConfig) -> bool {
    config
        .many_to_many_extras
        .values()
        .chain(config.many_to_one_extras.values())
        .flat_map(|entries| entries.values())
        .chain(config.foreign_key_extras.values())
        .chain(config.one_to_one_extras.values())
        .any(is_auto)
}

/// The extra-level configuration of a reused type: its auto-context fields and the extras that
/// need no nested type of their own.
fn without_auto_extras(config: &InputTypeConfig) -> InputTypeConfig {
    let keep_nested = |extras: &RelationshipExtras| -> RelationshipExtras {
        extras
            .iter()
            .map(|(field, entries)| {
                let entries = entries
                    .iter()
                    .filter(|(_, entry)| !is_auto(entry))
                    .map(|(key, entry)| (key.clone(), entry.clone()))
                    .collect::<IndexMap<_, _>>();
                (field.clone(), entries)
            })
            .filter(|(_, entries)| !entries.is_empty())
            .collect()
    };
    let keep_single = |extras: &IndexMap<String, ExtraEntry>| -> IndexMap<String, ExtraEntry> {
        extras
            .iter()
            .filter(|(_, entry)| !is_auto(entry))
            .map(|(field, entry)| (field.clone(), entry.clone()))
            .collect()
    };

    InputTypeConfig {
        auto_context_fields: config.auto_context_fields.clone(),
        many_to_many_extras: keep_nested(&config.many_to_many_extras),
        many_to_one_extras: keep_nested(&config.many_to_one_extras),
        foreign_key_extras: keep_single(&config.foreign_key_extras),
        one_to_one_extras: keep_single(&config.one_to_one_extras),
        ..InputTypeConfig::default()
    }
}
