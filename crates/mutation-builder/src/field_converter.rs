// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Conversion of one model field into one input field type.

use core_model::types::{Choice, EntityField, EntityType, FieldKind};

use crate::error::ModelBuildingError;
use crate::naming::{choice_enum_name, choice_member_names};
use crate::types::{EnumMember, EnumType, FieldType, InputTypeRef};

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedField {
    pub field_type: FieldType,
    /// The enum type a choice field introduces
    pub enum_type: Option<EnumType>,
}

/// Whether an input for `field` must be supplied.
///
/// An explicit override wins. Otherwise fields with a default, reverse relations and blank-able
/// many-to-many fields are optional, and everything else is required unless nullable.
pub fn is_required(field: &EntityField, requiredness_override: Option<bool>) -> bool {
    if let Some(required) = requiredness_override {
        return required;
    }

    if field.has_default || field.kind.is_reverse() {
        false
    } else {
        !field.nullable
    }
}

/// Convert `field` of `entity` to its input type, or `None` if the field is not part of inputs
/// (auto-maintained timestamps without an explicit requiredness).
///
/// `target_type_name` names a generated input type to use in place of `ID` for relations.
pub fn convert(
    entity: &EntityType,
    field: &EntityField,
    requiredness_override: Option<bool>,
    target_type_name: Option<&str>,
) -> Result<Option<ConvertedField>, ModelBuildingError> {
    if field.auto_timestamp.is_some() && requiredness_override.is_none() {
        return Ok(None);
    }

    let relation_target = || match target_type_name {
        Some(name) => InputTypeRef::Input(name.to_string()),
        None => InputTypeRef::Id,
    };

    let mut enum_type = None;

    let base = if entity.is_pk(field) {
        FieldType::Plain(InputTypeRef::Id)
    } else {
        match &field.kind {
            FieldKind::Scalar(scalar) => {
                FieldType::Plain(InputTypeRef::Scalar(scalar.graphql_name().to_string()))
            }
            FieldKind::Choice(choices) => {
                let choice_type = choice_enum_type(entity, field, choices);
                let field_type = FieldType::Plain(InputTypeRef::Enum(choice_type.name.clone()));
                enum_type = Some(choice_type);
                field_type
            }
            FieldKind::ForeignKey(_)
            | FieldKind::OneToOneForward(_)
            | FieldKind::OneToOneReverse(_) => FieldType::Plain(relation_target()),
            FieldKind::ManyToOneReverse(_) | FieldKind::ManyToMany(..) => {
                FieldType::Plain(relation_target()).list_of()
            }
            FieldKind::Other(kind) => {
                return Err(ModelBuildingError::UnsupportedFieldKind {
                    entity: entity.name.clone(),
                    field: field.name.clone(),
                    kind: kind.clone(),
                });
            }
        }
    };

    Ok(Some(ConvertedField {
        field_type: base.with_requiredness(is_required(field, requiredness_override)),
        enum_type,
    }))
}

fn choice_enum_type(entity: &EntityType, field: &EntityField, choices: &[Choice]) -> EnumType {
    let names = choice_member_names(choices.iter().map(|choice| &choice.value));

    EnumType {
        name: choice_enum_name(&entity.name, &field.name),
        members: names
            .into_iter()
            .zip(choices)
            .map(|(name, choice)| EnumMember {
                name,
                value: choice.value.clone(),
                description: choice.description.clone(),
            })
            .collect(),
    }
}
