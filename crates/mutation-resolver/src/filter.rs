// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::{Val, ValObject};
use core_model::types::{EntityField, EntityType, FieldKind};
use graph_store::Filter;
use mutation_builder::mutation_kind::{IN_LOOKUP, IS_NULL_LOOKUP};

use crate::error::MutationExecutionError;
use crate::executor::coerce_choice;
use crate::identifier::disambiguate_id;

enum Lookup {
    Exact,
    In,
    IsNull,
}

fn split_lookup(key: &str) -> (&str, Lookup) {
    if let Some(field) = key.strip_suffix(IN_LOOKUP) {
        (field, Lookup::In)
    } else if let Some(field) = key.strip_suffix(IS_NULL_LOOKUP) {
        (field, Lookup::IsNull)
    } else {
        (key, Lookup::Exact)
    }
}

fn coerce(
    entity: &EntityType,
    field: &EntityField,
    value: &Val,
) -> Result<Val, MutationExecutionError> {
    if entity.is_pk(field) {
        return Ok(disambiguate_id(value).map(|id| id.to_val()).unwrap_or(Val::Null));
    }

    match &field.kind {
        FieldKind::ForeignKey(_) | FieldKind::OneToOneForward(_) => {
            Ok(disambiguate_id(value).map(|id| id.to_val()).unwrap_or(Val::Null))
        }
        FieldKind::Choice(choices) => coerce_choice(field, choices, value.clone()),
        _ => Ok(value.clone()),
    }
}

/// Translate a filter argument (`title`, `venue__in`, `organizer__isnull`, ...) into a store
/// predicate. Null lookups are ignored, so an empty filter matches every row.
pub fn build_filter(entity: &EntityType, filter: &ValObject) -> Result<Filter, MutationExecutionError> {
    let mut predicate = Filter::True;

    for (key, value) in filter {
        if value.is_null() {
            continue;
        }

        let (name, lookup) = split_lookup(key);
        let field = entity.field(name).ok_or_else(|| {
            MutationExecutionError::Validation(key.clone(), "unknown filter field".to_string())
        })?;
        let attribute = field.attribute_name();

        let clause = match lookup {
            Lookup::Exact => Filter::Eq(attribute, coerce(entity, field, value)?),
            Lookup::In => {
                let values = value.as_list().ok_or_else(|| {
                    MutationExecutionError::Validation(key.clone(), "expected a list".to_string())
                })?;
                Filter::In(
                    attribute,
                    values
                        .iter()
                        .map(|value| coerce(entity, field, value))
                        .collect::<Result<_, _>>()?,
                )
            }
            Lookup::IsNull => match value {
                Val::Bool(is_null) => Filter::IsNull(attribute, *is_null),
                _ => {
                    return Err(MutationExecutionError::Validation(
                        key.clone(),
                        "expected a boolean".to_string(),
                    ));
                }
            },
        };

        predicate = predicate.and(clause);
    }

    Ok(predicate)
}

#[cfg(test)]
mod tests {
    use core_model::test_support::concert_model;
    use mutation_builder::naming::choice_member_name;

    use super::*;
    use crate::identifier::to_global_id;

    #[test]
    fn lookups_map_to_stored_attributes() {
        let model = concert_model();
        let concert = model.entity("Concert").unwrap();

        let filter = ValObject::from_iter([
            (
                "venue__in".to_string(),
                Val::List(vec![
                    Val::from("3"),
                    Val::String(to_global_id("Venue", &common::value::Id::Int(4))),
                ]),
            ),
            ("organizer__isnull".to_string(), Val::Bool(true)),
            (
                "status".to_string(),
                Val::Enum(choice_member_name(&Val::from("draft"))),
            ),
            ("title".to_string(), Val::Null),
        ]);

        assert_eq!(
            build_filter(concert, &filter).unwrap(),
            Filter::And(vec![
                Filter::In("venue_id".into(), vec![Val::from(3i64), Val::from(4i64)]),
                Filter::IsNull("organizer_id".into(), true),
                Filter::Eq("status".into(), Val::from("draft")),
            ])
        );

        assert_eq!(build_filter(concert, &ValObject::new()).unwrap(), Filter::True);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let model = concert_model();
        let concert = model.entity("Concert").unwrap();

        let filter = ValObject::from_iter([("headliner".to_string(), Val::from("A1"))]);
        assert!(matches!(
            build_filter(concert, &filter),
            Err(MutationExecutionError::Validation(field, _)) if field == "headliner"
        ));
    }
}
