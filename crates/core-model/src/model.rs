// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::mapped_arena::MappedArena;
use crate::types::{EntityField, EntityId, EntityType, FieldKind, Relation};

/// The loaded persistent model. Every relation's `entity_id` points to a valid entity.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DomainModel {
    pub entities: MappedArena<EntityType>,
}

impl DomainModel {
    pub fn entity(&self, name: &str) -> Result<&EntityType, ModelError> {
        self.entities
            .get_by_key(name)
            .ok_or_else(|| ModelError::UnknownEntity(name.to_string()))
    }

    pub fn entity_id(&self, name: &str) -> Result<EntityId, ModelError> {
        self.entities
            .get_id(name)
            .ok_or_else(|| ModelError::UnknownEntity(name.to_string()))
    }

    pub fn related_entity(&self, relation: &Relation) -> &EntityType {
        &self.entities[relation.entity_id]
    }

    /// The field on the related entity that points back through `field`.
    pub fn reciprocal_field(&self, field: &EntityField) -> Option<&EntityField> {
        let relation = field.relation()?;
        let reciprocal = relation.reciprocal.as_deref()?;
        self.related_entity(relation).field(reciprocal)
    }
}

/// Builds a [`DomainModel`] in two passes: entities are first added with unresolved relation
/// targets, then every relation is resolved by name once all entities are known.
#[derive(Default)]
pub struct DomainModelBuilder {
    entities: Vec<EntityType>,
}

impl DomainModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: EntityType) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn build(self) -> Result<DomainModel, ModelError> {
        let mut entities = MappedArena::default();

        for entity in self.entities {
            if entities.contains_key(&entity.name) {
                return Err(ModelError::DuplicateEntity(entity.name));
            }
            if entity.pk().is_none() {
                return Err(ModelError::MissingPrimaryKey {
                    entity: entity.name,
                    field: entity.pk_field,
                });
            }
            let name = entity.name.clone();
            entities.add(&name, entity);
        }

        let expanded = entities
            .iter()
            .map(|(id, entity)| Ok((id, expand_entity(entity, &entities)?)))
            .collect::<Result<Vec<_>, ModelError>>()?;

        for (id, entity) in expanded {
            entities[id] = entity;
        }

        Ok(DomainModel { entities })
    }
}

fn expand_entity(
    entity: &EntityType,
    entities: &MappedArena<EntityType>,
) -> Result<EntityType, ModelError> {
    let fields = entity
        .fields
        .iter()
        .map(|field| expand_field(entity, field, entities))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EntityType {
        fields,
        ..entity.clone()
    })
}

fn expand_field(
    entity: &EntityType,
    field: &EntityField,
    entities: &MappedArena<EntityType>,
) -> Result<EntityField, ModelError> {
    let mut field = field.clone();
    let is_reverse = field.kind.is_reverse();

    let Some(relation) = field.kind.relation_mut() else {
        return Ok(field);
    };

    relation.entity_id =
        entities
            .get_id(&relation.entity_name)
            .ok_or_else(|| ModelError::UnknownRelationTarget {
                entity: entity.name.clone(),
                field: field.name.clone(),
                target: relation.entity_name.clone(),
            })?;

    let target = &entities[relation.entity_id];

    let reciprocal = match &relation.reciprocal {
        Some(reciprocal) => Some(target.field(reciprocal).ok_or_else(|| {
            ModelError::UnknownReciprocal {
                entity: entity.name.clone(),
                field: field.name.clone(),
                target: target.name.clone(),
                reciprocal: reciprocal.clone(),
            }
        })?),
        None if is_reverse => {
            return Err(ModelError::MissingReciprocal {
                entity: entity.name.clone(),
                field: field.name.clone(),
            });
        }
        None => None,
    };

    // A reverse relation is as nullable as the key that backs it
    if let (true, Some(reciprocal)) = (is_reverse, reciprocal) {
        if matches!(
            reciprocal.kind,
            FieldKind::ForeignKey(_) | FieldKind::OneToOneForward(_)
        ) {
            field.nullable = reciprocal.nullable;
        }
    }

    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarType;

    #[test]
    fn relations_resolve_by_name() {
        let model = crate::test_support::concert_model();

        let concert = model.entity("Concert").unwrap();
        let venue_field = concert.field("venue").unwrap();
        let venue = model.related_entity(venue_field.relation().unwrap());
        assert_eq!(venue.name, "Venue");

        let reciprocal = model.reciprocal_field(venue_field).unwrap();
        assert_eq!(reciprocal.name, "concerts");
    }

    #[test]
    fn reverse_nullability_follows_the_key() {
        let model = crate::test_support::concert_model();

        // Concert.venue is nullable, Ticket.concert isn't
        assert!(model.entity("Venue").unwrap().field("concerts").unwrap().nullable);
        assert!(!model.entity("Concert").unwrap().field("tickets").unwrap().nullable);
        assert!(!model.entity("Artist").unwrap().field("profile").unwrap().nullable);
    }

    #[test]
    fn unknown_targets_are_rejected() {
        let result = DomainModelBuilder::new()
            .entity(
                EntityType::new("Concert", "concerts")
                    .with_field(EntityField::foreign_key("venue", "Venue", None)),
            )
            .build();

        assert_eq!(
            result.unwrap_err(),
            ModelError::UnknownRelationTarget {
                entity: "Concert".into(),
                field: "venue".into(),
                target: "Venue".into(),
            }
        );
    }

    #[test]
    fn unknown_reciprocals_are_rejected() {
        let result = DomainModelBuilder::new()
            .entity(
                EntityType::new("Concert", "concerts")
                    .with_field(EntityField::foreign_key("venue", "Venue", Some("shows"))),
            )
            .entity(
                EntityType::new("Venue", "venues")
                    .with_field(EntityField::scalar("name", ScalarType::String)),
            )
            .build();

        assert!(matches!(
            result.unwrap_err(),
            ModelError::UnknownReciprocal { reciprocal, .. } if reciprocal == "shows"
        ));
    }

    #[test]
    fn duplicates_are_rejected() {
        let result = DomainModelBuilder::new()
            .entity(EntityType::new("Venue", "venues"))
            .entity(EntityType::new("Venue", "other_venues"))
            .build();

        assert_eq!(
            result.unwrap_err(),
            ModelError::DuplicateEntity("Venue".into())
        );
    }
}
