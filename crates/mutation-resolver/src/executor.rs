// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Executes one (possibly nested) payload against a transaction.
//!
//! A payload is applied in phases. Auto-context values are queued first, then every plain
//! field is coerced into a row attribute, and foreign-key and forward one-to-one extras resolve
//! or create the rows they point to. The row itself is written next (immediately for creates,
//! last for updates). Once the row's identity is known its reverse relations are brought in line
//! with the payload: reverse one-to-one first, then many-to-one, then many-to-many.

use async_recursion::async_recursion;
use change_notification::{ChangeEvent, ChangeKind};
use common::context::RequestContext;
use common::value::{Id, Val, ValObject};
use core_model::model::DomainModel;
use core_model::types::{Choice, EntityField, EntityType, FieldKind, PrimaryKeyKind};
use graph_store::{Filter, LinkSide, LinkTableRef, PkStrategy, Record, TableRef, Transaction};
use indexmap::IndexMap;
use mutation_builder::config::{InputTypeConfig, Operation};
use mutation_builder::naming::choice_member_names;
use mutation_builder::type_meta_registry::TypeMetaRegistry;
use tracing::debug;

use crate::error::{MutationExecutionError, WithContext};
use crate::hooks::{FieldHandlers, MutationHooks};
use crate::identifier::disambiguate_id;
use crate::relation_operation::{PlannedOperation, nested_config, plan_operations};

pub fn table_ref(entity: &EntityType) -> TableRef {
    TableRef {
        name: entity.table_name.clone(),
        pk_column: entity.pk_column(),
        pk_strategy: match entity.pk_kind {
            PrimaryKeyKind::AutoIncrement => PkStrategy::AutoIncrement,
            PrimaryKeyKind::Uuid => PkStrategy::Uuid,
            PrimaryKeyKind::Natural => PkStrategy::Provided,
        },
    }
}

/// The link table behind a many-to-many field, and the side `entity`'s ids are stored on. The
/// owning side of a relation is always the left one.
pub fn link_table_ref(
    model: &DomainModel,
    entity: &EntityType,
    field: &EntityField,
) -> Option<(LinkTableRef, LinkSide)> {
    let FieldKind::ManyToMany(relation, link) = &field.kind else {
        return None;
    };
    let related = model.related_entity(relation);

    let (left, right, side) = if link.owner {
        (entity, related, LinkSide::Left)
    } else {
        (related, entity, LinkSide::Right)
    };

    Some((
        LinkTableRef {
            name: link.name.clone(),
            left_table: left.table_name.clone(),
            right_table: right.table_name.clone(),
        },
        side,
    ))
}

pub fn record_id(entity: &EntityType, record: &Record) -> Result<Id, MutationExecutionError> {
    record
        .get(&entity.pk_column())
        .and_then(Id::from_val)
        .ok_or_else(|| {
            MutationExecutionError::Generic(format!(
                "Stored {} row has no usable primary key",
                entity.name
            ))
        })
}

/// Map a client value for a choice field to the stored value. Enum member names and the stored
/// values themselves are both accepted.
pub fn coerce_choice(
    field: &EntityField,
    choices: &[Choice],
    value: Val,
) -> Result<Val, MutationExecutionError> {
    if value.is_null() {
        return Ok(Val::Null);
    }

    if let Some(member) = value.as_str() {
        let names = choice_member_names(choices.iter().map(|choice| &choice.value));
        if let Some(index) = names.iter().position(|name| name == member) {
            return Ok(choices[index].value.clone());
        }
    }

    if choices.iter().any(|choice| choice.value.loosely_eq(&value)) {
        Ok(value)
    } else {
        Err(MutationExecutionError::Validation(
            field.name.clone(),
            format!("{value} is not a valid choice"),
        ))
    }
}

fn id_value(value: &Val) -> Val {
    disambiguate_id(value)
        .map(|id| id.to_val())
        .unwrap_or(Val::Null)
}

/// The payload as `before_save` sees it: custom fields carry their handler's result.
fn handled_inputs(payload: &ValObject, custom: ValObject) -> ValObject {
    let mut inputs = payload.clone();
    inputs.extend(custom);
    inputs
}

/// Everything collected from a payload before the row is written.
#[derive(Default)]
struct PendingWrites {
    values: Record,
    /// Handler results for input fields the entity doesn't have
    custom: ValObject,
    reverse_one_to_one: Vec<(String, Val, Option<InputTypeConfig>)>,
    many_to_many: IndexMap<String, Vec<PlannedOperation>>,
    many_to_one: IndexMap<String, Vec<PlannedOperation>>,
}

#[derive(Default)]
struct RelationBuckets {
    to_set: Option<Vec<Id>>,
    to_add: Vec<Id>,
    to_remove: Vec<Id>,
}

impl RelationBuckets {
    fn fill(&mut self, operation: Operation, ids: Vec<Id>) {
        match operation {
            Operation::Exact => self.to_set.get_or_insert_with(Vec::new).extend(ids),
            Operation::Add | Operation::Update => self.to_add.extend(ids),
            Operation::Remove => self.to_remove.extend(ids),
        }
    }
}

pub struct MutationExecutor<'a> {
    model: &'a DomainModel,
    registry: &'a TypeMetaRegistry,
    handlers: &'a FieldHandlers,
    hooks: &'a dyn MutationHooks,
    context: &'a RequestContext,
    changes: Vec<ChangeEvent>,
}

impl<'a> MutationExecutor<'a> {
    pub fn new(
        model: &'a DomainModel,
        registry: &'a TypeMetaRegistry,
        handlers: &'a FieldHandlers,
        hooks: &'a dyn MutationHooks,
        context: &'a RequestContext,
    ) -> Self {
        Self {
            model,
            registry,
            handlers,
            hooks,
            context,
            changes: vec![],
        }
    }

    /// The changes made so far, in the order they happened.
    pub fn into_changes(self) -> Vec<ChangeEvent> {
        self.changes
    }

    /// Create a row of `entity` from `payload`, along with every related row it describes.
    ///
    /// `before_save` runs only for the `top_level` row.
    #[async_recursion]
    pub async fn create(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        payload: &ValObject,
        config: &InputTypeConfig,
        top_level: bool,
    ) -> Result<Record, MutationExecutionError> {
        let mut writes = self.collect_writes(tx, entity, payload, config, false).await?;

        let mut values = std::mem::take(&mut writes.values);
        let custom = std::mem::take(&mut writes.custom);
        if top_level {
            let inputs = handled_inputs(payload, custom);
            values = self
                .hooks
                .before_save(entity, values, &inputs, self.context)
                .await?;
        }

        let record = self.insert_row(tx, entity, values).await?;
        let id = record_id(entity, &record)?;

        self.apply_relations(tx, entity, &id, writes).await?;

        Ok(record)
    }

    /// Apply `payload` to the existing row `id` of `entity`. The row itself is written after its
    /// relations.
    #[async_recursion]
    pub async fn update(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        id: &Id,
        payload: &ValObject,
        config: &InputTypeConfig,
        top_level: bool,
    ) -> Result<Record, MutationExecutionError> {
        let mut writes = self.collect_writes(tx, entity, payload, config, true).await?;
        let mut values = std::mem::take(&mut writes.values);
        let custom = std::mem::take(&mut writes.custom);

        self.apply_relations(tx, entity, id, writes).await?;

        if top_level {
            let inputs = handled_inputs(payload, custom);
            values = self
                .hooks
                .before_save(entity, values, &inputs, self.context)
                .await?;
        }
        self.update_row(tx, entity, id, values).await
    }

    /// Delete a row. Rows that point at it through a reverse relation are detached when their key
    /// is nullable and deleted otherwise.
    #[async_recursion]
    pub async fn delete(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        id: &Id,
    ) -> Result<(), MutationExecutionError> {
        for field in &entity.fields {
            if !field.kind.is_reverse() {
                continue;
            }
            let Some(reciprocal) = self.model.reciprocal_field(field) else {
                continue;
            };
            let Some(relation) = field.relation() else {
                continue;
            };
            let related = self.model.related_entity(relation);
            let attribute = reciprocal.attribute_name();

            let dependents = tx
                .find(&table_ref(related), &Filter::eq(&attribute, id.to_val()))
                .await?;
            for dependent in dependents {
                let dependent_id = record_id(related, &dependent)?;
                self.detach(tx, related, &dependent_id, &attribute, reciprocal.nullable)
                    .await?;
            }
        }

        tx.delete(&table_ref(entity), id).await?;
        self.record_change(&entity.name, ChangeKind::Deleted, id);
        Ok(())
    }

    async fn collect_writes(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        payload: &ValObject,
        config: &InputTypeConfig,
        updating: bool,
    ) -> Result<PendingWrites, MutationExecutionError> {
        let mut writes = PendingWrites::default();

        let mut auto_context: IndexMap<String, Val> = IndexMap::new();
        for (field, attribute) in &config.auto_context_fields {
            if let Some(value) = self.context.attribute(attribute) {
                auto_context.insert(field.clone(), value);
            }
        }

        for (name, value) in payload {
            if config.is_extra_field(name) {
                continue;
            }
            let Some(field) = entity.field(name) else {
                if let Some(handler) = self.handlers.get(name) {
                    let handled = handler(value, payload, self.context)
                        .with_context(format!("while handling '{name}'"))?;
                    writes.custom.insert(name.clone(), handled);
                }
                continue;
            };
            // An explicit value always wins over the context
            auto_context.shift_remove(name);

            match self.handlers.get(name) {
                Some(handler) => {
                    let handled = handler(value, payload, self.context)
                        .with_context(format!("while handling '{name}'"))?;
                    self.assign_handled(entity, field, handled, &mut writes);
                }
                None => {
                    self.assign(tx, entity, field, value, updating, &mut writes)
                        .await
                        .with_context(format!("while processing '{name}'"))?;
                }
            }
        }

        let single_extras = config
            .foreign_key_extras
            .iter()
            .chain(config.one_to_one_extras.iter());
        for (name, entry) in single_extras {
            let Some(value) = payload.get(name) else {
                continue;
            };
            let field = entity.field(name).ok_or_else(|| {
                MutationExecutionError::Generic(format!("{} has no field '{name}'", entity.name))
            })?;
            auto_context.shift_remove(name);

            let entry_config = nested_config(entry, self.registry);
            if let FieldKind::OneToOneReverse(_) = field.kind {
                writes
                    .reverse_one_to_one
                    .push((name.clone(), value.clone(), entry_config));
            } else {
                let related_id = self
                    .resolve_related(tx, field, value, entry_config)
                    .await
                    .with_context(format!("while resolving '{name}'"))?;
                writes.values.insert(
                    field.attribute_name(),
                    related_id.map(|id| id.to_val()).unwrap_or(Val::Null),
                );
            }
        }

        for (name, value) in auto_context {
            match entity.field(&name) {
                Some(field) => {
                    let value = match field.kind {
                        FieldKind::ForeignKey(_) | FieldKind::OneToOneForward(_) => {
                            id_value(&value)
                        }
                        _ => value,
                    };
                    writes.values.insert(field.attribute_name(), value);
                }
                None => debug!(entity = %entity.name, field = %name, "Ignoring auto-context value for an unknown field"),
            }
        }

        for (name, entries) in &config.many_to_many_extras {
            let planned = plan_operations(name, entries, payload, self.registry)?;
            writes
                .many_to_many
                .entry(name.clone())
                .or_default()
                .extend(planned);
        }
        for (name, entries) in &config.many_to_one_extras {
            let planned = plan_operations(name, entries, payload, self.registry)?;
            writes
                .many_to_one
                .entry(name.clone())
                .or_default()
                .extend(planned);
        }

        Ok(writes)
    }

    async fn assign(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        field: &EntityField,
        value: &Val,
        updating: bool,
        writes: &mut PendingWrites,
    ) -> Result<(), MutationExecutionError> {
        if entity.is_pk(field) {
            // The key of an existing row never changes
            if !updating && let Some(id) = disambiguate_id(value) {
                writes.values.insert(field.attribute_name(), id.to_val());
            }
            return Ok(());
        }

        match &field.kind {
            FieldKind::Scalar(_) | FieldKind::Other(_) => {
                writes.values.insert(field.attribute_name(), value.clone());
            }
            FieldKind::Choice(choices) => {
                let stored = coerce_choice(field, choices, value.clone())?;
                writes.values.insert(field.attribute_name(), stored);
            }
            FieldKind::ForeignKey(_) | FieldKind::OneToOneForward(_) => {
                let related_id = self.resolve_related(tx, field, value, None).await?;
                writes.values.insert(
                    field.attribute_name(),
                    related_id.map(|id| id.to_val()).unwrap_or(Val::Null),
                );
            }
            FieldKind::OneToOneReverse(_) => {
                writes
                    .reverse_one_to_one
                    .push((field.name.clone(), value.clone(), None));
            }
            FieldKind::ManyToMany(..) | FieldKind::ManyToOneReverse(_) => {
                self.defer_collection(field, value.clone(), writes);
            }
        }

        Ok(())
    }

    /// Store a handler's result without any coercion (collections still go through their
    /// relation).
    fn assign_handled(
        &self,
        entity: &EntityType,
        field: &EntityField,
        value: Val,
        writes: &mut PendingWrites,
    ) {
        match &field.kind {
            FieldKind::ManyToMany(..) | FieldKind::ManyToOneReverse(_) => {
                self.defer_collection(field, value, writes)
            }
            FieldKind::OneToOneReverse(_) => {
                writes
                    .reverse_one_to_one
                    .push((field.name.clone(), value, None))
            }
            _ => {
                debug!(entity = %entity.name, field = %field.name, "Storing handled value");
                writes.values.insert(field.attribute_name(), value);
            }
        }
    }

    /// A collection assigned directly replaces the relation's current members.
    fn defer_collection(&self, field: &EntityField, value: Val, writes: &mut PendingWrites) {
        let values = match value {
            Val::Null => vec![],
            Val::List(values) => values,
            value => vec![value],
        };
        let nested = values
            .iter()
            .any(|value| matches!(value, Val::Object(_)))
            .then(InputTypeConfig::default);

        let operation = PlannedOperation {
            key: Operation::Exact.as_str().to_string(),
            operation: Operation::Exact,
            input_field: field.name.clone(),
            values,
            nested_config: nested,
        };

        let bucket = match field.kind {
            FieldKind::ManyToMany(..) => &mut writes.many_to_many,
            _ => &mut writes.many_to_one,
        };
        bucket.entry(field.name.clone()).or_default().push(operation);
    }

    /// Resolve the row a foreign key or forward one-to-one field points to: `None` for null, a
    /// newly created row for a nested object, an existing row otherwise.
    async fn resolve_related(
        &mut self,
        tx: &mut dyn Transaction,
        field: &EntityField,
        value: &Val,
        config: Option<InputTypeConfig>,
    ) -> Result<Option<Id>, MutationExecutionError> {
        let relation = field.relation().ok_or_else(|| {
            MutationExecutionError::Generic(format!("'{}' is not a relation", field.name))
        })?;
        let related = self.model.related_entity(relation);

        match value {
            Val::Null => Ok(None),
            Val::Object(nested) => {
                let config = config.unwrap_or_default();
                let record = self.create(tx, related, nested, &config, false).await?;
                Ok(Some(record_id(related, &record)?))
            }
            value => Ok(Some(
                self.existing_id(tx, related, value, &field.name).await?,
            )),
        }
    }

    async fn existing_id(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        value: &Val,
        input_field: &str,
    ) -> Result<Id, MutationExecutionError> {
        let id = disambiguate_id(value).ok_or_else(|| {
            MutationExecutionError::Validation(
                input_field.to_string(),
                format!("{value} is not a valid identifier"),
            )
        })?;
        tx.fetch(&table_ref(entity), &id).await?;
        Ok(id)
    }

    async fn apply_relations(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        id: &Id,
        writes: PendingWrites,
    ) -> Result<(), MutationExecutionError> {
        let PendingWrites {
            reverse_one_to_one,
            many_to_many,
            many_to_one,
            ..
        } = writes;

        for (name, value, config) in reverse_one_to_one {
            let field = self.relation_field(entity, &name)?;
            self.apply_reverse_one_to_one(tx, field, id, &value, config)
                .await
                .with_context(format!("while processing '{name}'"))?;
        }

        for (name, operations) in many_to_one {
            if operations.is_empty() {
                continue;
            }
            let field = self.relation_field(entity, &name)?;
            self.apply_many_to_one(tx, field, id, operations)
                .await
                .with_context(format!("while processing '{name}'"))?;
        }

        for (name, operations) in many_to_many {
            if operations.is_empty() {
                continue;
            }
            let field = self.relation_field(entity, &name)?;
            self.apply_many_to_many(tx, entity, field, id, operations)
                .await
                .with_context(format!("while processing '{name}'"))?;
        }

        Ok(())
    }

    fn relation_field<'e>(
        &self,
        entity: &'e EntityType,
        name: &str,
    ) -> Result<&'e EntityField, MutationExecutionError> {
        entity
            .field(name)
            .filter(|field| field.relation().is_some())
            .ok_or_else(|| {
                MutationExecutionError::Generic(format!(
                    "{} has no relationship '{name}'",
                    entity.name
                ))
            })
    }

    /// The forward field on the other side of a reverse relation, with the entity it belongs to.
    fn reverse_side(
        &self,
        field: &EntityField,
    ) -> Result<(&'a EntityType, &'a EntityField), MutationExecutionError> {
        let model = self.model;
        let missing = || {
            MutationExecutionError::Generic(format!(
                "Relationship '{}' has no reciprocal field",
                field.name
            ))
        };

        let relation = field.relation().ok_or_else(missing)?;
        let reciprocal = model.reciprocal_field(field).ok_or_else(missing)?;
        Ok((model.related_entity(relation), reciprocal))
    }

    async fn apply_reverse_one_to_one(
        &mut self,
        tx: &mut dyn Transaction,
        field: &EntityField,
        parent_id: &Id,
        value: &Val,
        config: Option<InputTypeConfig>,
    ) -> Result<(), MutationExecutionError> {
        let (related, reciprocal) = self.reverse_side(field)?;
        let attribute = reciprocal.attribute_name();

        let current = tx
            .find(&table_ref(related), &Filter::eq(&attribute, parent_id.to_val()))
            .await?
            .first()
            .map(|record| record_id(related, record))
            .transpose()?;

        match value {
            Val::Null => {
                if let Some(current) = current {
                    self.detach(tx, related, &current, &attribute, reciprocal.nullable)
                        .await?;
                }
            }
            Val::Object(nested) => {
                let mut nested = nested.clone();
                nested.insert(reciprocal.name.clone(), parent_id.to_val());
                let config = config.unwrap_or_default();

                match current {
                    Some(current) => {
                        self.update(tx, related, &current, &nested, &config, false)
                            .await?;
                    }
                    None => {
                        self.create(tx, related, &nested, &config, false).await?;
                    }
                }
            }
            value => {
                let target = self.existing_id(tx, related, value, &field.name).await?;
                if current.as_ref() != Some(&target) {
                    if let Some(current) = current {
                        self.detach(tx, related, &current, &attribute, reciprocal.nullable)
                            .await?;
                    }
                    self.attach(tx, related, &target, &attribute, parent_id)
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn apply_many_to_many(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        field: &EntityField,
        parent_id: &Id,
        operations: Vec<PlannedOperation>,
    ) -> Result<(), MutationExecutionError> {
        let (link, side) = link_table_ref(self.model, entity, field).ok_or_else(|| {
            MutationExecutionError::Generic(format!("'{}' is not many-to-many", field.name))
        })?;
        let Some(relation) = field.relation() else {
            return Ok(());
        };
        let related = self.model.related_entity(relation);

        let mut buckets = RelationBuckets::default();
        for operation in &operations {
            // Nested rows are created for `add`/`exact`; only `update` may touch existing ones
            let upsert = operation.operation == Operation::Update;
            let ids = self
                .resolve_targets(tx, related, operation, None, upsert)
                .await?;
            buckets.fill(operation.operation, ids);
        }

        let before = tx.linked(&link, side, parent_id).await?;
        if let Some(to_set) = &buckets.to_set {
            tx.set_links(&link, side, parent_id, to_set).await?;
        }
        if !buckets.to_add.is_empty() {
            tx.link(&link, side, parent_id, &buckets.to_add).await?;
        }
        if !buckets.to_remove.is_empty() {
            tx.unlink(&link, side, parent_id, &buckets.to_remove)
                .await?;
        }

        // Both ends of a link that appeared or went away count as updated
        let after = tx.linked(&link, side, parent_id).await?;
        let changed: Vec<Id> = before
            .iter()
            .filter(|id| !after.contains(id))
            .chain(after.iter().filter(|id| !before.contains(id)))
            .cloned()
            .collect();
        if !changed.is_empty() {
            self.record_change(&entity.name, ChangeKind::Updated, parent_id);
            for id in &changed {
                self.record_change(&related.name, ChangeKind::Updated, id);
            }
        }

        debug!(
            field = %field.name,
            added = buckets.to_add.len(),
            removed = buckets.to_remove.len(),
            replaced = buckets.to_set.is_some(),
            "Applied many-to-many operations"
        );
        Ok(())
    }

    async fn apply_many_to_one(
        &mut self,
        tx: &mut dyn Transaction,
        field: &EntityField,
        parent_id: &Id,
        operations: Vec<PlannedOperation>,
    ) -> Result<(), MutationExecutionError> {
        let (related, reciprocal) = self.reverse_side(field)?;
        let attribute = reciprocal.attribute_name();
        let nullable = reciprocal.nullable;

        let mut buckets = RelationBuckets::default();
        for operation in &operations {
            let parent = (reciprocal.name.as_str(), parent_id);
            let ids = self
                .resolve_targets(tx, related, operation, Some(parent), true)
                .await?;
            buckets.fill(operation.operation, ids);
        }

        if let Some(to_set) = &buckets.to_set {
            let current = tx
                .find(&table_ref(related), &Filter::eq(&attribute, parent_id.to_val()))
                .await?;
            for record in current {
                let current_id = record_id(related, &record)?;
                if !to_set.contains(&current_id) {
                    self.detach(tx, related, &current_id, &attribute, nullable)
                        .await?;
                }
            }
            for id in to_set {
                self.attach(tx, related, id, &attribute, parent_id).await?;
            }
        }

        for id in &buckets.to_add {
            self.attach(tx, related, id, &attribute, parent_id).await?;
        }

        for id in &buckets.to_remove {
            let record = tx.fetch(&table_ref(related), id).await?;
            let related_to_parent = record
                .get(&attribute)
                .is_some_and(|value| value.loosely_eq(&parent_id.to_val()));

            if related_to_parent {
                self.detach(tx, related, id, &attribute, nullable).await?;
            } else {
                debug!(entity = %related.name, id = %id, "Skipping removal of an unrelated row");
            }
        }

        Ok(())
    }

    /// Turn the values of one planned operation into ids of `related` rows, creating or updating
    /// nested rows along the way. `parent` names the field (and id) nested rows must point back
    /// through.
    async fn resolve_targets(
        &mut self,
        tx: &mut dyn Transaction,
        related: &EntityType,
        operation: &PlannedOperation,
        parent: Option<(&str, &Id)>,
        upsert: bool,
    ) -> Result<Vec<Id>, MutationExecutionError> {
        let mut ids = Vec::with_capacity(operation.values.len());

        for value in &operation.values {
            let id = match (value, &operation.nested_config) {
                (Val::Object(nested), Some(config)) => {
                    let mut nested = nested.clone();
                    if let Some((reciprocal, parent_id)) = parent {
                        nested.insert(reciprocal.to_string(), parent_id.to_val());
                    }

                    if operation.operation == Operation::Remove {
                        let key = nested.get(&related.pk_field).ok_or_else(|| {
                            MutationExecutionError::MissingArgument(format!(
                                "{}.{}",
                                operation.input_field, related.pk_field
                            ))
                        })?;
                        self.existing_id(tx, related, key, &operation.input_field)
                            .await?
                    } else if upsert {
                        self.upsert(tx, related, &nested, config).await?
                    } else {
                        let record = self.create(tx, related, &nested, config, false).await?;
                        record_id(related, &record)?
                    }
                }
                (value, _) => {
                    self.existing_id(tx, related, value, &operation.input_field)
                        .await?
                }
            };
            ids.push(id);
        }

        Ok(ids)
    }

    /// Update the row a nested payload names through its primary key, or create it when the key
    /// is absent or matches no row.
    #[async_recursion]
    async fn upsert(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        payload: &ValObject,
        config: &InputTypeConfig,
    ) -> Result<Id, MutationExecutionError> {
        if let Some(id) = payload.get(&entity.pk_field).and_then(disambiguate_id) {
            match tx.fetch(&table_ref(entity), &id).await {
                Ok(_) => {
                    self.update(tx, entity, &id, payload, config, false).await?;
                    return Ok(id);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        let record = self.create(tx, entity, payload, config, false).await?;
        record_id(entity, &record)
    }

    async fn attach(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        id: &Id,
        attribute: &str,
        parent_id: &Id,
    ) -> Result<(), MutationExecutionError> {
        let values = Record::from_iter([(attribute.to_string(), parent_id.to_val())]);
        self.update_row(tx, entity, id, values).await?;
        Ok(())
    }

    /// Cut a row loose from its parent: clear the key when it may be null, delete the row when
    /// it can't exist on its own.
    async fn detach(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        id: &Id,
        attribute: &str,
        nullable: bool,
    ) -> Result<(), MutationExecutionError> {
        if nullable {
            let values = Record::from_iter([(attribute.to_string(), Val::Null)]);
            self.update_row(tx, entity, id, values).await?;
        } else {
            self.delete(tx, entity, id).await?;
        }
        Ok(())
    }

    async fn insert_row(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        values: Record,
    ) -> Result<Record, MutationExecutionError> {
        let record = tx.insert(&table_ref(entity), values).await?;
        let id = record_id(entity, &record)?;
        self.record_change(&entity.name, ChangeKind::Created, &id);
        Ok(record)
    }

    async fn update_row(
        &mut self,
        tx: &mut dyn Transaction,
        entity: &EntityType,
        id: &Id,
        values: Record,
    ) -> Result<Record, MutationExecutionError> {
        let record = tx.update(&table_ref(entity), id, values).await?;
        self.record_change(&entity.name, ChangeKind::Updated, id);
        Ok(record)
    }

    /// Record a change, folding updates of rows this mutation created or already updated.
    fn record_change(&mut self, entity: &str, kind: ChangeKind, id: &Id) {
        let seen = |change: &ChangeEvent, kind: ChangeKind| {
            change.entity == entity && change.kind == kind && &change.id == id
        };

        let redundant = match kind {
            ChangeKind::Updated => self
                .changes
                .iter()
                .any(|change| seen(change, ChangeKind::Created) || seen(change, ChangeKind::Updated)),
            ChangeKind::Created | ChangeKind::Deleted => false,
        };

        if !redundant {
            self.changes.push(ChangeEvent::new(entity, kind, id.clone()));
        }
    }
}
