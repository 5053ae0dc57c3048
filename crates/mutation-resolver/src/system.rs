// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use change_notification::ChangeNotifier;
use common::context::RequestContext;
use common::value::{Id, Val, ValObject};
use core_model::model::DomainModel;
use core_model::types::EntityType;
use graph_store::{Store, Transaction};
use indexmap::IndexMap;
use mutation_builder::config::InputTypeConfig;
use mutation_builder::error::ModelBuildingError;
use mutation_builder::input_schema_builder::InputSchemaBuilder;
use mutation_builder::mutation_kind::{
    DATA_ARGUMENT, FILTER_ARGUMENT, ID_ARGUMENT, IDS_ARGUMENT, INPUT_ARGUMENT, MutationKind,
    MutationSignature, build_mutation,
};
use mutation_builder::schema::InputSchema;
use mutation_builder::type_meta_registry::TypeMetaRegistry;
use tracing::{debug, instrument, warn};

use crate::declaration::MutationDeclaration;
use crate::error::{MutationExecutionError, WithContext};
use crate::executor::{MutationExecutor, record_id, table_ref};
use crate::filter::build_filter;
use crate::identifier::{disambiguate_id, to_global_id};
use crate::settings::ResolverSettings;

struct CompiledMutation {
    declaration: MutationDeclaration,
    signature: MutationSignature,
    /// The resolved configuration of the mutation's input type
    config: Arc<InputTypeConfig>,
}

pub struct MutationSystemBuilder {
    model: Arc<DomainModel>,
    store: Arc<dyn Store>,
    declarations: Vec<MutationDeclaration>,
    settings: ResolverSettings,
    notifier: Option<ChangeNotifier>,
}

impl MutationSystemBuilder {
    pub fn new(model: Arc<DomainModel>, store: Arc<dyn Store>) -> Self {
        Self {
            model,
            store,
            declarations: vec![],
            settings: ResolverSettings::default(),
            notifier: None,
        }
    }

    pub fn mutation(mut self, declaration: MutationDeclaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Publish a change event for every row a mutation creates, updates or deletes.
    pub fn with_notifier(mut self, notifier: ChangeNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Compile every declaration into its input types. Fails on the first invalid declaration.
    pub fn build(self) -> Result<MutationSystem, ModelBuildingError> {
        let registry = Arc::new(TypeMetaRegistry::new());
        let mut builder = InputSchemaBuilder::new(&self.model, registry.clone());
        let mut mutations = IndexMap::new();

        for declaration in self.declarations {
            let entity = self.model.entity(&declaration.entity)?;
            let signature = build_mutation(
                &mut builder,
                declaration.kind,
                declaration.name.as_deref(),
                entity,
                &declaration.config,
                &declaration.custom_fields,
            )?;

            if mutations.contains_key(&signature.name) {
                return Err(ModelBuildingError::DuplicateMutation(signature.name));
            }

            let config = match &signature.input_type_name {
                Some(type_name) => registry.get(type_name),
                None => Arc::new(declaration.config.clone()),
            };

            debug!(mutation = %signature.name, entity = %entity.name, "Compiled mutation");
            mutations.insert(
                signature.name.clone(),
                CompiledMutation {
                    declaration,
                    signature,
                    config,
                },
            );
        }

        let schema = builder.finalize()?;

        Ok(MutationSystem {
            model: self.model,
            registry,
            schema,
            mutations,
            store: self.store,
            settings: self.settings,
            notifier: self.notifier,
        })
    }
}

/// Compiled mutations, ready to resolve.
pub struct MutationSystem {
    model: Arc<DomainModel>,
    registry: Arc<TypeMetaRegistry>,
    schema: InputSchema,
    mutations: IndexMap<String, CompiledMutation>,
    store: Arc<dyn Store>,
    settings: ResolverSettings,
    notifier: Option<ChangeNotifier>,
}

impl MutationSystem {
    pub fn schema(&self) -> &InputSchema {
        &self.schema
    }

    pub fn registry(&self) -> &TypeMetaRegistry {
        &self.registry
    }

    pub fn signature(&self, name: &str) -> Option<&MutationSignature> {
        self.mutations.get(name).map(|mutation| &mutation.signature)
    }

    pub fn signatures(&self) -> impl Iterator<Item = &MutationSignature> {
        self.mutations.values().map(|mutation| &mutation.signature)
    }

    /// Resolve the mutation `name` with the given (already validated) arguments.
    ///
    /// Everything the mutation writes happens in one transaction, which is rolled back on any
    /// error. Change events are published only once it has committed.
    #[instrument(name = "MutationSystem::resolve", skip_all, fields(mutation = %name))]
    pub async fn resolve(
        &self,
        name: &str,
        arguments: Val,
        context: &RequestContext,
    ) -> Result<Val, MutationExecutionError> {
        let mutation = self
            .mutations
            .get(name)
            .ok_or_else(|| MutationExecutionError::UnknownMutation(name.to_string()))?;
        let declaration = &mutation.declaration;
        let hooks = declaration.hooks.as_ref();

        let arguments = match arguments {
            Val::Object(arguments) => arguments,
            Val::Null => ValObject::new(),
            _ => {
                return Err(MutationExecutionError::Validation(
                    name.to_string(),
                    "arguments must be an object".to_string(),
                ));
            }
        };
        let arguments = hooks.before_mutate(arguments, context).await?;

        if declaration.login_required && !context.user().is_authenticated() {
            return Err(MutationExecutionError::Unauthenticated);
        }
        let permissions = hooks.get_permissions(&arguments, context, &declaration.permissions);
        hooks.check_permissions(context, &permissions)?;

        for payload in payloads(mutation.signature.kind, &arguments) {
            declaration.field_validators.validate(payload, context)?;
        }
        hooks.validate(&arguments, context).await?;

        self.check_batch_size(mutation.signature.kind, &arguments)?;

        let mut executor = MutationExecutor::new(
            &self.model,
            &self.registry,
            &declaration.field_handlers,
            hooks,
            context,
        );

        let mut tx = self.store.begin().await?;
        let result = match self
            .execute(mutation, &arguments, &mut executor, tx.as_mut())
            .await
        {
            Ok(result) => {
                tx.commit().await?;
                result
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!("Failed to roll back: {rollback_error}");
                }
                return Err(e);
            }
        };

        if let Some(notifier) = &self.notifier {
            for event in executor.into_changes() {
                let delivered = notifier.notify(event);
                debug!(delivered, "Published change");
            }
        }

        hooks.after_mutate(&result, context).await;

        Ok(result)
    }

    fn check_batch_size(
        &self,
        kind: MutationKind,
        arguments: &ValObject,
    ) -> Result<(), MutationExecutionError> {
        let Some(max_batch_size) = self.settings.max_batch_size else {
            return Ok(());
        };

        let argument = match kind {
            MutationKind::BatchCreate | MutationKind::BatchUpdate | MutationKind::BatchPatch => {
                INPUT_ARGUMENT
            }
            MutationKind::BatchDelete => IDS_ARGUMENT,
            _ => return Ok(()),
        };

        let size = arguments
            .get(argument)
            .and_then(Val::as_list)
            .map(<[Val]>::len)
            .unwrap_or_default();

        if size > max_batch_size {
            Err(MutationExecutionError::Validation(
                argument.to_string(),
                format!("at most {max_batch_size} items are allowed, got {size}"),
            ))
        } else {
            Ok(())
        }
    }

    async fn execute(
        &self,
        mutation: &CompiledMutation,
        arguments: &ValObject,
        executor: &mut MutationExecutor<'_>,
        tx: &mut dyn Transaction,
    ) -> Result<Val, MutationExecutionError> {
        let entity = self.model.entity(&mutation.signature.entity)?;
        let config = mutation.config.as_ref();
        let return_field = mutation.declaration.return_field(entity);

        match mutation.signature.kind {
            MutationKind::Create => {
                let input = object_argument(arguments, INPUT_ARGUMENT)?;
                let record = executor.create(tx, entity, input, config, true).await?;
                Ok(object([(return_field.as_str(), Val::Object(record))]))
            }
            MutationKind::Update | MutationKind::Patch => {
                let id = id_argument(arguments.get(ID_ARGUMENT), ID_ARGUMENT)?;
                let input = object_argument(arguments, INPUT_ARGUMENT)?;

                tx.fetch(&table_ref(entity), &id).await?;
                let record = executor.update(tx, entity, &id, input, config, true).await?;
                Ok(object([(return_field.as_str(), Val::Object(record))]))
            }
            MutationKind::Delete => self.delete_one(entity, arguments, executor, tx).await,
            MutationKind::BatchCreate => {
                let mut records = vec![];
                for input in object_list_argument(arguments, INPUT_ARGUMENT)? {
                    let record = executor.create(tx, entity, input, config, true).await?;
                    records.push(Val::Object(record));
                }
                Ok(object([(return_field.as_str(), Val::List(records))]))
            }
            MutationKind::BatchUpdate | MutationKind::BatchPatch => {
                let mut records = vec![];
                for (index, input) in object_list_argument(arguments, INPUT_ARGUMENT)?
                    .into_iter()
                    .enumerate()
                {
                    let id = id_argument(input.get(&entity.pk_field), &entity.pk_field)
                        .with_context(format!("in input {index}"))?;

                    tx.fetch(&table_ref(entity), &id).await?;
                    let record = executor.update(tx, entity, &id, input, config, true).await?;
                    records.push(Val::Object(record));
                }
                Ok(object([(return_field.as_str(), Val::List(records))]))
            }
            MutationKind::BatchDelete => {
                let ids = arguments
                    .get(IDS_ARGUMENT)
                    .and_then(Val::as_list)
                    .ok_or_else(|| {
                        MutationExecutionError::MissingArgument(IDS_ARGUMENT.to_string())
                    })?;

                let mut deleted = vec![];
                let mut missed = vec![];
                for raw in ids {
                    let id = id_argument(Some(raw), IDS_ARGUMENT)?;
                    match tx.fetch(&table_ref(entity), &id).await {
                        Ok(_) => {
                            executor.delete(tx, entity, &id).await?;
                            deleted.push(id.to_val());
                        }
                        Err(e) if e.is_not_found() => missed.push(raw.clone()),
                        Err(e) => return Err(e.into()),
                    }
                }

                Ok(object([
                    ("deletionCount", Val::from(deleted.len() as i64)),
                    ("deletedIds", Val::List(deleted)),
                    ("missedIds", Val::List(missed)),
                ]))
            }
            MutationKind::FilterDelete => {
                let filter = build_filter(entity, object_argument(arguments, FILTER_ARGUMENT)?)?;

                let mut deleted = vec![];
                for record in tx.find(&table_ref(entity), &filter).await? {
                    let id = record_id(entity, &record)?;
                    executor.delete(tx, entity, &id).await?;
                    deleted.push(id.to_val());
                }

                Ok(object([
                    ("deletionCount", Val::from(deleted.len() as i64)),
                    ("deletedIds", Val::List(deleted)),
                ]))
            }
            MutationKind::FilterUpdate => {
                let filter = build_filter(entity, object_argument(arguments, FILTER_ARGUMENT)?)?;
                let data = object_argument(arguments, DATA_ARGUMENT)?;

                let mut updated = vec![];
                for record in tx.find(&table_ref(entity), &filter).await? {
                    let id = record_id(entity, &record)?;
                    let record = executor.update(tx, entity, &id, data, config, true).await?;
                    updated.push(Val::Object(record));
                }

                Ok(object([
                    ("updatedCount", Val::from(updated.len() as i64)),
                    ("updatedObjects", Val::List(updated)),
                ]))
            }
        }
    }

    /// Delete by id. A missing row is reported through `found` rather than as an error.
    async fn delete_one(
        &self,
        entity: &EntityType,
        arguments: &ValObject,
        executor: &mut MutationExecutor<'_>,
        tx: &mut dyn Transaction,
    ) -> Result<Val, MutationExecutionError> {
        let input_id = arguments.get(ID_ARGUMENT).cloned().unwrap_or(Val::Null);
        let id = id_argument(Some(&input_id), ID_ARGUMENT)?;

        match tx.fetch(&table_ref(entity), &id).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                return Ok(object([
                    ("found", Val::Bool(false)),
                    ("deletedId", Val::Null),
                    ("deletedRawId", Val::Null),
                    ("deletedInputId", input_id),
                ]));
            }
            Err(e) => return Err(e.into()),
        }

        executor.delete(tx, entity, &id).await?;

        Ok(object([
            ("found", Val::Bool(true)),
            ("deletedId", self.output_id(entity, &id)),
            ("deletedRawId", id.to_val()),
            ("deletedInputId", input_id),
        ]))
    }

    fn output_id(&self, entity: &EntityType, id: &Id) -> Val {
        if self.settings.global_id_output {
            Val::String(to_global_id(&entity.name, id))
        } else {
            id.to_val()
        }
    }
}

/// The payloads field validators run against.
fn payloads(kind: MutationKind, arguments: &ValObject) -> Vec<&ValObject> {
    let argument = match kind {
        MutationKind::FilterUpdate => DATA_ARGUMENT,
        _ => INPUT_ARGUMENT,
    };

    match arguments.get(argument) {
        Some(Val::Object(payload)) => vec![payload],
        Some(Val::List(payloads)) => payloads.iter().filter_map(Val::as_object).collect(),
        _ => vec![],
    }
}

fn object<const N: usize>(pairs: [(&str, Val); N]) -> Val {
    Val::Object(
        pairs
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

fn object_argument<'a>(
    arguments: &'a ValObject,
    name: &str,
) -> Result<&'a ValObject, MutationExecutionError> {
    arguments
        .get(name)
        .and_then(Val::as_object)
        .ok_or_else(|| MutationExecutionError::MissingArgument(name.to_string()))
}

fn object_list_argument<'a>(
    arguments: &'a ValObject,
    name: &str,
) -> Result<Vec<&'a ValObject>, MutationExecutionError> {
    let items = arguments
        .get(name)
        .and_then(Val::as_list)
        .ok_or_else(|| MutationExecutionError::MissingArgument(name.to_string()))?;

    items
        .iter()
        .map(|item| {
            item.as_object().ok_or_else(|| {
                MutationExecutionError::Validation(name.to_string(), "expected objects".to_string())
            })
        })
        .collect()
}

fn id_argument(value: Option<&Val>, name: &str) -> Result<Id, MutationExecutionError> {
    match value {
        None | Some(Val::Null) => Err(MutationExecutionError::MissingArgument(name.to_string())),
        Some(value) => disambiguate_id(value).ok_or_else(|| {
            MutationExecutionError::Validation(
                name.to_string(),
                format!("{value} is not a valid identifier"),
            )
        }),
    }
}
