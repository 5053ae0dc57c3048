// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Declarative configuration of generated input types.
//!
//! An [`InputTypeConfig`] is what an application author writes for each mutation (and, through
//! [`ExtraEntry::config`], for each nested type). Once compiled it is immutable and shared through
//! the [`crate::type_meta_registry::TypeMetaRegistry`].

use std::fmt::Display;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::FieldType;

/// The canonical relationship operations.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Replace the relation with exactly the given set
    Exact,
    /// Union in the given rows (creating nested ones first)
    Add,
    /// Detach the given rows (or delete them, if they can't exist detached)
    Remove,
    /// Modify existing rows in place (inserting absent ones)
    Update,
}

impl Operation {
    /// Resolve an operation name, accepting the aliases `patch`, `append`, `create` and `delete`.
    pub fn resolve(name: &str) -> Option<Operation> {
        match name {
            "exact" => Some(Operation::Exact),
            "add" | "append" | "create" => Some(Operation::Add),
            "remove" | "delete" => Some(Operation::Remove),
            "update" | "patch" => Some(Operation::Update),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Exact => "exact",
            Operation::Add => "add",
            Operation::Remove => "remove",
            Operation::Update => "update",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the payload of a relationship extra is typed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum TargetType {
    /// Bare identifiers of existing rows
    Id,
    /// A nested input type synthesized for this extra
    Auto,
    /// A nested input type generated elsewhere (for example, another mutation's input)
    Named(String),
}

impl TargetType {
    pub fn type_name(&self) -> Option<&str> {
        match self {
            TargetType::Named(name) => Some(name),
            TargetType::Id | TargetType::Auto => None,
        }
    }
}

/// One operation exposed on a relationship field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExtraEntry {
    pub target: TargetType,
    /// The operation this entry performs when its key is a custom name (`"add_new"` with
    /// `operation: "add"`)
    pub operation: Option<String>,
    /// Name for the synthesized type of an `Auto` target
    pub type_name: Option<String>,
    /// Configuration of the nested type. Its auto-context fields and extras are also mixed into
    /// the configuration used when executing nested payloads.
    pub config: InputTypeConfig,
}

impl ExtraEntry {
    fn with_target(target: TargetType) -> Self {
        Self {
            target,
            operation: None,
            type_name: None,
            config: InputTypeConfig::default(),
        }
    }

    pub fn id() -> Self {
        Self::with_target(TargetType::Id)
    }

    pub fn auto() -> Self {
        Self::with_target(TargetType::Auto)
    }

    pub fn named(type_name: impl Into<String>) -> Self {
        Self::with_target(TargetType::Named(type_name.into()))
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_config(mut self, config: InputTypeConfig) -> Self {
        self.config = config;
        self
    }

    /// The canonical operation of an entry declared under `key`: the explicit `operation` if
    /// present, otherwise the key itself.
    pub fn canonical_operation(&self, key: &str) -> Option<Operation> {
        Operation::resolve(self.operation.as_deref().unwrap_or(key))
    }
}

/// Field name to (operation key to entry)
pub type RelationshipExtras = IndexMap<String, IndexMap<String, ExtraEntry>>;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct InputTypeConfig {
    pub only_fields: Vec<String>,
    pub exclude_fields: Vec<String>,
    pub optional_fields: Vec<String>,
    pub required_fields: Vec<String>,
    pub many_to_many_extras: RelationshipExtras,
    pub many_to_one_extras: RelationshipExtras,
    pub foreign_key_extras: IndexMap<String, ExtraEntry>,
    pub one_to_one_extras: IndexMap<String, ExtraEntry>,
    /// Input field name to context attribute name
    pub auto_context_fields: IndexMap<String, String>,
    pub field_types: IndexMap<String, FieldType>,
    pub retain_primary_key: bool,
}

fn strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl InputTypeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn only<I: IntoIterator<Item = S>, S: Into<String>>(mut self, fields: I) -> Self {
        self.only_fields.extend(strings(fields));
        self
    }

    pub fn exclude<I: IntoIterator<Item = S>, S: Into<String>>(mut self, fields: I) -> Self {
        self.exclude_fields.extend(strings(fields));
        self
    }

    pub fn optional<I: IntoIterator<Item = S>, S: Into<String>>(mut self, fields: I) -> Self {
        self.optional_fields.extend(strings(fields));
        self
    }

    pub fn required<I: IntoIterator<Item = S>, S: Into<String>>(mut self, fields: I) -> Self {
        self.required_fields.extend(strings(fields));
        self
    }

    pub fn many_to_many_extra(
        mut self,
        field: impl Into<String>,
        key: impl Into<String>,
        entry: ExtraEntry,
    ) -> Self {
        self.many_to_many_extras
            .entry(field.into())
            .or_default()
            .insert(key.into(), entry);
        self
    }

    pub fn many_to_one_extra(
        mut self,
        field: impl Into<String>,
        key: impl Into<String>,
        entry: ExtraEntry,
    ) -> Self {
        self.many_to_one_extras
            .entry(field.into())
            .or_default()
            .insert(key.into(), entry);
        self
    }

    pub fn foreign_key_extra(mut self, field: impl Into<String>, entry: ExtraEntry) -> Self {
        self.foreign_key_extras.insert(field.into(), entry);
        self
    }

    pub fn one_to_one_extra(mut self, field: impl Into<String>, entry: ExtraEntry) -> Self {
        self.one_to_one_extras.insert(field.into(), entry);
        self
    }

    pub fn auto_context(mut self, field: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.auto_context_fields
            .insert(field.into(), attribute.into());
        self
    }

    pub fn field_type(mut self, field: impl Into<String>, field_type: FieldType) -> Self {
        self.field_types.insert(field.into(), field_type);
        self
    }

    pub fn retain_primary_key(mut self) -> Self {
        self.retain_primary_key = true;
        self
    }

    /// Explicit requiredness of a field (`required` wins over `optional`)
    pub fn requiredness_override(&self, field: &str) -> Option<bool> {
        if self.required_fields.iter().any(|name| name == field) {
            Some(true)
        } else if self.optional_fields.iter().any(|name| name == field) {
            Some(false)
        } else {
            None
        }
    }

    /// Whether the field is excluded by `exclude` or falls outside a non-empty `only`
    pub fn skips(&self, field: &str) -> bool {
        self.exclude_fields.iter().any(|name| name == field)
            || (!self.only_fields.is_empty() && !self.only_fields.iter().any(|name| name == field))
    }

    /// Whether the payload field is driven by an extra (and so handled in a later phase).
    /// A collection's bare name only belongs to its extras when an `exact` entry claims it.
    pub fn is_extra_field(&self, field: &str) -> bool {
        let claims_exact = |extras: &RelationshipExtras| {
            extras.get(field).is_some_and(|entries| {
                entries
                    .iter()
                    .any(|(key, entry)| entry.canonical_operation(key) == Some(Operation::Exact))
            })
        };

        claims_exact(&self.many_to_many_extras)
            || claims_exact(&self.many_to_one_extras)
            || self.foreign_key_extras.contains_key(field)
            || self.one_to_one_extras.contains_key(field)
    }

    /// Mix `overrides`' auto-context fields and extras into this configuration. Entries of
    /// `overrides` win on collision; everything else is kept from `self`.
    pub fn merge(&self, overrides: &InputTypeConfig) -> InputTypeConfig {
        fn merge_nested(base: &mut RelationshipExtras, overrides: &RelationshipExtras) {
            for (field, entries) in overrides {
                let merged = base.entry(field.clone()).or_default();
                for (key, entry) in entries {
                    merged.insert(key.clone(), entry.clone());
                }
            }
        }

        let mut merged = self.clone();

        for (field, attribute) in &overrides.auto_context_fields {
            merged
                .auto_context_fields
                .insert(field.clone(), attribute.clone());
        }
        merge_nested(&mut merged.many_to_many_extras, &overrides.many_to_many_extras);
        merge_nested(&mut merged.many_to_one_extras, &overrides.many_to_one_extras);
        for (field, entry) in &overrides.foreign_key_extras {
            merged.foreign_key_extras.insert(field.clone(), entry.clone());
        }
        for (field, entry) in &overrides.one_to_one_extras {
            merged.one_to_one_extras.insert(field.clone(), entry.clone());
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_resolve_through_aliases() {
        assert_eq!(Operation::resolve("patch"), Some(Operation::Update));
        assert_eq!(Operation::resolve("append"), Some(Operation::Add));
        assert_eq!(Operation::resolve("create"), Some(Operation::Add));
        assert_eq!(Operation::resolve("delete"), Some(Operation::Remove));
        assert_eq!(Operation::resolve("exact"), Some(Operation::Exact));
        assert_eq!(Operation::resolve("replace"), None);

        let entry = ExtraEntry::auto().with_operation("patch");
        assert_eq!(entry.canonical_operation("edit"), Some(Operation::Update));
        assert_eq!(ExtraEntry::id().canonical_operation("add"), Some(Operation::Add));
        assert_eq!(ExtraEntry::id().canonical_operation("add_new"), None);
    }

    #[test]
    fn field_selection() {
        let config = InputTypeConfig::new()
            .only(["title", "venue"])
            .exclude(["venue"])
            .optional(["title"]);

        assert!(!config.skips("title"));
        assert!(config.skips("venue"));
        assert!(config.skips("status"));
        assert_eq!(config.requiredness_override("title"), Some(false));
        assert_eq!(config.requiredness_override("status"), None);

        let both = InputTypeConfig::new().optional(["title"]).required(["title"]);
        assert_eq!(both.requiredness_override("title"), Some(true));
    }

    #[test]
    fn merge_prefers_overrides() {
        let registered = InputTypeConfig::new()
            .exclude(["created_at"])
            .auto_context("organizer", "user")
            .auto_context("venue", "default_venue")
            .many_to_many_extra("artists", "add", ExtraEntry::id())
            .many_to_many_extra("artists", "exact", ExtraEntry::id());

        let overrides = InputTypeConfig::new()
            .auto_context("venue", "venue")
            .many_to_many_extra("artists", "add", ExtraEntry::auto());

        let merged = registered.merge(&overrides);

        assert_eq!(merged.exclude_fields, vec!["created_at"]);
        assert_eq!(merged.auto_context_fields["organizer"], "user");
        assert_eq!(merged.auto_context_fields["venue"], "venue");
        assert_eq!(merged.many_to_many_extras["artists"]["add"], ExtraEntry::auto());
        assert_eq!(merged.many_to_many_extras["artists"]["exact"], ExtraEntry::id());
    }

    #[test]
    fn collections_claim_their_name_only_through_exact() {
        let additive = InputTypeConfig::new()
            .many_to_many_extra("artists", "add", ExtraEntry::id())
            .many_to_one_extra("tickets", "remove", ExtraEntry::id());
        assert!(!additive.is_extra_field("artists"));
        assert!(!additive.is_extra_field("tickets"));

        let replacing = InputTypeConfig::new()
            .many_to_many_extra("artists", "set", ExtraEntry::id().with_operation("exact"))
            .many_to_one_extra("tickets", "exact", ExtraEntry::auto());
        assert!(replacing.is_extra_field("artists"));
        assert!(replacing.is_extra_field("tickets"));

        let single = InputTypeConfig::new()
            .foreign_key_extra("venue", ExtraEntry::auto())
            .one_to_one_extra("profile", ExtraEntry::id());
        assert!(single.is_extra_field("venue"));
        assert!(single.is_extra_field("profile"));
        assert!(!single.is_extra_field("title"));
    }

    #[test]
    fn empty_configuration() {
        assert!(InputTypeConfig::new().is_empty());
        assert!(!InputTypeConfig::new().retain_primary_key().is_empty());
    }
}
