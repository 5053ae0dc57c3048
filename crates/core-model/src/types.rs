// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use serde::{Deserialize, Serialize};

use crate::mapped_arena::{SerializableSlabIndex, shallow_index};

pub type EntityId = SerializableSlabIndex<EntityType>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryKeyKind {
    AutoIncrement,
    Uuid,
    /// Supplied by the caller (natural keys)
    Natural,
}

/// One persistent record type.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EntityType {
    pub name: String,
    pub table_name: String,
    /// Fields in declaration order (input types preserve this order)
    pub fields: Vec<EntityField>,
    pub pk_field: String,
    pub pk_kind: PrimaryKeyKind,
    pub doc_comments: Option<String>,
}

impl EntityType {
    /// An entity with an auto-increment `id` primary key.
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            fields: vec![EntityField::scalar("id", ScalarType::Int).with_default()],
            pk_field: "id".to_string(),
            pk_kind: PrimaryKeyKind::AutoIncrement,
            doc_comments: None,
        }
    }

    /// Replace the primary key. UUID and auto-increment keys are generated by the store, so they
    /// carry a default; natural keys don't.
    pub fn with_primary_key(mut self, field: EntityField, kind: PrimaryKeyKind) -> Self {
        self.fields.retain(|existing| existing.name != self.pk_field);

        let field = match kind {
            PrimaryKeyKind::Natural => field,
            PrimaryKeyKind::AutoIncrement | PrimaryKeyKind::Uuid => field.with_default(),
        };
        self.pk_field = field.name.clone();
        self.pk_kind = kind;
        self.fields.insert(0, field);
        self
    }

    pub fn with_field(mut self, field: EntityField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comments = Some(doc.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&EntityField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn pk(&self) -> Option<&EntityField> {
        self.field(&self.pk_field)
    }

    pub fn is_pk(&self, field: &EntityField) -> bool {
        field.name == self.pk_field
    }

    /// The stored attribute of the primary key
    pub fn pk_column(&self) -> String {
        self.pk()
            .map(EntityField::attribute_name)
            .unwrap_or_else(|| self.pk_field.clone())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoTimestamp {
    /// Set once, when the row is created (`auto_now_add`)
    OnCreate,
    /// Refreshed on every save (`auto_now`)
    OnSave,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EntityField {
    pub name: String,
    pub kind: FieldKind,
    /// For forward relations and scalars: whether the stored value may be null. For many-to-many
    /// fields: whether the collection may be left empty. For reverse relations: whether the
    /// reciprocal key may be null (derived when the model is built).
    pub nullable: bool,
    pub has_default: bool,
    pub auto_timestamp: Option<AutoTimestamp>,
    /// Explicit stored column (for foreign keys, overrides `<name>_id`)
    pub column: Option<String>,
    pub doc_comments: Option<String>,
}

impl EntityField {
    fn of_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            has_default: false,
            auto_timestamp: None,
            column: None,
            doc_comments: None,
        }
    }

    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::of_kind(name, FieldKind::Scalar(scalar))
    }

    pub fn choice(name: impl Into<String>, choices: Vec<Choice>) -> Self {
        Self::of_kind(name, FieldKind::Choice(choices))
    }

    pub fn foreign_key(
        name: impl Into<String>,
        entity: impl Into<String>,
        reciprocal: Option<&str>,
    ) -> Self {
        Self::of_kind(
            name,
            FieldKind::ForeignKey(Relation::new(entity, reciprocal)),
        )
    }

    pub fn one_to_one(
        name: impl Into<String>,
        entity: impl Into<String>,
        reciprocal: Option<&str>,
    ) -> Self {
        Self::of_kind(
            name,
            FieldKind::OneToOneForward(Relation::new(entity, reciprocal)),
        )
    }

    pub fn one_to_one_reverse(
        name: impl Into<String>,
        entity: impl Into<String>,
        reciprocal: &str,
    ) -> Self {
        Self::of_kind(
            name,
            FieldKind::OneToOneReverse(Relation::new(entity, Some(reciprocal))),
        )
    }

    pub fn many_to_one_reverse(
        name: impl Into<String>,
        entity: impl Into<String>,
        reciprocal: &str,
    ) -> Self {
        Self::of_kind(
            name,
            FieldKind::ManyToOneReverse(Relation::new(entity, Some(reciprocal))),
        )
    }

    pub fn many_to_many(
        name: impl Into<String>,
        entity: impl Into<String>,
        reciprocal: Option<&str>,
        link_table: LinkTable,
    ) -> Self {
        Self::of_kind(
            name,
            FieldKind::ManyToMany(Relation::new(entity, reciprocal), link_table),
        )
    }

    /// A persistence-layer field with no input representation
    pub fn other(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::of_kind(name, FieldKind::Other(kind.into()))
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn auto_now(mut self) -> Self {
        self.auto_timestamp = Some(AutoTimestamp::OnSave);
        self
    }

    pub fn auto_now_add(mut self) -> Self {
        self.auto_timestamp = Some(AutoTimestamp::OnCreate);
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc_comments = Some(doc.into());
        self
    }

    /// Mark a reverse relation as having no backward reference (it is never exposed as input).
    pub fn hidden(mut self) -> Self {
        if let Some(relation) = self.kind.relation_mut() {
            relation.hidden = true;
        }
        self
    }

    /// The attribute the value of this field is stored under.
    ///
    /// Forward keys (foreign key, forward one-to-one) are stored as `<name>_id` unless an explicit
    /// column is declared.
    pub fn attribute_name(&self) -> String {
        match (&self.column, &self.kind) {
            (Some(column), _) => column.clone(),
            (None, FieldKind::ForeignKey(_) | FieldKind::OneToOneForward(_)) => {
                format!("{}_id", self.name)
            }
            (None, _) => self.name.clone(),
        }
    }

    pub fn relation(&self) -> Option<&Relation> {
        self.kind.relation()
    }

    pub fn is_hidden(&self) -> bool {
        self.relation().is_some_and(|relation| relation.hidden)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum FieldKind {
    Scalar(ScalarType),
    Choice(Vec<Choice>),
    ForeignKey(Relation),
    OneToOneForward(Relation),
    OneToOneReverse(Relation),
    ManyToOneReverse(Relation),
    ManyToMany(Relation, LinkTable),
    Other(String),
}

impl FieldKind {
    pub fn relation(&self) -> Option<&Relation> {
        match self {
            FieldKind::ForeignKey(relation)
            | FieldKind::OneToOneForward(relation)
            | FieldKind::OneToOneReverse(relation)
            | FieldKind::ManyToOneReverse(relation)
            | FieldKind::ManyToMany(relation, _) => Some(relation),
            FieldKind::Scalar(_) | FieldKind::Choice(_) | FieldKind::Other(_) => None,
        }
    }

    pub fn relation_mut(&mut self) -> Option<&mut Relation> {
        match self {
            FieldKind::ForeignKey(relation)
            | FieldKind::OneToOneForward(relation)
            | FieldKind::OneToOneReverse(relation)
            | FieldKind::ManyToOneReverse(relation)
            | FieldKind::ManyToMany(relation, _) => Some(relation),
            FieldKind::Scalar(_) | FieldKind::Choice(_) | FieldKind::Other(_) => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, FieldKind::ManyToMany(..) | FieldKind::ManyToOneReverse(_))
    }

    /// Relations whose key lives on the other side
    pub fn is_reverse(&self) -> bool {
        matches!(
            self,
            FieldKind::OneToOneReverse(_) | FieldKind::ManyToOneReverse(_)
        )
    }

    pub fn kind_name(&self) -> &str {
        match self {
            FieldKind::Scalar(_) => "scalar",
            FieldKind::Choice(_) => "choice",
            FieldKind::ForeignKey(_) => "foreign key",
            FieldKind::OneToOneForward(_) => "one-to-one",
            FieldKind::OneToOneReverse(_) => "reverse one-to-one",
            FieldKind::ManyToOneReverse(_) => "reverse many-to-one",
            FieldKind::ManyToMany(..) => "many-to-many",
            FieldKind::Other(kind) => kind,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Relation {
    pub entity_name: String,
    /// Resolved when the model is built
    pub entity_id: EntityId,
    /// Name of the field on the related entity that points back (if any)
    pub reciprocal: Option<String>,
    pub hidden: bool,
}

impl Relation {
    fn new(entity: impl Into<String>, reciprocal: Option<&str>) -> Self {
        Self {
            entity_name: entity.into(),
            entity_id: shallow_index(),
            reciprocal: reciprocal.map(str::to_string),
            hidden: false,
        }
    }
}

/// The link table backing a many-to-many relation. The declaring (`owner`) side is the left
/// column of each stored pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LinkTable {
    pub name: String,
    pub owner: bool,
}

impl LinkTable {
    pub fn owned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: true,
        }
    }

    pub fn reverse(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Choice {
    pub value: Val,
    pub description: String,
}

impl Choice {
    pub fn new(value: impl Into<Val>, description: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            description: description.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Boolean,
    Int,
    BigInt,
    Float,
    Decimal,
    String,
    Uuid,
    Date,
    Time,
    DateTime,
    Json,
    Binary,
}

impl ScalarType {
    pub fn graphql_name(&self) -> &'static str {
        match self {
            ScalarType::Boolean => "Boolean",
            ScalarType::Int => "Int",
            ScalarType::BigInt => "BigInt",
            ScalarType::Float => "Float",
            ScalarType::Decimal => "Decimal",
            ScalarType::String => "String",
            ScalarType::Uuid => "UUID",
            ScalarType::Date => "Date",
            ScalarType::Time => "Time",
            ScalarType::DateTime => "DateTime",
            ScalarType::Json => "JSONString",
            ScalarType::Binary => "Binary",
        }
    }
}
