// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Generated input types.

use common::value::Val;
use serde::{Deserialize, Serialize};

/// The named type at the bottom of a [`FieldType`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum InputTypeRef {
    Scalar(String),
    Id,
    Enum(String),
    /// A generated input type, referenced by name and checked when the schema is finalized
    Input(String),
}

impl InputTypeRef {
    pub fn name(&self) -> &str {
        match self {
            InputTypeRef::Scalar(name) | InputTypeRef::Enum(name) | InputTypeRef::Input(name) => {
                name
            }
            InputTypeRef::Id => "ID",
        }
    }
}

/// An input field's type. Fields are required unless wrapped in `Optional`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Plain(InputTypeRef),
    List(Box<FieldType>),
    Optional(Box<FieldType>),
}

impl FieldType {
    pub fn id() -> Self {
        FieldType::Plain(InputTypeRef::Id)
    }

    pub fn input(name: impl Into<String>) -> Self {
        FieldType::Plain(InputTypeRef::Input(name.into()))
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        FieldType::Plain(InputTypeRef::Scalar(name.into()))
    }

    pub fn list_of(self) -> Self {
        FieldType::List(Box::new(self))
    }

    pub fn is_required(&self) -> bool {
        !matches!(self, FieldType::Optional(_))
    }

    pub fn optional(self) -> Self {
        match self {
            FieldType::Optional(_) => self,
            _ => FieldType::Optional(Box::new(self)),
        }
    }

    pub fn required(self) -> Self {
        match self {
            FieldType::Optional(underlying) => *underlying,
            _ => self,
        }
    }

    pub fn with_requiredness(self, required: bool) -> Self {
        if required {
            self.required()
        } else {
            self.optional()
        }
    }

    pub fn is_list(&self) -> bool {
        match self {
            FieldType::Optional(underlying) => underlying.is_list(),
            FieldType::List(_) => true,
            FieldType::Plain(_) => false,
        }
    }

    pub fn base(&self) -> &InputTypeRef {
        match self {
            FieldType::Optional(underlying) | FieldType::List(underlying) => underlying.base(),
            FieldType::Plain(base) => base,
        }
    }

    /// The GraphQL type expression (`[ID!]!`, `CreateConcertInput`, ...)
    pub fn sdl(&self) -> String {
        match self {
            FieldType::Optional(underlying) => {
                let required = underlying.sdl();
                required
                    .strip_suffix('!')
                    .map(str::to_string)
                    .unwrap_or(required)
            }
            FieldType::List(underlying) => format!("[{}]!", underlying.sdl()),
            FieldType::Plain(base) => format!("{}!", base.name()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InputField {
    pub name: String,
    pub field_type: FieldType,
    pub description: Option<String>,
}

impl InputField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InputType {
    pub name: String,
    pub fields: Vec<InputField>,
    /// The entity the type creates or updates (absent for argument-only types such as filters)
    pub entity: Option<String>,
    pub description: Option<String>,
}

impl InputType {
    pub fn field(&self, name: &str) -> Option<&InputField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Val,
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<EnumMember>,
}

impl EnumType {
    /// The stored value of a member
    pub fn value_of(&self, member: &str) -> Option<&Val> {
        self.members
            .iter()
            .find(|candidate| candidate.name == member)
            .map(|candidate| &candidate.value)
    }
}
