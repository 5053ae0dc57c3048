// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Val;

/// A canonical (store-native) primary key value.
///
/// `Str` is the last-resort form for keys that are neither integers nor UUIDs (for example,
/// natural string keys).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Id {
    Int(i64),
    Uuid(Uuid),
    Str(String),
}

impl Id {
    pub fn to_val(&self) -> Val {
        match self {
            Id::Int(n) => Val::from(*n),
            Id::Uuid(uuid) => Val::String(uuid.to_string()),
            Id::Str(s) => Val::String(s.clone()),
        }
    }

    /// Read an id from a stored value. Numbers must be integral; strings are taken as UUIDs when
    /// they parse as such.
    pub fn from_val(val: &Val) -> Option<Id> {
        match val {
            Val::Number(n) => n.as_i64().map(Id::Int),
            Val::String(s) => Some(
                Uuid::parse_str(s)
                    .map(Id::Uuid)
                    .unwrap_or_else(|_| Id::Str(s.clone())),
            ),
            _ => None,
        }
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Id::Int(n) => write!(f, "{n}"),
            Id::Uuid(uuid) => write!(f, "{uuid}"),
            Id::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Id::Int(value)
    }
}

impl From<Uuid> for Id {
    fn from(value: Uuid) -> Self {
        Id::Uuid(value)
    }
}

impl From<Id> for Val {
    fn from(value: Id) -> Self {
        value.to_val()
    }
}
