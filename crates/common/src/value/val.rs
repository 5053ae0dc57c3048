// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;

use async_graphql_value::ConstValue;
use indexmap::IndexMap;
use serde::de::Error;
use serde::{Deserialize, Serialize};

/// An object value. Field order is significant: mutation payloads are processed in the order
/// the caller supplied them.
pub type ValObject = IndexMap<String, Val>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ValNumber {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl ValNumber {
    pub fn as_f64(&self) -> f64 {
        match self {
            ValNumber::I64(n) => *n as f64,
            ValNumber::U64(n) => *n as f64,
            ValNumber::F64(n) => *n,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ValNumber::I64(n) => Some(*n),
            ValNumber::U64(n) => i64::try_from(*n).ok(),
            ValNumber::F64(_) => None,
        }
    }

    /// Numeric equality across representations (`I64(1)` equals `U64(1)` and `F64(1.0)`)
    pub fn same_number(&self, other: &ValNumber) -> bool {
        match (self.as_i64(), other.as_i64()) {
            (Some(left), Some(right)) => left == right,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl Display for ValNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValNumber::I64(n) => write!(f, "{n}"),
            ValNumber::U64(n) => write!(f, "{n}"),
            ValNumber::F64(n) => write!(f, "{n}"),
        }
    }
}

impl TryFrom<ValNumber> for serde_json::Number {
    type Error = ();

    fn try_from(value: ValNumber) -> Result<Self, Self::Error> {
        match value {
            ValNumber::I64(n) => Ok(serde_json::Number::from(n)),
            ValNumber::U64(n) => Ok(serde_json::Number::from(n)),
            ValNumber::F64(n) => serde_json::Number::from_f64(n).ok_or(()),
        }
    }
}

impl TryFrom<serde_json::Number> for ValNumber {
    type Error = ();

    fn try_from(value: serde_json::Number) -> Result<Self, Self::Error> {
        if let Some(n) = value.as_i64() {
            Ok(ValNumber::I64(n))
        } else if let Some(n) = value.as_u64() {
            Ok(ValNumber::U64(n))
        } else if let Some(n) = value.as_f64() {
            Ok(ValNumber::F64(n))
        } else {
            Err(())
        }
    }
}

impl From<i64> for ValNumber {
    fn from(value: i64) -> Self {
        ValNumber::I64(value)
    }
}

impl From<u64> for ValNumber {
    fn from(value: u64) -> Self {
        ValNumber::U64(value)
    }
}

impl From<f64> for ValNumber {
    fn from(value: f64) -> Self {
        ValNumber::F64(value)
    }
}

/// Represent a value that can be used in:
/// - mutation arguments (including nested payloads)
/// - stored records
/// - context attributes
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Val {
    Bool(bool),
    Number(ValNumber),
    String(String),
    List(Vec<Val>),
    Object(ValObject),
    Binary(bytes::Bytes),
    Enum(String),
    Null,
}

impl Val {
    pub fn get(&self, key: &str) -> Option<&Val> {
        match self {
            Val::Object(o) => o.get(key),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ValObject> {
        match self {
            Val::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Val]> {
        match self {
            Val::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::String(s) | Val::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }

    /// Structural equality that treats numbers by value rather than by representation.
    pub fn loosely_eq(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::Number(left), Val::Number(right)) => left.same_number(right),
            (Val::String(left) | Val::Enum(left), Val::String(right) | Val::Enum(right)) => {
                left == right
            }
            (Val::List(left), Val::List(right)) => {
                left.len() == right.len()
                    && left.iter().zip(right).all(|(l, r)| l.loosely_eq(r))
            }
            (Val::Object(left), Val::Object(right)) => {
                left.len() == right.len()
                    && left
                        .iter()
                        .all(|(k, v)| right.get(k).is_some_and(|r| v.loosely_eq(r)))
            }
            _ => self == other,
        }
    }
}

impl Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Val::Bool(b) => write!(f, "{b}"),
            Val::Number(n) => write!(f, "{n}"),
            Val::String(s) => write!(f, "\"{s}\""),
            Val::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Val::Object(o) => {
                write!(f, "{{")?;
                for (i, (k, v)) in o.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Val::Binary(_) => write!(f, "Binary"),
            Val::Enum(e) => write!(f, "{e}"),
            Val::Null => write!(f, "null"),
        }
    }
}

impl From<i64> for Val {
    fn from(value: i64) -> Self {
        Val::Number(ValNumber::I64(value))
    }
}

impl From<bool> for Val {
    fn from(value: bool) -> Self {
        Val::Bool(value)
    }
}

impl From<&str> for Val {
    fn from(value: &str) -> Self {
        Val::String(value.to_string())
    }
}

impl From<String> for Val {
    fn from(value: String) -> Self {
        Val::String(value)
    }
}

impl<T: Into<Val>> From<Option<T>> for Val {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Val::Null)
    }
}

impl TryInto<serde_json::Value> for Val {
    type Error = serde_json::Error;

    fn try_into(self) -> Result<serde_json::Value, Self::Error> {
        match self {
            Val::Null => Ok(serde_json::Value::Null),
            Val::Bool(b) => Ok(serde_json::Value::Bool(b)),
            Val::Number(n) => {
                Ok(serde_json::Value::Number(n.try_into().map_err(|_| {
                    serde_json::Error::custom("Invalid number")
                })?))
            }
            Val::String(s) => Ok(serde_json::Value::String(s)),
            Val::List(l) => Ok(serde_json::Value::Array(
                l.into_iter()
                    .map(|v| v.try_into())
                    .collect::<Result<_, _>>()?,
            )),
            Val::Object(o) => Ok(serde_json::Value::Object(
                o.into_iter()
                    .map(|(k, v)| Ok((k, v.try_into()?)))
                    .collect::<Result<_, _>>()?,
            )),
            Val::Enum(e) => Ok(serde_json::Value::String(e)),
            Val::Binary(_) => Err(Error::custom("Binary is not supported")),
        }
    }
}

/// GraphQL argument literals. Enum literals (choice members) stay distinct from strings.
impl TryFrom<ConstValue> for Val {
    type Error = serde_json::Error;

    fn try_from(value: ConstValue) -> Result<Self, Self::Error> {
        match value {
            ConstValue::Null => Ok(Val::Null),
            ConstValue::Boolean(b) => Ok(Val::Bool(b)),
            ConstValue::Number(n) => {
                Ok(Val::Number(n.try_into().map_err(|_| {
                    serde_json::Error::custom("Invalid number")
                })?))
            }
            ConstValue::String(s) => Ok(Val::String(s)),
            ConstValue::List(l) => Ok(Val::List(
                l.into_iter()
                    .map(|v| v.try_into())
                    .collect::<Result<_, _>>()?,
            )),
            ConstValue::Object(o) => Ok(Val::Object(
                o.into_iter()
                    .map(|(k, v)| Ok((k.to_string(), v.try_into()?)))
                    .collect::<Result<_, _>>()?,
            )),
            ConstValue::Binary(b) => Ok(Val::Binary(b)),
            ConstValue::Enum(e) => Ok(Val::Enum(e.to_string())),
        }
    }
}

impl From<serde_json::Value> for Val {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Val::Null,
            serde_json::Value::Bool(b) => Val::Bool(b),
            serde_json::Value::Number(n) => n
                .try_into()
                .map(Val::Number)
                .unwrap_or(Val::Null),
            serde_json::Value::String(s) => Val::String(s),
            serde_json::Value::Array(l) => Val::List(l.into_iter().map(|v| v.into()).collect()),
            serde_json::Value::Object(o) => {
                Val::Object(o.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}
