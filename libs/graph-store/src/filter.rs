// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;

use crate::Record;

/// A row predicate over stored attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    /// Attribute equals the value (`Val::Null` matches missing or null attributes)
    Eq(String, Val),
    In(String, Vec<Val>),
    IsNull(String, bool),
    Not(Box<Filter>),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(attribute: impl Into<String>, value: impl Into<Val>) -> Self {
        Filter::Eq(attribute.into(), value.into())
    }

    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::True, other) | (other, Filter::True) => other,
            (Filter::And(mut filters), Filter::And(others)) => {
                filters.extend(others);
                Filter::And(filters)
            }
            (Filter::And(mut filters), other) | (other, Filter::And(mut filters)) => {
                filters.push(other);
                Filter::And(filters)
            }
            (left, right) => Filter::And(vec![left, right]),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let attribute_value = |attribute: &str| record.get(attribute).unwrap_or(&Val::Null);

        match self {
            Filter::True => true,
            Filter::Eq(attribute, value) => attribute_value(attribute).loosely_eq(value),
            Filter::In(attribute, values) => {
                let actual = attribute_value(attribute);
                values.iter().any(|value| actual.loosely_eq(value))
            }
            Filter::IsNull(attribute, is_null) => attribute_value(attribute).is_null() == *is_null,
            Filter::Not(filter) => !filter.matches(record),
            Filter::And(filters) => filters.iter().all(|filter| filter.matches(record)),
        }
    }
}
