// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::LazyLock;

use common::value::Val;
use regex::Regex;

use crate::config::Operation;

static NON_NAME_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid regex"));

/// Upper-case the first character and lower-case the rest (`organized_concerts` becomes
/// `Organized_concerts`).
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Name of a synthesized nested input type (`CreateConcertInput` + `add` + `Concert` +
/// `artists` gives `CreateConcertInputAddConcertArtists`).
pub fn nested_type_name(parent_type_name: &str, operation_key: &str, entity: &str, field: &str) -> String {
    format!(
        "{parent_type_name}{}{entity}{}",
        capitalize(operation_key),
        capitalize(field)
    )
}

/// The input field carrying an extra on a collection field: the field itself for `exact`,
/// `<field>_<key>` otherwise.
pub fn extra_field_name(field: &str, key: &str, operation: Operation) -> String {
    if operation == Operation::Exact {
        field.to_string()
    } else {
        format!("{field}_{key}")
    }
}

pub fn choice_enum_name(entity: &str, field: &str) -> String {
    format!("{entity}_{field}")
}

fn choice_label(value: &Val) -> String {
    match value {
        Val::String(s) | Val::Enum(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert a choice value to an enum member name: runs of characters that may not appear in a
/// GraphQL name become `_`, the result is upper-cased, and a name that would start with a digit
/// is prefixed with `A_`.
pub fn choice_member_name(value: &Val) -> String {
    let name = NON_NAME_CHARACTERS
        .replace_all(&choice_label(value), "_")
        .to_uppercase();

    match name.chars().next() {
        Some(first) if !first.is_ascii_digit() => name,
        _ => format!("A_{name}"),
    }
}

/// Member names for a list of choice values, in order. A name already taken gets `_<n>` appended
/// (`n` being the number of members named so far) until it is unique.
pub fn choice_member_names<'a>(values: impl IntoIterator<Item = &'a Val>) -> Vec<String> {
    let mut names: Vec<String> = vec![];

    for value in values {
        let mut name = choice_member_name(value);
        while names.contains(&name) {
            name = format!("{name}_{}", names.len());
        }
        names.push(name);
    }

    names
}
