// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Client-supplied identifiers arrive as raw integers, UUIDs, decimal strings or opaque global
//! ids (`base64("<Type>:<raw id>")`). [`disambiguate_id`] maps all of them to the stored [`Id`].

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::value::{Id, Val};
use regex::Regex;
use uuid::Uuid;

static TYPE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

pub fn to_global_id(type_name: &str, id: &Id) -> String {
    STANDARD.encode(format!("{type_name}:{id}"))
}

/// Split a global id into its type name and raw id. Tokens that do not decode to
/// `<Type>:<non-empty id>` are not global ids.
pub fn from_global_id(token: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(token).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (type_name, raw) = decoded.split_once(':')?;

    (TYPE_NAME.is_match(type_name) && !raw.is_empty())
        .then(|| (type_name.to_string(), raw.to_string()))
}

/// The stored identifier a client value refers to, or `None` for null (and for values that
/// cannot be identifiers).
pub fn disambiguate_id(value: &Val) -> Option<Id> {
    match value {
        Val::Number(n) => n.as_i64().map(Id::Int),
        Val::String(s) | Val::Enum(s) => Some(disambiguate_str(s)),
        _ => None,
    }
}

fn disambiguate_str(value: &str) -> Id {
    if let Ok(n) = value.parse::<i64>() {
        return Id::Int(n);
    }

    if let Some((_, raw)) = from_global_id(value) {
        return raw_id(&raw);
    }

    raw_id(value)
}

fn raw_id(value: &str) -> Id {
    if let Ok(n) = value.parse::<i64>() {
        Id::Int(n)
    } else if let Ok(uuid) = Uuid::parse_str(value) {
        Id::Uuid(uuid)
    } else {
        Id::Str(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_survive_every_encoding() {
        let uuid = Uuid::new_v4();
        let ids = [Id::Int(7), Id::Uuid(uuid), Id::Str("summer-fest".into())];

        for id in ids {
            let global = to_global_id("Concert", &id);
            assert_eq!(disambiguate_id(&Val::String(global)), Some(id.clone()));
            assert_eq!(disambiguate_id(&id.to_val()), Some(id));
        }

        assert_eq!(disambiguate_id(&Val::String("42".into())), Some(Id::Int(42)));
        assert_eq!(disambiguate_id(&Val::Null), None);
        assert_eq!(disambiguate_id(&Val::Bool(true)), None);
    }

    #[test]
    fn global_ids_need_a_type_and_an_id() {
        assert_eq!(to_global_id("Concert", &Id::Int(1)), "Q29uY2VydDox");
        assert_eq!(
            from_global_id("Q29uY2VydDox"),
            Some(("Concert".to_string(), "1".to_string()))
        );

        let no_id = STANDARD.encode("Concert:");
        assert_eq!(from_global_id(&no_id), None);
        let bad_type = STANDARD.encode("not a type:1");
        assert_eq!(from_global_id(&bad_type), None);
        assert_eq!(from_global_id("not base64!"), None);

        // Plain strings that aren't global ids are kept as they are
        assert_eq!(
            disambiguate_id(&Val::from("summer-fest")),
            Some(Id::Str("summer-fest".into()))
        );
    }
}
