// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use indexmap::IndexMap;

use crate::value::Val;

use super::UserIdentity;

/// Attribute name under which the caller's id is exposed when no explicit attribute shadows it.
pub const USER_ATTRIBUTE: &str = "user";

/// Per-request state handed to every mutation: the caller and the named attributes that
/// auto-context fields copy from.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    user: UserIdentity,
    attributes: IndexMap<String, Val>,
}

impl RequestContext {
    pub fn new(user: UserIdentity) -> Self {
        Self {
            user,
            attributes: IndexMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Val>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Look up a context attribute by name.
    ///
    /// Explicit attributes win; `user` otherwise resolves to the authenticated caller's id.
    pub fn attribute(&self, name: &str) -> Option<Val> {
        match self.attributes.get(name) {
            Some(value) => Some(value.clone()),
            None if name == USER_ATTRIBUTE && self.user.is_authenticated() => {
                self.user.id().cloned()
            }
            None => None,
        }
    }
}
