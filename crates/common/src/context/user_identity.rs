// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashSet;

use crate::value::Val;

/// The caller of a mutation, as established by the (external) authentication layer.
#[derive(Debug, Clone, Default)]
pub struct UserIdentity {
    id: Option<Val>,
    authenticated: bool,
    superuser: bool,
    permissions: HashSet<String>,
}

impl UserIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(id: impl Into<Val>) -> Self {
        Self {
            id: Some(id.into()),
            authenticated: true,
            superuser: false,
            permissions: HashSet::new(),
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn as_superuser(mut self) -> Self {
        self.superuser = true;
        self
    }

    pub fn id(&self) -> Option<&Val> {
        self.id.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// An active superuser holds every permission; anyone else must hold all of `permissions`.
    pub fn has_perms(&self, permissions: &[String]) -> bool {
        if self.authenticated && self.superuser {
            return true;
        }

        permissions
            .iter()
            .all(|permission| self.permissions.contains(permission))
    }
}
