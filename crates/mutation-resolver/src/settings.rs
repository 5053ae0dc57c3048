// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::env::{EnvError, Environment, SystemEnvironment};
use common::env_const::{get_global_id_output, get_max_batch_size};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Largest number of items a batch mutation accepts; unlimited when `None`
    pub max_batch_size: Option<usize>,
    /// Report deleted ids as global ids (`deletedId`) in addition to raw ids
    pub global_id_output: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_batch_size: None,
            global_id_output: true,
        }
    }
}

impl ResolverSettings {
    pub fn from_env(env: &dyn Environment) -> Result<Self, EnvError> {
        Ok(Self {
            max_batch_size: get_max_batch_size(env)?,
            global_id_output: get_global_id_output(env)?,
        })
    }

    /// Settings from the process environment.
    pub fn from_system_env() -> Result<Self, EnvError> {
        Self::from_env(&SystemEnvironment)
    }
}
