// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Id;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{table} matching id '{id}' does not exist")]
    NotFound { table: String, id: Id },

    #[error("{table} with id '{id}' already exists")]
    Conflict { table: String, id: Id },

    #[error("Missing primary key '{column}' for {table}")]
    MissingPrimaryKey { table: String, column: String },

    #[error("{0}")]
    Generic(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
