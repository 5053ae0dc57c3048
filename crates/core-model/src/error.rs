// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelError {
    #[error("Entity '{0}' is defined more than once")]
    DuplicateEntity(String),

    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("Field '{field}' of '{entity}' refers to unknown entity '{target}'")]
    UnknownRelationTarget {
        entity: String,
        field: String,
        target: String,
    },

    #[error("Field '{field}' of '{entity}' names reciprocal '{reciprocal}', which '{target}' doesn't have")]
    UnknownReciprocal {
        entity: String,
        field: String,
        target: String,
        reciprocal: String,
    },

    #[error("Reverse relation '{field}' of '{entity}' must name its reciprocal field")]
    MissingReciprocal { entity: String, field: String },

    #[error("Entity '{entity}' has no primary key field '{field}'")]
    MissingPrimaryKey { entity: String, field: String },
}
