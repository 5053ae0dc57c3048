// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use core_model::error::ModelError;
use thiserror::Error;

/// Configuration errors, reported while compiling mutation declarations (before any request is
/// served).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModelBuildingError {
    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("Extra declared for unknown field '{field}' of '{entity}'")]
    UnknownExtraField { entity: String, field: String },

    #[error("Field '{field}' of '{entity}' is a {actual} field and cannot take {expected} extras")]
    ExtraKindMismatch {
        entity: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error(
        "Operation '{operation}' on field '{field}' of '{entity}' is not one of exact, add, remove, update (or an alias)"
    )]
    UnresolvableOperation {
        entity: String,
        field: String,
        operation: String,
    },

    #[error("Field '{field}' of '{entity}' references '{type_name}', whose nested extras must use ID or named types")]
    AutoExtraOnNamedType {
        entity: String,
        field: String,
        type_name: String,
    },

    #[error("Input type '{type_name}' referenced by '{referenced_by}' is never defined")]
    MissingType {
        type_name: String,
        referenced_by: String,
    },

    #[error("Field '{field}' of '{entity}' has unsupported kind '{kind}'")]
    UnsupportedFieldKind {
        entity: String,
        field: String,
        kind: String,
    },

    #[error("Mutation '{0}' is declared more than once")]
    DuplicateMutation(String),

    #[error("{0}")]
    Generic(String),
}
