// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use core_model::error::ModelError;
use graph_store::StoreError;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum MutationExecutionError {
    #[error("{0}")]
    Generic(String),

    #[error("Invalid field '{0}': {1}")]
    Validation(String, String),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Model(#[from] ModelError),

    #[error("Not authorized")]
    Authorization,

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Unknown mutation '{0}'")]
    UnknownMutation(String),

    #[error("Missing argument '{0}'")]
    MissingArgument(String),

    #[error("{0} {1}")]
    WithContext(String, #[source] Box<MutationExecutionError>),
}

impl MutationExecutionError {
    pub fn with_context(self, context: String) -> MutationExecutionError {
        MutationExecutionError::WithContext(context, Box::new(self))
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            MutationExecutionError::Store(error) => error.is_not_found(),
            MutationExecutionError::WithContext(_, error) => error.is_not_found(),
            _ => false,
        }
    }

    pub fn user_error_message(&self) -> String {
        match self {
            MutationExecutionError::Authorization => "Not authorized".to_string(),
            MutationExecutionError::Unauthenticated => "Not authenticated".to_string(),
            MutationExecutionError::Validation(_, _)
            | MutationExecutionError::MissingArgument(_)
            | MutationExecutionError::UnknownMutation(_) => self.to_string(),
            MutationExecutionError::Store(StoreError::NotFound { .. }) => self.to_string(),
            MutationExecutionError::WithContext(context, e) => {
                format!("{}: {}", e.user_error_message(), context)
            }
            // Store errors may carry row data; keep them out of responses
            _ => {
                error!("Mutation failed: {:?}", self);
                "Operation failed".to_string()
            }
        }
    }
}

pub(crate) trait WithContext {
    fn with_context(self, context: String) -> Self;
}

impl<T> WithContext for Result<T, MutationExecutionError> {
    fn with_context(self, context: String) -> Result<T, MutationExecutionError> {
        self.map_err(|e| e.with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use common::value::Id;

    use super::*;

    #[test]
    fn user_messages_hide_store_internals() {
        let conflict = MutationExecutionError::from(StoreError::Conflict {
            table: "concerts".into(),
            id: Id::Int(1),
        });
        assert_eq!(conflict.user_error_message(), "Operation failed");

        let not_found = MutationExecutionError::from(StoreError::NotFound {
            table: "venues".into(),
            id: Id::Int(9),
        })
        .with_context("while resolving 'venue'".into());
        assert!(not_found.is_not_found());
        assert_eq!(
            not_found.user_error_message(),
            "venues matching id '9' does not exist: while resolving 'venue'"
        );

        let invalid = MutationExecutionError::Validation("title".into(), "too short".into());
        assert_eq!(invalid.user_error_message(), "Invalid field 'title': too short");
    }
}
