// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Resolve compiled mutations against a [`graph_store::Store`].
//!
//! A [`system::MutationSystem`] is built from [`declaration::MutationDeclaration`]s. Resolving a
//! mutation runs its lifecycle hooks, executes the (possibly deeply nested) payload inside one
//! transaction and publishes the resulting changes once the transaction commits.

pub mod declaration;
pub mod error;
pub mod executor;
pub mod filter;
pub mod hooks;
pub mod identifier;
pub mod relation_operation;
pub mod settings;
pub mod system;

pub use declaration::MutationDeclaration;
pub use error::MutationExecutionError;
pub use hooks::{DefaultHooks, FieldHandlers, FieldValidators, MutationHooks};
pub use settings::ResolverSettings;
pub use system::{MutationSystem, MutationSystemBuilder};
