// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Derive mutation input types from a [`core_model::model::DomainModel`].
//!
//! Each mutation declaration carries an [`config::InputTypeConfig`]; compiling it produces an
//! input type (plus any nested input types its relationship extras call for) and records the
//! resolved configuration in the [`type_meta_registry::TypeMetaRegistry`], where resolvers find
//! it when executing nested payloads.

pub mod config;
pub mod error;
pub mod field_converter;
pub mod input_schema_builder;
pub mod mutation_kind;
pub mod naming;
pub mod schema;
pub mod type_meta_registry;
pub mod types;
