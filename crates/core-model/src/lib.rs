// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Descriptors of the persistent model that mutation schemas are derived from.
//!
//! A [`model::DomainModel`] is loaded once (typically from the persistence layer's metadata)
//! and treated as immutable afterwards.

pub mod error;
pub mod mapped_arena;
pub mod model;
pub mod types;

#[cfg(any(feature = "test-support", test))]
pub mod test_support;
