// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The persistence boundary of the mutation engine.
//!
//! The engine only needs a handful of row-level primitives (fetch, insert, update, delete,
//! filtered bulk update/delete) plus link-table operations for many-to-many relations, all scoped
//! to a transaction that is either committed as a whole or discarded. [`Store`] and
//! [`Transaction`] capture that contract; [`MemoryStore`] is a transactional in-process
//! implementation.

mod error;
mod filter;
mod memory;
mod store;

pub use error::StoreError;
pub use filter::Filter;
pub use memory::MemoryStore;
pub use store::{LinkSide, LinkTableRef, PkStrategy, Record, Store, TableRef, Transaction};
