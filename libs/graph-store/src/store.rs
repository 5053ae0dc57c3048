// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use async_trait::async_trait;
use common::value::{Id, Val};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Filter, StoreError};

/// A stored row: attribute name to value. Foreign keys are stored under their column name
/// (`venue_id`), never as nested objects.
pub type Record = IndexMap<String, Val>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkStrategy {
    AutoIncrement,
    Uuid,
    /// The caller must supply the key on insert
    Provided,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub pk_column: String,
    pub pk_strategy: PkStrategy,
}

/// A many-to-many link table. Pairs are stored as `(left id, right id)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LinkTableRef {
    pub name: String,
    pub left_table: String,
    pub right_table: String,
}

/// Which column of a link table an id refers to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    Left,
    Right,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Start a transaction. Dropping the returned transaction without committing discards
    /// every change made through it.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}

#[async_trait]
pub trait Transaction: Send {
    /// Fetch a row by primary key, failing with [`StoreError::NotFound`] if it doesn't exist.
    async fn fetch(&mut self, table: &TableRef, id: &Id) -> Result<Record, StoreError>;

    async fn find(&mut self, table: &TableRef, filter: &Filter)
    -> Result<Vec<Record>, StoreError>;

    /// Insert a row and return it as stored (including a generated primary key).
    async fn insert(&mut self, table: &TableRef, values: Record) -> Result<Record, StoreError>;

    /// Assign `values` to an existing row and return the updated row.
    async fn update(
        &mut self,
        table: &TableRef,
        id: &Id,
        values: Record,
    ) -> Result<Record, StoreError>;

    async fn delete(&mut self, table: &TableRef, id: &Id) -> Result<(), StoreError>;

    /// Assign `values` to every row matching `filter`, returning the ids of those rows.
    async fn update_where(
        &mut self,
        table: &TableRef,
        filter: &Filter,
        values: Record,
    ) -> Result<Vec<Id>, StoreError>;

    /// Delete every row matching `filter`, returning the ids of the deleted rows.
    async fn delete_where(&mut self, table: &TableRef, filter: &Filter)
    -> Result<Vec<Id>, StoreError>;

    async fn linked(
        &mut self,
        link: &LinkTableRef,
        side: LinkSide,
        id: &Id,
    ) -> Result<Vec<Id>, StoreError>;

    async fn link(
        &mut self,
        link: &LinkTableRef,
        side: LinkSide,
        id: &Id,
        others: &[Id],
    ) -> Result<(), StoreError>;

    async fn unlink(
        &mut self,
        link: &LinkTableRef,
        side: LinkSide,
        id: &Id,
        others: &[Id],
    ) -> Result<(), StoreError>;

    /// Replace the set of rows linked to `id` with exactly `others`.
    async fn set_links(
        &mut self,
        link: &LinkTableRef,
        side: LinkSide,
        id: &Id,
        others: &[Id],
    ) -> Result<(), StoreError> {
        let current = self.linked(link, side, id).await?;

        let stale: Vec<Id> = current
            .iter()
            .filter(|existing| !others.contains(existing))
            .cloned()
            .collect();
        let fresh: Vec<Id> = others
            .iter()
            .filter(|other| !current.contains(other))
            .cloned()
            .collect();

        self.unlink(link, side, id, &stale).await?;
        self.link(link, side, id, &fresh).await
    }

    async fn clear_links(
        &mut self,
        link: &LinkTableRef,
        side: LinkSide,
        id: &Id,
    ) -> Result<(), StoreError> {
        self.set_links(link, side, id, &[]).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
