// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::value::Id;
use indexmap::{IndexMap, IndexSet};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::{
    Filter, LinkSide, LinkTableRef, PkStrategy, Record, Store, StoreError, TableRef, Transaction,
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    tables: HashMap<String, TableData>,
    links: HashMap<String, LinkData>,
}

#[derive(Debug, Clone, Default)]
struct TableData {
    rows: IndexMap<Id, Record>,
    last_id: i64,
}

#[derive(Debug, Clone, Default)]
struct LinkData {
    left_table: String,
    right_table: String,
    pairs: IndexSet<(Id, Id)>,
}

/// A transactional in-process store.
///
/// Transactions are serialized: `begin` waits for the previous transaction to finish. Each
/// transaction works on a copy of the committed state, which replaces the committed state only
/// on `commit`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows of a table, in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Record> {
        let state = self.state.lock().await;
        state
            .tables
            .get(table)
            .map(|data| data.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        let state = self.state.lock().await;
        state
            .tables
            .get(table)
            .map(|data| data.rows.len())
            .unwrap_or_default()
    }

    /// Committed link pairs of a many-to-many link table.
    pub async fn link_pairs(&self, link: &str) -> Vec<(Id, Id)> {
        let state = self.state.lock().await;
        state
            .links
            .get(link)
            .map(|data| data.pairs.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        debug!("Beginning in-memory transaction");

        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
}

impl MemoryTransaction {
    fn table_mut(&mut self, table: &TableRef) -> &mut TableData {
        self.working.tables.entry(table.name.clone()).or_default()
    }

    fn row_mut(&mut self, table: &TableRef, id: &Id) -> Result<&mut Record, StoreError> {
        self.table_mut(table)
            .rows
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound {
                table: table.name.clone(),
                id: id.clone(),
            })
    }

    fn matching_ids(&self, table: &TableRef, filter: &Filter) -> Vec<Id> {
        self.working
            .tables
            .get(&table.name)
            .map(|data| {
                data.rows
                    .iter()
                    .filter(|(_, record)| filter.matches(record))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn link_mut(&mut self, link: &LinkTableRef) -> &mut LinkData {
        self.working
            .links
            .entry(link.name.clone())
            .or_insert_with(|| LinkData {
                left_table: link.left_table.clone(),
                right_table: link.right_table.clone(),
                pairs: IndexSet::new(),
            })
    }
}

fn link_pair(side: LinkSide, id: &Id, other: &Id) -> (Id, Id) {
    match side {
        LinkSide::Left => (id.clone(), other.clone()),
        LinkSide::Right => (other.clone(), id.clone()),
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn fetch(&mut self, table: &TableRef, id: &Id) -> Result<Record, StoreError> {
        self.row_mut(table, id).map(|record| record.clone())
    }

    async fn find(
        &mut self,
        table: &TableRef,
        filter: &Filter,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .working
            .tables
            .get(&table.name)
            .map(|data| {
                data.rows
                    .values()
                    .filter(|record| filter.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&mut self, table: &TableRef, values: Record) -> Result<Record, StoreError> {
        let supplied_id = values
            .get(&table.pk_column)
            .filter(|value| !value.is_null())
            .and_then(Id::from_val);

        let data = self.table_mut(table);

        let id = match (supplied_id, table.pk_strategy) {
            (Some(id), _) => {
                if let Id::Int(n) = id {
                    data.last_id = data.last_id.max(n);
                }
                id
            }
            (None, PkStrategy::AutoIncrement) => {
                data.last_id += 1;
                Id::Int(data.last_id)
            }
            (None, PkStrategy::Uuid) => Id::Uuid(uuid::Uuid::new_v4()),
            (None, PkStrategy::Provided) => {
                return Err(StoreError::MissingPrimaryKey {
                    table: table.name.clone(),
                    column: table.pk_column.clone(),
                });
            }
        };

        if data.rows.contains_key(&id) {
            return Err(StoreError::Conflict {
                table: table.name.clone(),
                id,
            });
        }

        let mut record = Record::new();
        record.insert(table.pk_column.clone(), id.to_val());
        record.extend(
            values
                .into_iter()
                .filter(|(attribute, _)| attribute != &table.pk_column),
        );

        data.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn update(
        &mut self,
        table: &TableRef,
        id: &Id,
        values: Record,
    ) -> Result<Record, StoreError> {
        let pk_column = table.pk_column.clone();
        let record = self.row_mut(table, id)?;

        for (attribute, value) in values {
            if attribute != pk_column {
                record.insert(attribute, value);
            }
        }

        Ok(record.clone())
    }

    async fn delete(&mut self, table: &TableRef, id: &Id) -> Result<(), StoreError> {
        self.table_mut(table)
            .rows
            .shift_remove(id)
            .ok_or_else(|| StoreError::NotFound {
                table: table.name.clone(),
                id: id.clone(),
            })?;

        for link in self.working.links.values_mut() {
            let left_matches = link.left_table == table.name;
            let right_matches = link.right_table == table.name;

            link.pairs.retain(|(left, right)| {
                !(left_matches && left == id || right_matches && right == id)
            });
        }

        Ok(())
    }

    async fn update_where(
        &mut self,
        table: &TableRef,
        filter: &Filter,
        values: Record,
    ) -> Result<Vec<Id>, StoreError> {
        let ids = self.matching_ids(table, filter);

        for id in &ids {
            self.update(table, id, values.clone()).await?;
        }

        Ok(ids)
    }

    async fn delete_where(
        &mut self,
        table: &TableRef,
        filter: &Filter,
    ) -> Result<Vec<Id>, StoreError> {
        let ids = self.matching_ids(table, filter);

        for id in &ids {
            self.delete(table, id).await?;
        }

        Ok(ids)
    }

    async fn linked(
        &mut self,
        link: &LinkTableRef,
        side: LinkSide,
        id: &Id,
    ) -> Result<Vec<Id>, StoreError> {
        Ok(self
            .working
            .links
            .get(&link.name)
            .map(|data| {
                data.pairs
                    .iter()
                    .filter_map(|(left, right)| match side {
                        LinkSide::Left if left == id => Some(right.clone()),
                        LinkSide::Right if right == id => Some(left.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn link(
        &mut self,
        link: &LinkTableRef,
        side: LinkSide,
        id: &Id,
        others: &[Id],
    ) -> Result<(), StoreError> {
        let data = self.link_mut(link);
        for other in others {
            data.pairs.insert(link_pair(side, id, other));
        }
        Ok(())
    }

    async fn unlink(
        &mut self,
        link: &LinkTableRef,
        side: LinkSide,
        id: &Id,
        others: &[Id],
    ) -> Result<(), StoreError> {
        let data = self.link_mut(link);
        for other in others {
            data.pairs.shift_remove(&link_pair(side, id, other));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        debug!("Committed in-memory transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        debug!("Rolled back in-memory transaction");
        Ok(())
    }
}
