// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![allow(dead_code)]

use std::sync::Arc;

use change_notification::ChangeNotifier;
use common::context::{RequestContext, UserIdentity};
use common::value::{Id, Val};
use core_model::test_support::concert_model;
use graph_store::{MemoryStore, PkStrategy, Record, Store, TableRef};
use mutation_resolver::{MutationDeclaration, MutationSystem, MutationSystemBuilder, ResolverSettings};

pub struct Fixture {
    pub store: MemoryStore,
    pub notifier: ChangeNotifier,
    pub system: MutationSystem,
}

pub fn fixture(declarations: Vec<MutationDeclaration>) -> Fixture {
    fixture_with_settings(declarations, ResolverSettings::default())
}

pub fn fixture_with_settings(
    declarations: Vec<MutationDeclaration>,
    settings: ResolverSettings,
) -> Fixture {
    let store = MemoryStore::new();
    let notifier = ChangeNotifier::new();

    let system = declarations
        .into_iter()
        .fold(
            MutationSystemBuilder::new(Arc::new(concert_model()), Arc::new(store.clone())),
            |builder, declaration| builder.mutation(declaration),
        )
        .with_settings(settings)
        .with_notifier(notifier.clone())
        .build()
        .unwrap();

    Fixture {
        store,
        notifier,
        system,
    }
}

pub fn args(value: serde_json::Value) -> Val {
    value.into()
}

pub fn anonymous() -> RequestContext {
    RequestContext::new(UserIdentity::anonymous())
}

pub fn user(id: i64) -> RequestContext {
    RequestContext::new(UserIdentity::authenticated(id))
}

pub fn table(name: &str) -> TableRef {
    TableRef {
        name: name.to_string(),
        pk_column: "id".to_string(),
        pk_strategy: PkStrategy::AutoIncrement,
    }
}

/// Insert rows directly into the store, returning their ids.
pub async fn seed(store: &MemoryStore, table_name: &str, rows: serde_json::Value) -> Vec<Id> {
    let mut tx = store.begin().await.unwrap();
    let mut ids = vec![];

    let Val::List(rows) = Val::from(rows) else {
        panic!("rows must be a list");
    };
    for row in rows {
        let Val::Object(values) = row else {
            panic!("each row must be an object");
        };
        let record = tx.insert(&table(table_name), values).await.unwrap();
        ids.push(Id::from_val(record.get("id").unwrap()).unwrap());
    }

    tx.commit().await.unwrap();
    ids
}

pub async fn seed_links(store: &MemoryStore, link: &str, left: &str, right: &str, pairs: &[(i64, i64)]) {
    let mut tx = store.begin().await.unwrap();
    let link = graph_store::LinkTableRef {
        name: link.to_string(),
        left_table: left.to_string(),
        right_table: right.to_string(),
    };
    for (left_id, right_id) in pairs {
        tx.link(
            &link,
            graph_store::LinkSide::Left,
            &Id::Int(*left_id),
            &[Id::Int(*right_id)],
        )
        .await
        .unwrap();
    }
    tx.commit().await.unwrap();
}

pub async fn row(store: &MemoryStore, table_name: &str, id: i64) -> Option<Record> {
    store
        .rows(table_name)
        .await
        .into_iter()
        .find(|record| record.get("id") == Some(&Val::from(id)))
}

/// Ids linked to the concert `concert_id` through `concert_artists`, sorted.
pub async fn concert_artist_ids(store: &MemoryStore, concert_id: i64) -> Vec<i64> {
    let mut ids: Vec<i64> = store
        .link_pairs("concert_artists")
        .await
        .into_iter()
        .filter(|(concert, _)| concert == &Id::Int(concert_id))
        .filter_map(|(_, artist)| match artist {
            Id::Int(id) => Some(id),
            _ => None,
        })
        .collect();
    ids.sort();
    ids
}

pub fn field<'a>(value: &'a Val, path: &[&str]) -> &'a Val {
    path.iter().fold(value, |value, key| {
        value
            .get(key)
            .unwrap_or_else(|| panic!("missing '{key}' in {value}"))
    })
}
