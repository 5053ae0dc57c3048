// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use common::value::Val;
use mutation_builder::config::{ExtraEntry, InputTypeConfig};
use mutation_builder::mutation_kind::MutationKind;
use mutation_resolver::MutationDeclaration;
use serde_json::json;

mod support;

use support::{anonymous, args, concert_artist_ids, field, fixture, row, seed};

#[test_log::test(tokio::test)]
async fn create_with_required_foreign_key_and_omitted_many_to_many() {
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::Create, "Ticket"),
        MutationDeclaration::new(MutationKind::Create, "Concert")
            .with_config(InputTypeConfig::new().required(["venue"])),
    ]);
    seed(&fixture.store, "venues", json!([{"name": "Hall"}])).await;
    seed(&fixture.store, "concerts", json!([{"title": "Opening"}])).await;

    let result = fixture
        .system
        .resolve(
            "createConcert",
            args(json!({"input": {"title": "Summer Fest", "venue": "1"}})),
            &anonymous(),
        )
        .await
        .unwrap();

    assert_eq!(field(&result, &["concert", "venue_id"]), &Val::from(1i64));
    assert_eq!(field(&result, &["concert", "title"]), &Val::from("Summer Fest"));
    let concert_id = 2;
    assert!(concert_artist_ids(&fixture.store, concert_id).await.is_empty());

    let result = fixture
        .system
        .resolve(
            "createTicket",
            args(json!({"input": {"code": "T-1", "concert": 2}})),
            &anonymous(),
        )
        .await
        .unwrap();
    assert_eq!(field(&result, &["ticket", "concert_id"]), &Val::from(2i64));
}

#[test_log::test(tokio::test)]
async fn update_with_empty_exact_list_clears_the_relation() {
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::Create, "Concert"),
        MutationDeclaration::new(MutationKind::Patch, "Concert"),
    ]);
    seed(&fixture.store, "artists", json!([{"name": "A1"}, {"name": "A2"}])).await;

    fixture
        .system
        .resolve(
            "createConcert",
            args(json!({"input": {"title": "C1", "artists": ["1", "2"]}})),
            &anonymous(),
        )
        .await
        .unwrap();
    assert_eq!(concert_artist_ids(&fixture.store, 1).await, vec![1, 2]);

    fixture
        .system
        .resolve(
            "patchConcert",
            args(json!({"id": 1, "input": {"artists": []}})),
            &anonymous(),
        )
        .await
        .unwrap();

    assert!(concert_artist_ids(&fixture.store, 1).await.is_empty());
    assert_eq!(fixture.store.row_count("artists").await, 2);
}

#[test_log::test(tokio::test)]
async fn create_with_nested_one_to_one() {
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::Create, "Artist").with_config(
            InputTypeConfig::new().one_to_one_extra("profile", ExtraEntry::auto()),
        ),
    ]);

    let result = fixture
        .system
        .resolve(
            "createArtist",
            args(json!({"input": {"name": "A1", "profile": {"bio": "Plays the oud"}}})),
            &anonymous(),
        )
        .await
        .unwrap();

    let artist_id = field(&result, &["artist", "id"]).clone();

    let profiles = fixture.store.rows("profiles").await;
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].get("bio"), Some(&Val::from("Plays the oud")));
    assert_eq!(profiles[0].get("artist_id"), Some(&artist_id));
    assert_eq!(fixture.store.row_count("artists").await, 1);
}

#[test_log::test(tokio::test)]
async fn batch_delete_reports_missed_ids() {
    let fixture = fixture(vec![MutationDeclaration::new(
        MutationKind::BatchDelete,
        "Concert",
    )]);
    seed(
        &fixture.store,
        "concerts",
        json!([{"title": "C1"}, {"title": "C2"}, {"title": "C3"}]),
    )
    .await;

    let result = fixture
        .system
        .resolve(
            "batchDeleteConcert",
            args(json!({"ids": [1, "99", 3, 42]})),
            &anonymous(),
        )
        .await
        .unwrap();

    assert_eq!(field(&result, &["deletionCount"]), &Val::from(2i64));
    assert_eq!(
        field(&result, &["deletedIds"]),
        &Val::List(vec![Val::from(1i64), Val::from(3i64)])
    );
    assert_eq!(
        field(&result, &["missedIds"]),
        &Val::List(vec![Val::from("99"), Val::from(42i64)])
    );
    assert_eq!(fixture.store.row_count("concerts").await, 1);
}

#[test_log::test(tokio::test)]
async fn field_handler_value_is_persisted() {
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::Update, "Concert")
            .with_config(InputTypeConfig::new().only(["title", "status"]))
            .with_handler("title", |value, _payload, _context| {
                Ok(Val::String(
                    value.as_str().unwrap_or_default().to_uppercase(),
                ))
            })
            .with_handler("status", |_value, _payload, _context| {
                // Would fail choice coercion if it were applied
                Ok(Val::from("archived"))
            }),
    ]);
    seed(&fixture.store, "concerts", json!([{"title": "C1", "status": "draft"}])).await;

    fixture
        .system
        .resolve(
            "updateConcert",
            args(json!({"id": "1", "input": {"title": "summer fest", "status": "ON_SALE"}})),
            &anonymous(),
        )
        .await
        .unwrap();

    let concert = row(&fixture.store, "concerts", 1).await.unwrap();
    assert_eq!(concert.get("title"), Some(&Val::from("SUMMER FEST")));
    assert_eq!(concert.get("status"), Some(&Val::from("archived")));
}
