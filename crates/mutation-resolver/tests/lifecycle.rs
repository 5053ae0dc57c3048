// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use change_notification::{ChangeEvent, ChangeKind};
use common::context::{RequestContext, UserIdentity};
use common::value::{Id, Val, ValObject};
use core_model::test_support::concert_model;
use core_model::types::EntityType;
use graph_store::{MemoryStore, Record};
use mutation_builder::config::{ExtraEntry, InputTypeConfig};
use mutation_builder::error::ModelBuildingError;
use mutation_builder::mutation_kind::MutationKind;
use mutation_resolver::{
    MutationDeclaration, MutationExecutionError, MutationHooks, MutationSystemBuilder,
    ResolverSettings,
};
use serde_json::json;

mod support;

use support::{
    anonymous, args, field, fixture, fixture_with_settings, row, seed, seed_links, user,
};

#[derive(Clone, Default)]
struct RecordingHooks {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingHooks {
    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MutationHooks for RecordingHooks {
    async fn before_mutate(
        &self,
        arguments: ValObject,
        _context: &RequestContext,
    ) -> Result<ValObject, MutationExecutionError> {
        self.record("before_mutate");
        Ok(arguments)
    }

    fn get_permissions(
        &self,
        _arguments: &ValObject,
        _context: &RequestContext,
        declared: &[String],
    ) -> Vec<String> {
        self.record("get_permissions");
        declared.to_vec()
    }

    async fn validate(
        &self,
        _arguments: &ValObject,
        _context: &RequestContext,
    ) -> Result<(), MutationExecutionError> {
        self.record("validate");
        Ok(())
    }

    async fn before_save(
        &self,
        entity: &EntityType,
        mut values: Record,
        _inputs: &ValObject,
        _context: &RequestContext,
    ) -> Result<Record, MutationExecutionError> {
        self.record(&format!("before_save {}", entity.name));
        values.insert("title".to_string(), Val::from("Saved"));
        Ok(values)
    }

    async fn after_mutate(&self, _result: &Val, _context: &RequestContext) {
        self.record("after_mutate");
    }
}

#[test_log::test(tokio::test)]
async fn login_is_required_when_declared() {
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::Create, "Venue").login_required(),
    ]);

    let err = fixture
        .system
        .resolve("createVenue", args(json!({"input": {"name": "Hall"}})), &anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, MutationExecutionError::Unauthenticated));

    fixture
        .system
        .resolve("createVenue", args(json!({"input": {"name": "Hall"}})), &user(1))
        .await
        .unwrap();
    assert_eq!(fixture.store.row_count("venues").await, 1);
}

#[test_log::test(tokio::test)]
async fn permissions_are_checked() {
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::Create, "Venue")
            .with_permissions(["venues.add", "venues.change"]),
    ]);
    let input = || args(json!({"input": {"name": "Hall"}}));

    let partial = RequestContext::new(UserIdentity::authenticated(1i64).with_permissions(["venues.add"]));
    let err = fixture
        .system
        .resolve("createVenue", input(), &partial)
        .await
        .unwrap_err();
    assert!(matches!(err, MutationExecutionError::Authorization));
    assert_eq!(err.user_error_message(), "Not authorized");

    let granted = RequestContext::new(
        UserIdentity::authenticated(1i64).with_permissions(["venues.add", "venues.change"]),
    );
    fixture
        .system
        .resolve("createVenue", input(), &granted)
        .await
        .unwrap();

    let superuser = RequestContext::new(UserIdentity::authenticated(2i64).as_superuser());
    fixture
        .system
        .resolve("createVenue", input(), &superuser)
        .await
        .unwrap();

    assert_eq!(fixture.store.row_count("venues").await, 2);
}

#[test_log::test(tokio::test)]
async fn validators_reject_before_anything_is_written() {
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::BatchCreate, "Venue").with_validator(
            "capacity",
            |value, _payload, _context| match value {
                Val::Number(n) if n.as_i64().is_some_and(|capacity| capacity > 0) => Ok(()),
                _ => Err(MutationExecutionError::Validation(
                    "capacity".to_string(),
                    "must be positive".to_string(),
                )),
            },
        ),
    ]);

    let err = fixture
        .system
        .resolve(
            "batchCreateVenue",
            args(json!({"input": [
                {"name": "Hall", "capacity": 100},
                {"name": "Shed", "capacity": 0}
            ]})),
            &anonymous(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.user_error_message(),
        "Invalid field 'capacity': must be positive"
    );
    assert_eq!(fixture.store.row_count("venues").await, 0);
}

#[test_log::test(tokio::test)]
async fn hooks_run_in_order() {
    let hooks = RecordingHooks::default();
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::Create, "Concert")
            .with_config(InputTypeConfig::new().foreign_key_extra("venue", ExtraEntry::auto()))
            .with_hooks(hooks.clone()),
    ]);

    let result = fixture
        .system
        .resolve(
            "createConcert",
            args(json!({"input": {"title": "Draft title", "venue": {"name": "Hall"}}})),
            &anonymous(),
        )
        .await
        .unwrap();

    // Only the top-level row goes through before_save
    assert_eq!(
        hooks.calls(),
        vec![
            "before_mutate",
            "get_permissions",
            "validate",
            "before_save Concert",
            "after_mutate"
        ]
    );
    assert_eq!(field(&result, &["concert", "title"]), &Val::from("Saved"));
    let venue = row(&fixture.store, "venues", 1).await.unwrap();
    assert_eq!(venue.get("name"), Some(&Val::from("Hall")));
}

#[test_log::test(tokio::test)]
async fn after_mutate_is_skipped_on_failure() {
    let hooks = RecordingHooks::default();
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::Update, "Concert").with_hooks(hooks.clone()),
    ]);

    let err = fixture
        .system
        .resolve(
            "updateConcert",
            args(json!({"id": 7, "input": {"title": "Missing"}})),
            &anonymous(),
        )
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(
        err.user_error_message(),
        "concerts matching id '7' does not exist"
    );
    assert!(!hooks.calls().contains(&"after_mutate".to_string()));
}

#[test_log::test(tokio::test)]
async fn changes_are_published_after_commit() {
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::Create, "Concert").with_config(
            InputTypeConfig::new()
                .many_to_many_extra("artists", "add", ExtraEntry::auto())
                .many_to_one_extra("tickets", "exact", ExtraEntry::id()),
        ),
    ]);
    let mut concerts = fixture.notifier.subscribe("Concert");
    let mut artists = fixture.notifier.subscribe("Artist");

    fixture
        .system
        .resolve(
            "createConcert",
            args(json!({"input": {"title": "C1", "artists_add": [{"name": "A1"}]}})),
            &anonymous(),
        )
        .await
        .unwrap();

    assert_eq!(
        concerts.try_recv(),
        Some(ChangeEvent::new("Concert", ChangeKind::Created, Id::Int(1)))
    );
    assert_eq!(concerts.try_recv(), None);
    assert_eq!(
        artists.try_recv(),
        Some(ChangeEvent::new("Artist", ChangeKind::Created, Id::Int(1)))
    );

    fixture
        .system
        .resolve(
            "createConcert",
            args(json!({"input": {"title": "C2", "artists_add": [{"name": "A2"}], "tickets": [5]}})),
            &anonymous(),
        )
        .await
        .unwrap_err();

    assert_eq!(concerts.try_recv(), None);
    assert_eq!(artists.try_recv(), None);
}

#[test_log::test(tokio::test)]
async fn link_changes_update_both_ends() {
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::Patch, "Concert").with_config(
            InputTypeConfig::new()
                .many_to_many_extra("artists", "exact", ExtraEntry::id())
                .many_to_many_extra("artists", "add", ExtraEntry::id()),
        ),
    ]);
    seed(&fixture.store, "artists", json!([{"name": "A1"}, {"name": "A2"}])).await;
    seed(&fixture.store, "concerts", json!([{"title": "C1"}])).await;
    seed_links(&fixture.store, "concert_artists", "concerts", "artists", &[(1, 1)]).await;

    let mut concerts = fixture.notifier.subscribe("Concert");
    let mut artists = fixture.notifier.subscribe("Artist");

    fixture
        .system
        .resolve(
            "patchConcert",
            args(json!({"id": 1, "input": {"artists_add": [2]}})),
            &anonymous(),
        )
        .await
        .unwrap();

    assert_eq!(
        concerts.try_recv(),
        Some(ChangeEvent::new("Concert", ChangeKind::Updated, Id::Int(1)))
    );
    assert_eq!(concerts.try_recv(), None);
    assert_eq!(
        artists.try_recv(),
        Some(ChangeEvent::new("Artist", ChangeKind::Updated, Id::Int(2)))
    );
    assert_eq!(artists.try_recv(), None);

    // Re-sending the current set changes no links
    fixture
        .system
        .resolve(
            "patchConcert",
            args(json!({"id": 1, "input": {"artists": [1, 2]}})),
            &anonymous(),
        )
        .await
        .unwrap();

    assert_eq!(artists.try_recv(), None);
}

#[test_log::test(tokio::test)]
async fn delete_reports_whether_the_row_was_found() {
    let fixture = fixture(vec![MutationDeclaration::new(MutationKind::Delete, "Concert")]);
    seed(&fixture.store, "concerts", json!([{"title": "C1"}])).await;
    seed(
        &fixture.store,
        "tickets",
        json!([{"code": "T1", "concert_id": 1}]),
    )
    .await;

    let result = fixture
        .system
        .resolve("deleteConcert", args(json!({"id": "Q29uY2VydDox"})), &anonymous())
        .await
        .unwrap();
    assert_eq!(field(&result, &["found"]), &Val::Bool(true));
    assert_eq!(field(&result, &["deletedId"]), &Val::from("Q29uY2VydDox"));
    assert_eq!(field(&result, &["deletedRawId"]), &Val::from(1i64));
    assert_eq!(field(&result, &["deletedInputId"]), &Val::from("Q29uY2VydDox"));
    assert_eq!(fixture.store.row_count("concerts").await, 0);
    assert_eq!(fixture.store.row_count("tickets").await, 0);

    let result = fixture
        .system
        .resolve("deleteConcert", args(json!({"id": 1})), &anonymous())
        .await
        .unwrap();
    assert_eq!(field(&result, &["found"]), &Val::Bool(false));
    assert_eq!(field(&result, &["deletedId"]), &Val::Null);
}

#[test_log::test(tokio::test)]
async fn delete_can_report_raw_ids() {
    let settings = ResolverSettings {
        global_id_output: false,
        ..ResolverSettings::default()
    };
    let fixture = fixture_with_settings(
        vec![MutationDeclaration::new(MutationKind::Delete, "Venue")],
        settings,
    );
    seed(&fixture.store, "venues", json!([{"name": "Hall"}])).await;
    seed(&fixture.store, "concerts", json!([{"title": "C1", "venue_id": 1}])).await;

    let result = fixture
        .system
        .resolve("deleteVenue", args(json!({"id": "1"})), &anonymous())
        .await
        .unwrap();
    assert_eq!(field(&result, &["deletedId"]), &Val::from(1i64));

    // Concert.venue is nullable, so the concert survives
    let concert = row(&fixture.store, "concerts", 1).await.unwrap();
    assert_eq!(concert.get("venue_id"), Some(&Val::Null));
}

#[test_log::test(tokio::test)]
async fn filter_mutations() {
    let fixture = fixture(vec![
        MutationDeclaration::new(MutationKind::FilterUpdate, "Concert"),
        MutationDeclaration::new(MutationKind::FilterDelete, "Concert"),
    ]);
    seed(&fixture.store, "venues", json!([{"name": "Hall"}])).await;
    seed(
        &fixture.store,
        "concerts",
        json!([
            {"title": "C1", "status": "draft", "venue_id": 1},
            {"title": "C2", "status": "draft", "venue_id": null},
            {"title": "C3", "status": "on sale", "venue_id": 1}
        ]),
    )
    .await;
    seed(
        &fixture.store,
        "tickets",
        json!([{"code": "T1", "concert_id": 2}, {"code": "T3", "concert_id": 3}]),
    )
    .await;

    let result = fixture
        .system
        .resolve(
            "filterUpdateConcert",
            args(json!({
                "filter": {"status": "DRAFT", "venue__isnull": false},
                "data": {"status": "ON_SALE"}
            })),
            &anonymous(),
        )
        .await
        .unwrap();
    assert_eq!(field(&result, &["updatedCount"]), &Val::from(1i64));
    let concert = row(&fixture.store, "concerts", 1).await.unwrap();
    assert_eq!(concert.get("status"), Some(&Val::from("on sale")));

    let result = fixture
        .system
        .resolve(
            "filterDeleteConcert",
            args(json!({"filter": {"id__in": [2, "3", 4]}})),
            &anonymous(),
        )
        .await
        .unwrap();
    assert_eq!(field(&result, &["deletionCount"]), &Val::from(2i64));
    assert_eq!(
        field(&result, &["deletedIds"]),
        &Val::List(vec![Val::from(2i64), Val::from(3i64)])
    );
    assert_eq!(fixture.store.row_count("concerts").await, 1);
    assert_eq!(fixture.store.row_count("tickets").await, 0);
}

#[test_log::test(tokio::test)]
async fn batch_size_is_limited() {
    let settings = ResolverSettings {
        max_batch_size: Some(2),
        ..ResolverSettings::default()
    };
    let fixture = fixture_with_settings(
        vec![MutationDeclaration::new(MutationKind::BatchCreate, "Venue")],
        settings,
    );

    let err = fixture
        .system
        .resolve(
            "batchCreateVenue",
            args(json!({"input": [{"name": "A"}, {"name": "B"}, {"name": "C"}]})),
            &anonymous(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.user_error_message(),
        "Invalid field 'input': at most 2 items are allowed, got 3"
    );

    let result = fixture
        .system
        .resolve(
            "batchCreateVenue",
            args(json!({"input": [{"name": "A"}, {"name": "B"}]})),
            &anonymous(),
        )
        .await
        .unwrap();
    assert_eq!(
        field(&result, &["venues"]).as_list().map(<[Val]>::len),
        Some(2)
    );
}

#[test_log::test(tokio::test)]
async fn batch_patch_updates_each_row() {
    let fixture = fixture(vec![MutationDeclaration::new(MutationKind::BatchPatch, "Venue")]);
    seed(
        &fixture.store,
        "venues",
        json!([{"name": "A", "capacity": 10}, {"name": "B", "capacity": 20}]),
    )
    .await;

    fixture
        .system
        .resolve(
            "batchPatchVenue",
            args(json!({"input": [{"id": 1, "capacity": 15}, {"id": "2", "name": "Bee"}]})),
            &anonymous(),
        )
        .await
        .unwrap();

    let first = row(&fixture.store, "venues", 1).await.unwrap();
    assert_eq!(first.get("capacity"), Some(&Val::from(15i64)));
    let second = row(&fixture.store, "venues", 2).await.unwrap();
    assert_eq!(second.get("name"), Some(&Val::from("Bee")));
    assert_eq!(second.get("capacity"), Some(&Val::from(20i64)));

    let err = fixture
        .system
        .resolve(
            "batchPatchVenue",
            args(json!({"input": [{"id": 1, "name": "Ay"}, {"name": "No id"}]})),
            &anonymous(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.user_error_message(),
        "Missing argument 'id': in input 1"
    );
    let first = row(&fixture.store, "venues", 1).await.unwrap();
    assert_eq!(first.get("name"), Some(&Val::from("A")));
}

#[test_log::test(tokio::test)]
async fn unknown_mutations_are_rejected() {
    let fixture = fixture(vec![]);

    let err = fixture
        .system
        .resolve("createConcert", Val::Null, &anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, MutationExecutionError::UnknownMutation(name) if name == "createConcert"));
}

#[test]
fn duplicate_mutations_fail_to_build() {
    let result = MutationSystemBuilder::new(Arc::new(concert_model()), Arc::new(MemoryStore::new()))
        .mutation(MutationDeclaration::new(MutationKind::Create, "Venue"))
        .mutation(MutationDeclaration::new(MutationKind::Create, "Venue"))
        .build();

    assert!(matches!(
        result,
        Err(ModelBuildingError::DuplicateMutation(name)) if name == "createVenue"
    ));
}
