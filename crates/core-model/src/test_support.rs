// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A small model that exercises every relation kind:
//!
//! - `Concert.venue` (nullable foreign key) / `Venue.concerts`
//! - `Ticket.concert` (non-nullable foreign key) / `Concert.tickets`
//! - `Concert.artists` / `Artist.concerts` (many-to-many through `concert_artists`)
//! - `Profile.artist` (one-to-one) / `Artist.profile`
//! - `Artist.mentor` / `Artist.mentees` (self reference)
//! - `Concert.organizer` / `User.organized_concerts` (hidden reverse)

use crate::model::{DomainModel, DomainModelBuilder};
use crate::types::{Choice, EntityField, EntityType, LinkTable, ScalarType};

pub fn concert_model() -> DomainModel {
    DomainModelBuilder::new()
        .entity(
            EntityType::new("User", "users")
                .with_field(EntityField::scalar("username", ScalarType::String))
                .with_field(
                    EntityField::many_to_one_reverse("organized_concerts", "Concert", "organizer")
                        .hidden(),
                ),
        )
        .entity(
            EntityType::new("Venue", "venues")
                .with_field(EntityField::scalar("name", ScalarType::String))
                .with_field(EntityField::scalar("capacity", ScalarType::Int).nullable())
                .with_field(EntityField::many_to_one_reverse(
                    "concerts", "Concert", "venue",
                )),
        )
        .entity(
            EntityType::new("Concert", "concerts")
                .with_doc("A scheduled performance")
                .with_field(EntityField::scalar("title", ScalarType::String))
                .with_field(
                    EntityField::choice(
                        "status",
                        vec![
                            Choice::new("draft", "Draft"),
                            Choice::new("on sale", "On sale"),
                            Choice::new("on-sale", "On sale (legacy)"),
                            Choice::new("2nd-release", "Second release"),
                        ],
                    )
                    .with_default(),
                )
                .with_field(EntityField::foreign_key("venue", "Venue", Some("concerts")).nullable())
                .with_field(
                    EntityField::foreign_key("organizer", "User", Some("organized_concerts"))
                        .nullable(),
                )
                .with_field(
                    EntityField::many_to_many(
                        "artists",
                        "Artist",
                        Some("concerts"),
                        LinkTable::owned("concert_artists"),
                    )
                    .nullable(),
                )
                .with_field(EntityField::many_to_one_reverse(
                    "tickets", "Ticket", "concert",
                ))
                .with_field(EntityField::scalar("created_at", ScalarType::DateTime).auto_now_add()),
        )
        .entity(
            EntityType::new("Artist", "artists")
                .with_field(EntityField::scalar("name", ScalarType::String))
                .with_field(EntityField::foreign_key("mentor", "Artist", Some("mentees")).nullable())
                .with_field(EntityField::many_to_one_reverse(
                    "mentees", "Artist", "mentor",
                ))
                .with_field(
                    EntityField::many_to_many(
                        "concerts",
                        "Concert",
                        Some("artists"),
                        LinkTable::reverse("concert_artists"),
                    )
                    .nullable(),
                )
                .with_field(EntityField::one_to_one_reverse(
                    "profile", "Profile", "artist",
                )),
        )
        .entity(
            EntityType::new("Profile", "profiles")
                .with_field(EntityField::scalar("bio", ScalarType::String).nullable())
                .with_field(EntityField::one_to_one("artist", "Artist", Some("profile"))),
        )
        .entity(
            EntityType::new("Ticket", "tickets")
                .with_field(EntityField::scalar("code", ScalarType::String))
                .with_field(EntityField::scalar("price", ScalarType::Decimal).with_default())
                .with_field(EntityField::foreign_key("concert", "Concert", Some("tickets"))),
        )
        .build()
        .expect("the concert model is well formed")
}
