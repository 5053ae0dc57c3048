// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-entity fan-out of change events to long-lived subscribers.
//!
//! Each [`Subscription`] owns an unbounded queue; [`ChangeNotifier::notify`] pushes the event to
//! every current subscriber of the entity without waiting on any of them. A subscription leaves
//! the registry when it is dropped, whichever way its consumer exits.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};

use common::value::Id;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub entity: String,
    pub kind: ChangeKind,
    pub id: Id,
}

impl ChangeEvent {
    pub fn new(entity: impl Into<String>, kind: ChangeKind, id: Id) -> Self {
        Self {
            entity: entity.into(),
            kind,
            id,
        }
    }
}

type SubscriberId = u64;

#[derive(Default)]
struct SubscriberRegistry {
    next_id: SubscriberId,
    subscribers: HashMap<String, Vec<(SubscriberId, UnboundedSender<ChangeEvent>)>>,
}

impl SubscriberRegistry {
    fn remove(&mut self, entity: &str, id: SubscriberId) {
        if let Some(handles) = self.subscribers.get_mut(entity) {
            handles.retain(|(subscriber_id, _)| *subscriber_id != id);
            if handles.is_empty() {
                self.subscribers.remove(entity);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct ChangeNotifier {
    registry: Arc<Mutex<SubscriberRegistry>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, entity: &str) -> Subscription {
        let (sender, receiver) = unbounded_channel();

        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .subscribers
            .entry(entity.to_string())
            .or_default()
            .push((id, sender));

        debug!(entity, subscriber = id, "Subscribed to changes");

        Subscription {
            id,
            entity: entity.to_string(),
            receiver,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every subscriber of its entity and return how many received it.
    ///
    /// Subscribers whose receiving end is gone are pruned; they never affect delivery to others.
    pub fn notify(&self, event: ChangeEvent) -> usize {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(handles) = registry.subscribers.get_mut(&event.entity) else {
            return 0;
        };

        let mut delivered = 0;
        handles.retain(|(id, sender)| match sender.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                debug!(entity = %event.entity, subscriber = *id, "Pruning closed subscriber");
                false
            }
        });

        if handles.is_empty() {
            registry.subscribers.remove(&event.entity);
        }

        delivered
    }

    pub fn subscriber_count(&self, entity: &str) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .get(entity)
            .map(Vec::len)
            .unwrap_or_default()
    }
}

/// A live subscription to one entity's changes. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    entity: String,
    receiver: UnboundedReceiver<ChangeEvent>,
    registry: Weak<Mutex<SubscriberRegistry>>,
}

impl Subscription {
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Wait for the next event. Returns `None` once the notifier itself is gone.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }

    /// Stop receiving new events while keeping the ones already queued
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl Stream for Subscription {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.entity, self.id);
            debug!(entity = %self.entity, subscriber = self.id, "Unsubscribed from changes");
        }
    }
}
