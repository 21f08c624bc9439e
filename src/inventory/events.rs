//! Notifications and update events.
//!
//! Two channels leave an inventory after a mutation:
//! - the owner's notification queue ("+3 wood"), drained once by the owner
//! - slot update events, published with an explicit visibility scope

use std::collections::VecDeque;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::slot::SlotKind;
use super::ActorId;
use crate::catalog::ItemId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub item: ItemId,
    pub quantity_delta: i64,
    pub was_addition: bool,
}

/// FIFO of pending notifications for the owning client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationQueue {
    entries: VecDeque<Notification>,
    available: bool,
}

impl NotificationQueue {
    /// Zero-quantity changes and the empty item are never queued.
    pub fn send(&mut self, item: &ItemId, quantity: u32, was_added: bool) -> bool {
        if quantity == 0 || item.is_none() {
            return false;
        }
        let delta = quantity as i64;
        self.entries.push_back(Notification {
            item: item.clone(),
            quantity_delta: if was_added { delta } else { -delta },
            was_addition: was_added,
        });
        self.available = true;
        true
    }

    /// Take every queued notification, oldest first
    pub fn drain(&mut self) -> Vec<Notification> {
        self.available = false;
        self.entries.drain(..).collect()
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Who may observe a published update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateScope {
    OwnerOnly,
    AllObservers,
}

/// Which slot changed. `index: None` asks observers to re-read every slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotUpdate {
    pub kind: SlotKind,
    pub index: Option<usize>,
}

impl SlotUpdate {
    pub fn slot(kind: SlotKind, index: usize) -> Self {
        Self {
            kind,
            index: Some(index),
        }
    }

    pub fn bulk(kind: SlotKind) -> Self {
        Self { kind, index: None }
    }

    pub fn is_bulk(&self) -> bool {
        self.index.is_none()
    }
}

/// Pending side effects of mutations, flushed to bevy events once per frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbox {
    pub(crate) updates: Vec<SlotUpdate>,
    pub(crate) activated: Vec<ItemId>,
}

impl Outbox {
    pub(crate) fn push_update(&mut self, update: SlotUpdate) {
        if !self.updates.contains(&update) {
            self.updates.push(update);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.activated.is_empty()
    }

    pub fn updates(&self) -> &[SlotUpdate] {
        &self.updates
    }

    pub fn activated(&self) -> &[ItemId] {
        &self.activated
    }

    pub(crate) fn take(&mut self) -> Outbox {
        std::mem::take(self)
    }
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct InventoryUpdated {
    pub inventory: Entity,
    pub owner: ActorId,
    pub update: SlotUpdate,
    pub scope: UpdateScope,
}

/// Sent to the owner only, when its notification queue becomes non-empty
#[derive(Event, Debug, Clone, PartialEq)]
pub struct NotificationsAvailable {
    pub inventory: Entity,
    pub owner: ActorId,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct ItemActivated {
    pub inventory: Entity,
    pub owner: ActorId,
    pub item: ItemId,
}
