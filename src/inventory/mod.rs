//! Inventory
//!
//! Server-authoritative slot storage for one owning entity:
//! - [`slot`] / [`store`]: the slot data model and read accessors
//! - [`transaction`]: every state-changing operation (add, remove, transfer, split, activate)
//! - [`events`]: owner notifications and scoped slot update events
//! - [`access`]: actors, authority and cross-entity access rules
//! - [`mirror`]: read-only client copies fed from published snapshots
//! - [`systems`]: the request surface wired into the ECS

pub mod access;
pub mod events;
pub mod mirror;
pub mod slot;
pub mod store;
pub mod systems;
pub mod transaction;

use bevy::prelude::*;

pub use access::{Actor, ActorId, Role};
pub use events::{
    InventoryUpdated, ItemActivated, Notification, NotificationQueue, NotificationsAvailable,
    Outbox, SlotUpdate, UpdateScope,
};
pub use mirror::{InventoryMirror, InventorySnapshot};
pub use slot::{ItemStatics, Slot, SlotKind, SlotRef};
pub use store::SlotStore;
pub use systems::{
    AccessRequest, ActivateItemRequest, DropItemRequest, ReleaseAccessRequest, RequestRejected,
    SplitStackRequest, TransferItemsRequest,
};
pub use transaction::{Activation, AddOutcome, AddRequest, TransactionEngine, TransferKind, TransferOutcome};

use crate::catalog::ItemId;
use crate::config::{CoreConfig, InventoryConfig, StartingItem};
use crate::pickup::PickupQueue;

pub struct InventoryPlugin;

impl Plugin for InventoryPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CoreConfig>()
            .init_resource::<PickupQueue>()
            .add_event::<TransferItemsRequest>()
            .add_event::<ActivateItemRequest>()
            .add_event::<SplitStackRequest>()
            .add_event::<DropItemRequest>()
            .add_event::<AccessRequest>()
            .add_event::<ReleaseAccessRequest>()
            .add_event::<RequestRejected>()
            .add_event::<InventoryUpdated>()
            .add_event::<NotificationsAvailable>()
            .add_event::<ItemActivated>()
            .add_systems(
                Update,
                (
                    systems::sync_positions,
                    systems::grant_starting_items,
                    systems::handle_access_requests,
                    systems::handle_transfer_requests,
                    systems::handle_split_requests,
                    systems::handle_activate_requests,
                    systems::handle_drop_requests,
                    systems::publish_inventory_updates,
                    mirror::sync_inventory_mirrors,
                )
                    .chain(),
            );
    }
}

/// Slot store plus everything the authority tracks about it
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Inventory {
    owner: ActorId,
    player_owned: bool,
    store: SlotStore,
    notifications: NotificationQueue,
    outbox: Outbox,
    withdraw_only: bool,
    in_use_by: Option<ActorId>,
    position: Vec3,
    max_interaction_distance: f32,
    hunt_iteration_ceiling: u32,
    starting_items: Vec<StartingItem>,
    starting_items_granted: bool,
    revision: u64,
}

impl Inventory {
    pub fn new(owner: ActorId, config: &InventoryConfig) -> Self {
        Self {
            owner,
            player_owned: false,
            store: SlotStore::new(config.general_slots, &config.equipment_slots),
            notifications: NotificationQueue::default(),
            outbox: Outbox::default(),
            withdraw_only: config.withdraw_only,
            in_use_by: None,
            position: Vec3::ZERO,
            max_interaction_distance: config.max_interaction_distance,
            hunt_iteration_ceiling: config.hunt_iteration_ceiling.max(1),
            starting_items: config.starting_items.clone(),
            starting_items_granted: config.starting_items.is_empty(),
            revision: 0,
        }
    }

    pub fn player_owned(mut self, player_owned: bool) -> Self {
        self.player_owned = player_owned;
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn owner(&self) -> ActorId {
        self.owner
    }

    pub fn is_player_owned(&self) -> bool {
        self.player_owned
    }

    pub fn store(&self) -> &SlotStore {
        &self.store
    }

    pub fn is_withdraw_only(&self) -> bool {
        self.withdraw_only
    }

    pub fn in_use_by(&self) -> Option<ActorId> {
        self.in_use_by
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn max_interaction_distance(&self) -> f32 {
        self.max_interaction_distance
    }

    pub fn hunt_iteration_ceiling(&self) -> u32 {
        self.hunt_iteration_ceiling
    }

    /// Bumped on every mutation; mirrors compare it to detect staleness
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn has_notifications(&self) -> bool {
        self.notifications.is_available()
    }

    /// Owner-side consumption of queued notifications
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn starting_items(&self) -> &[StartingItem] {
        &self.starting_items
    }

    pub fn starting_items_granted(&self) -> bool {
        self.starting_items_granted
    }

    /// General slots of player inventories are private; everything else is public.
    pub fn update_scope(&self, kind: SlotKind) -> UpdateScope {
        if self.player_owned && kind == SlotKind::General {
            UpdateScope::OwnerOnly
        } else {
            UpdateScope::AllObservers
        }
    }

    pub(crate) fn store_mut(&mut self) -> &mut SlotStore {
        &mut self.store
    }

    pub(crate) fn set_in_use_by(&mut self, actor: Option<ActorId>) {
        self.in_use_by = actor;
    }

    pub(crate) fn mark_changed(&mut self, update: SlotUpdate) {
        self.revision += 1;
        self.outbox.push_update(update);
    }

    pub(crate) fn mark_activated(&mut self, item: ItemId) {
        self.outbox.activated.push(item);
    }

    pub(crate) fn notify(&mut self, item: &ItemId, quantity: u32, was_added: bool) {
        self.notifications.send(item, quantity, was_added);
    }

    pub(crate) fn take_outbox(&mut self) -> Outbox {
        self.outbox.take()
    }

    pub(crate) fn set_starting_items_granted(&mut self) {
        self.starting_items_granted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_inventory_from_config() {
        let config = InventoryConfig::default();
        let inv = Inventory::new(ActorId(7), &config);
        assert_eq!(inv.owner(), ActorId(7));
        assert_eq!(inv.store().slot_count(SlotKind::General), 24);
        assert_eq!(inv.store().slot_count(SlotKind::Equipment), 21);
        assert_eq!(inv.revision(), 0);
        assert!(inv.starting_items_granted(), "nothing to grant");
        assert!(!inv.has_notifications());
    }

    #[test]
    fn test_update_scope() {
        let config = InventoryConfig::default();
        let player = Inventory::new(ActorId(1), &config).player_owned(true);
        assert_eq!(player.update_scope(SlotKind::General), UpdateScope::OwnerOnly);
        assert_eq!(player.update_scope(SlotKind::Equipment), UpdateScope::AllObservers);

        let chest = Inventory::new(ActorId(2), &config);
        assert_eq!(chest.update_scope(SlotKind::General), UpdateScope::AllObservers);
    }

    #[test]
    fn test_mark_changed_bumps_revision() {
        let mut inv = Inventory::new(ActorId(1), &InventoryConfig::container(2));
        inv.mark_changed(SlotUpdate::slot(SlotKind::General, 0));
        inv.mark_changed(SlotUpdate::slot(SlotKind::General, 0));
        assert_eq!(inv.revision(), 2);
        assert_eq!(inv.outbox().updates().len(), 1);
        let taken = inv.take_outbox();
        assert_eq!(taken.updates().len(), 1);
        assert!(inv.outbox().is_empty());
    }
}
