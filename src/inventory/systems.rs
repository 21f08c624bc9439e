//! ECS request surface for inventories.
//!
//! Clients never touch an [`Inventory`] directly: they send request events,
//! the authority runs them through the [`TransactionEngine`], and the results
//! leave as scoped update events. Rejections come back as [`RequestRejected`].

use bevy::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, info};

use super::access::{release_access, request_access, Actor};
use super::events::{InventoryUpdated, ItemActivated, NotificationsAvailable};
use super::slot::SlotRef;
use super::transaction::TransactionEngine;
use super::Inventory;
use crate::catalog::CatalogHandle;
use crate::config::CoreConfig;
use crate::error::{InventoryError, InventoryResult};
use crate::pickup::PickupQueue;

// ============================================================================
// Request events
// ============================================================================

/// Move units between two slots, possibly across inventories.
/// `quantity: 0` moves the whole stack.
#[derive(Event, Debug, Clone)]
pub struct TransferItemsRequest {
    pub actor: Entity,
    pub from: Entity,
    pub from_slot: SlotRef,
    pub to: Entity,
    pub to_slot: SlotRef,
    pub quantity: u32,
}

#[derive(Event, Debug, Clone)]
pub struct ActivateItemRequest {
    pub actor: Entity,
    pub inventory: Entity,
    pub slot: SlotRef,
    pub force_consume: bool,
}

#[derive(Event, Debug, Clone)]
pub struct SplitStackRequest {
    pub actor: Entity,
    pub inventory: Entity,
    pub from_index: usize,
    pub quantity: u32,
    pub to_index: Option<usize>,
}

#[derive(Event, Debug, Clone)]
pub struct DropItemRequest {
    pub actor: Entity,
    pub inventory: Entity,
    pub slot: SlotRef,
    pub quantity: u32,
}

/// Claim a world-owned inventory (open a chest)
#[derive(Event, Debug, Clone)]
pub struct AccessRequest {
    pub actor: Entity,
    pub inventory: Entity,
}

#[derive(Event, Debug, Clone)]
pub struct ReleaseAccessRequest {
    pub actor: Entity,
    pub inventory: Entity,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct RequestRejected {
    pub actor: Entity,
    pub error: InventoryError,
}

// ============================================================================
// Systems
// ============================================================================

/// Copy transforms into the positions used for distance checks
pub fn sync_positions(
    mut actors: Query<(&Transform, &mut Actor), Changed<Transform>>,
    mut inventories: Query<(&Transform, &mut Inventory), Changed<Transform>>,
) {
    for (transform, mut actor) in &mut actors {
        actor.position = transform.translation;
    }
    for (transform, mut inventory) in &mut inventories {
        inventory.set_position(transform.translation);
    }
}

pub fn grant_starting_items(
    config: Res<CoreConfig>,
    catalog: Option<Res<CatalogHandle>>,
    mut inventories: Query<&mut Inventory>,
) {
    let Some(catalog) = catalog else {
        return;
    };
    for mut inventory in &mut inventories {
        if inventory.starting_items_granted() {
            continue;
        }
        let owner = Actor::authority(inventory.owner());
        let engine = TransactionEngine::new(&owner, catalog.get());
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.fuel.byproduct_seed ^ owner.id.0);
        match engine.grant_starting_items(&mut inventory, &mut rng) {
            Ok(granted) => info!(owner = owner.id.0, granted, "starting items granted"),
            Err(e) => debug!(owner = owner.id.0, "starting items deferred: {}", e),
        }
    }
}

pub fn handle_access_requests(
    mut access: EventReader<AccessRequest>,
    mut release: EventReader<ReleaseAccessRequest>,
    actors: Query<&Actor>,
    mut inventories: Query<&mut Inventory>,
    mut rejected: EventWriter<RequestRejected>,
) {
    for request in access.read() {
        let result = with_actor_and_inventory(
            &actors,
            &mut inventories,
            request.actor,
            request.inventory,
            request_access,
        );
        report(request.actor, "access", result, &mut rejected);
    }
    for request in release.read() {
        let result = with_actor_and_inventory(
            &actors,
            &mut inventories,
            request.actor,
            request.inventory,
            release_access,
        );
        report(request.actor, "release", result, &mut rejected);
    }
}

pub fn handle_transfer_requests(
    mut requests: EventReader<TransferItemsRequest>,
    catalog: Option<Res<CatalogHandle>>,
    actors: Query<&Actor>,
    mut inventories: Query<&mut Inventory>,
    mut rejected: EventWriter<RequestRejected>,
) {
    let Some(catalog) = catalog else {
        return;
    };
    for request in requests.read() {
        let Ok(actor) = actors.get(request.actor) else {
            continue;
        };
        let engine = TransactionEngine::new(actor, catalog.get());
        let result = if request.from == request.to {
            match inventories.get_mut(request.from) {
                Ok(mut inventory) => engine.transfer(
                    &mut inventory,
                    request.from_slot,
                    None,
                    request.to_slot,
                    request.quantity,
                ),
                Err(_) => Err(InventoryError::MissingStore),
            }
        } else {
            match inventories.get_many_mut([request.from, request.to]) {
                Ok([mut from, mut to]) => engine.transfer(
                    &mut from,
                    request.from_slot,
                    Some(&mut *to),
                    request.to_slot,
                    request.quantity,
                ),
                Err(_) => Err(InventoryError::MissingStore),
            }
        };
        report(request.actor, "transfer", result, &mut rejected);
    }
}

pub fn handle_split_requests(
    mut requests: EventReader<SplitStackRequest>,
    catalog: Option<Res<CatalogHandle>>,
    actors: Query<&Actor>,
    mut inventories: Query<&mut Inventory>,
    mut rejected: EventWriter<RequestRejected>,
) {
    let Some(catalog) = catalog else {
        return;
    };
    for request in requests.read() {
        let result = with_actor_and_inventory(
            &actors,
            &mut inventories,
            request.actor,
            request.inventory,
            |actor, inventory| {
                TransactionEngine::new(actor, catalog.get()).split_stack(
                    inventory,
                    request.from_index,
                    request.quantity,
                    request.to_index,
                )
            },
        );
        report(request.actor, "split", result, &mut rejected);
    }
}

pub fn handle_activate_requests(
    mut requests: EventReader<ActivateItemRequest>,
    catalog: Option<Res<CatalogHandle>>,
    actors: Query<&Actor>,
    mut inventories: Query<&mut Inventory>,
    mut rejected: EventWriter<RequestRejected>,
) {
    let Some(catalog) = catalog else {
        return;
    };
    for request in requests.read() {
        let result = with_actor_and_inventory(
            &actors,
            &mut inventories,
            request.actor,
            request.inventory,
            |actor, inventory| {
                TransactionEngine::new(actor, catalog.get()).activate(
                    inventory,
                    request.slot,
                    request.force_consume,
                )
            },
        );
        report(request.actor, "activate", result, &mut rejected);
    }
}

pub fn handle_drop_requests(
    mut requests: EventReader<DropItemRequest>,
    catalog: Option<Res<CatalogHandle>>,
    mut queue: ResMut<PickupQueue>,
    actors: Query<&Actor>,
    mut inventories: Query<&mut Inventory>,
    mut rejected: EventWriter<RequestRejected>,
) {
    let Some(catalog) = catalog else {
        return;
    };
    for request in requests.read() {
        let result = with_actor_and_inventory(
            &actors,
            &mut inventories,
            request.actor,
            request.inventory,
            |actor, inventory| {
                TransactionEngine::new(actor, catalog.get()).drop_item(
                    inventory,
                    request.slot,
                    request.quantity,
                    &mut *queue,
                )
            },
        );
        report(request.actor, "drop", result, &mut rejected);
    }
}

/// Flush each inventory's outbox into scoped events
pub fn publish_inventory_updates(
    mut inventories: Query<(Entity, &mut Inventory)>,
    mut updated: EventWriter<InventoryUpdated>,
    mut available: EventWriter<NotificationsAvailable>,
    mut activated: EventWriter<ItemActivated>,
) {
    for (entity, mut inventory) in &mut inventories {
        if inventory.outbox().is_empty() {
            continue;
        }
        let outbox = inventory.take_outbox();
        let owner = inventory.owner();
        for &update in outbox.updates() {
            updated.send(InventoryUpdated {
                inventory: entity,
                owner,
                update,
                scope: inventory.update_scope(update.kind),
            });
        }
        for item in outbox.activated() {
            activated.send(ItemActivated {
                inventory: entity,
                owner,
                item: item.clone(),
            });
        }
        if inventory.has_notifications() {
            available.send(NotificationsAvailable {
                inventory: entity,
                owner,
            });
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn with_actor_and_inventory<T>(
    actors: &Query<&Actor>,
    inventories: &mut Query<&mut Inventory>,
    actor: Entity,
    inventory: Entity,
    run: impl FnOnce(&Actor, &mut Inventory) -> InventoryResult<T>,
) -> InventoryResult<T> {
    let actor = actors.get(actor).map_err(|_| InventoryError::NotAuthorized)?;
    let mut inventory = inventories
        .get_mut(inventory)
        .map_err(|_| InventoryError::MissingStore)?;
    run(actor, &mut inventory)
}

/// Run `run` with the inventory on `input` and, when it is a different
/// entity, the one on `output`. `None` if either is missing.
pub(crate) fn with_input_output<R>(
    inventories: &mut Query<&mut Inventory>,
    input: Entity,
    output: Option<Entity>,
    run: impl FnOnce(&mut Inventory, Option<&mut Inventory>) -> R,
) -> Option<R> {
    match output.filter(|&out| out != input) {
        Some(out) => match inventories.get_many_mut([input, out]) {
            Ok([mut input, mut output]) => Some(run(&mut *input, Some(&mut *output))),
            Err(_) => None,
        },
        None => match inventories.get_mut(input) {
            Ok(mut input) => Some(run(&mut *input, None)),
            Err(_) => None,
        },
    }
}

fn report<T: std::fmt::Debug>(
    actor: Entity,
    action: &str,
    result: InventoryResult<T>,
    rejected: &mut EventWriter<RequestRejected>,
) {
    match result {
        Ok(outcome) => debug!(?actor, action, ?outcome, "request applied"),
        Err(error) => {
            debug!(?actor, action, "request rejected: {}", error);
            rejected.send(RequestRejected { actor, error });
        }
    }
}
