//! World pickups.
//!
//! Dropped items and fuel byproducts without an output store become pickups
//! in the world. The transaction engine only talks to the [`PickupSpawner`]
//! trait; in the ECS that is the [`PickupQueue`] resource, drained once per
//! frame into [`WorldPickup`] entities.

use bevy::prelude::*;
use tracing::{debug, info};

use crate::catalog::{CatalogHandle, ItemId};
use crate::error::{InventoryError, InventoryResult};
use crate::inventory::{Actor, AddRequest, Inventory, ItemStatics, RequestRejected, TransactionEngine};

pub struct PickupPlugin;

impl Plugin for PickupPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PickupQueue>()
            .add_event::<CollectPickupRequest>()
            .add_event::<PickupCollected>()
            .add_event::<RequestRejected>()
            .add_systems(Update, (handle_collect_requests, spawn_queued_pickups).chain());
    }
}

/// Opaque reference to a spawned pickup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PickupHandle(pub u64);

/// Everything needed to materialize a pickup
#[derive(Debug, Clone, PartialEq)]
pub struct PickupSpawn {
    pub item: ItemId,
    pub quantity: u32,
    pub durability: f32,
    pub statics: ItemStatics,
    pub position: Vec3,
}

pub trait PickupSpawner {
    fn spawn_pickup(&mut self, spawn: PickupSpawn) -> PickupHandle;
}

/// Spawner that only records requests. Used by tests and headless tools.
#[derive(Debug, Default)]
pub struct RecordingSpawner {
    pub spawned: Vec<PickupSpawn>,
}

impl PickupSpawner for RecordingSpawner {
    fn spawn_pickup(&mut self, spawn: PickupSpawn) -> PickupHandle {
        self.spawned.push(spawn);
        PickupHandle(self.spawned.len() as u64)
    }
}

/// Pending spawns, turned into entities by [`spawn_queued_pickups`]
#[derive(Resource, Debug, Default)]
pub struct PickupQueue {
    pending: Vec<(PickupHandle, PickupSpawn)>,
    next_handle: u64,
}

impl PickupQueue {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> Vec<(PickupHandle, PickupSpawn)> {
        std::mem::take(&mut self.pending)
    }
}

impl PickupSpawner for PickupQueue {
    fn spawn_pickup(&mut self, spawn: PickupSpawn) -> PickupHandle {
        self.next_handle += 1;
        let handle = PickupHandle(self.next_handle);
        self.pending.push((handle, spawn));
        handle
    }
}

/// An item stack lying in the world
#[derive(Component, Debug, Clone, PartialEq)]
pub struct WorldPickup {
    pub handle: PickupHandle,
    pub item: ItemId,
    pub quantity: u32,
    pub durability: f32,
    pub statics: ItemStatics,
    operating: bool,
}

impl WorldPickup {
    pub fn new(handle: PickupHandle, spawn: PickupSpawn) -> Self {
        Self {
            handle,
            item: spawn.item,
            quantity: spawn.quantity,
            durability: spawn.durability,
            statics: spawn.statics,
            operating: false,
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.quantity == 0
    }

    /// Move as much of this pickup as fits into `inventory`. Whatever does not
    /// fit stays here. Re-entrant calls are refused.
    pub fn collect(
        &mut self,
        engine: &TransactionEngine,
        inventory: &mut Inventory,
        position: Vec3,
    ) -> InventoryResult<u32> {
        if self.operating {
            return Err(InventoryError::InUse);
        }
        if self.is_depleted() {
            return Err(InventoryError::InvalidQuantity(0));
        }
        self.operating = true;
        let result = self.collect_into(engine, inventory, position);
        self.operating = false;
        result
    }

    fn collect_into(
        &mut self,
        engine: &TransactionEngine,
        inventory: &mut Inventory,
        position: Vec3,
    ) -> InventoryResult<u32> {
        let actor = engine.actor();
        let distance = actor.position.distance(position);
        let max = inventory.max_interaction_distance();
        if distance > max {
            return Err(InventoryError::TooFar { distance, max });
        }
        let request = AddRequest::new(self.item.clone(), self.quantity)
            .with_durability(self.durability)
            .with_statics(self.statics.clone());
        match engine.add_item(inventory, request, None) {
            Ok(outcome) => {
                self.quantity -= outcome.added;
                Ok(outcome.added)
            }
            Err(error) => {
                // an aborted hunt keeps what it placed
                if let InventoryError::InternalLoopGuardTripped { added, .. } = error {
                    self.quantity -= added;
                }
                Err(error)
            }
        }
    }
}

// ============================================================================
// Events & systems
// ============================================================================

#[derive(Event, Debug, Clone)]
pub struct CollectPickupRequest {
    pub actor: Entity,
    pub pickup: Entity,
    pub inventory: Entity,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct PickupCollected {
    pub pickup: Entity,
    pub inventory: Entity,
    pub item: ItemId,
    pub quantity: u32,
    pub depleted: bool,
}

pub fn spawn_queued_pickups(mut commands: Commands, mut queue: ResMut<PickupQueue>) {
    for (handle, spawn) in queue.drain() {
        debug!(item = %spawn.item, quantity = spawn.quantity, "pickup spawned");
        commands.spawn((
            Transform::from_translation(spawn.position),
            WorldPickup::new(handle, spawn),
        ));
    }
}

#[allow(clippy::too_many_arguments)]
pub fn handle_collect_requests(
    mut commands: Commands,
    mut requests: EventReader<CollectPickupRequest>,
    catalog: Option<Res<CatalogHandle>>,
    actors: Query<&Actor>,
    mut pickups: Query<(&Transform, &mut WorldPickup)>,
    mut inventories: Query<&mut Inventory>,
    mut collected: EventWriter<PickupCollected>,
    mut rejected: EventWriter<RequestRejected>,
) {
    let Some(catalog) = catalog else {
        return;
    };
    for request in requests.read() {
        let Ok(actor) = actors.get(request.actor) else {
            continue;
        };
        let (Ok((transform, mut pickup)), Ok(mut inventory)) = (
            pickups.get_mut(request.pickup),
            inventories.get_mut(request.inventory),
        ) else {
            rejected.send(RequestRejected {
                actor: request.actor,
                error: InventoryError::MissingStore,
            });
            continue;
        };
        let engine = TransactionEngine::new(actor, catalog.get());
        match pickup.collect(&engine, &mut inventory, transform.translation) {
            Ok(quantity) => {
                let depleted = pickup.is_depleted();
                if depleted {
                    commands.entity(request.pickup).despawn();
                }
                info!(item = %pickup.item, quantity, depleted, "pickup collected");
                collected.send(PickupCollected {
                    pickup: request.pickup,
                    inventory: request.inventory,
                    item: pickup.item.clone(),
                    quantity,
                    depleted,
                });
            }
            Err(error) => {
                debug!(actor = actor.id.0, "pickup collect rejected: {}", error);
                rejected.send(RequestRejected {
                    actor: request.actor,
                    error,
                });
            }
        }
    }
}
