//! ECS integration tests
//!
//! Builds a headless app with every plugin, sends request events and checks
//! the published events and component state after a few frames.

use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;

use inventory_core::catalog::{
    CatalogTable, FuelDefinition, ItemDefinition, QuantityRange, RecipeDefinition,
};
use inventory_core::config::{CraftingConfig, FuelConfig, InventoryConfig, StartingItem};
use inventory_core::crafting::{CraftRequest, CraftingEvent, CraftingEventKind, CraftingStation};
use inventory_core::fuel::{FuelBurner, FuelOutput, FuelSystemToggled, StartFuelRequest};
use inventory_core::inventory::{
    AddRequest, DropItemRequest, InventoryMirror, InventoryUpdated, RequestRejected, TransferItemsRequest,
    UpdateScope,
};
use inventory_core::pickup::{CollectPickupRequest, PickupCollected, WorldPickup};
use inventory_core::{
    Actor, ActorId, CatalogHandle, Inventory, InventoryCorePlugins, InventoryError, ItemId,
    SlotKind, SlotRef, TransactionEngine,
};

// ============================================================
// Harness
// ============================================================

const STEP: Duration = Duration::from_millis(250);
const PLAYER: ActorId = ActorId(1);
const CHEST: ActorId = ActorId(40);
const STATION: ActorId = ActorId(60);

#[derive(Resource)]
struct Recorded<E: Event>(Vec<E>);

impl<E: Event> Default for Recorded<E> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

fn record<E: Event + Clone>(mut reader: EventReader<E>, mut log: ResMut<Recorded<E>>) {
    log.0.extend(reader.read().cloned());
}

fn catalog() -> CatalogTable {
    CatalogTable::new()
        .with_item(ItemDefinition::new("wood", 10))
        .with_item(ItemDefinition::new("plank", 20))
        .with_item(ItemDefinition::new("bread", 5))
        .with_item(ItemDefinition::new("oil", 10))
        .with_item(ItemDefinition::new("ash", 50))
        .with_recipe(RecipeDefinition::new("plank", &[("wood", 2)]).with_ticks(3, 1))
        .with_fuel(FuelDefinition::new("oil", 1.0).with_byproduct("ash", 2, 2))
}

fn app() -> App {
    let mut app = App::new();
    app.insert_resource(TimeUpdateStrategy::ManualDuration(STEP))
        .insert_resource(CatalogHandle::new(catalog()))
        .add_plugins(MinimalPlugins)
        .add_plugins(InventoryCorePlugins)
        .init_resource::<Recorded<InventoryUpdated>>()
        .init_resource::<Recorded<RequestRejected>>()
        .init_resource::<Recorded<CraftingEvent>>()
        .init_resource::<Recorded<FuelSystemToggled>>()
        .init_resource::<Recorded<PickupCollected>>()
        .add_systems(
            Last,
            (
                record::<InventoryUpdated>,
                record::<RequestRejected>,
                record::<CraftingEvent>,
                record::<FuelSystemToggled>,
                record::<PickupCollected>,
            ),
        );
    app
}

fn run(app: &mut App, frames: u32) {
    for _ in 0..frames {
        app.update();
    }
}

fn stocked(owner: ActorId, items: &[(&str, u32)]) -> Inventory {
    let catalog = catalog();
    let mut inventory = Inventory::new(owner, &InventoryConfig::container(6));
    let actor = Actor::authority(owner);
    let engine = TransactionEngine::new(&actor, &catalog);
    for (item, quantity) in items {
        engine
            .add_item(&mut inventory, AddRequest::new(*item, *quantity), None)
            .unwrap();
    }
    inventory
}

fn spawn_player(app: &mut App) -> Entity {
    app.world_mut()
        .spawn((
            Actor::player(PLAYER, Vec3::ZERO),
            Inventory::new(PLAYER, &InventoryConfig::container(6)).player_owned(true),
        ))
        .id()
}

// ============================================================
// Inventory requests
// ============================================================

#[test]
fn test_transfer_request_publishes_scoped_updates() {
    let mut app = app();
    let player = spawn_player(&mut app);
    let chest = app.world_mut().spawn(stocked(CHEST, &[("wood", 7)])).id();
    run(&mut app, 1);
    app.world_mut().resource_mut::<Recorded<InventoryUpdated>>().0.clear();

    app.world_mut().send_event(TransferItemsRequest {
        actor: player,
        from: chest,
        from_slot: SlotRef::general(0),
        to: player,
        to_slot: SlotRef::general(0),
        quantity: 5,
    });
    run(&mut app, 2);

    let bag = app.world().get::<Inventory>(player).unwrap();
    assert_eq!(bag.store().total_quantity(&ItemId::new("wood")), 5);
    let updates = &app.world().resource::<Recorded<InventoryUpdated>>().0;
    let chest_update = updates.iter().find(|u| u.inventory == chest).unwrap();
    assert_eq!(chest_update.scope, UpdateScope::AllObservers);
    let bag_update = updates.iter().find(|u| u.inventory == player).unwrap();
    assert_eq!(bag_update.scope, UpdateScope::OwnerOnly);
}

#[test]
fn test_stranger_request_is_rejected() {
    let mut app = app();
    let player = spawn_player(&mut app);
    let stranger = app
        .world_mut()
        .spawn(Actor::player(ActorId(2), Vec3::ZERO))
        .id();
    run(&mut app, 1);

    app.world_mut().send_event(DropItemRequest {
        actor: stranger,
        inventory: player,
        slot: SlotRef::general(0),
        quantity: 1,
    });
    run(&mut app, 2);

    let rejected = &app.world().resource::<Recorded<RequestRejected>>().0;
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].actor, stranger);
    assert_eq!(rejected[0].error, InventoryError::NotAuthorized);
}

#[test]
fn test_starting_items_granted_once() {
    let mut app = app();
    let mut config = InventoryConfig::container(4);
    config.starting_items = vec![StartingItem {
        item: ItemId::new("bread"),
        quantity: QuantityRange::exactly(3),
        equip: false,
    }];
    let entity = app.world_mut().spawn(Inventory::new(PLAYER, &config)).id();
    run(&mut app, 3);

    let inventory = app.world().get::<Inventory>(entity).unwrap();
    assert!(inventory.starting_items_granted());
    assert_eq!(inventory.store().total_quantity(&ItemId::new("bread")), 3);
}

#[test]
fn test_mirror_follows_revision() {
    let mut app = app();
    let chest = app.world_mut().spawn(stocked(CHEST, &[("wood", 4)])).id();
    let mirror = app.world_mut().spawn(InventoryMirror::new(chest)).id();
    run(&mut app, 1);

    let revision = app.world().get::<Inventory>(chest).unwrap().revision();
    let view = app.world().get::<InventoryMirror>(mirror).unwrap();
    assert_eq!(view.revision(), Some(revision));
    assert_eq!(view.slot(0, SlotKind::General).quantity(), 4);
}

#[test]
fn test_drop_and_collect_round_trip() {
    let mut app = app();
    let player = spawn_player(&mut app);
    run(&mut app, 1);
    {
        let catalog = catalog();
        let actor = Actor::authority(PLAYER);
        let mut bag = app.world_mut().get_mut::<Inventory>(player).unwrap();
        TransactionEngine::new(&actor, &catalog)
            .add_item(&mut bag, AddRequest::new("wood", 6), None)
            .unwrap();
    }

    app.world_mut().send_event(DropItemRequest {
        actor: player,
        inventory: player,
        slot: SlotRef::general(0),
        quantity: 4,
    });
    run(&mut app, 2);

    let world = app.world_mut();
    let mut pickups = world.query::<(Entity, &WorldPickup)>();
    let found: Vec<(Entity, u32)> = pickups.iter(world).map(|(e, p)| (e, p.quantity)).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1, 4);

    app.world_mut().send_event(CollectPickupRequest {
        actor: player,
        pickup: found[0].0,
        inventory: player,
    });
    run(&mut app, 2);

    let collected = &app.world().resource::<Recorded<PickupCollected>>().0;
    assert_eq!(collected.len(), 1);
    assert!(collected[0].depleted);
    assert!(app.world().get::<WorldPickup>(found[0].0).is_none());
    let bag = app.world().get::<Inventory>(player).unwrap();
    assert_eq!(bag.store().total_quantity(&ItemId::new("wood")), 6);
}

// ============================================================
// Crafting & fuel
// ============================================================

#[test]
fn test_craft_request_completes_over_frames() {
    let mut app = app();
    let player = spawn_player(&mut app);
    let station = app
        .world_mut()
        .spawn((
            stocked(STATION, &[("wood", 6)]),
            CraftingStation::new(STATION, CraftingConfig::default()),
        ))
        .id();
    run(&mut app, 1);

    app.world_mut().send_event(CraftRequest {
        actor: player,
        station,
        item: ItemId::new("plank"),
    });
    run(&mut app, 24);

    let events = &app.world().resource::<Recorded<CraftingEvent>>().0;
    assert_eq!(events.first().map(|e| e.kind), Some(CraftingEventKind::Started));
    assert!(events
        .iter()
        .any(|e| e.kind == CraftingEventKind::Completed { quantity: 1 }));
    let store = app.world().get::<Inventory>(station).unwrap();
    assert_eq!(store.store().total_quantity(&ItemId::new("plank")), 1);
    assert_eq!(store.store().total_quantity(&ItemId::new("wood")), 0);
}

#[test]
fn test_furnace_toggles_and_outputs_byproducts() {
    let mut app = app();
    let player = spawn_player(&mut app);
    let bin = app.world_mut().spawn(Inventory::new(CHEST, &InventoryConfig::container(2))).id();
    let furnace = app
        .world_mut()
        .spawn((
            stocked(STATION, &[("oil", 2)]),
            FuelBurner::new(STATION, FuelConfig::default()),
            FuelOutput(bin),
        ))
        .id();
    run(&mut app, 1);

    app.world_mut().send_event(StartFuelRequest {
        actor: player,
        burner: furnace,
    });
    run(&mut app, 40);

    let toggles: Vec<bool> = app
        .world()
        .resource::<Recorded<FuelSystemToggled>>()
        .0
        .iter()
        .map(|t| t.running)
        .collect();
    assert_eq!(toggles, vec![true, false]);
    let burner = app.world().get::<FuelBurner>(furnace).unwrap();
    assert!(!burner.is_burning());
    let bin = app.world().get::<Inventory>(bin).unwrap();
    assert_eq!(bin.store().total_quantity(&ItemId::new("ash")), 4);
}
