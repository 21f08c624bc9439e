use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use tracing::{info, warn};

use inventory_core::catalog::reload::CatalogReloadPlugin;
use inventory_core::config::InventoryConfig;
use inventory_core::crafting::{CraftRequest, CraftingEvent, CraftingStation};
use inventory_core::fuel::{FuelBurner, FuelSystemToggled, StartFuelRequest};
use inventory_core::inventory::{AddRequest, RequestRejected};
use inventory_core::{
    Actor, ActorId, CatalogHandle, CatalogTable, CoreConfig, Inventory, InventoryCorePlugins,
    ItemId, TransactionEngine,
};

const CATALOG_PATH: &str = "assets/catalog.ron";
const CONFIG_PATH: &str = "config/core.ron";
const FRAME_STEP: Duration = Duration::from_millis(250);
const DEMO_FRAMES: u32 = 120;

const PLAYER: ActorId = ActorId(1);
const WORKBENCH: ActorId = ActorId(100);
const FURNACE: ActorId = ActorId(200);

fn main() -> Result<()> {
    let config = CoreConfig::load(Path::new(CONFIG_PATH))
        .with_context(|| format!("loading {}", CONFIG_PATH))?;
    let catalog = CatalogTable::load(Path::new(CATALOG_PATH))
        .with_context(|| format!("loading {}", CATALOG_PATH))?;

    let mut app = App::new();
    app.insert_resource(config)
        .insert_resource(CatalogHandle::new(catalog))
        .insert_resource(TimeUpdateStrategy::ManualDuration(FRAME_STEP))
        .add_plugins(MinimalPlugins)
        .add_plugins(InventoryCorePlugins)
        .add_plugins(CatalogReloadPlugin {
            path: CATALOG_PATH.into(),
        })
        .add_systems(Startup, setup)
        .add_systems(Update, log_activity);

    for _ in 0..DEMO_FRAMES {
        app.update();
    }

    let world = app.world_mut();
    let mut inventories = world.query::<&Inventory>();
    for inventory in inventories.iter(world) {
        info!(
            owner = inventory.owner().0,
            revision = inventory.revision(),
            planks = inventory.store().total_quantity(&ItemId::new("plank")),
            ash = inventory.store().total_quantity(&ItemId::new("ash")),
            "final state"
        );
    }
    Ok(())
}

/// Player, a stocked workbench and a stocked furnace
fn setup(
    mut commands: Commands,
    config: Res<CoreConfig>,
    catalog: Res<CatalogHandle>,
    mut crafts: EventWriter<CraftRequest>,
    mut starts: EventWriter<StartFuelRequest>,
) {
    let player = commands
        .spawn((
            Actor::player(PLAYER, Vec3::ZERO).with_name("Quartermaster"),
            Inventory::new(PLAYER, &config.inventory).player_owned(true),
            Transform::default(),
        ))
        .id();

    let workbench_store = stocked(
        catalog.get(),
        WORKBENCH,
        &[("wood", 12), ("iron_ore", 4)],
        Vec3::new(64.0, 0.0, 0.0),
    );
    let workbench = commands
        .spawn((
            workbench_store,
            CraftingStation::new(WORKBENCH, config.crafting.clone()),
        ))
        .id();

    let furnace_store = stocked(
        catalog.get(),
        FURNACE,
        &[("oil", 2), ("coal", 1)],
        Vec3::new(0.0, 0.0, 64.0),
    );
    let furnace = commands
        .spawn((furnace_store, FuelBurner::new(FURNACE, config.fuel.clone())))
        .id();

    for item in ["plank", "plank", "nail"] {
        crafts.send(CraftRequest {
            actor: player,
            station: workbench,
            item: ItemId::new(item),
        });
    }
    starts.send(StartFuelRequest {
        actor: player,
        burner: furnace,
    });
    info!("demo world ready");
}

fn stocked(
    catalog: &dyn inventory_core::ItemCatalog,
    owner: ActorId,
    items: &[(&str, u32)],
    position: Vec3,
) -> Inventory {
    let mut inventory = Inventory::new(owner, &InventoryConfig::container(8)).at(position);
    let actor = Actor::authority(owner);
    let engine = TransactionEngine::new(&actor, catalog);
    for (item, quantity) in items {
        if let Err(e) = engine.add_item(&mut inventory, AddRequest::new(*item, *quantity), None) {
            warn!(item, "could not stock demo inventory: {}", e);
        }
    }
    inventory
}

fn log_activity(
    mut crafting: EventReader<CraftingEvent>,
    mut toggled: EventReader<FuelSystemToggled>,
    mut rejected: EventReader<RequestRejected>,
) {
    for event in crafting.read() {
        info!(item = %event.item, kind = ?event.kind, "crafting");
    }
    for event in toggled.read() {
        info!(running = event.running, "furnace toggled");
    }
    for event in rejected.read() {
        warn!(error = %event.error, "request rejected");
    }
}
