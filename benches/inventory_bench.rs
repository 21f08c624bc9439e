use criterion::{black_box, criterion_group, criterion_main, Criterion};

use inventory_core::catalog::{CatalogTable, ItemDefinition, RecipeDefinition};
use inventory_core::config::{CraftingConfig, InventoryConfig};
use inventory_core::crafting::CraftingStation;
use inventory_core::inventory::AddRequest;
use inventory_core::pickup::RecordingSpawner;
use inventory_core::{Actor, ActorId, Inventory, ItemId, SlotKind, SlotRef, TransactionEngine};

const OWNER: ActorId = ActorId(1);

fn catalog() -> CatalogTable {
    CatalogTable::new()
        .with_item(ItemDefinition::new("wood", 10))
        .with_item(ItemDefinition::new("gem", 1))
        .with_item(ItemDefinition::new("plank", 50))
        .with_recipe(RecipeDefinition::new("plank", &[("wood", 2)]).with_ticks(3, 1))
}

fn bench_hunt_add(c: &mut Criterion) {
    let catalog = catalog();
    let actor = Actor::authority(OWNER);
    let engine = TransactionEngine::new(&actor, &catalog);

    c.bench_function("hunt_add_stackable_24", |b| {
        b.iter(|| {
            let mut inv = Inventory::new(OWNER, &InventoryConfig::container(24));
            for _ in 0..24 {
                let _ = engine.add_item(&mut inv, AddRequest::new("wood", black_box(7)), None);
            }
            inv
        })
    });

    c.bench_function("hunt_add_unstackable_96", |b| {
        b.iter(|| {
            let mut inv = Inventory::new(OWNER, &InventoryConfig::container(96));
            let _ = engine.add_item(&mut inv, AddRequest::new("gem", black_box(96)), None);
            inv
        })
    });
}

fn bench_transfer(c: &mut Criterion) {
    let catalog = catalog();
    let actor = Actor::authority(OWNER);
    let engine = TransactionEngine::new(&actor, &catalog);
    let mut inv = Inventory::new(OWNER, &InventoryConfig::container(24));
    let _ = engine.add_item(&mut inv, AddRequest::new("wood", 10), None);

    c.bench_function("transfer_back_and_forth", |b| {
        b.iter(|| {
            let _ = engine.transfer(&mut inv, SlotRef::general(0), None, SlotRef::general(23), 0);
            let _ = engine.transfer(&mut inv, SlotRef::general(23), None, SlotRef::general(0), 0);
        })
    });
}

fn bench_crafting_tick(c: &mut Criterion) {
    let catalog = catalog();
    let actor = Actor::authority(OWNER);
    let engine = TransactionEngine::new(&actor, &catalog);
    let plank = ItemId::new("plank");

    c.bench_function("crafting_full_queue", |b| {
        b.iter(|| {
            let mut input = Inventory::new(OWNER, &InventoryConfig::container(24));
            for _ in 0..5 {
                let _ = engine.add_item(&mut input, AddRequest::new("wood", 10), None);
            }
            let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
            let mut drops = RecordingSpawner::default();
            for _ in 0..8 {
                let _ = station.request_craft(&actor, &catalog, &plank, &mut input, None, &mut drops);
            }
            for _ in 0..4 {
                station.tick(&catalog, &mut input, None, &mut drops);
            }
            black_box(input.store().occupied_count(SlotKind::General))
        })
    });
}

criterion_group!(benches, bench_hunt_add, bench_transfer, bench_crafting_tick);
criterion_main!(benches);
