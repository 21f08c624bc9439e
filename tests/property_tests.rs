//! Property-based tests using proptest
//!
//! Invariants that must hold for ALL inputs:
//! - Adds conserve units: added + remainder + dropped == requested
//! - No slot ever exceeds its stack limit; vacant slots hold the empty item
//! - Transfers and splits never create or destroy units
//! - Crafting never consumes more than its recipe allows
//! - Cancelling refunds exactly the completed consumption cycles
//! - Draining notifications twice yields an empty second batch
//! - Save blobs restore to the same slot contents

use proptest::prelude::*;

use inventory_core::catalog::{CatalogTable, EquipCategory, ItemDefinition, RecipeDefinition};
use inventory_core::config::{CraftingConfig, InventoryConfig};
use inventory_core::crafting::CraftingStation;
use inventory_core::inventory::{AddRequest, SlotStore};
use inventory_core::pickup::RecordingSpawner;
use inventory_core::{Actor, ActorId, Inventory, ItemId, SlotKind, SlotRef, TransactionEngine};

const OWNER: ActorId = ActorId(9);
const ITEMS: [&str; 3] = ["wood", "stone", "gem"];

fn catalog() -> CatalogTable {
    CatalogTable::new()
        .with_item(ItemDefinition::new("wood", 10))
        .with_item(ItemDefinition::new("stone", 25))
        .with_item(ItemDefinition::new("gem", 1))
        .with_item(ItemDefinition::new("brick", 50))
        .with_recipe(RecipeDefinition::new("brick", &[("stone", 3)]).with_ticks(4, 2))
}

fn inventory(slots: usize) -> Inventory {
    let mut config = InventoryConfig::container(slots);
    config.equipment_slots = vec![EquipCategory::Primary];
    Inventory::new(OWNER, &config)
}

fn total_units(store: &SlotStore) -> u32 {
    store.slots(SlotKind::General).iter().map(|s| s.quantity()).sum()
}

fn assert_slots_valid(store: &SlotStore, catalog: &CatalogTable) -> Result<(), TestCaseError> {
    for slot in store.slots(SlotKind::General) {
        if slot.is_vacant() {
            prop_assert!(slot.item().is_none(), "vacant slot holds {}", slot.item());
            continue;
        }
        let max = inventory_core::ItemCatalog::max_stack(catalog, slot.item()).unwrap_or(0);
        prop_assert!(slot.quantity() <= max, "{} over stack: {} > {}", slot.item(), slot.quantity(), max);
    }
    Ok(())
}

fn adds() -> impl Strategy<Value = Vec<(usize, u32)>> {
    prop::collection::vec((0..ITEMS.len(), 1u32..40), 1..20)
}

// ============================================================
// Add / remove
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_add_conserves_units(slots in 1usize..12, ops in adds()) {
        let catalog = catalog();
        let actor = Actor::authority(OWNER);
        let engine = TransactionEngine::new(&actor, &catalog);
        let mut inv = inventory(slots);
        let mut expected = 0u32;

        for (item, quantity) in ops {
            match engine.add_item(&mut inv, AddRequest::new(ITEMS[item], quantity), None) {
                Ok(outcome) => {
                    prop_assert_eq!(outcome.added + outcome.remainder + outcome.dropped, quantity);
                    prop_assert_eq!(outcome.dropped, 0);
                    expected += outcome.added;
                }
                Err(_) => {}
            }
            assert_slots_valid(inv.store(), &catalog)?;
        }
        prop_assert_eq!(total_units(inv.store()), expected);
    }

    #[test]
    fn prop_remove_never_overdraws(ops in adds(), take in 1u32..200) {
        let catalog = catalog();
        let actor = Actor::authority(OWNER);
        let engine = TransactionEngine::new(&actor, &catalog);
        let mut inv = inventory(16);
        for (item, quantity) in ops {
            let _ = engine.add_item(&mut inv, AddRequest::new(ITEMS[item], quantity), None);
        }
        let wood = ItemId::new("wood");
        let before = inv.store().total_quantity(&wood);
        let removed = engine.remove_item(&mut inv, &wood, take, SlotKind::General, true).unwrap();
        prop_assert_eq!(removed, take.min(before));
        prop_assert_eq!(inv.store().total_quantity(&wood), before - removed);
        assert_slots_valid(inv.store(), &catalog)?;
    }
}

// ============================================================
// Transfer / split
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_transfer_conserves_units(
        ops in adds(),
        moves in prop::collection::vec((0usize..8, 0usize..8, 0u32..12), 1..20),
    ) {
        let catalog = catalog();
        let actor = Actor::authority(OWNER);
        let engine = TransactionEngine::new(&actor, &catalog);
        let mut inv = inventory(8);
        for (item, quantity) in ops {
            let _ = engine.add_item(&mut inv, AddRequest::new(ITEMS[item], quantity), None);
        }
        let totals: Vec<u32> = ITEMS.iter().map(|i| inv.store().total_quantity(&ItemId::new(*i))).collect();

        for (from, to, quantity) in moves {
            let _ = engine.transfer(&mut inv, SlotRef::general(from), None, SlotRef::general(to), quantity);
            assert_slots_valid(inv.store(), &catalog)?;
        }
        let after: Vec<u32> = ITEMS.iter().map(|i| inv.store().total_quantity(&ItemId::new(*i))).collect();
        prop_assert_eq!(totals, after);
    }

    #[test]
    fn prop_split_keeps_source_nonempty(stack in 1u32..=25, split in 0u32..40) {
        let catalog = catalog();
        let actor = Actor::authority(OWNER);
        let engine = TransactionEngine::new(&actor, &catalog);
        let mut inv = inventory(4);
        engine.add_item(&mut inv, AddRequest::new("stone", stack), None).unwrap();

        match engine.split_stack(&mut inv, 0, split, None) {
            Ok(moved) => {
                prop_assert!(moved >= 1);
                prop_assert!(inv.store().slot(0, SlotKind::General).quantity() >= 1);
                prop_assert_eq!(inv.store().slot(1, SlotKind::General).quantity(), moved);
            }
            Err(_) => {
                prop_assert_eq!(inv.store().slot(0, SlotKind::General).quantity(), stack);
            }
        }
        prop_assert_eq!(total_units(inv.store()), stack);
    }
}

// ============================================================
// Crafting
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_crafting_consumption_bounded(stone in 0u32..20, ticks in 0u32..12) {
        let catalog = catalog();
        let actor = Actor::authority(OWNER);
        let engine = TransactionEngine::new(&actor, &catalog);
        let mut input = inventory(6);
        if stone > 0 {
            engine.add_item(&mut input, AddRequest::new("stone", stone), None).unwrap();
        }
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station.request_craft(&actor, &catalog, &ItemId::new("brick"), &mut input, None, &mut drops).unwrap();

        for _ in 0..ticks {
            station.tick(&catalog, &mut input, None, &mut drops);
        }
        let consumed = stone - input.store().total_quantity(&ItemId::new("stone"));
        // 4 ticks at interval 2 -> 2 cycles of 3 stone
        prop_assert!(consumed <= 6);
        prop_assert_eq!(consumed % 3, 0);
        let bricks = input.store().total_quantity(&ItemId::new("brick"));
        if bricks > 0 {
            prop_assert_eq!(consumed, 6);
            prop_assert!(station.queue().is_empty());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_cancel_refunds_completed_cycles(ticks in 0u32..4) {
        let catalog = catalog();
        let actor = Actor::authority(OWNER);
        let engine = TransactionEngine::new(&actor, &catalog);
        let mut input = inventory(6);
        engine.add_item(&mut input, AddRequest::new("stone", 24), None).unwrap();
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station.request_craft(&actor, &catalog, &ItemId::new("brick"), &mut input, None, &mut drops).unwrap();

        for _ in 0..ticks {
            station.tick(&catalog, &mut input, None, &mut drops);
        }
        let completed = station.queue()[0].ticks_completed;
        let before = input.store().total_quantity(&ItemId::new("stone"));
        let refunded = station.cancel_craft(&actor, &catalog, 0, &mut input, &mut drops).unwrap();

        prop_assert_eq!(refunded, (completed / 2) * 3);
        prop_assert_eq!(input.store().total_quantity(&ItemId::new("stone")), before + refunded);
        prop_assert!(station.queue().is_empty());
    }
}

// ============================================================
// Notifications
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_drain_is_idempotent(ops in adds()) {
        let catalog = catalog();
        let actor = Actor::authority(OWNER);
        let engine = TransactionEngine::new(&actor, &catalog);
        let mut inv = inventory(8);
        let mut expected = 0;
        for (item, quantity) in ops {
            if engine.add_item(&mut inv, AddRequest::new(ITEMS[item], quantity), None).is_ok() {
                expected += 1;
            }
        }
        let first = inv.drain_notifications();
        prop_assert_eq!(first.len(), expected);
        prop_assert!(first.iter().all(|n| n.was_addition && n.quantity_delta > 0));
        prop_assert!(inv.drain_notifications().is_empty());
        prop_assert!(!inv.has_notifications());
    }
}

// ============================================================
// Save blobs
// ============================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_save_restore_preserves_slots(ops in adds()) {
        let catalog = catalog();
        let actor = Actor::authority(OWNER);
        let engine = TransactionEngine::new(&actor, &catalog);
        let mut inv = inventory(10);
        for (item, quantity) in ops {
            let _ = engine.add_item(&mut inv, AddRequest::new(ITEMS[item], quantity), None);
        }

        let blob = inventory_core::save::save(&inv).unwrap();
        let mut restored = inventory(10);
        let report = inventory_core::save::restore(&mut restored, &actor, &catalog, &blob).unwrap();
        prop_assert_eq!(report.skipped, 0);
        prop_assert_eq!(
            restored.store().slots(SlotKind::General),
            inv.store().slots(SlotKind::General)
        );
    }
}
