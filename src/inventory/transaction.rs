//! Transaction engine
//!
//! Every mutating inventory operation runs the same pipeline:
//! authority check, validation, mutation, notification, update publish.
//! Failures return an [`InventoryError`] and leave the inventory untouched,
//! except for loop-guard trips, which keep whatever was already placed.
//!
//! Units are conserved: apart from `add_item` (creates) and the remove
//! family (destroys, or hands units to a pickup spawner), no operation here
//! changes the total count of any item across the inventories it touches.

use bevy::prelude::*;
use rand::Rng;
use tracing::{debug, error, warn};

use super::access::{accepts_deposit_from, authorize, AccessKind, Actor};
use super::events::SlotUpdate;
use super::slot::{ItemStatics, Slot, SlotKind, SlotRef};
use super::store::SlotStore;
use super::Inventory;
use crate::catalog::{EquipCategory, ItemActivation, ItemCatalog, ItemDefinition, ItemId};
use crate::constants::PICKUP_SPAWN_HEIGHT;
use crate::error::{InventoryError, InventoryResult};
use crate::pickup::{PickupSpawn, PickupSpawner};

/// Parameters of an add. Defaults: hunt mode, overflow to other slots, notify.
#[derive(Debug, Clone, PartialEq)]
pub struct AddRequest {
    pub item: ItemId,
    pub quantity: u32,
    /// Explicit general slot; `None` hunts for a stack or vacancy
    pub slot: Option<usize>,
    pub overflow: bool,
    pub drop_overflow: bool,
    pub notify: bool,
    /// Defaults to the catalog's full durability
    pub durability: Option<f32>,
    pub statics: Option<ItemStatics>,
}

impl AddRequest {
    pub fn new(item: impl Into<ItemId>, quantity: u32) -> Self {
        Self {
            item: item.into(),
            quantity,
            slot: None,
            overflow: true,
            drop_overflow: false,
            notify: true,
            durability: None,
            statics: None,
        }
    }

    pub fn at(mut self, index: usize) -> Self {
        self.slot = Some(index);
        self
    }

    pub fn overflow(mut self, overflow: bool) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn drop_overflow(mut self, drop: bool) -> Self {
        self.drop_overflow = drop;
        self
    }

    pub fn notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    pub fn with_durability(mut self, durability: f32) -> Self {
        self.durability = Some(durability);
        self
    }

    pub fn with_statics(mut self, statics: ItemStatics) -> Self {
        self.statics = Some(statics);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: u32,
    /// Units neither placed nor dropped
    pub remainder: u32,
    /// Units handed to the pickup spawner
    pub dropped: u32,
    /// General slot indices that received units, in placement order
    pub slots: Vec<usize>,
}

impl AddOutcome {
    pub fn is_complete(&self) -> bool {
        self.remainder == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Destination was vacant
    Moved,
    /// Same item stacked onto the destination
    Merged,
    /// Contents exchanged wholesale
    Swapped,
    /// Source and destination are the same slot
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub kind: TransferKind,
    pub item: ItemId,
    /// Units of `item` now in the destination slot because of this transfer
    pub moved: u32,
    /// Requested units that stayed in the source
    pub remainder: u32,
    /// For swaps, what travelled back into the source slot
    pub swapped_in: Option<(ItemId, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Equipped { slot: usize },
    Unequipped { slot: usize },
    Consumed,
    Used,
}

/// Runs inventory operations on behalf of one actor
pub struct TransactionEngine<'a> {
    actor: &'a Actor,
    catalog: &'a dyn ItemCatalog,
}

impl<'a> TransactionEngine<'a> {
    pub fn new(actor: &'a Actor, catalog: &'a dyn ItemCatalog) -> Self {
        Self { actor, catalog }
    }

    pub fn actor(&self) -> &Actor {
        self.actor
    }

    fn definition(&self, item: &ItemId) -> InventoryResult<&'a ItemDefinition> {
        if item.is_none() {
            return Err(InventoryError::InvalidItem(item.clone()));
        }
        self.catalog
            .lookup_item(item)
            .ok_or_else(|| InventoryError::InvalidItem(item.clone()))
    }

    // ============================================================
    // Add
    // ============================================================

    /// Place units into general slots. Returns how much landed where; a
    /// partial result is still `Ok` with a non-zero remainder.
    pub fn add_item(
        &self,
        inventory: &mut Inventory,
        request: AddRequest,
        spawner: Option<&mut dyn PickupSpawner>,
    ) -> InventoryResult<AddOutcome> {
        authorize(self.actor, inventory, AccessKind::Deposit)?;
        let def = self.definition(&request.item)?;
        if request.quantity < 1 {
            return Err(InventoryError::InvalidQuantity(request.quantity));
        }

        let durability = request.durability.unwrap_or_else(|| def.full_durability());
        let statics = request
            .statics
            .clone()
            .unwrap_or_else(|| ItemStatics::from_definition(def));
        let mut remaining = request.quantity;
        let mut touched = Vec::new();

        if let Some(index) = request.slot {
            let count = inventory.store().slot_count(SlotKind::General);
            let slot = inventory
                .store()
                .get(SlotRef::general(index))
                .ok_or(InventoryError::InvalidSlot { index, count })?;
            let capacity = if slot.is_vacant() {
                def.max_stack
            } else if slot.can_stack_with(def, durability) {
                slot.room(def.max_stack)
            } else {
                0
            };
            if capacity == 0 {
                return Err(InventoryError::SlotFull(index));
            }
            remaining -= place(inventory.store_mut(), index, def, remaining, durability, &statics);
            touched.push(index);
        }

        if remaining > 0 && (request.slot.is_none() || request.overflow) {
            let ceiling = inventory.hunt_iteration_ceiling();
            let mut iterations = 0;
            while remaining > 0 {
                iterations += 1;
                if iterations > ceiling {
                    error!(
                        owner = inventory.owner().0,
                        item = %def.id,
                        remainder = remaining,
                        "hunt exceeded its iteration ceiling, aborting add"
                    );
                    let added = request.quantity - remaining;
                    self.finish_add(inventory, def, added, &touched, request.notify);
                    return Err(InventoryError::InternalLoopGuardTripped {
                        iterations: ceiling,
                        added,
                        remainder: remaining,
                    });
                }
                let Some(index) = hunt_target(inventory.store(), def, durability) else {
                    break;
                };
                remaining -= place(inventory.store_mut(), index, def, remaining, durability, &statics);
                if !touched.contains(&index) {
                    touched.push(index);
                }
                if !request.overflow {
                    break;
                }
            }
        }

        let mut dropped = 0;
        if remaining > 0 && request.drop_overflow {
            if let Some(spawner) = spawner {
                spawner.spawn_pickup(PickupSpawn {
                    item: def.id.clone(),
                    quantity: remaining,
                    durability,
                    statics: statics.clone(),
                    position: drop_position(inventory),
                });
                debug!(owner = inventory.owner().0, item = %def.id, quantity = remaining, "overflow dropped");
                dropped = remaining;
                remaining = 0;
            }
        }

        let added = request.quantity - remaining - dropped;
        self.finish_add(inventory, def, added, &touched, request.notify);
        if added == 0 && dropped == 0 {
            return Err(InventoryError::InventoryFull {
                remainder: remaining,
            });
        }
        Ok(AddOutcome {
            added,
            remainder: remaining,
            dropped,
            slots: touched,
        })
    }

    /// Add with overflow dropped into the world. A hunt that trips the loop
    /// guard keeps what it placed and drops the unresolved remainder, so the
    /// caller can count every unit as delivered.
    pub fn add_or_drop(
        &self,
        inventory: &mut Inventory,
        request: AddRequest,
        spawner: &mut dyn PickupSpawner,
    ) -> InventoryResult<AddOutcome> {
        let request = request.drop_overflow(true);
        match self.add_item(inventory, request.clone(), Some(&mut *spawner)) {
            Err(InventoryError::InternalLoopGuardTripped {
                added, remainder, ..
            }) => {
                let def = self.definition(&request.item)?;
                spawner.spawn_pickup(PickupSpawn {
                    item: def.id.clone(),
                    quantity: remainder,
                    durability: request.durability.unwrap_or_else(|| def.full_durability()),
                    statics: request
                        .statics
                        .unwrap_or_else(|| ItemStatics::from_definition(def)),
                    position: drop_position(inventory),
                });
                warn!(owner = inventory.owner().0, item = %def.id, quantity = remainder, "guard remainder dropped");
                Ok(AddOutcome {
                    added,
                    remainder: 0,
                    dropped: remainder,
                    slots: inventory.store().find_all_containing(&def.id),
                })
            }
            other => other,
        }
    }

    fn finish_add(
        &self,
        inventory: &mut Inventory,
        def: &ItemDefinition,
        added: u32,
        touched: &[usize],
        notify: bool,
    ) {
        for &index in touched {
            inventory.mark_changed(SlotUpdate::slot(SlotKind::General, index));
        }
        if notify {
            inventory.notify(&def.id, added, true);
        }
    }

    // ============================================================
    // Remove
    // ============================================================

    /// Remove up to `quantity` units from one slot. With a spawner, the
    /// removed units are dropped into the world instead of destroyed.
    pub fn remove_from_slot(
        &self,
        inventory: &mut Inventory,
        slot: SlotRef,
        quantity: u32,
        notify: bool,
        drop_to: Option<&mut dyn PickupSpawner>,
    ) -> InventoryResult<u32> {
        authorize(self.actor, inventory, AccessKind::Withdraw)?;
        if quantity < 1 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }
        let position = drop_position(inventory);
        let target = writable_slot(inventory, slot)?;
        if target.is_vacant() {
            return Err(InventoryError::EmptySlot(slot.index));
        }
        let item = target.item().clone();
        let durability = target.durability();
        let statics = target.statics().clone();
        let removed = target.decrease(quantity);

        inventory.mark_changed(SlotUpdate::slot(slot.kind, slot.index));
        if notify {
            inventory.notify(&item, removed, false);
        }
        if let Some(spawner) = drop_to {
            spawner.spawn_pickup(PickupSpawn {
                item,
                quantity: removed,
                durability,
                statics: ItemStatics {
                    equipped: false,
                    ..statics
                },
                position,
            });
        }
        Ok(removed)
    }

    /// Drop units from a slot onto the ground at the owner's position
    pub fn drop_item(
        &self,
        inventory: &mut Inventory,
        slot: SlotRef,
        quantity: u32,
        spawner: &mut dyn PickupSpawner,
    ) -> InventoryResult<u32> {
        self.remove_from_slot(inventory, slot, quantity, true, Some(spawner))
    }

    /// Remove `total` units of `item` from slots of `kind`, lowest index
    /// first. Partial removal is reported, not an error.
    pub fn remove_item(
        &self,
        inventory: &mut Inventory,
        item: &ItemId,
        total: u32,
        kind: SlotKind,
        notify: bool,
    ) -> InventoryResult<u32> {
        authorize(self.actor, inventory, AccessKind::Withdraw)?;
        if item.is_none() {
            return Err(InventoryError::InvalidItem(item.clone()));
        }
        if total < 1 {
            return Err(InventoryError::InvalidQuantity(total));
        }
        let mut removed = 0;
        for index in inventory.store().find_all_containing_in(item, kind) {
            if removed >= total {
                break;
            }
            let slot = SlotRef { kind, index };
            if let Some(target) = inventory.store_mut().slot_mut(slot) {
                removed += target.decrease(total - removed);
            }
            inventory.mark_changed(SlotUpdate::slot(kind, index));
        }
        if notify {
            inventory.notify(item, removed, false);
        }
        Ok(removed)
    }

    // ============================================================
    // Transfer
    // ============================================================

    /// Move units between two slots. `to: None` keeps the move inside `from`.
    /// A `quantity` of 0 moves the whole source stack.
    pub fn transfer(
        &self,
        from: &mut Inventory,
        from_slot: SlotRef,
        to: Option<&mut Inventory>,
        to_slot: SlotRef,
        quantity: u32,
    ) -> InventoryResult<TransferOutcome> {
        match to {
            None => {
                authorize(self.actor, from, AccessKind::Withdraw)?;
                validate_ref(from.store(), from_slot)?;
                validate_ref(from.store(), to_slot)?;
                if from_slot == to_slot {
                    let slot = from.store().slot(from_slot.index, from_slot.kind);
                    if slot.is_vacant() {
                        return Err(InventoryError::EmptySlot(from_slot.index));
                    }
                    return Ok(TransferOutcome {
                        kind: TransferKind::Unchanged,
                        item: slot.item().clone(),
                        moved: 0,
                        remainder: 0,
                        swapped_in: None,
                    });
                }
                let outcome = {
                    let (src, dst) = from
                        .store_mut()
                        .pair_mut(from_slot, to_slot)
                        .ok_or(InventoryError::InvalidSlot {
                            index: to_slot.index,
                            count: 0,
                        })?;
                    self.move_between(src, from_slot, dst, to_slot, quantity, true)?
                };
                from.mark_changed(SlotUpdate::slot(from_slot.kind, from_slot.index));
                from.mark_changed(SlotUpdate::slot(to_slot.kind, to_slot.index));
                Ok(outcome)
            }
            Some(to) => {
                authorize(self.actor, from, AccessKind::Withdraw)?;
                authorize(self.actor, to, AccessKind::Deposit)?;
                // a swap deposits the destination's item into `from`
                let swap_back = accepts_deposit_from(self.actor, from);
                let outcome = {
                    let src = writable_slot(from, from_slot)?;
                    let dst = writable_slot(to, to_slot)?;
                    self.move_between(src, from_slot, dst, to_slot, quantity, swap_back)?
                };
                from.mark_changed(SlotUpdate::slot(from_slot.kind, from_slot.index));
                to.mark_changed(SlotUpdate::slot(to_slot.kind, to_slot.index));

                from.notify(&outcome.item, outcome.moved, false);
                to.notify(&outcome.item, outcome.moved, true);
                if let Some((back, qty)) = &outcome.swapped_in {
                    to.notify(back, *qty, false);
                    from.notify(back, *qty, true);
                }
                Ok(outcome)
            }
        }
    }

    fn move_between(
        &self,
        src: &mut Slot,
        src_ref: SlotRef,
        dst: &mut Slot,
        dst_ref: SlotRef,
        quantity: u32,
        swap_back: bool,
    ) -> InventoryResult<TransferOutcome> {
        if src.is_vacant() {
            return Err(InventoryError::EmptySlot(src_ref.index));
        }
        let def = self.definition(src.item())?;
        let requested = if quantity == 0 {
            src.quantity()
        } else {
            quantity.min(src.quantity())
        };
        ensure_eligible(dst, def)?;

        if dst.is_vacant() {
            let moved = dst.set_contents(
                def.id.clone(),
                requested,
                def.max_stack,
                src.durability(),
                src.statics().clone(),
            );
            src.decrease(moved);
            return Ok(TransferOutcome {
                kind: TransferKind::Moved,
                item: def.id.clone(),
                moved,
                remainder: requested - moved,
                swapped_in: None,
            });
        }

        if dst.can_stack_with(def, src.durability()) {
            let absorbed = requested.min(dst.room(def.max_stack));
            if absorbed == 0 {
                return Err(InventoryError::SlotFull(dst_ref.index));
            }
            let taken = src.decrease(absorbed);
            let added = dst.increase(taken, def.max_stack);
            // refund anything the destination could not take
            if added < taken {
                restore_units(src, def, taken - added, dst.durability(), dst.statics().clone());
            }
            return Ok(TransferOutcome {
                kind: TransferKind::Merged,
                item: def.id.clone(),
                moved: added,
                remainder: requested - added,
                swapped_in: None,
            });
        }

        // Different item: all-or-nothing swap, both directions must be eligible
        let other = self.definition(dst.item())?;
        ensure_eligible(src, other)?;
        if !swap_back {
            debug!(from = ?src_ref, to = ?dst_ref, "swap rejected: source is withdraw-only");
            return Err(InventoryError::WithdrawOnly);
        }
        let back = (other.id.clone(), dst.quantity());
        let moved = src.quantity();
        src.swap_contents(dst);
        debug!(from = ?src_ref, to = ?dst_ref, "slots swapped");
        Ok(TransferOutcome {
            kind: TransferKind::Swapped,
            item: def.id.clone(),
            moved,
            remainder: 0,
            swapped_in: Some(back),
        })
    }

    /// Move a general slot's item into the equipment slot for `category`
    pub fn equip(
        &self,
        inventory: &mut Inventory,
        from_index: usize,
        category: EquipCategory,
    ) -> InventoryResult<TransferOutcome> {
        let slot = inventory.store().slot(from_index, SlotKind::General);
        let target = inventory.store().find_equipment_index(category).ok_or(
            InventoryError::IneligibleCategory {
                item: slot.item().clone(),
                category,
            },
        )?;
        self.transfer(
            inventory,
            SlotRef::general(from_index),
            None,
            SlotRef::equipment(target),
            0,
        )
    }

    /// Move the item worn in `category` to a general slot (first vacant if `None`)
    pub fn unequip(
        &self,
        inventory: &mut Inventory,
        category: EquipCategory,
        to_index: Option<usize>,
    ) -> InventoryResult<TransferOutcome> {
        let from = inventory.store().find_equipment_index(category).ok_or(
            InventoryError::IneligibleCategory {
                item: ItemId::none(),
                category,
            },
        )?;
        let worn = inventory.store().slot(from, SlotKind::Equipment);
        if worn.is_vacant() {
            return Err(InventoryError::EmptySlot(from));
        }
        let to = match to_index {
            Some(index) => index,
            None => inventory
                .store()
                .find_first_vacant()
                .ok_or(InventoryError::InventoryFull {
                    remainder: worn.quantity(),
                })?,
        };
        self.transfer(inventory, SlotRef::equipment(from), None, SlotRef::general(to), 0)
    }

    // ============================================================
    // Split
    // ============================================================

    /// Move part of a general stack into another general slot. The source
    /// always keeps at least one unit; a single-unit stack cannot be split.
    /// Returns the units that landed in the destination.
    pub fn split_stack(
        &self,
        inventory: &mut Inventory,
        from_index: usize,
        quantity: u32,
        to_index: Option<usize>,
    ) -> InventoryResult<u32> {
        authorize(self.actor, inventory, AccessKind::Withdraw)?;
        let count = inventory.store().slot_count(SlotKind::General);
        let source = inventory
            .store()
            .get(SlotRef::general(from_index))
            .ok_or(InventoryError::InvalidSlot {
                index: from_index,
                count,
            })?
            .clone();
        if source.is_vacant() {
            return Err(InventoryError::EmptySlot(from_index));
        }
        let def = self.definition(source.item())?;
        let split = quantity.min(source.quantity() - 1);
        if split < 1 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        let dest = match to_index {
            Some(index) => {
                let slot = inventory
                    .store()
                    .get(SlotRef::general(index))
                    .ok_or(InventoryError::InvalidSlot { index, count })?;
                let fits = index != from_index
                    && (slot.is_vacant()
                        || (slot.can_stack_with(def, source.durability())
                            && slot.room(def.max_stack) > 0));
                if !fits {
                    return Err(InventoryError::SlotFull(index));
                }
                index
            }
            None => inventory
                .store()
                .find_first_vacant()
                .ok_or(InventoryError::InventoryFull { remainder: split })?,
        };

        // Decrease first; only proceed with what was actually taken
        let taken = match inventory.store_mut().slot_mut(SlotRef::general(from_index)) {
            Some(src) => src.decrease(split),
            None => 0,
        };
        if taken == 0 {
            return Err(InventoryError::EmptySlot(from_index));
        }
        let placed = place(
            inventory.store_mut(),
            dest,
            def,
            taken,
            source.durability(),
            source.statics(),
        );
        if placed < taken {
            if let Some(src) = inventory.store_mut().slot_mut(SlotRef::general(from_index)) {
                src.increase(taken - placed, def.max_stack);
            }
        }
        inventory.mark_changed(SlotUpdate::slot(SlotKind::General, from_index));
        inventory.mark_changed(SlotUpdate::slot(SlotKind::General, dest));
        Ok(placed)
    }

    // ============================================================
    // Activate & durability
    // ============================================================

    /// Use the item in `slot`: equip-type items are worn (or taken off when
    /// already worn), consumables lose one unit.
    pub fn activate(
        &self,
        inventory: &mut Inventory,
        slot: SlotRef,
        force_consume: bool,
    ) -> InventoryResult<Activation> {
        authorize(self.actor, inventory, AccessKind::Withdraw)?;
        validate_ref(inventory.store(), slot)?;
        let current = inventory.store().slot(slot.index, slot.kind);
        if current.is_vacant() {
            return Err(InventoryError::EmptySlot(slot.index));
        }
        let def = self.definition(current.item())?;

        let activation = match (def.activation, slot.kind) {
            (ItemActivation::Equip, SlotKind::General) => {
                let store = inventory.store();
                let candidates: Vec<usize> = def
                    .equip_slots
                    .iter()
                    .filter_map(|&category| store.find_equipment_index(category))
                    .collect();
                let Some(&first) = candidates.first() else {
                    return Err(InventoryError::InvalidItem(def.id.clone()));
                };
                let target = candidates
                    .iter()
                    .copied()
                    .find(|&index| store.is_vacant(index, SlotKind::Equipment))
                    .ok_or(InventoryError::SlotFull(first))?;
                self.transfer(inventory, slot, None, SlotRef::equipment(target), 0)?;
                Activation::Equipped { slot: target }
            }
            (ItemActivation::Equip, SlotKind::Equipment) => {
                let to = inventory
                    .store()
                    .find_first_vacant()
                    .ok_or(InventoryError::InventoryFull {
                        remainder: current.quantity(),
                    })?;
                self.transfer(inventory, slot, None, SlotRef::general(to), 0)?;
                Activation::Unequipped { slot: to }
            }
            _ if force_consume || def.consume_on_use => {
                let removed = self.remove_from_slot(inventory, slot, 1, true, None)?;
                if removed < 1 {
                    return Err(InventoryError::EmptySlot(slot.index));
                }
                Activation::Consumed
            }
            _ => Activation::Used,
        };

        inventory.mark_activated(def.id.clone());
        debug!(owner = inventory.owner().0, item = %def.id, ?activation, "item activated");
        Ok(activation)
    }

    /// Apply wear to the item in `slot`; returns the new durability
    pub fn damage_durability(
        &self,
        inventory: &mut Inventory,
        slot: SlotRef,
        amount: f32,
    ) -> InventoryResult<f32> {
        self.adjust_durability(inventory, slot, |s, def| s.damage_durability(def, amount))
    }

    pub fn repair_durability(
        &self,
        inventory: &mut Inventory,
        slot: SlotRef,
        amount: f32,
    ) -> InventoryResult<f32> {
        self.adjust_durability(inventory, slot, |s, def| s.repair_durability(def, amount))
    }

    fn adjust_durability(
        &self,
        inventory: &mut Inventory,
        slot: SlotRef,
        apply: impl FnOnce(&mut Slot, &ItemDefinition) -> f32,
    ) -> InventoryResult<f32> {
        authorize(self.actor, inventory, AccessKind::Withdraw)?;
        let target = writable_slot(inventory, slot)?;
        if target.is_vacant() {
            return Err(InventoryError::EmptySlot(slot.index));
        }
        let def = self.definition(target.item())?;
        let durability = apply(target, def);
        inventory.mark_changed(SlotUpdate::slot(slot.kind, slot.index));
        Ok(durability)
    }

    // ============================================================
    // Starting items
    // ============================================================

    /// Grant the configured starting items once. Items that do not fit are
    /// logged and skipped. Returns the units granted.
    pub fn grant_starting_items<R: Rng + ?Sized>(
        &self,
        inventory: &mut Inventory,
        rng: &mut R,
    ) -> InventoryResult<u32> {
        if inventory.starting_items_granted() {
            return Ok(0);
        }
        authorize(self.actor, inventory, AccessKind::Deposit)?;
        let mut granted = 0;
        for start in inventory.starting_items().to_vec() {
            let Some(def) = self.catalog.lookup_item(&start.item) else {
                warn!(item = %start.item, "starting item not in catalog, skipped");
                continue;
            };
            let mut quantity = start.quantity.roll(rng);
            if start.equip {
                if let Some(index) = first_vacant_equipment(inventory.store(), def) {
                    let placed = inventory
                        .store_mut()
                        .slot_mut(SlotRef::equipment(index))
                        .map(|slot| {
                            slot.set_contents(
                                def.id.clone(),
                                quantity,
                                def.max_stack,
                                def.full_durability(),
                                ItemStatics::from_definition(def),
                            )
                        })
                        .unwrap_or(0);
                    inventory.mark_changed(SlotUpdate::slot(SlotKind::Equipment, index));
                    granted += placed;
                    quantity -= placed;
                }
            }
            if quantity > 0 {
                match self.add_item(inventory, AddRequest::new(def.id.clone(), quantity).notify(false), None) {
                    Ok(outcome) => {
                        granted += outcome.added;
                        if outcome.remainder > 0 {
                            warn!(item = %def.id, remainder = outcome.remainder, "starting item did not fit");
                        }
                    }
                    Err(InventoryError::InternalLoopGuardTripped { added, remainder, .. }) => {
                        granted += added;
                        warn!(item = %def.id, remainder, "starting item hunt aborted");
                    }
                    Err(e) => warn!(item = %def.id, "starting item skipped: {}", e),
                }
            }
        }
        inventory.set_starting_items_granted();
        Ok(granted)
    }
}

// ============================================================
// Helpers
// ============================================================

/// Stackable slot (ascending) with room, else the first vacancy
fn hunt_target(store: &SlotStore, def: &ItemDefinition, durability: f32) -> Option<usize> {
    let slots = store.slots(SlotKind::General);
    slots
        .iter()
        .position(|s| s.can_stack_with(def, durability) && s.room(def.max_stack) > 0)
        .or_else(|| slots.iter().position(Slot::is_vacant))
}

fn first_vacant_equipment(store: &SlotStore, def: &ItemDefinition) -> Option<usize> {
    def.equip_slots
        .iter()
        .filter_map(|&category| store.find_equipment_index(category))
        .find(|&index| store.is_vacant(index, SlotKind::Equipment))
}

/// Put up to `quantity` units into a general slot; returns units placed
fn place(
    store: &mut SlotStore,
    index: usize,
    def: &ItemDefinition,
    quantity: u32,
    durability: f32,
    statics: &ItemStatics,
) -> u32 {
    let Some(slot) = store.slot_mut(SlotRef::general(index)) else {
        return 0;
    };
    if slot.is_vacant() {
        slot.set_contents(def.id.clone(), quantity, def.max_stack, durability, statics.clone())
    } else {
        slot.increase(quantity, def.max_stack)
    }
}

/// Put units back into a slot that may have been vacated
fn restore_units(slot: &mut Slot, def: &ItemDefinition, quantity: u32, durability: f32, statics: ItemStatics) {
    if slot.is_vacant() {
        slot.set_contents(def.id.clone(), quantity, def.max_stack, durability, statics);
    } else {
        slot.increase(quantity, def.max_stack);
    }
}

fn ensure_eligible(slot: &Slot, def: &ItemDefinition) -> InventoryResult<()> {
    match slot.category() {
        Some(category) if slot.kind() == SlotKind::Equipment && !def.can_equip_in(category) => {
            Err(InventoryError::IneligibleCategory {
                item: def.id.clone(),
                category,
            })
        }
        _ => Ok(()),
    }
}

fn validate_ref(store: &SlotStore, slot: SlotRef) -> InventoryResult<()> {
    if store.is_valid_index(slot.index, slot.kind) {
        Ok(())
    } else {
        Err(InventoryError::InvalidSlot {
            index: slot.index,
            count: store.slot_count(slot.kind),
        })
    }
}

fn writable_slot(inventory: &mut Inventory, slot: SlotRef) -> InventoryResult<&mut Slot> {
    let count = inventory.store().slot_count(slot.kind);
    inventory
        .store_mut()
        .slot_mut(slot)
        .ok_or(InventoryError::InvalidSlot {
            index: slot.index,
            count,
        })
}

fn drop_position(inventory: &Inventory) -> Vec3 {
    inventory.position() + Vec3::Y * PICKUP_SPAWN_HEIGHT
}
