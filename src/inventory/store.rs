//! Slot store: the general and equipment slot sequences of one owner.
//!
//! Slot counts are fixed at construction. Reads are public and never fail;
//! writable access is crate-private and reserved for the transaction engine.

use serde::{Deserialize, Serialize};

use super::slot::{Slot, SlotKind, SlotRef};
use crate::catalog::{EquipCategory, ItemCatalog, ItemId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotStore {
    general: Vec<Slot>,
    equipment: Vec<Slot>,
}

impl SlotStore {
    /// Duplicate categories are dropped, keeping the first occurrence.
    pub fn new(general_slots: usize, categories: &[EquipCategory]) -> Self {
        let mut equipment: Vec<Slot> = Vec::with_capacity(categories.len());
        for &category in categories {
            if equipment.iter().all(|s| s.category() != Some(category)) {
                equipment.push(Slot::equipment(category));
            }
        }
        Self {
            general: vec![Slot::general(); general_slots],
            equipment,
        }
    }

    pub fn slot_count(&self, kind: SlotKind) -> usize {
        self.slots(kind).len()
    }

    pub fn slots(&self, kind: SlotKind) -> &[Slot] {
        match kind {
            SlotKind::General => &self.general,
            SlotKind::Equipment => &self.equipment,
        }
    }

    pub fn get(&self, slot: SlotRef) -> Option<&Slot> {
        self.slots(slot.kind).get(slot.index)
    }

    /// Copy of the slot, or a vacant sentinel when the index is out of range
    pub fn slot(&self, index: usize, kind: SlotKind) -> Slot {
        self.slots(kind)
            .get(index)
            .cloned()
            .unwrap_or_else(|| Slot::vacant(kind))
    }

    pub fn is_valid_index(&self, index: usize, kind: SlotKind) -> bool {
        index < self.slot_count(kind)
    }

    pub fn is_vacant(&self, index: usize, kind: SlotKind) -> bool {
        self.slots(kind).get(index).map_or(true, Slot::is_vacant)
    }

    pub fn find_first_vacant(&self) -> Option<usize> {
        self.general.iter().position(Slot::is_vacant)
    }

    /// General slot indices holding `item`, ascending
    pub fn find_all_containing(&self, item: &ItemId) -> Vec<usize> {
        self.find_all_containing_in(item, SlotKind::General)
    }

    pub fn find_all_containing_in(&self, item: &ItemId, kind: SlotKind) -> Vec<usize> {
        self.slots(kind)
            .iter()
            .enumerate()
            .filter(|(_, s)| s.contains(item))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn find_equipment_index(&self, category: EquipCategory) -> Option<usize> {
        self.equipment
            .iter()
            .position(|s| s.category() == Some(category))
    }

    /// Total units of `item` across general slots
    pub fn total_quantity(&self, item: &ItemId) -> u32 {
        self.general
            .iter()
            .filter(|s| s.contains(item))
            .map(Slot::quantity)
            .sum()
    }

    pub fn contains_item(&self, item: &ItemId, min_quantity: u32) -> bool {
        self.total_quantity(item) >= min_quantity.max(1)
    }

    /// Carried weight of every occupied slot. Unknown items weigh nothing.
    pub fn total_weight(&self, catalog: &dyn ItemCatalog) -> f32 {
        self.general
            .iter()
            .chain(self.equipment.iter())
            .filter(|s| !s.is_vacant())
            .filter_map(|s| {
                catalog
                    .lookup_item(s.item())
                    .map(|def| def.weight * s.quantity() as f32)
            })
            .sum()
    }

    pub fn occupied_count(&self, kind: SlotKind) -> usize {
        self.slots(kind).iter().filter(|s| !s.is_vacant()).count()
    }

    pub(crate) fn slot_mut(&mut self, slot: SlotRef) -> Option<&mut Slot> {
        match slot.kind {
            SlotKind::General => self.general.get_mut(slot.index),
            SlotKind::Equipment => self.equipment.get_mut(slot.index),
        }
    }

    /// Two distinct slots of this store, mutably. `None` if either is out of
    /// range or both refer to the same slot.
    pub(crate) fn pair_mut(&mut self, a: SlotRef, b: SlotRef) -> Option<(&mut Slot, &mut Slot)> {
        if a == b {
            return None;
        }
        if a.kind != b.kind {
            let (general, equipment) = (&mut self.general, &mut self.equipment);
            return match a.kind {
                SlotKind::General => Some((general.get_mut(a.index)?, equipment.get_mut(b.index)?)),
                SlotKind::Equipment => {
                    Some((equipment.get_mut(a.index)?, general.get_mut(b.index)?))
                }
            };
        }
        let slots = match a.kind {
            SlotKind::General => &mut self.general,
            SlotKind::Equipment => &mut self.equipment,
        };
        if a.index >= slots.len() || b.index >= slots.len() {
            return None;
        }
        if a.index < b.index {
            let (lo, hi) = slots.split_at_mut(b.index);
            Some((&mut lo[a.index], &mut hi[0]))
        } else {
            let (lo, hi) = slots.split_at_mut(a.index);
            Some((&mut hi[0], &mut lo[b.index]))
        }
    }
}
