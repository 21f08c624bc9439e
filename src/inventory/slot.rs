//! The atomic unit of storage.
//!
//! A slot's kind and equip category are fixed at creation. Contents only
//! change through the `pub(crate)` mutators, which keep two invariants:
//! `quantity == 0` iff the item is the empty sentinel, and the quantity never
//! exceeds the stack limit handed in by the caller.

use serde::{Deserialize, Serialize};

use crate::catalog::{EquipCategory, ItemDefinition, ItemId, ItemRarity};
use crate::constants::DURABILITY_EPSILON;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    General,
    Equipment,
}

/// Address of a slot inside one store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub kind: SlotKind,
    pub index: usize,
}

impl SlotRef {
    pub fn general(index: usize) -> Self {
        Self {
            kind: SlotKind::General,
            index,
        }
    }

    pub fn equipment(index: usize) -> Self {
        Self {
            kind: SlotKind::Equipment,
            index,
        }
    }
}

/// Per-instance data that travels with an item between slots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStatics {
    pub rarity: ItemRarity,
    pub crafter_name: Option<String>,
    /// Unix seconds
    pub crafted_at: Option<u64>,
    pub equipped: bool,
}

impl ItemStatics {
    pub fn from_definition(def: &ItemDefinition) -> Self {
        Self {
            rarity: def.rarity,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    item: ItemId,
    quantity: u32,
    durability: f32,
    kind: SlotKind,
    category: Option<EquipCategory>,
    statics: ItemStatics,
}

impl Slot {
    pub fn general() -> Self {
        Self {
            item: ItemId::none(),
            quantity: 0,
            durability: 0.0,
            kind: SlotKind::General,
            category: None,
            statics: ItemStatics::default(),
        }
    }

    pub fn equipment(category: EquipCategory) -> Self {
        Self {
            kind: SlotKind::Equipment,
            category: Some(category),
            ..Self::general()
        }
    }

    /// Vacant sentinel returned for out-of-range reads
    pub fn vacant(kind: SlotKind) -> Self {
        Self {
            kind,
            ..Self::general()
        }
    }

    pub fn item(&self) -> &ItemId {
        &self.item
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn durability(&self) -> f32 {
        self.durability
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    pub fn category(&self) -> Option<EquipCategory> {
        self.category
    }

    pub fn statics(&self) -> &ItemStatics {
        &self.statics
    }

    pub fn is_vacant(&self) -> bool {
        self.quantity < 1
    }

    pub fn contains(&self, item: &ItemId) -> bool {
        !self.is_vacant() && &self.item == item
    }

    /// Whether this slot's kind and category can ever hold `def`
    pub fn accepts(&self, def: &ItemDefinition) -> bool {
        match (self.kind, self.category) {
            (SlotKind::General, _) => true,
            (SlotKind::Equipment, Some(category)) => def.can_equip_in(category),
            (SlotKind::Equipment, None) => false,
        }
    }

    /// Same item, and durabilities match or the incoming unit is pristine
    pub fn can_stack_with(&self, def: &ItemDefinition, durability: f32) -> bool {
        self.contains(&def.id)
            && ((self.durability - durability).abs() < DURABILITY_EPSILON
                || def.is_full_durability(durability))
    }

    /// Units this slot can still absorb of its current item
    pub fn room(&self, max_stack: u32) -> u32 {
        max_stack.saturating_sub(self.quantity)
    }

    /// Overwrite contents, clamped at `max_stack`. Returns units placed.
    pub(crate) fn set_contents(
        &mut self,
        item: ItemId,
        quantity: u32,
        max_stack: u32,
        durability: f32,
        mut statics: ItemStatics,
    ) -> u32 {
        let placed = quantity.min(max_stack);
        if placed == 0 || item.is_none() {
            self.clear();
            return 0;
        }
        statics.equipped = self.kind == SlotKind::Equipment;
        self.item = item;
        self.quantity = placed;
        self.durability = durability;
        self.statics = statics;
        placed
    }

    /// Add units of the item already held, clamped at `max_stack`. Returns units added.
    pub(crate) fn increase(&mut self, quantity: u32, max_stack: u32) -> u32 {
        if self.is_vacant() {
            return 0;
        }
        let added = quantity.min(self.room(max_stack));
        self.quantity += added;
        added
    }

    /// Remove up to `quantity` units, vacating the slot on empty. Returns units removed.
    pub(crate) fn decrease(&mut self, quantity: u32) -> u32 {
        let removed = quantity.min(self.quantity);
        self.quantity -= removed;
        if self.quantity < 1 {
            self.clear();
        }
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.item = ItemId::none();
        self.quantity = 0;
        self.durability = 0.0;
        self.statics = ItemStatics::default();
    }

    /// Exchange contents with another slot; kinds and categories stay put.
    pub(crate) fn swap_contents(&mut self, other: &mut Slot) {
        std::mem::swap(&mut self.item, &mut other.item);
        std::mem::swap(&mut self.quantity, &mut other.quantity);
        std::mem::swap(&mut self.durability, &mut other.durability);
        std::mem::swap(&mut self.statics, &mut other.statics);
        self.statics.equipped = !self.is_vacant() && self.kind == SlotKind::Equipment;
        other.statics.equipped = !other.is_vacant() && other.kind == SlotKind::Equipment;
    }

    /// Apply wear. Indestructible and durability-less items are unaffected.
    /// Returns the new durability.
    pub(crate) fn damage_durability(&mut self, def: &ItemDefinition, amount: f32) -> f32 {
        if self.contains(&def.id) && def.has_durability() {
            self.durability = (self.durability - amount.max(0.0)).max(0.0);
        }
        self.durability
    }

    pub(crate) fn repair_durability(&mut self, def: &ItemDefinition, amount: f32) -> f32 {
        if self.contains(&def.id) && def.has_durability() {
            self.durability = (self.durability + amount.max(0.0)).min(def.max_durability);
        }
        self.durability
    }

    pub fn is_broken(&self, def: &ItemDefinition) -> bool {
        def.has_durability() && self.contains(&def.id) && self.durability <= 0.0
    }
}
