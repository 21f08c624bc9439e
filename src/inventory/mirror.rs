//! Read-only client copies of an inventory.
//!
//! Observers never mutate. They hold the last published [`InventorySnapshot`]
//! and refresh it whenever the source revision moves.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::slot::{Slot, SlotKind};
use super::{ActorId, Inventory};
use crate::catalog::ItemId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub owner: ActorId,
    pub revision: u64,
    pub general: Vec<Slot>,
    pub equipment: Vec<Slot>,
}

impl InventorySnapshot {
    pub fn slot(&self, index: usize, kind: SlotKind) -> Slot {
        let slots = match kind {
            SlotKind::General => &self.general,
            SlotKind::Equipment => &self.equipment,
        };
        slots.get(index).cloned().unwrap_or_else(|| Slot::vacant(kind))
    }

    pub fn total_quantity(&self, item: &ItemId) -> u32 {
        self.general
            .iter()
            .filter(|s| s.contains(item))
            .map(Slot::quantity)
            .sum()
    }
}

impl Inventory {
    /// Full copy of the slot state at the current revision
    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            owner: self.owner(),
            revision: self.revision(),
            general: self.store().slots(SlotKind::General).to_vec(),
            equipment: self.store().slots(SlotKind::Equipment).to_vec(),
        }
    }
}

/// Observer-side view of the inventory on `source`
#[derive(Component, Debug, Clone)]
pub struct InventoryMirror {
    source: Entity,
    snapshot: Option<InventorySnapshot>,
}

impl InventoryMirror {
    pub fn new(source: Entity) -> Self {
        Self {
            source,
            snapshot: None,
        }
    }

    pub fn source(&self) -> Entity {
        self.source
    }

    pub fn snapshot(&self) -> Option<&InventorySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn revision(&self) -> Option<u64> {
        self.snapshot.as_ref().map(|s| s.revision)
    }

    pub fn slot(&self, index: usize, kind: SlotKind) -> Slot {
        self.snapshot
            .as_ref()
            .map(|s| s.slot(index, kind))
            .unwrap_or_else(|| Slot::vacant(kind))
    }

    /// Replace the held snapshot if `incoming` is newer. Returns whether it changed.
    pub fn apply(&mut self, incoming: InventorySnapshot) -> bool {
        if self.revision() == Some(incoming.revision) {
            return false;
        }
        self.snapshot = Some(incoming);
        true
    }
}

pub fn sync_inventory_mirrors(
    sources: Query<&Inventory>,
    mut mirrors: Query<&mut InventoryMirror>,
) {
    for mut mirror in &mut mirrors {
        let Ok(inventory) = sources.get(mirror.source) else {
            continue;
        };
        if mirror.revision() == Some(inventory.revision()) {
            continue;
        }
        if mirror.apply(inventory.snapshot()) {
            trace!(owner = inventory.owner().0, revision = inventory.revision(), "mirror refreshed");
        }
    }
}
