//! Inventory Core - server-authoritative item storage for networked games
//!
//! This crate provides the deterministic item logic that runs on the authority:
//! - Item catalog (RON definitions, hot reload)
//! - Slot stores with general and equipment slots
//! - Transaction engine (add, remove, transfer, split, equip, activate)
//! - Access rules, notifications and scoped update events
//! - World pickups for dropped items
//! - Crafting queue engine (tick-driven, cycle-consumed ingredients)
//! - Fuel burners (timed consumption with rolled byproducts)
//! - Versioned save blobs with checksum and migration

pub mod catalog;
pub mod config;
pub mod constants;
pub mod crafting;
pub mod error;
pub mod fuel;
pub mod inventory;
pub mod logging;
pub mod pickup;
pub mod save;

use bevy::prelude::*;

pub use catalog::{CatalogHandle, CatalogTable, ItemCatalog, ItemId};
pub use config::CoreConfig;
pub use error::{InventoryError, InventoryResult, LoadError};
pub use inventory::{Actor, ActorId, Inventory, Slot, SlotKind, SlotRef, TransactionEngine};

/// Every runtime plugin of the crate. Hot reload is opt-in through
/// [`catalog::reload::CatalogReloadPlugin`].
pub struct InventoryCorePlugins;

impl Plugin for InventoryCorePlugins {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            logging::LoggingPlugin,
            inventory::InventoryPlugin,
            pickup::PickupPlugin,
            crafting::CraftingPlugin,
            fuel::FuelPlugin,
        ));
    }
}
