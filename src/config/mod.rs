//! Runtime configuration for inventories, crafting stations and fuel burners.
//!
//! Every section has a `Default` matching the values in [`crate::constants`].
//! Files are RON or JSON, picked by extension.

use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::{EquipCategory, ItemId, QuantityRange};
use crate::constants::*;
use crate::error::LoadError;
use crate::logging::TracingConfig;

/// An item granted once when an inventory initializes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartingItem {
    pub item: ItemId,
    pub quantity: QuantityRange,
    /// Try an equipment slot first
    #[serde(default)]
    pub equip: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub general_slots: usize,
    pub equipment_slots: Vec<EquipCategory>,
    pub max_interaction_distance: f32,
    pub hunt_iteration_ceiling: u32,
    pub withdraw_only: bool,
    pub starting_items: Vec<StartingItem>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            general_slots: DEFAULT_GENERAL_SLOTS,
            equipment_slots: EquipCategory::ALL.to_vec(),
            max_interaction_distance: MAX_INTERACTION_DISTANCE,
            hunt_iteration_ceiling: HUNT_ITERATION_CEILING,
            withdraw_only: false,
            starting_items: Vec::new(),
        }
    }
}

impl InventoryConfig {
    /// A container with general slots only (chests, station inputs)
    pub fn container(general_slots: usize) -> Self {
        Self {
            general_slots,
            equipment_slots: Vec::new(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraftingConfig {
    /// Seconds between ticks; <= 0 crafts instantly
    pub crafting_rate_secs: f32,
    pub max_queue_len: usize,
    pub enabled: bool,
}

impl Default for CraftingConfig {
    fn default() -> Self {
        Self {
            crafting_rate_secs: DEFAULT_CRAFTING_RATE,
            max_queue_len: DEFAULT_CRAFTING_QUEUE_LEN,
            enabled: true,
        }
    }
}

impl CraftingConfig {
    pub fn is_instant(&self) -> bool {
        self.crafting_rate_secs <= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelConfig {
    pub tick_interval_secs: f32,
    /// Draw order for fuel; empty accepts anything the catalog knows as fuel
    pub allowed_fuels: Vec<ItemId>,
    /// Burn forever without drawing fuel
    pub ignore_fuel: bool,
    pub byproduct_seed: u64,
}

impl Default for FuelConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: DEFAULT_FUEL_TICK,
            allowed_fuels: Vec::new(),
            ignore_fuel: false,
            byproduct_seed: DEFAULT_BYPRODUCT_SEED,
        }
    }
}

/// Aggregate configuration, inserted as a resource by the plugins
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub inventory: InventoryConfig,
    pub crafting: CraftingConfig,
    pub fuel: FuelConfig,
    pub logging: TracingConfig,
}

impl CoreConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, LoadError> {
        Ok(ron::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("ron") => Self::from_ron_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => Err(LoadError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.inventory.general_slots, 24);
        assert_eq!(config.inventory.equipment_slots.len(), 21);
        assert_eq!(config.inventory.max_interaction_distance, 1024.0);
        assert!(!config.crafting.is_instant());
        assert_eq!(config.fuel.tick_interval_secs, 1.0);
    }

    #[test]
    fn test_instant_crafting_rate() {
        let mut crafting = CraftingConfig::default();
        crafting.crafting_rate_secs = 0.0;
        assert!(crafting.is_instant());
        crafting.crafting_rate_secs = -2.0;
        assert!(crafting.is_instant());
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let text = r#"(
            inventory: (general_slots: 6, equipment_slots: [Primary, Helmet]),
            crafting: (crafting_rate_secs: 0.5),
        )"#;
        let config = CoreConfig::from_ron_str(text).unwrap();
        assert_eq!(config.inventory.general_slots, 6);
        assert_eq!(config.inventory.equipment_slots.len(), 2);
        assert_eq!(config.inventory.hunt_iteration_ceiling, HUNT_ITERATION_CEILING);
        assert_eq!(config.crafting.crafting_rate_secs, 0.5);
        assert_eq!(config.crafting.max_queue_len, DEFAULT_CRAFTING_QUEUE_LEN);
        assert!(config.fuel.allowed_fuels.is_empty());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = CoreConfig::default();
        config.fuel.allowed_fuels = vec![ItemId::new("oil"), ItemId::new("wood")];
        config.inventory.starting_items.push(StartingItem {
            item: ItemId::new("torch"),
            quantity: QuantityRange::new(1, 3),
            equip: false,
        });
        let json = config.to_json();
        let back = CoreConfig::from_json_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let ron_path = dir.path().join("core.ron");
        std::fs::write(&ron_path, "(inventory: (general_slots: 3))").unwrap();
        assert_eq!(CoreConfig::load(&ron_path).unwrap().inventory.general_slots, 3);

        let toml_path = dir.path().join("core.toml");
        std::fs::write(&toml_path, "").unwrap();
        assert!(matches!(
            CoreConfig::load(&toml_path),
            Err(LoadError::UnsupportedFormat(ext)) if ext == "toml"
        ));
    }
}
