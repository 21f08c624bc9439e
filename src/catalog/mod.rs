//! Item Catalog
//!
//! Read-only metadata the transaction engine consults for every rule:
//! - Item definitions (stack limit, weight, durability, equip eligibility, activation)
//! - Crafting recipes (ingredients per cycle, ticks to complete)
//! - Fuel definitions (burn time, byproducts)
//!
//! The engine only sees the [`ItemCatalog`] trait. [`CatalogTable`] is the
//! in-memory implementation, loaded from a RON document.

pub mod reload;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::DURABILITY_EPSILON;
use crate::error::LoadError;

/// Opaque key naming a catalog entry. The empty string is the "no item" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn none() -> Self {
        Self(String::new())
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happens when an item is activated from its slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemActivation {
    #[default]
    None,
    Equip,
    Eat,
    Drink,
    Place,
    Misc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    #[default]
    None,
    Craft,
    Quest,
    Food,
    Drink,
    Weapon,
    Equipment,
    Placeable,
    Currency,
    Component,
    Fuel,
    Utility,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ItemRarity {
    #[default]
    Common,
    Uncommon,
    Masterwork,
    Rare,
    Legendary,
    Mythical,
    Relic,
    Dev,
}

/// Fixed set of equipment slots. An inventory holds at most one slot per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquipCategory {
    Primary,
    Secondary,
    Helmet,
    Face,
    Neck,
    Shoulders,
    Back,
    Torso,
    Waist,
    Hands,
    Legs,
    Anklet,
    Feet,
    Sleeves,
    Cosmetic,
    EarringLeft,
    EarringRight,
    RingLeft,
    RingRight,
    WristLeft,
    WristRight,
}

impl EquipCategory {
    pub const ALL: [EquipCategory; 21] = [
        EquipCategory::Primary,
        EquipCategory::Secondary,
        EquipCategory::Helmet,
        EquipCategory::Face,
        EquipCategory::Neck,
        EquipCategory::Shoulders,
        EquipCategory::Back,
        EquipCategory::Torso,
        EquipCategory::Waist,
        EquipCategory::Hands,
        EquipCategory::Legs,
        EquipCategory::Anklet,
        EquipCategory::Feet,
        EquipCategory::Sleeves,
        EquipCategory::Cosmetic,
        EquipCategory::EarringLeft,
        EquipCategory::EarringRight,
        EquipCategory::RingLeft,
        EquipCategory::RingRight,
        EquipCategory::WristLeft,
        EquipCategory::WristRight,
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CraftingSkill {
    #[default]
    General,
    Shipwright,
    Gunsmith,
    Ordnance,
    Cooking,
    Brewing,
    Engineer,
    Blacksmith,
    Energetics,
    Extrication,
    Architect,
    Tailor,
    Armorer,
}

/// Static metadata for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: ItemId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: ItemCategory,
    #[serde(default)]
    pub rarity: ItemRarity,
    /// 1 = non-stackable
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
    #[serde(default)]
    pub weight: f32,
    /// > 0 tracks durability, 0 = no durability, < 0 = indestructible
    #[serde(default)]
    pub max_durability: f32,
    #[serde(default)]
    pub equip_slots: Vec<EquipCategory>,
    #[serde(default)]
    pub activation: ItemActivation,
    #[serde(default)]
    pub consume_on_use: bool,
    #[serde(default)]
    pub base_price: u32,
}

fn default_max_stack() -> u32 {
    1
}

impl ItemDefinition {
    pub fn new(id: &str, max_stack: u32) -> Self {
        Self {
            id: ItemId::new(id),
            display_name: id.to_string(),
            description: String::new(),
            category: ItemCategory::None,
            rarity: ItemRarity::Common,
            max_stack,
            weight: 0.0,
            max_durability: 0.0,
            equip_slots: Vec::new(),
            activation: ItemActivation::None,
            consume_on_use: false,
            base_price: 0,
        }
    }

    pub fn with_equip_slots(mut self, slots: &[EquipCategory]) -> Self {
        self.equip_slots = slots.to_vec();
        self.activation = ItemActivation::Equip;
        self
    }

    pub fn with_durability(mut self, max: f32) -> Self {
        self.max_durability = max;
        self
    }

    pub fn with_activation(mut self, activation: ItemActivation, consume_on_use: bool) -> Self {
        self.activation = activation;
        self.consume_on_use = consume_on_use;
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn has_durability(&self) -> bool {
        self.max_durability > 0.0
    }

    pub fn is_indestructible(&self) -> bool {
        self.max_durability < 0.0
    }

    /// Durability a freshly created unit starts with
    pub fn full_durability(&self) -> f32 {
        self.max_durability.max(0.0)
    }

    pub fn is_full_durability(&self, durability: f32) -> bool {
        !self.has_durability() || durability + DURABILITY_EPSILON >= self.max_durability
    }

    pub fn can_equip_in(&self, category: EquipCategory) -> bool {
        self.equip_slots.contains(&category)
    }
}

/// Inclusive quantity roll. `min <= 0` becomes 1, `max < min` becomes `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityRange {
    pub min: i32,
    pub max: i32,
}

impl QuantityRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn exactly(quantity: i32) -> Self {
        Self::new(quantity, quantity)
    }

    /// Normalized `(min, max)` bounds
    pub fn bounds(&self) -> (u32, u32) {
        let min = if self.min <= 0 { 1 } else { self.min as u32 };
        let max = if self.max < min as i32 { min } else { self.max as u32 };
        (min, max)
    }

    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let (min, max) = self.bounds();
        if min == max {
            min
        } else {
            rng.gen_range(min..=max)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub item: ItemId,
    pub quantity: u32,
}

/// How to craft one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDefinition {
    pub item: ItemId,
    #[serde(default = "default_one")]
    pub creates_quantity: u32,
    pub ingredients: Vec<Ingredient>,
    #[serde(default = "default_one")]
    pub ticks_to_complete: u32,
    /// Ingredients are consumed on every tick where `ticks_completed % interval == 0`
    #[serde(default = "default_one")]
    pub tick_consume_interval: u32,
    #[serde(default)]
    pub skill: CraftingSkill,
}

fn default_one() -> u32 {
    1
}

impl RecipeDefinition {
    pub fn new(item: &str, ingredients: &[(&str, u32)]) -> Self {
        Self {
            item: ItemId::new(item),
            creates_quantity: 1,
            ingredients: ingredients
                .iter()
                .map(|(id, qty)| Ingredient {
                    item: ItemId::new(*id),
                    quantity: *qty,
                })
                .collect(),
            ticks_to_complete: 1,
            tick_consume_interval: 1,
            skill: CraftingSkill::General,
        }
    }

    pub fn with_ticks(mut self, ticks_to_complete: u32, tick_consume_interval: u32) -> Self {
        self.ticks_to_complete = ticks_to_complete.max(1);
        self.tick_consume_interval = tick_consume_interval.max(1);
        self
    }

    pub fn with_creates(mut self, quantity: u32) -> Self {
        self.creates_quantity = quantity.max(1);
        self
    }

    /// Number of ingredient cycles a full craft consumes
    pub fn consume_cycles(&self) -> u32 {
        let interval = self.tick_consume_interval.max(1);
        self.ticks_to_complete.div_ceil(interval)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Byproduct {
    pub item: ItemId,
    pub quantity: QuantityRange,
}

/// Burn data for an item usable as fuel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelDefinition {
    pub item: ItemId,
    pub burn_time: f32,
    #[serde(default)]
    pub byproducts: Vec<Byproduct>,
}

impl FuelDefinition {
    pub fn new(item: &str, burn_time: f32) -> Self {
        Self {
            item: ItemId::new(item),
            burn_time,
            byproducts: Vec::new(),
        }
    }

    pub fn with_byproduct(mut self, item: &str, min: i32, max: i32) -> Self {
        self.byproducts.push(Byproduct {
            item: ItemId::new(item),
            quantity: QuantityRange::new(min, max),
        });
        self
    }
}

/// Side-effect-free metadata lookup service
pub trait ItemCatalog: Send + Sync {
    fn lookup_item(&self, id: &ItemId) -> Option<&ItemDefinition>;
    fn lookup_recipe(&self, id: &ItemId) -> Option<&RecipeDefinition>;
    fn lookup_fuel(&self, id: &ItemId) -> Option<&FuelDefinition>;

    /// Every item with a fuel definition, in a stable order
    fn fuel_items(&self) -> Vec<ItemId>;

    fn max_stack(&self, id: &ItemId) -> Option<u32> {
        self.lookup_item(id).map(|def| def.max_stack)
    }
}

/// Serialized form of a catalog file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub items: Vec<ItemDefinition>,
    #[serde(default)]
    pub recipes: Vec<RecipeDefinition>,
    #[serde(default)]
    pub fuels: Vec<FuelDefinition>,
}

/// In-memory catalog indexed by item id
#[derive(Debug, Clone, Default)]
pub struct CatalogTable {
    items: HashMap<ItemId, ItemDefinition>,
    recipes: HashMap<ItemId, RecipeDefinition>,
    fuels: HashMap<ItemId, FuelDefinition>,
}

impl CatalogTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, def: ItemDefinition) -> Self {
        self.items.insert(def.id.clone(), def);
        self
    }

    pub fn with_recipe(mut self, recipe: RecipeDefinition) -> Self {
        self.recipes.insert(recipe.item.clone(), recipe);
        self
    }

    pub fn with_fuel(mut self, fuel: FuelDefinition) -> Self {
        self.fuels.insert(fuel.item.clone(), fuel);
        self
    }

    /// Build from a parsed document, rejecting unusable definitions
    pub fn from_document(doc: CatalogDocument) -> Result<Self, LoadError> {
        let mut table = Self::new();
        for item in doc.items {
            if item.id.is_none() {
                return Err(LoadError::Invalid {
                    id: String::new(),
                    reason: "empty item id".into(),
                });
            }
            if item.max_stack < 1 {
                return Err(LoadError::Invalid {
                    id: item.id.to_string(),
                    reason: "max_stack must be at least 1".into(),
                });
            }
            table.items.insert(item.id.clone(), item);
        }
        for mut recipe in doc.recipes {
            recipe.ticks_to_complete = recipe.ticks_to_complete.max(1);
            recipe.tick_consume_interval = recipe.tick_consume_interval.max(1);
            recipe.creates_quantity = recipe.creates_quantity.max(1);
            table.recipes.insert(recipe.item.clone(), recipe);
        }
        for fuel in doc.fuels {
            if fuel.burn_time <= 0.0 {
                return Err(LoadError::Invalid {
                    id: fuel.item.to_string(),
                    reason: "burn_time must be positive".into(),
                });
            }
            table.fuels.insert(fuel.item.clone(), fuel);
        }
        Ok(table)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, LoadError> {
        let doc: CatalogDocument = ron::from_str(text)?;
        Self::from_document(doc)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }
}

impl ItemCatalog for CatalogTable {
    fn lookup_item(&self, id: &ItemId) -> Option<&ItemDefinition> {
        self.items.get(id)
    }

    fn lookup_recipe(&self, id: &ItemId) -> Option<&RecipeDefinition> {
        self.recipes.get(id)
    }

    fn lookup_fuel(&self, id: &ItemId) -> Option<&FuelDefinition> {
        self.fuels.get(id)
    }

    fn fuel_items(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.fuels.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Shared catalog resource. Cloning is cheap; `replace` swaps the table in place.
#[derive(Resource, Clone)]
pub struct CatalogHandle(Arc<dyn ItemCatalog>);

impl CatalogHandle {
    pub fn new(catalog: impl ItemCatalog + 'static) -> Self {
        Self(Arc::new(catalog))
    }

    pub fn replace(&mut self, catalog: impl ItemCatalog + 'static) {
        self.0 = Arc::new(catalog);
    }

    pub fn get(&self) -> &dyn ItemCatalog {
        self.0.as_ref()
    }
}
