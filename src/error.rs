//! Error taxonomy shared by every inventory operation.
//!
//! Validation failures are returned to the caller and never cross a system
//! boundary as a panic. The only condition treated as fatal is an engine
//! missing its required input store, which disables that engine.

use crate::catalog::{EquipCategory, ItemId};

/// Failure of an inventory, crafting or fuel operation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InventoryError {
    #[error("invalid item: '{0}'")]
    InvalidItem(ItemId),
    #[error("invalid quantity: {0}")]
    InvalidQuantity(u32),
    #[error("slot index {index} out of range ({count} slots)")]
    InvalidSlot { index: usize, count: usize },
    #[error("slot {0} is empty")]
    EmptySlot(usize),
    #[error("slot {0} cannot take any more of this item")]
    SlotFull(usize),
    #[error("inventory full, {remainder} unit(s) could not be placed")]
    InventoryFull { remainder: u32 },
    #[error("'{item}' cannot be placed in the {category:?} slot")]
    IneligibleCategory { item: ItemId, category: EquipCategory },
    #[error("actor is not authorized to modify this inventory")]
    NotAuthorized,
    #[error("target is too far away ({distance:.1} > {max:.1})")]
    TooFar { distance: f32, max: f32 },
    #[error("inventory only allows withdrawals")]
    WithdrawOnly,
    #[error("inventory is in use by another actor")]
    InUse,
    #[error("missing ingredients for '{0}'")]
    IngredientsMissing(ItemId),
    #[error("no recipe for '{0}'")]
    NoRecipe(ItemId),
    #[error("crafting queue is full ({0} jobs)")]
    QueueFull(usize),
    #[error("no crafting job at queue index {0}")]
    NoSuchJob(usize),
    #[error("no fuel available")]
    NoFuel,
    #[error("required store is not attached")]
    MissingStore,
    /// Units already placed stay in the store; `added` reports them
    #[error("hunt aborted after {iterations} iterations, {added} placed, {remainder} unit(s) unresolved")]
    InternalLoopGuardTripped {
        iterations: u32,
        added: u32,
        remainder: u32,
    },
}

impl InventoryError {
    /// True for errors that leave the target untouched and may succeed later
    /// without any caller intervention (e.g. a stalled crafting cycle).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            InventoryError::IngredientsMissing(_) | InventoryError::InUse | InventoryError::NoFuel
        )
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;

/// Failure while loading a catalog or config document
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported file extension: {0}")]
    UnsupportedFormat(String),
    #[error("invalid definition '{id}': {reason}")]
    Invalid { id: String, reason: String },
}
