//! Centralized constants for the inventory core.
//!
//! Defaults that more than one module reaches for. Per-module values (save
//! migration steps, log filters) stay next to the code that owns them.

// =====================================================
// Slot store
// =====================================================

/// Default number of general slots per inventory
pub const DEFAULT_GENERAL_SLOTS: usize = 24;

/// Upper bound on hunt-mode iterations before an add is aborted
pub const HUNT_ITERATION_CEILING: u32 = 10_000;

/// Two durabilities closer than this are considered equal for stacking
pub const DURABILITY_EPSILON: f32 = 0.001;

// =====================================================
// Interaction
// =====================================================

/// Max distance (world units) between an actor and a store it does not own
pub const MAX_INTERACTION_DISTANCE: f32 = 1024.0;

/// Vertical offset applied to dropped items and spawned byproducts
pub const PICKUP_SPAWN_HEIGHT: f32 = 128.0;

// =====================================================
// Crafting
// =====================================================

/// Seconds between crafting ticks (<= 0 means instant crafting)
pub const DEFAULT_CRAFTING_RATE: f32 = 1.0;

/// Max jobs held in a crafting queue
pub const DEFAULT_CRAFTING_QUEUE_LEN: usize = 8;

// =====================================================
// Fuel
// =====================================================

/// Seconds between fuel ticks; each tick burns this much time
pub const DEFAULT_FUEL_TICK: f32 = 1.0;

/// Seed for byproduct quantity rolls when none is configured
pub const DEFAULT_BYPRODUCT_SEED: u64 = 0x5EED_F0E1;

// =====================================================
// Save
// =====================================================

/// Current inventory save format version
pub const CURRENT_SAVE_VERSION: u32 = 3;

/// Oldest save version that can still be migrated forward
pub const MIN_SUPPORTED_SAVE_VERSION: u32 = 1;
