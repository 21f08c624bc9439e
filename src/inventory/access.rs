//! Actors, authority and cross-entity access rules.
//!
//! Every mutating call names the acting [`Actor`]. Only the authority role may
//! mutate. An actor always has full access to inventories it owns; any other
//! inventory must be world-owned, within interaction distance, not held by a
//! different actor, and (for deposits) not withdraw-only.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Inventory;
use crate::error::{InventoryError, InventoryResult};

/// Stable identity of a game entity, independent of ECS entity ids
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ActorId(pub u64);

/// Which side of the network the caller runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Authority,
    Observer,
}

#[derive(Component, Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
    pub is_player: bool,
    pub position: Vec3,
    pub name: Option<String>,
}

impl Actor {
    /// Server-side actor acting for itself (stations, furnaces, systems)
    pub fn authority(id: ActorId) -> Self {
        Self {
            id,
            role: Role::Authority,
            is_player: false,
            position: Vec3::ZERO,
            name: None,
        }
    }

    /// Server-side view of a player's session
    pub fn player(id: ActorId, position: Vec3) -> Self {
        Self {
            id,
            role: Role::Authority,
            is_player: true,
            position,
            name: None,
        }
    }

    /// Client-side mirror; never allowed to mutate
    pub fn observer(id: ActorId) -> Self {
        Self {
            id,
            role: Role::Observer,
            is_player: true,
            position: Vec3::ZERO,
            name: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn is_authority(&self) -> bool {
        self.role == Role::Authority
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Withdraw,
    Deposit,
}

/// Check that `actor` may perform `access` on `inventory`
pub fn authorize(actor: &Actor, inventory: &Inventory, access: AccessKind) -> InventoryResult<()> {
    if !actor.is_authority() {
        debug!(actor = actor.id.0, "mutation rejected: caller is not the authority");
        return Err(InventoryError::NotAuthorized);
    }
    if inventory.owner() == actor.id {
        return Ok(());
    }
    if inventory.is_player_owned() {
        warn!(
            actor = actor.id.0,
            owner = inventory.owner().0,
            "actor attempted to modify another player's inventory"
        );
        return Err(InventoryError::NotAuthorized);
    }
    if let Some(holder) = inventory.in_use_by() {
        if holder != actor.id {
            return Err(InventoryError::InUse);
        }
    }
    check_distance(actor, inventory)?;
    if access == AccessKind::Deposit && !accepts_deposit_from(actor, inventory) {
        debug!(owner = inventory.owner().0, "deposit rejected: withdraw-only inventory");
        return Err(InventoryError::WithdrawOnly);
    }
    Ok(())
}

/// Withdraw-only inventories take deposits from their owner alone
pub fn accepts_deposit_from(actor: &Actor, inventory: &Inventory) -> bool {
    inventory.owner() == actor.id || !inventory.is_withdraw_only()
}

pub fn check_distance(actor: &Actor, inventory: &Inventory) -> InventoryResult<()> {
    let distance = actor.position.distance(inventory.position());
    let max = inventory.max_interaction_distance();
    if distance > max {
        debug!(actor = actor.id.0, distance, max, "operation rejected: too far");
        return Err(InventoryError::TooFar { distance, max });
    }
    Ok(())
}

/// Claim a non-owned inventory for exclusive use by `actor`
pub fn request_access(actor: &Actor, inventory: &mut Inventory) -> InventoryResult<()> {
    authorize(actor, inventory, AccessKind::Withdraw)?;
    if inventory.owner() != actor.id {
        inventory.set_in_use_by(Some(actor.id));
        debug!(actor = actor.id.0, owner = inventory.owner().0, "inventory access granted");
    }
    Ok(())
}

/// Release a claim. Releasing an unclaimed inventory is a no-op.
pub fn release_access(actor: &Actor, inventory: &mut Inventory) -> InventoryResult<()> {
    if !actor.is_authority() {
        return Err(InventoryError::NotAuthorized);
    }
    match inventory.in_use_by() {
        Some(holder) if holder != actor.id => Err(InventoryError::InUse),
        Some(_) => {
            inventory.set_in_use_by(None);
            Ok(())
        }
        None => Ok(()),
    }
}
