//! Fuel consumption engine.
//!
//! `Idle -> Burning -> (Exhausted -> Idle | Refueled -> Burning)`
//!
//! Every tick burns `tick_interval_secs` off the active fuel. When it runs
//! out, its byproducts are rolled and delivered, and the next unit is drawn
//! from the burner's inventory without operator input. With nothing left to
//! draw the burner goes idle and reports it once.

use bevy::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogHandle, ItemCatalog, ItemId};
use crate::config::{CoreConfig, FuelConfig};
use crate::constants::PICKUP_SPAWN_HEIGHT;
use crate::error::{InventoryError, InventoryResult};
use crate::inventory::systems::with_input_output;
use crate::inventory::{
    Actor, ActorId, AddRequest, Inventory, ItemStatics, RequestRejected, SlotKind,
    TransactionEngine,
};
use crate::pickup::{PickupQueue, PickupSpawn, PickupSpawner};

pub struct FuelPlugin;

impl Plugin for FuelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CoreConfig>()
            .init_resource::<PickupQueue>()
            .add_event::<StartFuelRequest>()
            .add_event::<StopFuelRequest>()
            .add_event::<FuelUpdated>()
            .add_event::<FuelSystemToggled>()
            .add_event::<RequestRejected>()
            .add_systems(
                Update,
                (handle_fuel_requests, tick_fuel_burners, publish_fuel_events).chain(),
            );
    }
}

/// Observer-visible burn state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FuelState {
    pub current: Option<ItemId>,
    pub seconds_remaining: f32,
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct FuelUpdated {
    pub burner: Entity,
    pub current: Option<ItemId>,
    pub seconds_remaining: f32,
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuelSystemToggled {
    pub burner: Entity,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum FuelNotice {
    Updated,
    Toggled(bool),
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FuelTick {
    pub exhausted: Option<ItemId>,
    pub drew: Option<ItemId>,
    pub byproducts: Vec<(ItemId, u32)>,
    pub went_idle: bool,
}

/// Where byproducts go; without it they are spawned as pickups
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuelOutput(pub Entity);

#[derive(Component, Debug, Clone)]
pub struct FuelBurner {
    owner: ActorId,
    config: FuelConfig,
    state: FuelState,
    running: bool,
    burning: bool,
    missing_store: bool,
    elapsed: f32,
    rng: Xoshiro256PlusPlus,
    notices: Vec<FuelNotice>,
}

impl FuelBurner {
    pub fn new(owner: ActorId, config: FuelConfig) -> Self {
        let rng = Xoshiro256PlusPlus::seed_from_u64(config.byproduct_seed ^ owner.0);
        Self {
            owner,
            config,
            state: FuelState::default(),
            running: false,
            burning: false,
            missing_store: false,
            elapsed: 0.0,
            rng,
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> &FuelState {
        &self.state
    }

    pub fn is_burning(&self) -> bool {
        self.burning
    }

    pub fn is_running(&self) -> bool {
        self.running && !self.missing_store
    }

    pub fn config(&self) -> &FuelConfig {
        &self.config
    }

    /// Fuel item ids this burner will draw, in draw order
    pub fn candidate_fuels(&self, catalog: &dyn ItemCatalog) -> Vec<ItemId> {
        if self.config.allowed_fuels.is_empty() {
            catalog.fuel_items()
        } else {
            self.config
                .allowed_fuels
                .iter()
                .filter(|id| catalog.lookup_fuel(id).is_some())
                .cloned()
                .collect()
        }
    }

    pub fn total_fuel_units(&self, catalog: &dyn ItemCatalog, store: &Inventory) -> u32 {
        self.candidate_fuels(catalog)
            .iter()
            .map(|id| store.store().total_quantity(id))
            .sum()
    }

    /// Seconds of burn left, including the active unit
    pub fn total_fuel_time_available(&self, catalog: &dyn ItemCatalog, store: &Inventory) -> f32 {
        let reserve: f32 = self
            .candidate_fuels(catalog)
            .iter()
            .filter_map(|id| {
                catalog
                    .lookup_fuel(id)
                    .map(|fuel| fuel.burn_time * store.store().total_quantity(id) as f32)
            })
            .sum();
        reserve + self.state.seconds_remaining.max(0.0)
    }

    pub fn is_fuel_available(&self, catalog: &dyn ItemCatalog, store: &Inventory) -> bool {
        self.total_fuel_units(catalog, store) > 0
    }

    /// Start the burner, drawing the first unit immediately
    pub fn start(
        &mut self,
        actor: &Actor,
        catalog: &dyn ItemCatalog,
        store: &mut Inventory,
    ) -> InventoryResult<()> {
        if !actor.is_authority() {
            return Err(InventoryError::NotAuthorized);
        }
        if self.missing_store {
            return Err(InventoryError::MissingStore);
        }
        if self.running {
            return Ok(());
        }
        if self.config.ignore_fuel {
            self.burning = true;
        } else if self.state.current.is_none() {
            if self.draw(catalog, store).is_none() {
                return Err(InventoryError::NoFuel);
            }
            self.burning = true;
        }
        self.running = true;
        self.elapsed = 0.0;
        self.notices.push(FuelNotice::Toggled(true));
        info!(owner = self.owner.0, fuel = ?self.state.current, "fuel system started");
        Ok(())
    }

    /// Pause ticking; the active fuel and its remaining time are kept
    pub fn stop(&mut self, actor: &Actor) -> InventoryResult<()> {
        if !actor.is_authority() {
            return Err(InventoryError::NotAuthorized);
        }
        if self.running {
            self.running = false;
            self.notices.push(FuelNotice::Toggled(false));
            info!(owner = self.owner.0, "fuel system stopped");
        }
        Ok(())
    }

    pub fn tick(
        &mut self,
        catalog: &dyn ItemCatalog,
        store: &mut Inventory,
        output: Option<&mut Inventory>,
        spawner: &mut dyn PickupSpawner,
    ) -> FuelTick {
        let mut report = FuelTick::default();
        if !self.is_running() || self.config.ignore_fuel {
            return report;
        }

        if let Some(current) = self.state.current.clone() {
            self.state.seconds_remaining -= self.config.tick_interval_secs;
            if self.state.seconds_remaining <= 0.0 {
                report.byproducts = self.produce_byproducts(catalog, &current, store, output, spawner);
                self.state = FuelState::default();
                report.exhausted = Some(current);
            }
            self.notices.push(FuelNotice::Updated);
        }

        if self.state.current.is_none() {
            match self.draw(catalog, store) {
                Some(item) => {
                    if !self.burning {
                        self.burning = true;
                        self.notices.push(FuelNotice::Toggled(true));
                    }
                    report.drew = Some(item);
                }
                None if self.burning => {
                    self.burning = false;
                    report.went_idle = true;
                    self.notices.push(FuelNotice::Toggled(false));
                    info!(owner = self.owner.0, "out of fuel, burner idle");
                }
                None => {}
            }
        }
        report
    }

    /// Take one unit of the first available fuel and make it active
    fn draw(&mut self, catalog: &dyn ItemCatalog, store: &mut Inventory) -> Option<ItemId> {
        let station = Actor::authority(self.owner);
        let engine = TransactionEngine::new(&station, catalog);
        for id in self.candidate_fuels(catalog) {
            let Some(fuel) = catalog.lookup_fuel(&id) else {
                continue;
            };
            if store.store().total_quantity(&id) == 0 {
                continue;
            }
            match engine.remove_item(store, &id, 1, SlotKind::General, false) {
                Ok(1) => {
                    self.state = FuelState {
                        current: Some(id.clone()),
                        seconds_remaining: fuel.burn_time,
                    };
                    self.notices.push(FuelNotice::Updated);
                    debug!(owner = self.owner.0, fuel = %id, burn_time = fuel.burn_time, "fuel drawn");
                    return Some(id);
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!(owner = self.owner.0, fuel = %id, "could not draw fuel: {}", e);
                    continue;
                }
            }
        }
        None
    }

    fn produce_byproducts(
        &mut self,
        catalog: &dyn ItemCatalog,
        exhausted: &ItemId,
        store: &Inventory,
        mut output: Option<&mut Inventory>,
        spawner: &mut dyn PickupSpawner,
    ) -> Vec<(ItemId, u32)> {
        let Some(fuel) = catalog.lookup_fuel(exhausted) else {
            return Vec::new();
        };
        let station = Actor::authority(self.owner);
        let engine = TransactionEngine::new(&station, catalog);
        let mut produced = Vec::with_capacity(fuel.byproducts.len());
        for byproduct in &fuel.byproducts {
            let quantity = byproduct.quantity.roll(&mut self.rng);
            let Some(def) = catalog.lookup_item(&byproduct.item) else {
                warn!(item = %byproduct.item, "byproduct not in catalog, skipped");
                continue;
            };
            match output.as_deref_mut() {
                Some(target) => {
                    let request = AddRequest::new(def.id.clone(), quantity);
                    if let Err(e) = engine.add_or_drop(target, request, &mut *spawner) {
                        warn!(item = %def.id, "byproduct lost: {}", e);
                        continue;
                    }
                }
                None => {
                    spawner.spawn_pickup(PickupSpawn {
                        item: def.id.clone(),
                        quantity,
                        durability: def.full_durability(),
                        statics: ItemStatics::from_definition(def),
                        position: store.position() + Vec3::Y * PICKUP_SPAWN_HEIGHT,
                    });
                }
            }
            debug!(fuel = %exhausted, item = %def.id, quantity, "byproduct produced");
            produced.push((def.id.clone(), quantity));
        }
        produced
    }

    /// Accumulate frame time; returns how many ticks are due
    pub fn advance(&mut self, delta_secs: f32) -> u32 {
        if !self.is_running() {
            return 0;
        }
        let interval = self.config.tick_interval_secs;
        if interval <= 0.0 {
            return 1;
        }
        self.elapsed += delta_secs;
        let due = (self.elapsed / interval).floor();
        self.elapsed -= due * interval;
        due as u32
    }

    pub fn mark_missing_store(&mut self) {
        if !self.missing_store {
            error!(owner = self.owner.0, "fuel burner has no fuel inventory, disabled");
            self.missing_store = true;
        }
    }
}

// ============================================================================
// Requests & systems
// ============================================================================

#[derive(Event, Debug, Clone)]
pub struct StartFuelRequest {
    pub actor: Entity,
    pub burner: Entity,
}

#[derive(Event, Debug, Clone)]
pub struct StopFuelRequest {
    pub actor: Entity,
    pub burner: Entity,
}

#[allow(clippy::too_many_arguments)]
pub fn handle_fuel_requests(
    mut starts: EventReader<StartFuelRequest>,
    mut stops: EventReader<StopFuelRequest>,
    catalog: Option<Res<CatalogHandle>>,
    actors: Query<&Actor>,
    mut burners: Query<&mut FuelBurner>,
    mut inventories: Query<&mut Inventory>,
    mut rejected: EventWriter<RequestRejected>,
) {
    let Some(catalog) = catalog else {
        return;
    };
    for request in starts.read() {
        let (Ok(actor), Ok(mut burner)) = (actors.get(request.actor), burners.get_mut(request.burner))
        else {
            continue;
        };
        let result = match inventories.get_mut(request.burner) {
            Ok(mut store) => burner.start(actor, catalog.get(), &mut store),
            Err(_) => {
                burner.mark_missing_store();
                Err(InventoryError::MissingStore)
            }
        };
        if let Err(error) = result {
            rejected.send(RequestRejected {
                actor: request.actor,
                error,
            });
        }
    }
    for request in stops.read() {
        let (Ok(actor), Ok(mut burner)) = (actors.get(request.actor), burners.get_mut(request.burner))
        else {
            continue;
        };
        if let Err(error) = burner.stop(actor) {
            rejected.send(RequestRejected {
                actor: request.actor,
                error,
            });
        }
    }
}

pub fn tick_fuel_burners(
    time: Res<Time>,
    catalog: Option<Res<CatalogHandle>>,
    mut queue: ResMut<PickupQueue>,
    mut burners: Query<(Entity, &mut FuelBurner, Option<&FuelOutput>)>,
    mut inventories: Query<&mut Inventory>,
) {
    let Some(catalog) = catalog else {
        return;
    };
    for (entity, mut burner, output) in &mut burners {
        let due = burner.advance(time.delta_secs());
        if due == 0 {
            continue;
        }
        let output = output.map(|o| o.0);
        let ran = with_input_output(&mut inventories, entity, output, |store, mut output| {
            for _ in 0..due {
                burner.tick(catalog.get(), store, output.as_deref_mut(), &mut *queue);
            }
        });
        if ran.is_none() {
            burner.mark_missing_store();
        }
    }
}

pub fn publish_fuel_events(
    mut burners: Query<(Entity, &mut FuelBurner)>,
    mut updated: EventWriter<FuelUpdated>,
    mut toggled: EventWriter<FuelSystemToggled>,
) {
    for (entity, mut burner) in &mut burners {
        if burner.notices.is_empty() {
            continue;
        }
        let notices = std::mem::take(&mut burner.notices);
        let mut state_changed = false;
        for notice in notices {
            match notice {
                FuelNotice::Updated => state_changed = true,
                FuelNotice::Toggled(running) => {
                    toggled.send(FuelSystemToggled {
                        burner: entity,
                        running,
                    });
                }
            }
        }
        if state_changed {
            updated.send(FuelUpdated {
                burner: entity,
                current: burner.state.current.clone(),
                seconds_remaining: burner.state.seconds_remaining,
            });
        }
    }
}
