//! Crafting queue engine.
//!
//! A station owns a bounded queue of jobs. Each tick advances every job in
//! ascending order, consuming one ingredient cycle whenever
//! `ticks_completed % tick_consume_interval == 0`; a job whose cycle cannot be
//! paid stalls at its current tick. Finished jobs are delivered and removed in
//! a second, descending pass so removal never shifts an unvisited index.
//!
//! Ingredients are taken from the station's own inventory. Output goes to the
//! entity named by [`CraftingOutput`], or back into the input store. Output
//! and refunds that do not fit are dropped as pickups, never discarded.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogHandle, ItemCatalog, ItemId, RecipeDefinition};
use crate::config::{CoreConfig, CraftingConfig};
use crate::error::{InventoryError, InventoryResult};
use crate::inventory::access::{authorize, AccessKind};
use crate::inventory::systems::with_input_output;
use crate::inventory::{
    Actor, ActorId, AddRequest, Inventory, ItemStatics, RequestRejected, SlotKind,
    TransactionEngine,
};
use crate::pickup::{PickupQueue, PickupSpawner};

pub struct CraftingPlugin;

impl Plugin for CraftingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CoreConfig>()
            .init_resource::<PickupQueue>()
            .add_event::<CraftRequest>()
            .add_event::<CancelCraftRequest>()
            .add_event::<CraftingEvent>()
            .add_event::<RequestRejected>()
            .add_systems(
                Update,
                (handle_craft_requests, tick_crafting_stations, publish_crafting_events).chain(),
            );
    }
}

// ============================================================================
// Jobs & events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftingJob {
    pub item: ItemId,
    pub ticks_completed: u32,
    /// Ingredient cycles paid so far
    pub cycles_consumed: u32,
    pub crafter: Option<String>,
}

impl CraftingJob {
    fn new(item: ItemId, crafter: Option<String>) -> Self {
        Self {
            item,
            ticks_completed: 0,
            cycles_consumed: 0,
            crafter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CraftingEventKind {
    Started,
    Progressed { ticks: u32 },
    Stalled,
    Completed { quantity: u32 },
    Cancelled { refunded: u32 },
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct CraftingEvent {
    pub station: Entity,
    pub item: ItemId,
    pub kind: CraftingEventKind,
}

/// Result of one tick, mostly for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub advanced: u32,
    pub stalled: u32,
    pub completed: u32,
    pub skipped: bool,
}

// ============================================================================
// Station
// ============================================================================

/// Where finished items go, when not back into the station's own inventory
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CraftingOutput(pub Entity);

#[derive(Component, Debug, Clone)]
pub struct CraftingStation {
    owner: ActorId,
    config: CraftingConfig,
    queue: Vec<CraftingJob>,
    stopped: bool,
    ticking: bool,
    missing_store: bool,
    elapsed: f32,
    events: Vec<(ItemId, CraftingEventKind)>,
}

impl CraftingStation {
    pub fn new(owner: ActorId, config: CraftingConfig) -> Self {
        Self {
            owner,
            config,
            queue: Vec::new(),
            stopped: false,
            ticking: false,
            missing_store: false,
            elapsed: 0.0,
            events: Vec::new(),
        }
    }

    pub fn owner(&self) -> ActorId {
        self.owner
    }

    pub fn queue(&self) -> &[CraftingJob] {
        &self.queue
    }

    pub fn config(&self) -> &CraftingConfig {
        &self.config
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Timer runs only with work queued, crafting enabled and not stopped
    pub fn is_running(&self) -> bool {
        !self.queue.is_empty() && !self.stopped && self.config.enabled && !self.missing_store
    }

    pub fn is_disabled(&self) -> bool {
        self.missing_store
    }

    /// Queue a craft. In instant mode the item is produced synchronously and
    /// never enters the queue.
    pub fn request_craft(
        &mut self,
        actor: &Actor,
        catalog: &dyn ItemCatalog,
        item: &ItemId,
        input: &mut Inventory,
        output: Option<&mut Inventory>,
        spawner: &mut dyn PickupSpawner,
    ) -> InventoryResult<()> {
        if self.missing_store {
            return Err(InventoryError::MissingStore);
        }
        authorize(actor, input, AccessKind::Withdraw)?;
        if !self.config.enabled {
            return Err(InventoryError::NotAuthorized);
        }
        let recipe = catalog
            .lookup_recipe(item)
            .ok_or_else(|| InventoryError::NoRecipe(item.clone()))?;
        if catalog.lookup_item(&recipe.item).is_none() {
            return Err(InventoryError::InvalidItem(recipe.item.clone()));
        }

        let station = Actor::authority(self.owner);
        let engine = TransactionEngine::new(&station, catalog);

        if self.config.is_instant() {
            let cycles = recipe.consume_cycles();
            consume_cycles(&engine, input, recipe, cycles)?;
            let job = CraftingJob {
                cycles_consumed: cycles,
                ticks_completed: recipe.ticks_to_complete,
                ..CraftingJob::new(recipe.item.clone(), actor.name.clone())
            };
            let mut output = output;
            match deliver(&engine, input, &mut output, recipe, &job, catalog, &mut *spawner) {
                Ok(quantity) => {
                    self.events.push((recipe.item.clone(), CraftingEventKind::Completed { quantity }));
                    info!(item = %recipe.item, quantity, "instant craft completed");
                    Ok(())
                }
                Err(e) => {
                    // output blocked: hand the ingredients back
                    refund_cycles(&engine, input, recipe, cycles, spawner);
                    Err(e)
                }
            }
        } else {
            if self.queue.len() >= self.config.max_queue_len {
                return Err(InventoryError::QueueFull(self.config.max_queue_len));
            }
            self.queue
                .push(CraftingJob::new(recipe.item.clone(), actor.name.clone()));
            self.events.push((recipe.item.clone(), CraftingEventKind::Started));
            debug!(item = %recipe.item, queued = self.queue.len(), "craft queued");
            Ok(())
        }
    }

    /// Remove a job and refund its completed ingredient cycles
    pub fn cancel_craft(
        &mut self,
        actor: &Actor,
        catalog: &dyn ItemCatalog,
        index: usize,
        input: &mut Inventory,
        spawner: &mut dyn PickupSpawner,
    ) -> InventoryResult<u32> {
        authorize(actor, input, AccessKind::Withdraw)?;
        if index >= self.queue.len() {
            return Err(InventoryError::NoSuchJob(index));
        }
        let job = self.queue.remove(index);
        let refunded = match catalog.lookup_recipe(&job.item) {
            Some(recipe) => {
                let cycles = job.ticks_completed / recipe.tick_consume_interval.max(1);
                let station = Actor::authority(self.owner);
                refund_cycles(&TransactionEngine::new(&station, catalog), input, recipe, cycles, spawner)
            }
            None => {
                warn!(item = %job.item, "recipe vanished, nothing refunded");
                0
            }
        };
        self.events
            .push((job.item.clone(), CraftingEventKind::Cancelled { refunded }));
        debug!(item = %job.item, refunded, "craft cancelled");
        Ok(refunded)
    }

    /// Run one crafting tick
    pub fn tick(
        &mut self,
        catalog: &dyn ItemCatalog,
        input: &mut Inventory,
        output: Option<&mut Inventory>,
        spawner: &mut dyn PickupSpawner,
    ) -> TickSummary {
        if self.ticking || !self.is_running() {
            return TickSummary {
                skipped: true,
                ..TickSummary::default()
            };
        }
        self.ticking = true;
        let summary = self.run_tick(catalog, input, output, spawner);
        self.ticking = false;
        if self.queue.is_empty() {
            self.elapsed = 0.0;
            debug!(owner = self.owner.0, "crafting queue empty, timer paused");
        }
        summary
    }

    fn run_tick(
        &mut self,
        catalog: &dyn ItemCatalog,
        input: &mut Inventory,
        mut output: Option<&mut Inventory>,
        spawner: &mut dyn PickupSpawner,
    ) -> TickSummary {
        let station = Actor::authority(self.owner);
        let engine = TransactionEngine::new(&station, catalog);
        let mut summary = TickSummary::default();

        // Pass 1: advance, ascending
        for job in self.queue.iter_mut() {
            let Some(recipe) = catalog.lookup_recipe(&job.item) else {
                summary.stalled += 1;
                continue;
            };
            if job.ticks_completed >= recipe.ticks_to_complete {
                continue;
            }
            if job.ticks_completed % recipe.tick_consume_interval.max(1) == 0 {
                if let Err(e) = consume_cycles(&engine, input, recipe, 1) {
                    debug!(item = %job.item, ticks = job.ticks_completed, "craft stalled: {}", e);
                    self.events.push((job.item.clone(), CraftingEventKind::Stalled));
                    summary.stalled += 1;
                    continue;
                }
                job.cycles_consumed += 1;
            }
            job.ticks_completed += 1;
            summary.advanced += 1;
            self.events.push((
                job.item.clone(),
                CraftingEventKind::Progressed {
                    ticks: job.ticks_completed,
                },
            ));
        }

        // Pass 2: finalize and remove, descending
        for index in (0..self.queue.len()).rev() {
            let Some(recipe) = catalog.lookup_recipe(&self.queue[index].item) else {
                continue;
            };
            if self.queue[index].ticks_completed < recipe.ticks_to_complete {
                continue;
            }
            let owed = recipe
                .consume_cycles()
                .saturating_sub(self.queue[index].cycles_consumed);
            if owed > 0 {
                if let Err(e) = consume_cycles(&engine, input, recipe, owed) {
                    debug!(item = %recipe.item, "final consumption failed: {}", e);
                    summary.stalled += 1;
                    continue;
                }
                self.queue[index].cycles_consumed += owed;
            }
            match deliver(&engine, input, &mut output, recipe, &self.queue[index], catalog, &mut *spawner) {
                Ok(quantity) => {
                    let job = self.queue.remove(index);
                    info!(item = %job.item, quantity, "craft completed");
                    self.events
                        .push((job.item, CraftingEventKind::Completed { quantity }));
                    summary.completed += 1;
                }
                Err(e) => {
                    warn!(item = %recipe.item, "crafted item could not be delivered: {}", e);
                    self.events
                        .push((recipe.item.clone(), CraftingEventKind::Stalled));
                    summary.stalled += 1;
                }
            }
        }
        summary
    }

    /// Accumulate frame time; returns how many ticks are due
    pub fn advance(&mut self, delta_secs: f32) -> u32 {
        if !self.is_running() {
            return 0;
        }
        if self.config.is_instant() {
            return 1;
        }
        self.elapsed += delta_secs;
        let rate = self.config.crafting_rate_secs;
        let due = (self.elapsed / rate).floor();
        self.elapsed -= due * rate;
        due as u32
    }

    pub fn stop(&mut self, actor: &Actor) -> InventoryResult<()> {
        check_authority(actor)?;
        self.stopped = true;
        Ok(())
    }

    pub fn resume(&mut self, actor: &Actor) -> InventoryResult<()> {
        check_authority(actor)?;
        self.stopped = false;
        Ok(())
    }

    pub fn set_enabled(&mut self, actor: &Actor, enabled: bool) -> InventoryResult<()> {
        check_authority(actor)?;
        self.config.enabled = enabled;
        Ok(())
    }

    pub fn set_rate(&mut self, actor: &Actor, crafting_rate_secs: f32) -> InventoryResult<()> {
        check_authority(actor)?;
        self.config.crafting_rate_secs = crafting_rate_secs;
        self.elapsed = 0.0;
        Ok(())
    }

    /// Disable the station for good; logged once
    pub fn mark_missing_store(&mut self) {
        if !self.missing_store {
            error!(owner = self.owner.0, "crafting station has no input inventory, disabled");
            self.missing_store = true;
        }
    }

    pub fn drain_events(&mut self) -> Vec<(ItemId, CraftingEventKind)> {
        std::mem::take(&mut self.events)
    }
}

fn check_authority(actor: &Actor) -> InventoryResult<()> {
    if actor.is_authority() {
        Ok(())
    } else {
        Err(InventoryError::NotAuthorized)
    }
}

/// Per-item totals, merging duplicate ingredient lines
fn ingredient_totals(recipe: &RecipeDefinition, cycles: u32) -> BTreeMap<ItemId, u32> {
    let mut totals = BTreeMap::new();
    for ingredient in &recipe.ingredients {
        *totals.entry(ingredient.item.clone()).or_insert(0) += ingredient.quantity * cycles;
    }
    totals
}

/// Check every ingredient first, then deduct. Nothing is taken on failure.
fn consume_cycles(
    engine: &TransactionEngine,
    input: &mut Inventory,
    recipe: &RecipeDefinition,
    cycles: u32,
) -> InventoryResult<()> {
    let totals = ingredient_totals(recipe, cycles);
    if totals
        .iter()
        .any(|(item, &needed)| input.store().total_quantity(item) < needed)
    {
        return Err(InventoryError::IngredientsMissing(recipe.item.clone()));
    }
    for (item, needed) in totals {
        if needed > 0 {
            engine.remove_item(input, &item, needed, SlotKind::General, false)?;
        }
    }
    Ok(())
}

fn refund_cycles(
    engine: &TransactionEngine,
    input: &mut Inventory,
    recipe: &RecipeDefinition,
    cycles: u32,
    spawner: &mut dyn PickupSpawner,
) -> u32 {
    if cycles == 0 {
        return 0;
    }
    let mut refunded = 0;
    for (item, quantity) in ingredient_totals(recipe, cycles) {
        if quantity == 0 {
            continue;
        }
        let request = AddRequest::new(item.clone(), quantity).notify(false);
        match engine.add_or_drop(input, request, &mut *spawner) {
            Ok(outcome) => {
                refunded += outcome.added + outcome.dropped;
                if outcome.dropped > 0 {
                    debug!(item = %item, dropped = outcome.dropped, "refund overflow dropped");
                }
            }
            Err(e) => warn!(item = %item, "refund failed: {}", e),
        }
    }
    refunded
}

/// Add the crafted stack to the output store (or the input when unset)
fn deliver(
    engine: &TransactionEngine,
    input: &mut Inventory,
    output: &mut Option<&mut Inventory>,
    recipe: &RecipeDefinition,
    job: &CraftingJob,
    catalog: &dyn ItemCatalog,
    spawner: &mut dyn PickupSpawner,
) -> InventoryResult<u32> {
    let def = catalog
        .lookup_item(&recipe.item)
        .ok_or_else(|| InventoryError::InvalidItem(recipe.item.clone()))?;
    let statics = ItemStatics {
        crafter_name: job.crafter.clone(),
        crafted_at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .ok(),
        ..ItemStatics::from_definition(def)
    };
    let target: &mut Inventory = match output {
        Some(out) => &mut **out,
        None => input,
    };
    let request = AddRequest::new(recipe.item.clone(), recipe.creates_quantity).with_statics(statics);
    let outcome = engine.add_or_drop(target, request, spawner)?;
    if outcome.dropped > 0 {
        debug!(item = %recipe.item, dropped = outcome.dropped, "output store overflowed, dropped");
    }
    Ok(outcome.added + outcome.dropped)
}

// ============================================================================
// Requests & systems
// ============================================================================

#[derive(Event, Debug, Clone)]
pub struct CraftRequest {
    pub actor: Entity,
    pub station: Entity,
    pub item: ItemId,
}

#[derive(Event, Debug, Clone)]
pub struct CancelCraftRequest {
    pub actor: Entity,
    pub station: Entity,
    pub index: usize,
}

#[allow(clippy::too_many_arguments)]
pub fn handle_craft_requests(
    mut crafts: EventReader<CraftRequest>,
    mut cancels: EventReader<CancelCraftRequest>,
    catalog: Option<Res<CatalogHandle>>,
    actors: Query<&Actor>,
    mut stations: Query<(&mut CraftingStation, Option<&CraftingOutput>)>,
    mut inventories: Query<&mut Inventory>,
    mut queue: ResMut<PickupQueue>,
    mut rejected: EventWriter<RequestRejected>,
) {
    let Some(catalog) = catalog else {
        return;
    };
    for request in crafts.read() {
        let (Ok(actor), Ok((mut station, output))) =
            (actors.get(request.actor), stations.get_mut(request.station))
        else {
            continue;
        };
        let output = output.map(|o| o.0);
        let result = with_input_output(&mut inventories, request.station, output, |input, output| {
            station.request_craft(actor, catalog.get(), &request.item, input, output, &mut *queue)
        })
        .unwrap_or_else(|| {
            station.mark_missing_store();
            Err(InventoryError::MissingStore)
        });
        if let Err(error) = result {
            debug!(actor = actor.id.0, item = %request.item, "craft rejected: {}", error);
            rejected.send(RequestRejected {
                actor: request.actor,
                error,
            });
        }
    }
    for request in cancels.read() {
        let (Ok(actor), Ok((mut station, _))) =
            (actors.get(request.actor), stations.get_mut(request.station))
        else {
            continue;
        };
        let result = match inventories.get_mut(request.station) {
            Ok(mut input) => {
                station.cancel_craft(actor, catalog.get(), request.index, &mut input, &mut *queue)
            }
            Err(_) => Err(InventoryError::MissingStore),
        };
        if let Err(error) = result {
            rejected.send(RequestRejected {
                actor: request.actor,
                error,
            });
        }
    }
}

pub fn tick_crafting_stations(
    time: Res<Time>,
    catalog: Option<Res<CatalogHandle>>,
    mut stations: Query<(Entity, &mut CraftingStation, Option<&CraftingOutput>)>,
    mut inventories: Query<&mut Inventory>,
    mut queue: ResMut<PickupQueue>,
) {
    let Some(catalog) = catalog else {
        return;
    };
    for (entity, mut station, output) in &mut stations {
        let due = station.advance(time.delta_secs());
        if due == 0 {
            continue;
        }
        let output = output.map(|o| o.0);
        let ran = with_input_output(&mut inventories, entity, output, |input, mut output| {
            for _ in 0..due {
                station.tick(catalog.get(), input, output.as_deref_mut(), &mut *queue);
            }
        });
        if ran.is_none() {
            station.mark_missing_store();
        }
    }
}

pub fn publish_crafting_events(
    mut stations: Query<(Entity, &mut CraftingStation)>,
    mut events: EventWriter<CraftingEvent>,
) {
    for (entity, mut station) in &mut stations {
        if station.events.is_empty() {
            continue;
        }
        for (item, kind) in station.drain_events() {
            events.send(CraftingEvent {
                station: entity,
                item,
                kind,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogTable, ItemDefinition};
    use crate::config::InventoryConfig;
    use crate::pickup::RecordingSpawner;

    const OWNER: ActorId = ActorId(10);

    fn catalog() -> CatalogTable {
        CatalogTable::new()
            .with_item(ItemDefinition::new("wood", 50))
            .with_item(ItemDefinition::new("iron", 50))
            .with_item(ItemDefinition::new("plank", 20))
            .with_item(ItemDefinition::new("nail", 100))
            .with_recipe(RecipeDefinition::new("plank", &[("wood", 2)]).with_ticks(3, 1))
            .with_recipe(
                RecipeDefinition::new("nail", &[("iron", 1)])
                    .with_ticks(4, 2)
                    .with_creates(10),
            )
    }

    fn stocked(catalog: &CatalogTable, items: &[(&str, u32)]) -> Inventory {
        let mut inventory = Inventory::new(OWNER, &InventoryConfig::container(8));
        let actor = Actor::authority(OWNER);
        let engine = TransactionEngine::new(&actor, catalog);
        for (item, qty) in items {
            engine
                .add_item(&mut inventory, AddRequest::new(*item, *qty), None)
                .unwrap();
        }
        inventory
    }

    fn total(inventory: &Inventory, item: &str) -> u32 {
        inventory.store().total_quantity(&ItemId::new(item))
    }

    #[test]
    fn test_three_tick_craft_consumes_six_wood() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER);
        let mut input = stocked(&catalog, &[("wood", 6)]);
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();

        station
            .request_craft(&owner, &catalog, &ItemId::new("plank"), &mut input, None, &mut drops)
            .unwrap();
        station.tick(&catalog, &mut input, None, &mut drops);
        station.tick(&catalog, &mut input, None, &mut drops);
        assert_eq!(total(&input, "plank"), 0);
        let summary = station.tick(&catalog, &mut input, None, &mut drops);
        assert_eq!(summary.completed, 1);
        assert_eq!(total(&input, "plank"), 1);
        assert_eq!(total(&input, "wood"), 0);
        assert!(station.queue().is_empty());
        assert!(!station.is_running(), "empty queue pauses the timer");
    }

    #[test]
    fn test_missing_ingredients_stall_without_regression() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER);
        let mut input = stocked(&catalog, &[("wood", 5)]);
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station
            .request_craft(&owner, &catalog, &ItemId::new("plank"), &mut input, None, &mut drops)
            .unwrap();

        for _ in 0..5 {
            station.tick(&catalog, &mut input, None, &mut drops);
        }
        assert_eq!(station.queue()[0].ticks_completed, 2);
        assert_eq!(total(&input, "wood"), 1, "a failed cycle takes nothing");

        let engine = TransactionEngine::new(&owner, &catalog);
        engine.add_item(&mut input, AddRequest::new("wood", 1), None).unwrap();
        let summary = station.tick(&catalog, &mut input, None, &mut drops);
        assert_eq!(summary.completed, 1);
        assert_eq!(total(&input, "plank"), 1);
    }

    #[test]
    fn test_consume_interval() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER);
        let mut input = stocked(&catalog, &[("iron", 5)]);
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station
            .request_craft(&owner, &catalog, &ItemId::new("nail"), &mut input, None, &mut drops)
            .unwrap();

        station.tick(&catalog, &mut input, None, &mut drops);
        assert_eq!(total(&input, "iron"), 4);
        station.tick(&catalog, &mut input, None, &mut drops);
        assert_eq!(total(&input, "iron"), 4, "no consumption off-interval");
        station.tick(&catalog, &mut input, None, &mut drops);
        station.tick(&catalog, &mut input, None, &mut drops);
        assert_eq!(total(&input, "iron"), 3);
        assert_eq!(total(&input, "nail"), 10);
    }

    #[test]
    fn test_separate_output_store() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER);
        let mut input = stocked(&catalog, &[("wood", 6)]);
        let mut output = Inventory::new(OWNER, &InventoryConfig::container(2));
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station
            .request_craft(&owner, &catalog, &ItemId::new("plank"), &mut input, Some(&mut output), &mut drops)
            .unwrap();
        for _ in 0..3 {
            station.tick(&catalog, &mut input, Some(&mut output), &mut drops);
        }
        assert_eq!(total(&output, "plank"), 1);
        assert_eq!(total(&input, "plank"), 0);
    }

    #[test]
    fn test_crafted_item_carries_crafter() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER).with_name("Ada");
        let mut input = stocked(&catalog, &[("wood", 6)]);
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station
            .request_craft(&owner, &catalog, &ItemId::new("plank"), &mut input, None, &mut drops)
            .unwrap();
        for _ in 0..3 {
            station.tick(&catalog, &mut input, None, &mut drops);
        }
        let index = input.store().find_all_containing(&ItemId::new("plank"))[0];
        let slot = input.store().slot(index, SlotKind::General);
        assert_eq!(slot.statics().crafter_name.as_deref(), Some("Ada"));
        assert!(slot.statics().crafted_at.is_some());
    }

    #[test]
    fn test_request_rejections() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER);
        let mut input = stocked(&catalog, &[]);
        let config = CraftingConfig {
            max_queue_len: 1,
            ..CraftingConfig::default()
        };
        let mut station = CraftingStation::new(OWNER, config);
        let mut drops = RecordingSpawner::default();

        assert_eq!(
            station.request_craft(&owner, &catalog, &ItemId::new("wood"), &mut input, None, &mut drops),
            Err(InventoryError::NoRecipe(ItemId::new("wood")))
        );
        assert_eq!(
            station.request_craft(&Actor::observer(OWNER), &catalog, &ItemId::new("plank"), &mut input, None, &mut drops),
            Err(InventoryError::NotAuthorized)
        );
        station
            .request_craft(&owner, &catalog, &ItemId::new("plank"), &mut input, None, &mut drops)
            .unwrap();
        assert_eq!(
            station.request_craft(&owner, &catalog, &ItemId::new("plank"), &mut input, None, &mut drops),
            Err(InventoryError::QueueFull(1))
        );
    }

    #[test]
    fn test_cancel_refunds_completed_cycles() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER);
        let mut input = stocked(&catalog, &[("iron", 10)]);
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station
            .request_craft(&owner, &catalog, &ItemId::new("nail"), &mut input, None, &mut drops)
            .unwrap();
        // ticks 0 and 2 consume; after 3 ticks two cycles are paid, floor(3/2) = 1 refunded
        for _ in 0..3 {
            station.tick(&catalog, &mut input, None, &mut drops);
        }
        assert_eq!(total(&input, "iron"), 8);
        assert_eq!(station.cancel_craft(&owner, &catalog, 0, &mut input, &mut drops), Ok(1));
        assert_eq!(total(&input, "iron"), 9);
        assert_eq!(
            station.cancel_craft(&owner, &catalog, 0, &mut input, &mut drops),
            Err(InventoryError::NoSuchJob(0))
        );
    }

    #[test]
    fn test_cancel_refund_overflow_is_dropped() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER);
        let mut input = Inventory::new(OWNER, &InventoryConfig::container(1));
        let engine = TransactionEngine::new(&owner, &catalog);
        engine.add_item(&mut input, AddRequest::new("iron", 1), None).unwrap();
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station
            .request_craft(&owner, &catalog, &ItemId::new("nail"), &mut input, None, &mut drops)
            .unwrap();
        station.tick(&catalog, &mut input, None, &mut drops);
        station.tick(&catalog, &mut input, None, &mut drops);
        assert_eq!(total(&input, "iron"), 0);

        engine.add_item(&mut input, AddRequest::new("wood", 50), None).unwrap();
        assert_eq!(station.cancel_craft(&owner, &catalog, 0, &mut input, &mut drops), Ok(1));
        assert_eq!(drops.spawned.len(), 1);
        assert_eq!(drops.spawned[0].item, ItemId::new("iron"));
        assert_eq!(drops.spawned[0].quantity, 1);
    }

    #[test]
    fn test_full_output_drops_crafted_item() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER);
        let mut input = stocked(&catalog, &[("wood", 6)]);
        let mut output = Inventory::new(OWNER, &InventoryConfig::container(1));
        TransactionEngine::new(&owner, &catalog)
            .add_item(&mut output, AddRequest::new("iron", 50), None)
            .unwrap();
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station
            .request_craft(&owner, &catalog, &ItemId::new("plank"), &mut input, Some(&mut output), &mut drops)
            .unwrap();
        for _ in 0..3 {
            station.tick(&catalog, &mut input, Some(&mut output), &mut drops);
        }

        assert!(station.queue().is_empty(), "a dropped delivery still completes the job");
        assert_eq!(drops.spawned.len(), 1);
        assert_eq!(drops.spawned[0].item, ItemId::new("plank"));
        assert_eq!(total(&output, "plank"), 0);
    }

    #[test]
    fn test_instant_mode() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER);
        let mut input = stocked(&catalog, &[("wood", 7)]);
        let config = CraftingConfig {
            crafting_rate_secs: 0.0,
            ..CraftingConfig::default()
        };
        let mut station = CraftingStation::new(OWNER, config);
        let mut drops = RecordingSpawner::default();

        station
            .request_craft(&owner, &catalog, &ItemId::new("plank"), &mut input, None, &mut drops)
            .unwrap();
        assert!(station.queue().is_empty());
        assert_eq!(total(&input, "plank"), 1);
        assert_eq!(total(&input, "wood"), 1);
        assert_eq!(
            station.request_craft(&owner, &catalog, &ItemId::new("plank"), &mut input, None, &mut drops),
            Err(InventoryError::IngredientsMissing(ItemId::new("plank")))
        );
        assert_eq!(total(&input, "wood"), 1);
    }

    #[test]
    fn test_stop_and_resume() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER);
        let mut input = stocked(&catalog, &[("wood", 6)]);
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station
            .request_craft(&owner, &catalog, &ItemId::new("plank"), &mut input, None, &mut drops)
            .unwrap();

        station.stop(&owner).unwrap();
        assert!(station.tick(&catalog, &mut input, None, &mut drops).skipped);
        assert_eq!(station.advance(10.0), 0);
        assert_eq!(station.queue().len(), 1, "stopping keeps the queue");

        station.resume(&owner).unwrap();
        assert_eq!(station.advance(2.5), 2);
        assert_eq!(station.advance(0.5), 1);
        assert_eq!(
            station.stop(&Actor::observer(OWNER)),
            Err(InventoryError::NotAuthorized)
        );
    }

    #[test]
    fn test_events_recorded() {
        let catalog = catalog();
        let owner = Actor::authority(OWNER);
        let mut input = stocked(&catalog, &[("wood", 6)]);
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station
            .request_craft(&owner, &catalog, &ItemId::new("plank"), &mut input, None, &mut drops)
            .unwrap();
        for _ in 0..3 {
            station.tick(&catalog, &mut input, None, &mut drops);
        }
        let kinds: Vec<CraftingEventKind> = station.drain_events().into_iter().map(|(_, k)| k).collect();
        assert_eq!(kinds.first(), Some(&CraftingEventKind::Started));
        assert_eq!(kinds.last(), Some(&CraftingEventKind::Completed { quantity: 1 }));
        assert!(station.drain_events().is_empty());
    }

    #[test]
    fn test_missing_store_disables_once() {
        let mut station = CraftingStation::new(OWNER, CraftingConfig::default());
        let mut drops = RecordingSpawner::default();
        station.mark_missing_store();
        station.mark_missing_store();
        assert!(station.is_disabled());
        let catalog = catalog();
        let mut input = stocked(&catalog, &[("wood", 6)]);
        assert_eq!(
            station.request_craft(&Actor::authority(OWNER), &catalog, &ItemId::new("plank"), &mut input, None, &mut drops),
            Err(InventoryError::MissingStore)
        );
    }
}
