//! Inventory save blobs.
//!
//! A save is a JSON document:
//! `{ version, owner, general: [SlotRecord], equipment: [SlotRecord], checksum }`
//!
//! - Only occupied slots are written, each with its index.
//! - `checksum` is the first 8 bytes (LE) of SHA3-256 over the canonical JSON
//!   of `[general, equipment]` exactly as stored, so it is verified before
//!   any migration touches the records.
//! - Older versions migrate forward one step at a time:
//!   v1 -> v2 adds instance statics, v2 -> v3 adds equipment category tags.
//! - Restore is best-effort: records that no longer fit the current layout or
//!   catalog are logged and skipped.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha3::{Digest, Sha3_256};
use tracing::{info, warn};

use crate::catalog::{EquipCategory, ItemCatalog, ItemId, ItemRarity};
use crate::constants::{CURRENT_SAVE_VERSION, MIN_SUPPORTED_SAVE_VERSION};
use crate::error::InventoryError;
use crate::inventory::access::{authorize, AccessKind};
use crate::inventory::{Actor, ActorId, Inventory, ItemStatics, SlotKind, SlotRef, SlotUpdate};

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("save is missing its version field")]
    MissingVersion,
    #[error("save version {version} is newer than supported {max}")]
    FutureVersion { version: u32, max: u32 },
    #[error("save version {version} is older than supported {min}")]
    TooOld { version: u32, min: u32 },
    #[error("checksum mismatch: stored {stored:016x}, computed {computed:016x}")]
    ChecksumMismatch { stored: u64, computed: u64 },
    #[error("migration from v{from} failed: {detail}")]
    MigrationFailed { from: u32, detail: String },
    #[error("restore rejected: {0}")]
    Rejected(#[from] InventoryError),
}

/// One occupied slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub index: usize,
    pub item: ItemId,
    pub quantity: u32,
    #[serde(default)]
    pub durability: f32,
    #[serde(default)]
    pub rarity: ItemRarity,
    #[serde(default)]
    pub crafter_name: Option<String>,
    #[serde(default)]
    pub crafted_at: Option<u64>,
    #[serde(default)]
    pub equipped: bool,
    #[serde(default)]
    pub category: Option<EquipCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySave {
    pub version: u32,
    pub owner: ActorId,
    pub general: Vec<SlotRecord>,
    pub equipment: Vec<SlotRecord>,
    pub checksum: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreReport {
    pub restored: usize,
    pub skipped: usize,
    pub original_version: u32,
    pub steps_applied: Vec<String>,
}

fn records(inventory: &Inventory, kind: SlotKind) -> Vec<SlotRecord> {
    inventory
        .store()
        .slots(kind)
        .iter()
        .enumerate()
        .filter(|(_, slot)| !slot.is_vacant())
        .map(|(index, slot)| SlotRecord {
            index,
            item: slot.item().clone(),
            quantity: slot.quantity(),
            durability: slot.durability(),
            rarity: slot.statics().rarity,
            crafter_name: slot.statics().crafter_name.clone(),
            crafted_at: slot.statics().crafted_at,
            equipped: slot.statics().equipped,
            category: slot.category(),
        })
        .collect()
}

/// SHA3-256 of `[general, equipment]`, truncated to 8 bytes
pub fn checksum(general: &Value, equipment: &Value) -> u64 {
    let payload = Value::Array(vec![general.clone(), equipment.clone()]);
    let mut hasher = Sha3_256::new();
    hasher.update(payload.to_string().as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    u64::from_le_bytes(bytes)
}

/// Serialize an inventory to a save blob at the current version
pub fn save(inventory: &Inventory) -> Result<String, SaveError> {
    let general = serde_json::to_value(records(inventory, SlotKind::General))?;
    let equipment = serde_json::to_value(records(inventory, SlotKind::Equipment))?;
    let blob = serde_json::json!({
        "version": CURRENT_SAVE_VERSION,
        "owner": inventory.owner(),
        "checksum": checksum(&general, &equipment),
        "general": general,
        "equipment": equipment,
    });
    Ok(serde_json::to_string_pretty(&blob)?)
}

/// Verify, migrate and parse a blob without touching any inventory
pub fn load(blob: &str) -> Result<(InventorySave, RestoreReport), SaveError> {
    let mut data: Value = serde_json::from_str(blob)?;
    let version = data
        .get("version")
        .and_then(Value::as_u64)
        .ok_or(SaveError::MissingVersion)? as u32;
    if version > CURRENT_SAVE_VERSION {
        return Err(SaveError::FutureVersion {
            version,
            max: CURRENT_SAVE_VERSION,
        });
    }
    if version < MIN_SUPPORTED_SAVE_VERSION {
        return Err(SaveError::TooOld {
            version,
            min: MIN_SUPPORTED_SAVE_VERSION,
        });
    }

    let empty = Value::Array(Vec::new());
    let stored = data.get("checksum").and_then(Value::as_u64).unwrap_or(0);
    let computed = checksum(
        data.get("general").unwrap_or(&empty),
        data.get("equipment").unwrap_or(&empty),
    );
    if stored != computed {
        return Err(SaveError::ChecksumMismatch { stored, computed });
    }

    let mut steps = Vec::new();
    let mut current = version;
    while current < CURRENT_SAVE_VERSION {
        let step = apply_migration_step(&mut data, current)
            .map_err(|detail| SaveError::MigrationFailed {
                from: current,
                detail,
            })?;
        steps.push(step);
        current += 1;
        data["version"] = serde_json::json!(current);
    }

    let save: InventorySave = serde_json::from_value(data)?;
    Ok((
        save,
        RestoreReport {
            original_version: version,
            steps_applied: steps,
            ..RestoreReport::default()
        },
    ))
}

fn apply_migration_step(data: &mut Value, from_version: u32) -> Result<String, String> {
    match from_version {
        1 => migrate_v1_to_v2(data),
        2 => migrate_v2_to_v3(data),
        _ => Err(format!("no migration path from version {}", from_version)),
    }
}

fn records_mut<'a>(data: &'a mut Value, key: &str) -> Result<Vec<&'a mut serde_json::Map<String, Value>>, String> {
    match data.get_mut(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter_mut()
            .map(|record| {
                record
                    .as_object_mut()
                    .ok_or_else(|| format!("{} record is not an object", key))
            })
            .collect(),
        Some(_) => Err(format!("{} is not an array", key)),
    }
}

/// v1 -> v2: instance statics
fn migrate_v1_to_v2(data: &mut Value) -> Result<String, String> {
    let common = serde_json::to_value(ItemRarity::Common).map_err(|e| e.to_string())?;
    for (key, equipped) in [("general", false), ("equipment", true)] {
        for record in records_mut(data, key)? {
            record
                .entry("rarity")
                .or_insert_with(|| common.clone());
            record.entry("crafter_name").or_insert(Value::Null);
            record.entry("crafted_at").or_insert(Value::Null);
            record
                .entry("equipped")
                .or_insert_with(|| Value::Bool(equipped));
        }
    }
    Ok("v1→v2: added rarity, crafter, craft time and equipped flag".to_string())
}

/// v2 -> v3: equipment category tags
fn migrate_v2_to_v3(data: &mut Value) -> Result<String, String> {
    for key in ["general", "equipment"] {
        for record in records_mut(data, key)? {
            record.entry("category").or_insert(Value::Null);
        }
    }
    Ok("v2→v3: added equipment category tags".to_string())
}

/// Replace the contents of `inventory` with what `blob` describes
pub fn restore(
    inventory: &mut Inventory,
    actor: &Actor,
    catalog: &dyn ItemCatalog,
    blob: &str,
) -> Result<RestoreReport, SaveError> {
    authorize(actor, inventory, AccessKind::Deposit)?;
    let (save, mut report) = load(blob)?;
    if save.owner != inventory.owner() {
        warn!(
            saved = save.owner.0,
            current = inventory.owner().0,
            "restoring a save written for a different owner"
        );
    }

    for kind in [SlotKind::General, SlotKind::Equipment] {
        for index in 0..inventory.store().slot_count(kind) {
            if let Some(slot) = inventory.store_mut().slot_mut(SlotRef { kind, index }) {
                slot.clear();
            }
        }
    }

    for (kind, records) in [
        (SlotKind::General, &save.general),
        (SlotKind::Equipment, &save.equipment),
    ] {
        for record in records {
            if restore_record(inventory, catalog, kind, record) {
                report.restored += 1;
            } else {
                report.skipped += 1;
            }
        }
        inventory.mark_changed(SlotUpdate::bulk(kind));
    }

    info!(
        owner = inventory.owner().0,
        restored = report.restored,
        skipped = report.skipped,
        from_version = report.original_version,
        "inventory restored"
    );
    Ok(report)
}

fn restore_record(
    inventory: &mut Inventory,
    catalog: &dyn ItemCatalog,
    kind: SlotKind,
    record: &SlotRecord,
) -> bool {
    let Some(def) = catalog.lookup_item(&record.item) else {
        warn!(item = %record.item, "saved item no longer in catalog, skipped");
        return false;
    };
    if record.quantity == 0 {
        return false;
    }

    let index = match (kind, record.category) {
        (SlotKind::Equipment, Some(category)) => {
            match inventory.store().find_equipment_index(category) {
                Some(index) => index,
                None => {
                    warn!(item = %record.item, ?category, "no equipment slot for saved category, skipped");
                    return false;
                }
            }
        }
        _ => record.index,
    };
    let Some(slot) = inventory.store().get(SlotRef { kind, index }) else {
        warn!(item = %record.item, index, ?kind, "saved slot index out of range, skipped");
        return false;
    };
    if !slot.accepts(def) {
        warn!(item = %record.item, index, "saved item not eligible for its slot, skipped");
        return false;
    }
    if !slot.is_vacant() {
        warn!(item = %record.item, index, "saved slot already restored, skipped");
        return false;
    }
    if record.quantity > def.max_stack {
        warn!(item = %record.item, saved = record.quantity, max = def.max_stack, "saved stack clamped");
    }

    let statics = ItemStatics {
        rarity: record.rarity,
        crafter_name: record.crafter_name.clone(),
        crafted_at: record.crafted_at,
        equipped: record.equipped,
    };
    match inventory.store_mut().slot_mut(SlotRef { kind, index }) {
        Some(slot) => {
            slot.set_contents(
                record.item.clone(),
                record.quantity,
                def.max_stack,
                record.durability,
                statics,
            ) > 0
        }
        None => false,
    }
}

pub fn save_to_file(inventory: &Inventory, path: &Path) -> Result<(), SaveError> {
    std::fs::write(path, save(inventory)?)?;
    Ok(())
}

pub fn restore_from_file(
    inventory: &mut Inventory,
    actor: &Actor,
    catalog: &dyn ItemCatalog,
    path: &Path,
) -> Result<RestoreReport, SaveError> {
    let blob = std::fs::read_to_string(path)?;
    restore(inventory, actor, catalog, &blob)
}
