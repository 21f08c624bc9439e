//! Catalog hot reload
//!
//! Watches the catalog RON file with `notify` and swaps the shared
//! [`CatalogHandle`] when the file changes. A file that fails to parse is
//! rejected and the previous table stays live.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, info, warn};

use super::{CatalogHandle, CatalogTable};
use crate::error::LoadError;

pub struct CatalogReloadPlugin {
    pub path: PathBuf,
}

impl Plugin for CatalogReloadPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(CatalogReloadState {
            watched_file: Some(self.path.clone()),
            ..default()
        })
        .add_event::<CatalogReloadEvent>()
        .add_systems(Startup, setup_catalog_watcher)
        .add_systems(Update, process_catalog_changes);
    }
}

#[derive(Resource, Debug, Default)]
pub struct CatalogReloadState {
    pub enabled: bool,
    pub watched_file: Option<PathBuf>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    pub last_error: Option<String>,
}

#[derive(Event, Debug, Clone)]
pub struct CatalogReloadEvent {
    pub path: PathBuf,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Resource)]
struct CatalogWatcher {
    _watcher: RecommendedWatcher,
    receiver: Arc<Mutex<Receiver<notify::Result<Event>>>>,
}

fn setup_catalog_watcher(mut commands: Commands, mut state: ResMut<CatalogReloadState>) {
    let Some(path) = state.watched_file.clone() else {
        return;
    };
    if !path.exists() {
        warn!(path = %path.display(), "catalog file not found, hot reload disabled");
        state.enabled = false;
        return;
    }
    let Some(dir) = path.parent() else {
        state.enabled = false;
        return;
    };

    let (tx, rx) = channel::<notify::Result<Event>>();
    let mut watcher = match notify::recommended_watcher(tx) {
        Ok(w) => w,
        Err(e) => {
            error!("failed to create catalog watcher: {}", e);
            state.enabled = false;
            return;
        }
    };
    if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
        error!("failed to watch catalog directory: {}", e);
        state.enabled = false;
        return;
    }

    state.enabled = true;
    commands.insert_resource(CatalogWatcher {
        _watcher: watcher,
        receiver: Arc::new(Mutex::new(rx)),
    });
    info!(path = %path.display(), "catalog hot reload enabled");
}

fn process_catalog_changes(
    watcher: Option<Res<CatalogWatcher>>,
    mut state: ResMut<CatalogReloadState>,
    mut catalog: ResMut<CatalogHandle>,
    mut events: EventWriter<CatalogReloadEvent>,
) {
    let Some(watcher) = watcher else {
        return;
    };
    let Some(path) = state.watched_file.clone() else {
        return;
    };
    let Ok(receiver) = watcher.receiver.lock() else {
        return;
    };

    let mut touched = false;
    while let Ok(result) = receiver.try_recv() {
        match result {
            Ok(event) => touched |= is_catalog_event(&event, &path),
            Err(e) => warn!("catalog watcher error: {}", e),
        }
    }
    if !touched {
        return;
    }

    let outcome = apply_reload(&path, &mut catalog, &mut state);
    events.send(CatalogReloadEvent {
        path,
        success: outcome.is_ok(),
        error: outcome.err().map(|e| e.to_string()),
    });
}

/// Reparse the catalog and swap it in. On failure the handle is untouched.
pub fn apply_reload(
    path: &Path,
    catalog: &mut CatalogHandle,
    state: &mut CatalogReloadState,
) -> Result<(), LoadError> {
    match CatalogTable::load(path) {
        Ok(table) => {
            info!(
                items = table.item_count(),
                recipes = table.recipe_count(),
                "catalog reloaded"
            );
            catalog.replace(table);
            state.reload_count += 1;
            state.last_reload_success = true;
            state.last_error = None;
            Ok(())
        }
        Err(e) => {
            error!("catalog reload failed, keeping previous table: {}", e);
            state.last_reload_success = false;
            state.last_error = Some(e.to_string());
            Err(e)
        }
    }
}

/// True when a filesystem event modifies or creates the watched file
pub fn is_catalog_event(event: &Event, watched: &Path) -> bool {
    let Some(name) = watched.file_name() else {
        return false;
    };
    (event.kind.is_modify() || matches!(event.kind, EventKind::Create(_)))
        && event.paths.iter().any(|p| p.file_name() == Some(name))
}
