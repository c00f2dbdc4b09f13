//! Process-wide map from database name to its in-memory dataset.
//!
//! Connections opened with the same name share one dataset, so rows
//! written through one are visible through the others.

use crate::dataset::Dataset;
use fakedb_core::Result;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, RwLock};

/// A dataset shared between the registry and open connections.
pub type SharedDataset = Arc<Mutex<Dataset>>;

static REGISTRY: LazyLock<RwLock<HashMap<String, SharedDataset>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Lock a shared dataset, recovering the data if a holder panicked.
pub fn lock(dataset: &SharedDataset) -> MutexGuard<'_, Dataset> {
    dataset.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Install `dataset` under `name`.
///
/// If the name is already registered its contents are replaced in place,
/// so open connections observe the new data.
pub fn register(name: &str, dataset: Dataset) -> SharedDataset {
    let mut map = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = map.get(name) {
        *lock(existing) = dataset;
        tracing::debug!(database = name, "Replaced registered dataset");
        return Arc::clone(existing);
    }
    let shared = Arc::new(Mutex::new(dataset));
    map.insert(name.to_string(), Arc::clone(&shared));
    tracing::debug!(database = name, "Registered dataset");
    shared
}

/// The dataset registered under `name`, if any.
pub fn get(name: &str) -> Option<SharedDataset> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
}

/// The dataset registered under `name`, registering an empty one if absent.
pub fn open_or_create(name: &str) -> SharedDataset {
    if let Some(shared) = get(name) {
        return shared;
    }
    let mut map = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(map.entry(name.to_string()).or_insert_with(|| {
        tracing::debug!(database = name, "Created empty dataset");
        Arc::new(Mutex::new(Dataset::new()))
    }))
}

/// Remove `name` from the registry. Open connections keep their handle.
pub fn unregister(name: &str) -> Option<SharedDataset> {
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(name)
}

/// Remove every registered dataset.
pub fn clear() {
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

/// Registered database names, sorted.
pub fn names() -> Vec<String> {
    let mut names: Vec<String> = REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .cloned()
        .collect();
    names.sort();
    names
}

/// Parse a JSON fixture (see [`Dataset::from_json`]) and register it.
pub fn load_json(name: &str, json: &str) -> Result<SharedDataset> {
    let dataset = Dataset::from_json_str(json)?;
    Ok(register(name, dataset))
}
