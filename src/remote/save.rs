//! Persistence of the simulated store's tables.
//!
//! ## Versioning
//!
//! - `SAVE_VERSION`: current layout. Bump when fields are added.
//! - `MIN_COMPATIBLE_VERSION`: oldest layout that still loads. Only bump on
//!   breaking changes (a field removed or its meaning changed). Added fields
//!   load through `#[serde(default)]`.

use serde::{Deserialize, Serialize};

use super::simulated::Database;
use crate::storage::KeyValueStore;

const SAVE_VERSION: u32 = 1;
const MIN_COMPATIBLE_VERSION: u32 = 1;

pub const STORAGE_KEY: &str = "energy_empire_sim_db";

/// Written with a borrowed `&Database`, read back into an owned one.
#[derive(Serialize, Deserialize)]
struct SaveData<D> {
    version: u32,
    db: D,
}

pub fn save_database(storage: &mut dyn KeyValueStore, db: &Database) {
    let data = SaveData {
        version: SAVE_VERSION,
        db,
    };
    match serde_json::to_string(&data) {
        Ok(json) => {
            if !storage.set(STORAGE_KEY, &json) {
                log::warn!("failed to write {STORAGE_KEY}");
            }
        }
        Err(e) => log::warn!("failed to serialize simulated store: {e}"),
    }
}

/// Load saved tables. Unreadable or incompatible saves are discarded.
pub fn load_database(storage: &dyn KeyValueStore) -> Option<Database> {
    let json = storage.get(STORAGE_KEY)?;
    let data: SaveData<Database> = match serde_json::from_str(&json) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("discarding unreadable simulated store: {e}");
            return None;
        }
    };
    if data.version < MIN_COMPATIBLE_VERSION {
        log::info!(
            "simulated store save too old (saved={}, min_compatible={}), starting fresh",
            data.version,
            MIN_COMPATIBLE_VERSION
        );
        return None;
    }
    if data.version < SAVE_VERSION {
        log::info!(
            "migrating simulated store save (saved={}, current={})",
            data.version,
            SAVE_VERSION
        );
    }
    Some(data.db)
}
