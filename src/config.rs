//! Runtime configuration, read as JSON from browser storage.
//!
//! Every field has a default, so a missing key, a partial object, or a
//! corrupt value all yield a usable config. Unknown fields are ignored.

use serde::{Deserialize, Serialize};

use crate::storage::KeyValueStore;

/// Storage key holding the JSON config.
pub const CONFIG_KEY: &str = "energy_empire_config";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `error`, `warn`, `info`, `debug`, `trace` or `off`.
    pub log_level: String,
    /// Hosted backend. When absent the game runs against the in-browser
    /// simulated store.
    pub remote: Option<RemoteConfig>,
    pub tuning: Tuning,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            remote: None,
            tuning: Tuning::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    pub anon_key: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Client-side cadences and batch sizes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Clicks per queued wallet delta.
    pub sync_batch_clicks: u64,
    /// Maximum queued deltas before new ones are merged into the newest.
    pub sync_queue_capacity: usize,
    /// Drain interval of the sync queue.
    pub sync_drain_ms: u64,
    /// Full wallet re-fetch interval.
    pub wallet_resync_ms: u64,
    /// Autoclicker claim interval.
    pub autoclicker_claim_ms: u64,
    /// Per-click probability of asking the server for a random event.
    pub random_event_chance: f64,
    /// Artificial latency of the simulated store.
    pub sim_latency_ms: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            sync_batch_clicks: 5,
            sync_queue_capacity: 64,
            sync_drain_ms: 1_000,
            wallet_resync_ms: 30_000,
            autoclicker_claim_ms: 30_000,
            random_event_chance: 0.05,
            sim_latency_ms: 150,
        }
    }
}

impl Config {
    /// Parse a JSON config. Zero batch sizes and intervals are replaced by
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Config, serde_json::Error> {
        let mut config: Config = serde_json::from_str(json)?;
        config.tuning.sanitize();
        Ok(config)
    }

    /// Load from storage; absent or unreadable values fall back to defaults.
    pub fn load(storage: &dyn KeyValueStore) -> Config {
        let Some(json) = storage.get(CONFIG_KEY) else {
            return Config::default();
        };
        match Config::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("ignoring unreadable config in {CONFIG_KEY}: {e}");
                Config::default()
            }
        }
    }
}

impl Tuning {
    fn sanitize(&mut self) {
        let d = Tuning::default();
        if self.sync_batch_clicks == 0 {
            self.sync_batch_clicks = d.sync_batch_clicks;
        }
        if self.sync_queue_capacity == 0 {
            self.sync_queue_capacity = d.sync_queue_capacity;
        }
        if self.sync_drain_ms == 0 {
            self.sync_drain_ms = d.sync_drain_ms;
        }
        if self.wallet_resync_ms == 0 {
            self.wallet_resync_ms = d.wallet_resync_ms;
        }
        if self.autoclicker_claim_ms == 0 {
            self.autoclicker_claim_ms = d.autoclicker_claim_ms;
        }
        self.random_event_chance = self.random_event_chance.clamp(0.0, 1.0);
    }
}
