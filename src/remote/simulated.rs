//! In-process stand-in for the hosted database and its stored procedures.
//!
//! Every procedure validates and mutates atomically inside one call, the
//! way the hosted procedures do. Completions are delivered after a fixed
//! latency and in send order. Tests use the offline switch and failure
//! injection to exercise the client's error paths.

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{Activation, Completion, RemoteError, RemoteStore, Request, Response, Ticket, TicketCounter};
use crate::empire::logic::craft_cost;
use crate::empire::state::{
    AutoclickerSession, EpochMs, PaymentMethod, Planet, Profile, RandomEvent, Rarity, Tier,
    VersionedWallet, Wallet, WalletDelta,
};
use crate::storage::KeyValueStore;

/// How long a random event stays claimable.
const EVENT_LIFETIME_MS: u64 = 60_000;
/// Chance that `trigger_random_event` produces an event.
const EVENT_ROLL_CHANCE: f64 = 0.3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRow {
    pub user_id: String,
    pub session: AutoclickerSession,
    pub last_claim_at: EpochMs,
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub user_id: String,
    pub event: RandomEvent,
}

/// Tables of the simulated store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub users: Vec<Profile>,
    pub wallets: HashMap<String, VersionedWallet>,
    pub planets: HashMap<String, Planet>,
    pub sessions: Vec<SessionRow>,
    pub events: Vec<EventRow>,
    pub next_id: u64,
}

impl Database {
    fn new_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:06}", prefix, self.next_id)
    }

    fn user_exists(&self, user_id: &str) -> Result<(), RemoteError> {
        if self.users.iter().any(|u| u.id == user_id) {
            Ok(())
        } else {
            Err(RemoteError::Unauthorized)
        }
    }

    fn wallet_mut(&mut self, user_id: &str) -> Result<&mut VersionedWallet, RemoteError> {
        self.wallets.get_mut(user_id).ok_or(RemoteError::NotFound("wallet"))
    }

    /// Write a new balance and bump the row version.
    fn commit_wallet(&mut self, user_id: &str, wallet: Wallet) -> Result<u64, RemoteError> {
        let row = self.wallet_mut(user_id)?;
        row.wallet = wallet;
        row.version += 1;
        Ok(row.version)
    }

    fn live_session_mut(&mut self, user_id: &str, now_ms: EpochMs) -> Option<&mut SessionRow> {
        self.sessions
            .iter_mut()
            .rev()
            .find(|r| r.user_id == user_id && r.is_active && r.session.expires_at > now_ms)
    }

    pub fn sign_in(&self, username: &str) -> Result<Response, RemoteError> {
        self.users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .map(Response::Profile)
            .ok_or(RemoteError::Unauthorized)
    }

    pub fn register(&mut self, username: &str) -> Result<Response, RemoteError> {
        let valid = (3..=20).contains(&username.chars().count())
            && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(RemoteError::Rejected(
                "username must be 3-20 letters, digits or underscores".into(),
            ));
        }
        if self.users.iter().any(|u| u.username == username) {
            return Err(RemoteError::Rejected("username already taken".into()));
        }
        let profile = Profile {
            id: self.new_id("user"),
            username: username.to_string(),
        };
        self.wallets.insert(profile.id.clone(), VersionedWallet::default());
        self.users.push(profile.clone());
        Ok(Response::Profile(profile))
    }

    pub fn fetch_wallet(&self, user_id: &str) -> Result<Response, RemoteError> {
        self.user_exists(user_id)?;
        self.wallets
            .get(user_id)
            .copied()
            .map(Response::Wallet)
            .ok_or(RemoteError::NotFound("wallet"))
    }

    pub fn fetch_planet(&self, user_id: &str) -> Result<Response, RemoteError> {
        self.user_exists(user_id)?;
        Ok(Response::Planet(self.planets.get(user_id).cloned()))
    }

    pub fn fetch_active_session(&self, user_id: &str, now_ms: EpochMs) -> Result<Response, RemoteError> {
        self.user_exists(user_id)?;
        let session = self
            .sessions
            .iter()
            .rev()
            .find(|r| r.user_id == user_id && r.is_active && r.session.expires_at > now_ms)
            .map(|r| r.session.clone());
        Ok(Response::Session(session))
    }

    pub fn apply_wallet_delta(&mut self, user_id: &str, delta: &WalletDelta) -> Result<Response, RemoteError> {
        self.user_exists(user_id)?;
        let current = self.wallet_mut(user_id)?.wallet;
        let next = current
            .checked_delta(delta)
            .ok_or_else(|| RemoteError::Rejected("insufficient funds".into()))?;
        let version = self.commit_wallet(user_id, next)?;
        Ok(Response::WalletUpdated { version })
    }

    pub fn activate_autoclicker(
        &mut self,
        user_id: &str,
        tier: Tier,
        payment: PaymentMethod,
        now_ms: EpochMs,
    ) -> Result<Response, RemoteError> {
        self.user_exists(user_id)?;
        if self.live_session_mut(user_id, now_ms).is_some() {
            return Err(RemoteError::Rejected("an autoclicker is already active".into()));
        }
        let cost = tier.cost(payment).ok_or_else(|| {
            RemoteError::Rejected(format!("{} cannot be paid with {}", tier.name(), payment.code()))
        })?;
        let delta = match payment {
            PaymentMethod::Energy => WalletDelta { energy: -(cost as i64), ..Default::default() },
            PaymentMethod::Fuel => WalletDelta { fuel: -(cost as i64), ..Default::default() },
        };
        let current = self.wallet_mut(user_id)?.wallet;
        let next = current
            .checked_delta(&delta)
            .ok_or_else(|| RemoteError::Rejected(format!("not enough {}", payment.code())))?;
        self.commit_wallet(user_id, next)?;

        // Finished sessions of this user can no longer be claimed from.
        self.sessions
            .retain(|r| r.user_id != user_id || (r.is_active && r.session.expires_at > now_ms));
        let session = AutoclickerSession {
            id: self.new_id("session"),
            tier,
            energy_per_second: tier.energy_per_second(),
            started_at: now_ms,
            expires_at: now_ms + tier.duration_minutes() * 60_000,
        };
        self.sessions.push(SessionRow {
            user_id: user_id.to_string(),
            session: session.clone(),
            last_claim_at: now_ms,
            is_active: true,
        });
        Ok(Response::Activated(Activation {
            session_id: session.id,
            tier,
            energy_per_second: session.energy_per_second,
            expires_at: session.expires_at,
            duration_minutes: tier.duration_minutes(),
        }))
    }

    /// Grant `energy_per_second × whole seconds` since the last claim,
    /// capped at the session's expiry. The session is closed once expired.
    pub fn claim_autoclicker_energy(&mut self, user_id: &str, now_ms: EpochMs) -> Result<Response, RemoteError> {
        self.user_exists(user_id)?;
        let row = self
            .sessions
            .iter_mut()
            .rev()
            .find(|r| r.user_id == user_id && r.is_active)
            .ok_or_else(|| RemoteError::Rejected("no active autoclicker".into()))?;
        let until = now_ms.min(row.session.expires_at);
        let secs = until.saturating_sub(row.last_claim_at) / 1000;
        row.last_claim_at += secs * 1000;
        if now_ms >= row.session.expires_at {
            row.is_active = false;
        }
        let energy = secs * row.session.energy_per_second;

        let current = self.wallet_mut(user_id)?.wallet;
        let next = Wallet {
            energy: current.energy.saturating_add(energy),
            ..current
        };
        self.commit_wallet(user_id, next)?;
        Ok(Response::Claimed { energy_generated: energy })
    }

    pub fn craft_fuel(&mut self, user_id: &str, amount: u64) -> Result<Response, RemoteError> {
        self.user_exists(user_id)?;
        if amount == 0 {
            return Err(RemoteError::Rejected("amount must be positive".into()));
        }
        let cost = craft_cost(amount);
        let current = self.wallet_mut(user_id)?.wallet;
        if current.energy < cost.energy || current.rare_resources < cost.rare_resources {
            return Err(RemoteError::Rejected("insufficient resources".into()));
        }
        let next = Wallet {
            energy: current.energy - cost.energy,
            rare_resources: current.rare_resources - cost.rare_resources,
            fuel: current.fuel.saturating_add(amount),
            ..current
        };
        self.commit_wallet(user_id, next)?;
        Ok(Response::Crafted { fuel: amount })
    }

    pub fn trigger_random_event(
        &mut self,
        user_id: &str,
        now_ms: EpochMs,
        rng: &mut StdRng,
    ) -> Result<Response, RemoteError> {
        self.user_exists(user_id)?;
        self.events.retain(|e| e.event.expires_at > now_ms);
        if self.events.iter().any(|e| e.user_id == user_id) || !rng.random_bool(EVENT_ROLL_CHANCE) {
            return Ok(Response::Event(None));
        }
        let (event_type, name, description, energy, rare, fuel) = match rng.random_range(0..3) {
            0 => ("solar_flare", "Solar Flare", "A burst of stellar energy hits your grid.", 250, 0, 0),
            1 => ("meteor_shower", "Meteor Shower", "Rare fragments rain across the planet.", 0, 5, 0),
            _ => ("fuel_cache", "Abandoned Fuel Cache", "Scouts found a sealed fuel depot.", 0, 0, 1),
        };
        let event = RandomEvent {
            id: self.new_id("event"),
            event_type: event_type.into(),
            event_name: name.into(),
            event_description: description.into(),
            energy_reward: energy,
            rare_reward: rare,
            fuel_reward: fuel,
            expires_at: now_ms + EVENT_LIFETIME_MS,
        };
        self.events.push(EventRow {
            user_id: user_id.to_string(),
            event: event.clone(),
        });
        Ok(Response::Event(Some(event)))
    }

    pub fn generate_starter_planet(&mut self, user_id: &str, rng: &mut StdRng) -> Result<Response, RemoteError> {
        self.user_exists(user_id)?;
        if self.planets.contains_key(user_id) {
            return Err(RemoteError::Rejected("planet already generated".into()));
        }
        let roll: u32 = rng.random_range(0..100);
        let (rarity, energy_bonus, rare_bonus, max_tiles) = match roll {
            0..=59 => (Rarity::Common, 0.0, 0.0, 25),
            60..=84 => (Rarity::Uncommon, 5.0, 1.0, 36),
            85..=94 => (Rarity::Rare, 10.0, 2.0, 49),
            95..=98 => (Rarity::Epic, 25.0, 3.0, 64),
            _ => (Rarity::Legendary, 50.0, 5.0, 100),
        };
        const NAMES: &[&str] = &["Kepler", "Vesta", "Orion", "Nyx", "Helios", "Tethys"];
        let name = format!(
            "{}-{}",
            NAMES[rng.random_range(0..NAMES.len())],
            rng.random_range(100..1000)
        );
        let planet = Planet {
            id: self.new_id("planet"),
            name,
            rarity,
            max_tiles,
            discovered_tiles: 1,
            base_resources_percent: 70.0,
            rare_resources_percent: 5.0 + rare_bonus,
            buildable_tiles_percent: 40.0,
            bonus_energy_production: energy_bonus,
            bonus_rare_drop_rate: rare_bonus,
            tier: 1,
            upgrade_cost_fuel: 10,
        };
        self.planets.insert(user_id.to_string(), planet.clone());
        Ok(Response::PlanetGenerated(planet))
    }

    /// Run one request against the tables.
    pub fn execute(&mut self, request: &Request, now_ms: EpochMs, rng: &mut StdRng) -> Result<Response, RemoteError> {
        match request {
            Request::SignIn { username } => self.sign_in(username),
            Request::Register { username } => self.register(username),
            Request::FetchWallet { user_id } => self.fetch_wallet(user_id),
            Request::FetchPlanet { user_id } => self.fetch_planet(user_id),
            Request::FetchActiveSession { user_id } => self.fetch_active_session(user_id, now_ms),
            Request::ApplyWalletDelta { user_id, delta } => self.apply_wallet_delta(user_id, delta),
            Request::ActivateAutoclicker { user_id, tier, payment } => {
                self.activate_autoclicker(user_id, *tier, *payment, now_ms)
            }
            Request::ClaimAutoclickerEnergy { user_id } => self.claim_autoclicker_energy(user_id, now_ms),
            Request::CraftFuel { user_id, amount } => self.craft_fuel(user_id, *amount),
            Request::TriggerRandomEvent { user_id } => self.trigger_random_event(user_id, now_ms, rng),
            Request::GenerateStarterPlanet { user_id } => self.generate_starter_planet(user_id, rng),
        }
    }
}

fn mutates(request: &Request) -> bool {
    !matches!(
        request,
        Request::SignIn { .. }
            | Request::FetchWallet { .. }
            | Request::FetchPlanet { .. }
            | Request::FetchActiveSession { .. }
    )
}

pub struct SimulatedRemote {
    pub db: Database,
    latency_ms: u64,
    tickets: TicketCounter,
    outbox: VecDeque<(EpochMs, Completion)>,
    rng: StdRng,
    offline: bool,
    fail_next: u32,
    sent: Vec<&'static str>,
    storage: Option<Box<dyn KeyValueStore>>,
}

impl SimulatedRemote {
    pub fn new(latency_ms: u64, seed: u64) -> Self {
        Self {
            db: Database::default(),
            latency_ms,
            tickets: TicketCounter::default(),
            outbox: VecDeque::new(),
            rng: StdRng::seed_from_u64(seed),
            offline: false,
            fail_next: 0,
            sent: Vec::new(),
            storage: None,
        }
    }

    /// Restore tables from `storage` and save back after every mutation.
    pub fn persisted(latency_ms: u64, seed: u64, storage: Box<dyn KeyValueStore>) -> Self {
        let mut remote = Self::new(latency_ms, seed);
        if let Some(db) = super::save::load_database(storage.as_ref()) {
            remote.db = db;
        }
        remote.storage = Some(storage);
        remote
    }

    /// Fail every request with a network error while set.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Fail the next `n` requests with a network error.
    pub fn fail_next(&mut self, n: u32) {
        self.fail_next = n;
    }

    /// Number of requests sent with the given procedure/table name.
    pub fn sent_count(&self, name: &str) -> usize {
        self.sent.iter().filter(|n| **n == name).count()
    }

    pub fn in_flight(&self) -> usize {
        self.outbox.len()
    }

    pub fn wallet_of(&self, user_id: &str) -> Option<Wallet> {
        self.db.wallets.get(user_id).map(|w| w.wallet)
    }
}

impl RemoteStore for SimulatedRemote {
    fn send(&mut self, request: Request, now_ms: EpochMs) -> Ticket {
        let ticket = self.tickets.next();
        self.sent.push(request.name());

        let result = if self.offline {
            Err(RemoteError::Network("offline".into()))
        } else if self.fail_next > 0 {
            self.fail_next -= 1;
            Err(RemoteError::Network("connection reset".into()))
        } else {
            let result = self.db.execute(&request, now_ms, &mut self.rng);
            if result.is_ok() && mutates(&request) {
                if let Some(storage) = self.storage.as_mut() {
                    super::save::save_database(storage.as_mut(), &self.db);
                }
            }
            result
        };

        if let Err(e) = &result {
            log::debug!("simulated {} failed: {e}", request.name());
        }
        self.outbox
            .push_back((now_ms + self.latency_ms, Completion { ticket, result }));
        ticket
    }

    fn poll(&mut self, now_ms: EpochMs) -> Vec<Completion> {
        let mut ready = Vec::new();
        while let Some((due, _)) = self.outbox.front() {
            if *due > now_ms {
                break;
            }
            if let Some((_, completion)) = self.outbox.pop_front() {
                ready.push(completion);
            }
        }
        ready
    }
}
