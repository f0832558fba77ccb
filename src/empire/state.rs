//! Energy Empire data model and the local game-state store.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch. All expiries are wall-clock.
pub type EpochMs = u64;

/// The player's balances. The authoritative copy lives remotely.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub energy: u64,
    pub rare_resources: u64,
    pub fuel: u64,
    pub yes_tokens: u64,
    pub mini_yes: u64,
}

impl Wallet {
    /// Apply a signed delta, saturating at zero.
    pub fn with_delta(self, delta: &WalletDelta) -> Wallet {
        Wallet {
            energy: saturating_apply(self.energy, delta.energy),
            rare_resources: saturating_apply(self.rare_resources, delta.rare_resources),
            fuel: saturating_apply(self.fuel, delta.fuel),
            ..self
        }
    }

    /// Apply a signed delta, or `None` if any balance would go negative.
    pub fn checked_delta(self, delta: &WalletDelta) -> Option<Wallet> {
        Some(Wallet {
            energy: checked_apply(self.energy, delta.energy)?,
            rare_resources: checked_apply(self.rare_resources, delta.rare_resources)?,
            fuel: checked_apply(self.fuel, delta.fuel)?,
            ..self
        })
    }
}

fn saturating_apply(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta as u64)
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

fn checked_apply(value: u64, delta: i64) -> Option<u64> {
    if delta >= 0 {
        value.checked_add(delta as u64)
    } else {
        value.checked_sub(delta.unsigned_abs())
    }
}

/// A wallet snapshot tagged with the server's mutation counter.
/// Version 0 means the backend does not version its rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedWallet {
    pub wallet: Wallet,
    #[serde(default)]
    pub version: u64,
}

/// Partial wallet update: only `Some` fields are merged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WalletPatch {
    pub energy: Option<u64>,
    pub rare_resources: Option<u64>,
    pub fuel: Option<u64>,
    pub yes_tokens: Option<u64>,
    pub mini_yes: Option<u64>,
}

/// Signed balance changes, used for batched click gains and spends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDelta {
    pub energy: i64,
    pub rare_resources: i64,
    pub fuel: i64,
}

impl WalletDelta {
    pub fn is_zero(&self) -> bool {
        self.energy == 0 && self.rare_resources == 0 && self.fuel == 0
    }

    pub fn merge(&mut self, other: &WalletDelta) {
        self.energy = self.energy.saturating_add(other.energy);
        self.rare_resources = self.rare_resources.saturating_add(other.rare_resources);
        self.fuel = self.fuel.saturating_add(other.fuel);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn name(&self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
        }
    }
}

/// The player's planet. Read-only from the client's side; supplies the
/// percentage bonuses used by the click math.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    pub id: String,
    pub name: String,
    pub rarity: Rarity,
    pub max_tiles: u32,
    pub discovered_tiles: u32,
    pub base_resources_percent: f64,
    pub rare_resources_percent: f64,
    pub buildable_tiles_percent: f64,
    /// Percent added to energy per click.
    pub bonus_energy_production: f64,
    /// Percentage points added to the rare drop chance.
    pub bonus_rare_drop_rate: f64,
    pub tier: u32,
    pub upgrade_cost_fuel: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    /// All tiers in display order.
    pub fn all() -> &'static [Tier] {
        &[Tier::Bronze, Tier::Silver, Tier::Gold, Tier::Platinum]
    }

    pub fn index(&self) -> usize {
        match self {
            Tier::Bronze => 0,
            Tier::Silver => 1,
            Tier::Gold => 2,
            Tier::Platinum => 3,
        }
    }

    pub fn from_index(idx: usize) -> Option<Tier> {
        Tier::all().get(idx).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Bronze => "Bronze Autoclicker",
            Tier::Silver => "Silver Autoclicker",
            Tier::Gold => "Gold Autoclicker",
            Tier::Platinum => "Platinum Autoclicker",
        }
    }

    /// Wire name used by the remote procedures.
    pub fn code(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        }
    }

    pub fn duration_minutes(&self) -> u64 {
        match self {
            Tier::Bronze => 30,
            Tier::Silver => 120,
            Tier::Gold => 480,
            Tier::Platinum => 1440,
        }
    }

    pub fn energy_per_second(&self) -> u64 {
        match self {
            Tier::Bronze => 2,
            Tier::Silver => 5,
            Tier::Gold => 10,
            Tier::Platinum => 20,
        }
    }

    /// Cost in the given currency, or `None` when the tier cannot be paid that way.
    pub fn cost(&self, method: PaymentMethod) -> Option<u64> {
        let cost = match (self, method) {
            (Tier::Bronze, PaymentMethod::Energy) => 500,
            (Tier::Silver, PaymentMethod::Energy) => 2_000,
            (Tier::Gold, PaymentMethod::Energy) => 10_000,
            (Tier::Platinum, PaymentMethod::Fuel) => 1,
            _ => 0,
        };
        (cost > 0).then_some(cost)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Energy,
    Fuel,
}

impl PaymentMethod {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentMethod::Energy => "energy",
            PaymentMethod::Fuel => "fuel",
        }
    }

    /// Balance available in this currency.
    pub fn balance(&self, wallet: &Wallet) -> u64 {
        match self {
            PaymentMethod::Energy => wallet.energy,
            PaymentMethod::Fuel => wallet.fuel,
        }
    }
}

/// A timed passive-income session mirrored from the remote record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutoclickerSession {
    pub id: String,
    pub tier: Tier,
    pub energy_per_second: u64,
    pub started_at: EpochMs,
    pub expires_at: EpochMs,
}

impl AutoclickerSession {
    pub fn is_live(&self, now_ms: EpochMs) -> bool {
        now_ms < self.expires_at
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomEvent {
    pub id: String,
    pub event_type: String,
    pub event_name: String,
    pub event_description: String,
    pub energy_reward: u64,
    pub rare_reward: u64,
    pub fuel_reward: u64,
    pub expires_at: EpochMs,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
}

/// The single mutable snapshot every control reads and writes.
///
/// No validation happens here; callers keep merged values sane. `revision`
/// increases on every mutation so views can tell when something changed.
#[derive(Clone, Debug)]
pub struct GameStore {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub wallet: Wallet,
    pub planet: Option<Planet>,
    pub autoclicker: Option<AutoclickerSession>,
    pub active_event: Option<RandomEvent>,
    pub is_loading: bool,
    pub revision: u64,
}

impl GameStore {
    pub fn new() -> Self {
        Self {
            user_id: None,
            username: None,
            wallet: Wallet::default(),
            planet: None,
            autoclicker: None,
            active_event: None,
            is_loading: true,
            revision: 0,
        }
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn set_user(&mut self, user_id: Option<String>, username: Option<String>) {
        self.user_id = user_id;
        self.username = username;
        self.touch();
    }

    pub fn set_wallet(&mut self, wallet: Wallet) {
        self.wallet = wallet;
        self.touch();
    }

    /// Merge the fields present in `patch`, leaving the rest untouched.
    pub fn update_wallet(&mut self, patch: WalletPatch) {
        let w = &mut self.wallet;
        if let Some(v) = patch.energy {
            w.energy = v;
        }
        if let Some(v) = patch.rare_resources {
            w.rare_resources = v;
        }
        if let Some(v) = patch.fuel {
            w.fuel = v;
        }
        if let Some(v) = patch.yes_tokens {
            w.yes_tokens = v;
        }
        if let Some(v) = patch.mini_yes {
            w.mini_yes = v;
        }
        self.touch();
    }

    /// Optimistic signed adjustment; saturates at zero.
    pub fn apply_delta(&mut self, delta: &WalletDelta) {
        self.wallet = self.wallet.with_delta(delta);
        self.touch();
    }

    pub fn set_planet(&mut self, planet: Option<Planet>) {
        self.planet = planet;
        self.touch();
    }

    pub fn set_autoclicker(&mut self, session: Option<AutoclickerSession>) {
        self.autoclicker = session;
        self.touch();
    }

    pub fn set_active_event(&mut self, event: Option<RandomEvent>) {
        self.active_event = event;
        self.touch();
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
        self.touch();
    }

    pub fn energy_bonus_percent(&self) -> f64 {
        self.planet.as_ref().map_or(0.0, |p| p.bonus_energy_production)
    }

    pub fn rare_bonus_percent(&self) -> f64 {
        self.planet.as_ref().map_or(0.0, |p| p.bonus_rare_drop_rate)
    }
}

/// Inline message shown by user-initiated actions.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: true }
    }
}

/// Activity log entry.
#[derive(Clone, Debug)]
pub struct LogEntry {
    pub text: String,
    pub is_important: bool,
}
