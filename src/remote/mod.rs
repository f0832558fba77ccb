//! Remote store interface: named procedures plus row reads, completed
//! asynchronously through a ticket queue.
//!
//! The game sends a [`Request`] and gets a [`Ticket`] back immediately.
//! Completions are collected with [`RemoteStore::poll`] from the render
//! loop, which is the only suspension point of the client.

pub mod save;
pub mod simulated;

#[cfg(target_arch = "wasm32")]
pub mod http;

use thiserror::Error;

use crate::empire::state::{
    AutoclickerSession, EpochMs, PaymentMethod, Planet, Profile, RandomEvent, Tier,
    VersionedWallet, WalletDelta,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    SignIn { username: String },
    Register { username: String },
    FetchWallet { user_id: String },
    FetchPlanet { user_id: String },
    /// Most recent session that is active and not yet expired.
    FetchActiveSession { user_id: String },
    /// Server-side increment; rejected if any balance would go negative.
    ApplyWalletDelta { user_id: String, delta: WalletDelta },
    ActivateAutoclicker { user_id: String, tier: Tier, payment: PaymentMethod },
    ClaimAutoclickerEnergy { user_id: String },
    CraftFuel { user_id: String, amount: u64 },
    TriggerRandomEvent { user_id: String },
    GenerateStarterPlanet { user_id: String },
}

impl Request {
    /// Procedure or table name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::SignIn { .. } => "sign_in",
            Request::Register { .. } => "register",
            Request::FetchWallet { .. } => "wallets",
            Request::FetchPlanet { .. } => "planets",
            Request::FetchActiveSession { .. } => "autoclicker_sessions",
            Request::ApplyWalletDelta { .. } => "apply_wallet_delta",
            Request::ActivateAutoclicker { .. } => "activate_autoclicker",
            Request::ClaimAutoclickerEnergy { .. } => "claim_autoclicker_energy",
            Request::CraftFuel { .. } => "craft_fuel",
            Request::TriggerRandomEvent { .. } => "trigger_random_event",
            Request::GenerateStarterPlanet { .. } => "generate_starter_planet",
        }
    }
}

/// Result of `activate_autoclicker`.
#[derive(Clone, Debug, PartialEq)]
pub struct Activation {
    pub session_id: String,
    pub tier: Tier,
    pub energy_per_second: u64,
    pub expires_at: EpochMs,
    pub duration_minutes: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Profile(Profile),
    Wallet(VersionedWallet),
    Planet(Option<Planet>),
    Session(Option<AutoclickerSession>),
    WalletUpdated { version: u64 },
    Activated(Activation),
    Claimed { energy_generated: u64 },
    Crafted { fuel: u64 },
    Event(Option<RandomEvent>),
    PlanetGenerated(Planet),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(String),
    #[error("not signed in")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Business-rule rejection (`success: false`).
    #[error("{0}")]
    Rejected(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Classify a non-2xx HTTP answer. Client errors other than auth and
    /// lookups are business rejections (a raised procedure error comes back
    /// as 400 or 409) and carry the server's message. Timeouts, rate limits
    /// and server errors are worth retrying.
    pub fn from_status(status: u16, body: &str) -> RemoteError {
        match status {
            401 | 403 => RemoteError::Unauthorized,
            404 => RemoteError::NotFound("resource"),
            408 | 429 => RemoteError::Network(format!("HTTP {status}")),
            400..=499 => RemoteError::Rejected(rejection_message(status, body)),
            _ => RemoteError::Network(format!("HTTP {status}: {}", body.trim())),
        }
    }
}

fn rejection_message(status: u16, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body).ok().and_then(|v| {
        ["message", "error", "details"]
            .iter()
            .find_map(|key| v.get(*key).and_then(serde_json::Value::as_str).map(str::to_string))
    });
    match from_json {
        Some(message) if !message.is_empty() => message,
        _ if !body.trim().is_empty() && !body.trim_start().starts_with('{') => body.trim().to_string(),
        _ => format!("request rejected (HTTP {status})"),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub ticket: Ticket,
    pub result: Result<Response, RemoteError>,
}

/// The game's only path to authoritative state.
pub trait RemoteStore {
    /// Queue a request; the completion arrives through [`poll`](Self::poll).
    fn send(&mut self, request: Request, now_ms: EpochMs) -> Ticket;

    /// Drain completions that are ready at `now_ms`, in completion order.
    fn poll(&mut self, now_ms: EpochMs) -> Vec<Completion>;
}

/// Issues monotonically increasing tickets.
#[derive(Debug, Default)]
pub struct TicketCounter(u64);

impl TicketCounter {
    pub fn next(&mut self) -> Ticket {
        self.0 += 1;
        Ticket(self.0)
    }
}
