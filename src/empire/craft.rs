//! Fuel crafting: 100 Energy + 10 Rare per Fuel.

use thiserror::Error;

use super::logic::{can_craft, craft_cost, max_craftable};
use super::state::{GameStore, Notice, WalletDelta};
use crate::remote::Request;

/// How long a craft result stays on screen.
pub const NOTICE_CLEAR_MS: u64 = 3_000;
const MAX_AMOUNT: u64 = 9_999;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CraftError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("amount must be at least 1")]
    InvalidAmount,
    #[error("crafting already in progress")]
    InProgress,
    #[error("need {energy} Energy and {rare} Rare")]
    Insufficient { energy: u64, rare: u64 },
}

#[derive(Debug)]
pub struct CraftControl {
    pub amount: u64,
    in_flight: Option<u64>,
    pub notice: Option<Notice>,
}

impl CraftControl {
    pub fn new() -> Self {
        Self {
            amount: 1,
            in_flight: None,
            notice: None,
        }
    }

    pub fn is_crafting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn increment(&mut self) {
        self.amount = (self.amount + 1).min(MAX_AMOUNT);
    }

    pub fn decrement(&mut self) {
        self.amount = self.amount.saturating_sub(1).max(1);
    }

    pub fn set_max(&mut self, store: &GameStore) {
        self.amount = max_craftable(&store.wallet).clamp(1, MAX_AMOUNT);
    }

    /// Append a typed digit; a leading zero is dropped.
    pub fn type_digit(&mut self, digit: u32) {
        let typed = self.amount.saturating_mul(10).saturating_add(u64::from(digit));
        self.amount = typed.clamp(1, MAX_AMOUNT);
    }

    pub fn backspace(&mut self) {
        self.amount = (self.amount / 10).max(1);
    }

    /// Validate and build the craft request. A refusal touches nothing.
    pub fn begin(&mut self, store: &GameStore) -> Result<Request, CraftError> {
        let user_id = store.user_id.clone().ok_or(CraftError::NotSignedIn)?;
        if self.amount == 0 {
            return Err(CraftError::InvalidAmount);
        }
        if self.in_flight.is_some() {
            return Err(CraftError::InProgress);
        }
        if !can_craft(&store.wallet, self.amount) {
            let cost = craft_cost(self.amount);
            return Err(CraftError::Insufficient {
                energy: cost.energy,
                rare: cost.rare_resources,
            });
        }
        self.in_flight = Some(self.amount);
        self.notice = None;
        Ok(Request::CraftFuel {
            user_id,
            amount: self.amount,
        })
    }

    pub fn on_crafted(&mut self, store: &mut GameStore, fuel: u64) {
        let amount = self.in_flight.take().unwrap_or(fuel);
        let cost = craft_cost(amount);
        store.apply_delta(&WalletDelta {
            energy: -(cost.energy as i64),
            rare_resources: -(cost.rare_resources as i64),
            fuel: amount as i64,
        });
        self.notice = Some(Notice::success(format!("Successfully crafted {} Fuel!", amount)));
        self.amount = 1;
    }

    pub fn on_failed(&mut self, reason: &str) {
        self.in_flight = None;
        self.notice = Some(Notice::error(reason));
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn reset(&mut self) {
        self.in_flight = None;
    }
}
