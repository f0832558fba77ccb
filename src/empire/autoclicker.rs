//! Timed autoclicker rental: activation guard, periodic claims and the
//! local countdown.

use thiserror::Error;

use super::logic::{format_number, remaining_secs};
use super::state::{AutoclickerSession, EpochMs, GameStore, Notice, PaymentMethod, Tier, WalletDelta};
use crate::remote::{Activation, Request};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActivationError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("an autoclicker is already active")]
    AlreadyActive,
    #[error("activation already in progress")]
    Pending,
    #[error("{tier} cannot be paid with {currency}")]
    UnsupportedPayment { tier: &'static str, currency: &'static str },
    #[error("not enough {currency}: need {needed}, have {have}")]
    Insufficient { currency: &'static str, needed: u64, have: u64 },
}

/// The currency a tier is priced in.
pub fn payment_for(tier: Tier) -> PaymentMethod {
    if tier.cost(PaymentMethod::Energy).is_some() {
        PaymentMethod::Energy
    } else {
        PaymentMethod::Fuel
    }
}

/// `500 Energy`, `1 Fuel`.
pub fn cost_label(tier: Tier) -> String {
    let payment = payment_for(tier);
    let amount = tier.cost(payment).unwrap_or(0);
    match payment {
        PaymentMethod::Energy => format!("{} Energy", format_number(amount)),
        PaymentMethod::Fuel => format!("{} Fuel", amount),
    }
}

#[derive(Debug, Default)]
pub struct AutoclickerControl {
    pending: Option<(Tier, PaymentMethod)>,
    pub claiming: bool,
    pub remaining_secs: u64,
    pub notice: Option<Notice>,
}

impl AutoclickerControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Validate locally and build the activation request.
    pub fn begin_activation(
        &mut self,
        store: &GameStore,
        tier: Tier,
        payment: PaymentMethod,
        now_ms: EpochMs,
    ) -> Result<Request, ActivationError> {
        let user_id = store.user_id.clone().ok_or(ActivationError::NotSignedIn)?;
        if store.autoclicker.as_ref().is_some_and(|s| s.is_live(now_ms)) {
            return Err(ActivationError::AlreadyActive);
        }
        if self.pending.is_some() {
            return Err(ActivationError::Pending);
        }
        let needed = tier.cost(payment).ok_or(ActivationError::UnsupportedPayment {
            tier: tier.name(),
            currency: payment.code(),
        })?;
        let have = payment.balance(&store.wallet);
        if have < needed {
            return Err(ActivationError::Insufficient {
                currency: payment.code(),
                needed,
                have,
            });
        }
        self.pending = Some((tier, payment));
        self.notice = None;
        Ok(Request::ActivateAutoclicker { user_id, tier, payment })
    }

    /// Deduct the cost locally and adopt the new session.
    pub fn on_activated(&mut self, store: &mut GameStore, activation: Activation, now_ms: EpochMs) {
        let payment = match self.pending.take() {
            Some((_, payment)) => payment,
            None => payment_for(activation.tier),
        };
        let cost = activation.tier.cost(payment).unwrap_or(0) as i64;
        let debit = match payment {
            PaymentMethod::Energy => WalletDelta { energy: -cost, ..Default::default() },
            PaymentMethod::Fuel => WalletDelta { fuel: -cost, ..Default::default() },
        };
        store.apply_delta(&debit);
        self.notice = Some(Notice::success(format!(
            "{} activated for {} minutes!",
            activation.tier.name(),
            activation.duration_minutes
        )));
        store.set_autoclicker(Some(AutoclickerSession {
            id: activation.session_id,
            tier: activation.tier,
            energy_per_second: activation.energy_per_second,
            started_at: now_ms,
            expires_at: activation.expires_at,
        }));
        self.remaining_secs = remaining_secs(activation.expires_at, now_ms);
    }

    pub fn on_activation_failed(&mut self, reason: &str) {
        self.pending = None;
        self.notice = Some(Notice::error(reason));
    }

    /// Adopt a session found at load time. Returns whether it is live.
    pub fn adopt(&mut self, store: &mut GameStore, session: Option<AutoclickerSession>, now_ms: EpochMs) -> bool {
        match session {
            Some(s) if s.is_live(now_ms) => {
                self.remaining_secs = remaining_secs(s.expires_at, now_ms);
                store.set_autoclicker(Some(s));
                true
            }
            _ => false,
        }
    }

    pub fn on_claimed(&mut self, store: &mut GameStore, energy_generated: u64) {
        self.claiming = false;
        if energy_generated > 0 {
            store.apply_delta(&WalletDelta {
                energy: energy_generated as i64,
                ..Default::default()
            });
        }
    }

    /// One-second countdown. Returns true when the session just ended.
    pub fn tick_countdown(&mut self, store: &mut GameStore, now_ms: EpochMs) -> bool {
        let Some(session) = store.autoclicker.as_ref() else {
            return false;
        };
        self.remaining_secs = remaining_secs(session.expires_at, now_ms);
        if self.remaining_secs == 0 {
            store.set_autoclicker(None);
            self.claiming = false;
            return true;
        }
        false
    }

    /// Forget in-flight work after a teardown.
    pub fn reset(&mut self) {
        self.pending = None;
        self.claiming = false;
    }
}
