//! Manual clicking: reward math, batching and the human check trigger.

use rand::Rng;

use super::captcha::SliderChallenge;
use super::logic::{challenge_chance, energy_per_click, rare_drop_probability};
use super::state::{GameStore, WalletDelta};

/// What one accepted click did.
#[derive(Clone, Debug, PartialEq)]
pub struct ClickOutcome {
    pub energy: u64,
    pub rare_drop: bool,
    /// Completed batch to queue for the remote write.
    pub batch: Option<WalletDelta>,
    pub trigger_event: bool,
    pub challenge_opened: bool,
}

#[derive(Debug)]
pub struct Clicker {
    pub total_clicks: u64,
    pub clicks_since_check: u64,
    batch: WalletDelta,
    batch_clicks: u64,
    batch_size: u64,
    event_chance: f64,
    pub challenge: Option<SliderChallenge>,
    /// Small "+N" shown next to the button after each click.
    pub last_gain: Option<(u64, bool)>,
}

impl Clicker {
    pub fn new(batch_size: u64, event_chance: f64) -> Self {
        Self {
            total_clicks: 0,
            clicks_since_check: 0,
            batch: WalletDelta::default(),
            batch_clicks: 0,
            batch_size: batch_size.max(1),
            event_chance: event_chance.clamp(0.0, 1.0),
            challenge: None,
            last_gain: None,
        }
    }

    /// Process one click. `None` when clicking is not allowed right now.
    pub fn click(&mut self, store: &mut GameStore, boosted: bool, rng: &mut impl Rng) -> Option<ClickOutcome> {
        if store.user_id.is_none() || store.is_loading || self.challenge.is_some() {
            return None;
        }

        let energy = energy_per_click(store.energy_bonus_percent(), boosted);
        let rare_drop = rng.random_bool(rare_drop_probability(store.rare_bonus_percent()));
        let gained = WalletDelta {
            energy: energy as i64,
            rare_resources: i64::from(rare_drop),
            fuel: 0,
        };
        store.apply_delta(&gained);
        self.last_gain = Some((energy, rare_drop));

        self.total_clicks += 1;
        self.batch.merge(&gained);
        self.batch_clicks += 1;
        let batch = if self.batch_clicks >= self.batch_size {
            self.batch_clicks = 0;
            Some(std::mem::take(&mut self.batch))
        } else {
            None
        };

        let trigger_event = rng.random_bool(self.event_chance);

        self.clicks_since_check += 1;
        let challenge_opened = rng.random_bool(challenge_chance(self.clicks_since_check));
        if challenge_opened {
            self.clicks_since_check = 0;
            self.challenge = Some(SliderChallenge::new());
        }

        Some(ClickOutcome {
            energy,
            rare_drop,
            batch,
            trigger_event,
            challenge_opened,
        })
    }

    /// Gains not yet handed to the sync queue.
    pub fn unbatched(&self) -> WalletDelta {
        self.batch
    }

    /// Hand over a partial batch, e.g. before signing out.
    pub fn flush(&mut self) -> Option<WalletDelta> {
        self.batch_clicks = 0;
        let batch = std::mem::take(&mut self.batch);
        (!batch.is_zero()).then_some(batch)
    }

    pub fn close_challenge(&mut self) {
        self.challenge = None;
        self.clicks_since_check = 0;
    }
}
