//! 2x click boost. The flag lives only in browser storage; the fuel payment
//! is the one server-validated step.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::logic::{remaining_secs, BOOST_AD_DURATION_MS, BOOST_DURATION_MS, BOOST_FUEL_COST};
use super::state::{EpochMs, GameStore, Notice, WalletDelta};
use crate::remote::Request;
use crate::storage::KeyValueStore;

pub const BOOST_STORAGE_KEY: &str = "boost2x";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostFlag {
    #[serde(rename = "expiresAt")]
    pub expires_at: EpochMs,
}

impl BoostFlag {
    /// The expiry instant itself counts as expired.
    pub fn is_valid(&self, now_ms: EpochMs) -> bool {
        now_ms < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoostError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("boost is already active")]
    AlreadyActive,
    #[error("ad is already playing")]
    AdRunning,
    #[error("payment already in progress")]
    PaymentPending,
    #[error("need 5 Fuel, have {have}")]
    NotEnoughFuel { have: u64 },
}

fn fuel_debit() -> WalletDelta {
    WalletDelta {
        fuel: -(BOOST_FUEL_COST as i64),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
pub struct BoostControl {
    flag: Option<BoostFlag>,
    ad_ends_at: Option<EpochMs>,
    paying: bool,
    pub remaining_secs: u64,
    pub notice: Option<Notice>,
}

impl BoostControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a stored flag; an expired or unreadable one is removed.
    pub fn restore(&mut self, storage: &mut dyn KeyValueStore, now_ms: EpochMs) {
        let Some(raw) = storage.get(BOOST_STORAGE_KEY) else {
            return;
        };
        match serde_json::from_str::<BoostFlag>(&raw) {
            Ok(flag) if flag.is_valid(now_ms) => {
                self.remaining_secs = remaining_secs(flag.expires_at, now_ms);
                self.flag = Some(flag);
            }
            Ok(_) => storage.remove(BOOST_STORAGE_KEY),
            Err(e) => {
                log::warn!("dropping unreadable {BOOST_STORAGE_KEY}: {e}");
                storage.remove(BOOST_STORAGE_KEY);
            }
        }
    }

    /// Whether clicks are doubled at `now_ms`. An expired flag is cleared here.
    pub fn is_active(&mut self, storage: &mut dyn KeyValueStore, now_ms: EpochMs) -> bool {
        match self.flag {
            Some(flag) if flag.is_valid(now_ms) => true,
            Some(_) => {
                self.clear(storage);
                false
            }
            None => false,
        }
    }

    pub fn flag(&self) -> Option<BoostFlag> {
        self.flag
    }

    pub fn ad_remaining_secs(&self, now_ms: EpochMs) -> Option<u64> {
        self.ad_ends_at
            .map(|end| end.saturating_sub(now_ms).div_ceil(1000))
    }

    pub fn is_paying(&self) -> bool {
        self.paying
    }

    fn guard(&self, now_ms: EpochMs) -> Result<(), BoostError> {
        if self.flag.is_some_and(|f| f.is_valid(now_ms)) {
            return Err(BoostError::AlreadyActive);
        }
        if self.ad_ends_at.is_some() {
            return Err(BoostError::AdRunning);
        }
        if self.paying {
            return Err(BoostError::PaymentPending);
        }
        Ok(())
    }

    /// Start the fuel path. The debit is applied only once the server confirms.
    pub fn begin_fuel_payment(&mut self, store: &GameStore, now_ms: EpochMs) -> Result<Request, BoostError> {
        let user_id = store.user_id.clone().ok_or(BoostError::NotSignedIn)?;
        self.guard(now_ms)?;
        if store.wallet.fuel < BOOST_FUEL_COST {
            return Err(BoostError::NotEnoughFuel {
                have: store.wallet.fuel,
            });
        }
        self.paying = true;
        self.notice = None;
        Ok(Request::ApplyWalletDelta {
            user_id,
            delta: fuel_debit(),
        })
    }

    pub fn on_payment_confirmed(&mut self, store: &mut GameStore, storage: &mut dyn KeyValueStore, now_ms: EpochMs) {
        self.paying = false;
        store.apply_delta(&fuel_debit());
        self.activate(storage, now_ms);
        self.notice = Some(Notice::success("2x Boost active for 5 minutes!"));
    }

    pub fn on_payment_failed(&mut self, reason: &str) {
        self.paying = false;
        self.notice = Some(Notice::error(reason));
    }

    /// Start the rewarded ad gate.
    pub fn start_ad(&mut self, now_ms: EpochMs) -> Result<(), BoostError> {
        self.guard(now_ms)?;
        self.ad_ends_at = Some(now_ms + BOOST_AD_DURATION_MS);
        self.notice = None;
        Ok(())
    }

    fn activate(&mut self, storage: &mut dyn KeyValueStore, now_ms: EpochMs) {
        let flag = BoostFlag {
            expires_at: now_ms + BOOST_DURATION_MS,
        };
        match serde_json::to_string(&flag) {
            Ok(json) => {
                if !storage.set(BOOST_STORAGE_KEY, &json) {
                    log::warn!("boost flag not persisted");
                }
            }
            Err(e) => log::warn!("failed to encode boost flag: {e}"),
        }
        self.remaining_secs = remaining_secs(flag.expires_at, now_ms);
        self.flag = Some(flag);
    }

    fn clear(&mut self, storage: &mut dyn KeyValueStore) {
        self.flag = None;
        self.remaining_secs = 0;
        storage.remove(BOOST_STORAGE_KEY);
    }

    /// One-second tick: finishes the ad gate and counts the boost down.
    /// Returns false once there is nothing left to count.
    pub fn tick(&mut self, storage: &mut dyn KeyValueStore, now_ms: EpochMs) -> bool {
        if let Some(end) = self.ad_ends_at {
            if now_ms >= end {
                self.ad_ends_at = None;
                self.activate(storage, now_ms);
                self.notice = Some(Notice::success("Thanks for watching! 2x Boost active."));
            }
        }
        if let Some(flag) = self.flag {
            if flag.is_valid(now_ms) {
                self.remaining_secs = remaining_secs(flag.expires_at, now_ms);
            } else {
                self.clear(storage);
            }
        }
        self.flag.is_some() || self.ad_ends_at.is_some()
    }

    pub fn reset(&mut self) {
        self.paying = false;
        self.ad_ends_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::empire::state::Wallet;
    use crate::storage::MemoryStorage;
    use proptest::prelude::*;

    const NOW: u64 = 1_700_000_000_000;

    fn store_with_fuel(fuel: u64) -> GameStore {
        let mut store = GameStore::new();
        store.set_user(Some("u1".into()), Some("pilot".into()));
        store.set_loading(false);
        store.set_wallet(Wallet { fuel, ..Default::default() });
        store
    }

    #[test]
    fn fuel_path_debits_after_confirmation() {
        let mut storage = MemoryStorage::new();
        let mut store = store_with_fuel(5);
        let mut boost = BoostControl::new();
        let req = boost.begin_fuel_payment(&store, NOW).unwrap();
        assert!(matches!(req, Request::ApplyWalletDelta { delta, .. } if delta.fuel == -5));
        assert_eq!(store.wallet.fuel, 5);

        boost.on_payment_confirmed(&mut store, &mut storage, NOW);
        assert_eq!(store.wallet.fuel, 0);
        let stored: BoostFlag = serde_json::from_str(&storage.get(BOOST_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(stored.expires_at, NOW + 300_000);

        assert!(boost.is_active(&mut storage, NOW + 299_000));
        assert!(!boost.is_active(&mut storage, NOW + 301_000));
        assert!(boost.flag().is_none());
        assert!(storage.get(BOOST_STORAGE_KEY).is_none());
    }

    #[test]
    fn storage_format_is_expires_at() {
        let json = serde_json::to_string(&BoostFlag { expires_at: 42 }).unwrap();
        assert_eq!(json, r#"{"expiresAt":42}"#);
    }

    #[test]
    fn not_enough_fuel_rejected() {
        let store = store_with_fuel(4);
        let mut boost = BoostControl::new();
        assert_eq!(
            boost.begin_fuel_payment(&store, NOW),
            Err(BoostError::NotEnoughFuel { have: 4 })
        );
        assert!(!boost.is_paying());
    }

    #[test]
    fn failed_payment_changes_nothing() {
        let mut storage = MemoryStorage::new();
        let store = store_with_fuel(5);
        let mut boost = BoostControl::new();
        boost.begin_fuel_payment(&store, NOW).unwrap();
        assert_eq!(boost.begin_fuel_payment(&store, NOW), Err(BoostError::PaymentPending));
        boost.on_payment_failed("insufficient funds");
        assert!(!boost.is_active(&mut storage, NOW));
        assert_eq!(store.wallet.fuel, 5);
    }

    #[test]
    fn ad_gate_activates_after_five_seconds() {
        let mut storage = MemoryStorage::new();
        let mut boost = BoostControl::new();
        boost.start_ad(NOW).unwrap();
        assert_eq!(boost.start_ad(NOW), Err(BoostError::AdRunning));
        assert_eq!(boost.ad_remaining_secs(NOW + 1), Some(5));
        assert!(boost.tick(&mut storage, NOW + 4_000));
        assert!(!boost.is_active(&mut storage, NOW + 4_000));
        assert!(boost.tick(&mut storage, NOW + 5_000));
        assert!(boost.is_active(&mut storage, NOW + 5_000));
        assert_eq!(boost.remaining_secs, 300);
        assert_eq!(boost.start_ad(NOW + 6_000), Err(BoostError::AlreadyActive));
    }

    #[test]
    fn countdown_clears_at_expiry() {
        let mut storage = MemoryStorage::new();
        let mut boost = BoostControl::new();
        boost.start_ad(NOW).unwrap();
        boost.tick(&mut storage, NOW + 5_000);
        assert!(boost.tick(&mut storage, NOW + 5_000 + 299_000));
        assert_eq!(boost.remaining_secs, 1);
        assert!(!boost.tick(&mut storage, NOW + 5_000 + 300_000));
        assert!(storage.get(BOOST_STORAGE_KEY).is_none());
    }

    #[test]
    fn restore_keeps_valid_and_drops_expired() {
        let mut storage = MemoryStorage::new();
        storage.set(BOOST_STORAGE_KEY, &format!(r#"{{"expiresAt":{}}}"#, NOW + 60_000));
        let mut boost = BoostControl::new();
        boost.restore(&mut storage, NOW);
        assert!(boost.is_active(&mut storage, NOW));
        assert_eq!(boost.remaining_secs, 60);

        let mut boost = BoostControl::new();
        boost.restore(&mut storage, NOW + 60_000);
        assert!(boost.flag().is_none());
        assert!(storage.get(BOOST_STORAGE_KEY).is_none());
    }

    #[test]
    fn restore_drops_garbage() {
        let mut storage = MemoryStorage::new();
        storage.set(BOOST_STORAGE_KEY, "yes");
        let mut boost = BoostControl::new();
        boost.restore(&mut storage, NOW);
        assert!(boost.flag().is_none());
        assert!(storage.get(BOOST_STORAGE_KEY).is_none());
    }

    proptest! {
        #[test]
        fn validity_is_strictly_before_expiry(expires in 0u64..u64::MAX / 2, now in 0u64..u64::MAX / 2) {
            let flag = BoostFlag { expires_at: expires };
            prop_assert_eq!(flag.is_valid(now), now < expires);
        }
    }
}
