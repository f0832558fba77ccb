//! Energy Empire dashboard.
//!
//! `EmpireGame` owns the local store, every control, the timer scheduler and
//! the remote. Controls are plain state machines that validate locally and
//! hand back the [`Request`] to send; the game sends it, remembers which
//! control asked (by ticket), and routes the completion back. Tearing a
//! control down cancels its timers and forgets its tickets, so a late
//! completion finds no route and is dropped.

pub mod actions;
pub mod autoclicker;
pub mod boost;
pub mod captcha;
pub mod clicker;
pub mod craft;
pub mod logic;
pub mod render;
pub mod state;
pub mod sync;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rand::rngs::StdRng;
use ratzilla::ratatui::layout::Rect;
use ratzilla::ratatui::Frame;

use crate::config::Tuning;
use crate::input::{ClickState, InputEvent, KEY_BACKSPACE, KEY_ENTER, KEY_ESC, KEY_LEFT, KEY_RIGHT, KEY_TAB};
use crate::remote::{RemoteError, RemoteStore, Request, Response, Ticket};
use crate::storage::KeyValueStore;
use crate::time::{Owner, TimerKind, Timers};

use autoclicker::{payment_for, AutoclickerControl};
use boost::BoostControl;
use captcha::{ChallengeResult, RELOAD_DELAY_MS};
use clicker::Clicker;
use craft::{CraftControl, NOTICE_CLEAR_MS};
use state::{EpochMs, GameStore, LogEntry, Notice, Tier};
use sync::{SyncIndicator, SyncQueue};

const MAX_LOG: usize = 50;
const STATUS_TICK_MS: u64 = 1_000;
const COUNTDOWN_MS: u64 = 1_000;
const SLIDER_STEP: f64 = 0.05;

/// Everything the game needs from the host.
pub struct Services {
    pub remote: Box<dyn RemoteStore>,
    pub storage: Box<dyn KeyValueStore>,
    pub rng: StdRng,
    /// Connectivity probe, polled once per status tick.
    pub online: fn() -> bool,
}

/// Which panel the narrow layout shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tab {
    Clicker,
    Autoclicker,
    Craft,
}

/// Requests to the host that outlive the game.
#[derive(Clone, Debug, PartialEq)]
pub enum Signal {
    /// Human check failed; rebuild from scratch.
    Reload,
    /// Back to the sign-in screen, with an optional message.
    SignedOut(Option<String>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Pending {
    SignIn { register: bool },
    GeneratePlanet,
    LoadWallet,
    LoadPlanet,
    LoadSession,
    Resync { stamp: u64 },
    SyncWrite,
    RandomEvent,
    Activate,
    Claim,
    Craft,
    BoostPayment,
}

impl Pending {
    /// Server mutations confirmed outside the sync queue.
    fn changes_wallet(&self) -> bool {
        matches!(self, Pending::Craft | Pending::Activate | Pending::Claim | Pending::BoostPayment)
    }
}

#[derive(Clone, Copy, Debug)]
struct Route {
    owner: Owner,
    pending: Pending,
}

fn unexpected(response: &Response) -> RemoteError {
    RemoteError::Decode(format!("unexpected response {response:?}"))
}

pub struct EmpireGame {
    pub store: GameStore,
    pub clicker: Clicker,
    pub autoclicker: AutoclickerControl,
    pub boost: BoostControl,
    pub craft: CraftControl,
    pub sync: SyncQueue,
    pub indicator: SyncIndicator,
    pub log: Vec<LogEntry>,
    pub tab: Tab,
    pub now_ms: EpochMs,
    timers: Timers,
    routes: HashMap<Ticket, Route>,
    services: Services,
    tuning: Tuning,
    signal: Option<Signal>,
}

impl EmpireGame {
    /// Start a session: send the sign-in (or registration) and restore the
    /// boost flag. The dashboard loads once the profile arrives.
    pub fn sign_in(services: Services, tuning: Tuning, username: &str, register: bool, now_ms: EpochMs) -> Self {
        let mut game = Self {
            store: GameStore::new(),
            clicker: Clicker::new(tuning.sync_batch_clicks, tuning.random_event_chance),
            autoclicker: AutoclickerControl::new(),
            boost: BoostControl::new(),
            craft: CraftControl::new(),
            sync: SyncQueue::new(tuning.sync_queue_capacity),
            indicator: SyncIndicator::new(),
            log: Vec::new(),
            tab: Tab::Clicker,
            now_ms,
            timers: Timers::new(),
            routes: HashMap::new(),
            services,
            tuning,
            signal: None,
        };
        game.boost.restore(game.services.storage.as_mut(), now_ms);
        let request = if register {
            Request::Register { username: username.to_string() }
        } else {
            Request::SignIn { username: username.to_string() }
        };
        game.send(Owner::Dashboard, Pending::SignIn { register }, request);
        game
    }

    pub fn take_signal(&mut self) -> Option<Signal> {
        self.signal.take()
    }

    /// Hand the services back once the game is dropped.
    pub fn shutdown(mut self) -> Services {
        self.timers.cancel_all();
        self.routes.clear();
        self.services
    }

    pub fn in_flight(&self) -> usize {
        self.routes.len()
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn push_log(&mut self, text: impl Into<String>, is_important: bool) {
        self.log.push(LogEntry {
            text: text.into(),
            is_important,
        });
        if self.log.len() > MAX_LOG {
            let excess = self.log.len() - MAX_LOG;
            self.log.drain(..excess);
        }
    }

    fn send(&mut self, owner: Owner, pending: Pending, request: Request) -> Ticket {
        log::debug!("-> {}", request.name());
        let ticket = self.services.remote.send(request, self.now_ms);
        self.routes.insert(ticket, Route { owner, pending });
        ticket
    }

    fn is_pending(&self, pred: impl Fn(&Pending) -> bool) -> bool {
        self.routes.values().any(|r| pred(&r.pending))
    }

    /// Cancel an owner's timers and forget its in-flight requests.
    fn teardown(&mut self, owner: Owner) {
        self.timers.cancel_owner(owner);
        self.routes.retain(|_, r| r.owner != owner);
        match owner {
            Owner::Autoclicker => self.autoclicker.reset(),
            Owner::Boost => self.boost.reset(),
            Owner::Craft => self.craft.reset(),
            Owner::Sync => self.sync.abandon_write(),
            Owner::Dashboard | Owner::Clicker => {}
        }
    }

    /// Sign out: push unsent gains one last time, then tear everything down.
    pub fn sign_out(&mut self) {
        if let Some(batch) = self.clicker.flush() {
            self.sync.push(batch);
        }
        let unsent = self.sync.unsent_total();
        if let Some(user_id) = self.store.user_id.clone() {
            if !unsent.is_zero() {
                // Fire and forget; nobody is left to route the answer to.
                self.services
                    .remote
                    .send(Request::ApplyWalletDelta { user_id, delta: unsent }, self.now_ms);
            }
        }
        for owner in [Owner::Autoclicker, Owner::Boost, Owner::Craft, Owner::Sync, Owner::Clicker, Owner::Dashboard] {
            self.teardown(owner);
        }
        log::info!("signed out");
        self.signal = Some(Signal::SignedOut(None));
    }

    fn start_dashboard(&mut self) {
        let now = self.now_ms;
        self.timers
            .every(Owner::Dashboard, TimerKind::WalletResync, self.tuning.wallet_resync_ms, now);
        self.timers
            .every(Owner::Dashboard, TimerKind::StatusTick, STATUS_TICK_MS, now);
        self.timers
            .every(Owner::Sync, TimerKind::SyncDrain, self.tuning.sync_drain_ms, now);
        if self.boost.flag().is_some() {
            self.ensure_boost_timer();
        }
    }

    fn load(&mut self) {
        let Some(user_id) = self.store.user_id.clone() else {
            return;
        };
        self.send(Owner::Dashboard, Pending::LoadWallet, Request::FetchWallet { user_id: user_id.clone() });
        self.send(Owner::Dashboard, Pending::LoadPlanet, Request::FetchPlanet { user_id: user_id.clone() });
        self.send(Owner::Dashboard, Pending::LoadSession, Request::FetchActiveSession { user_id });
        self.start_dashboard();
    }

    fn start_autoclicker_timers(&mut self) {
        let now = self.now_ms;
        self.timers.cancel_owner(Owner::Autoclicker);
        self.timers.every(
            Owner::Autoclicker,
            TimerKind::AutoclickerClaim,
            self.tuning.autoclicker_claim_ms,
            now,
        );
        self.timers
            .every(Owner::Autoclicker, TimerKind::AutoclickerCountdown, COUNTDOWN_MS, now);
    }

    fn ensure_boost_timer(&mut self) {
        if !self.timers.has_kind(TimerKind::BoostCountdown) {
            self.timers
                .every(Owner::Boost, TimerKind::BoostCountdown, COUNTDOWN_MS, self.now_ms);
        }
    }

    /// Advance to `now_ms`: route completions, then fire due timers.
    pub fn tick(&mut self, now_ms: EpochMs) {
        self.now_ms = now_ms;
        for completion in self.services.remote.poll(now_ms) {
            match self.routes.remove(&completion.ticket) {
                Some(route) => self.complete(route.pending, completion.result),
                None => log::debug!("dropping completion for {:?}", completion.ticket),
            }
        }
        for (handle, kind) in self.timers.due(now_ms) {
            if self.timers.is_live(handle) {
                self.fire(kind);
            }
        }
    }

    fn fire(&mut self, kind: TimerKind) {
        let Some(user_id) = self.store.user_id.clone() else {
            return;
        };
        match kind {
            TimerKind::WalletResync => {
                if !self.is_pending(|p| matches!(p, Pending::Resync { .. } | Pending::LoadWallet)) {
                    let stamp = self.sync.resync_stamp();
                    self.send(Owner::Dashboard, Pending::Resync { stamp }, Request::FetchWallet { user_id });
                }
            }
            TimerKind::SyncDrain => {
                if let Some(delta) = self.sync.next_write() {
                    self.send(Owner::Sync, Pending::SyncWrite, Request::ApplyWalletDelta { user_id, delta });
                }
            }
            TimerKind::StatusTick => {
                let online = (self.services.online)();
                if self.indicator.set_online(online) {
                    let text = if online { "Back online" } else { "Connection lost" };
                    self.push_log(text, !online);
                }
                let expired = self
                    .store
                    .active_event
                    .as_ref()
                    .is_some_and(|e| e.expires_at <= self.now_ms);
                if expired {
                    self.store.set_active_event(None);
                }
            }
            TimerKind::AutoclickerClaim => {
                if self.store.autoclicker.is_some() && !self.autoclicker.claiming {
                    self.autoclicker.claiming = true;
                    self.send(Owner::Autoclicker, Pending::Claim, Request::ClaimAutoclickerEnergy { user_id });
                }
            }
            TimerKind::AutoclickerCountdown => {
                if self.autoclicker.tick_countdown(&mut self.store, self.now_ms) {
                    self.teardown(Owner::Autoclicker);
                    self.push_log("Autoclicker session ended", true);
                }
            }
            TimerKind::BoostCountdown => {
                let was_active = self.boost.flag().is_some();
                let running = self.boost.tick(self.services.storage.as_mut(), self.now_ms);
                if was_active && self.boost.flag().is_none() {
                    self.push_log("2x Boost expired", false);
                }
                if !running {
                    self.timers.cancel_owner(Owner::Boost);
                }
            }
            TimerKind::CraftNoticeClear => self.craft.clear_notice(),
            TimerKind::ForceReload => {
                log::warn!("human check failed, reloading");
                self.signal = Some(Signal::Reload);
            }
        }
    }

    fn complete(&mut self, pending: Pending, result: Result<Response, RemoteError>) {
        let now = self.now_ms;
        match pending {
            Pending::SignIn { register } => match result {
                Ok(Response::Profile(profile)) => {
                    log::info!("signed in as {}", profile.username);
                    self.push_log(format!("Welcome, {}!", profile.username), true);
                    let user_id = profile.id.clone();
                    self.store.set_user(Some(profile.id), Some(profile.username));
                    if register {
                        self.send(Owner::Dashboard, Pending::GeneratePlanet, Request::GenerateStarterPlanet { user_id });
                    }
                    self.load();
                }
                other => {
                    let err = match other {
                        Ok(r) => unexpected(&r),
                        Err(e) => e,
                    };
                    log::warn!("sign-in failed: {err}");
                    let message = match err {
                        RemoteError::Unauthorized => "Unknown username. Create an account first.".to_string(),
                        e => e.to_string(),
                    };
                    self.signal = Some(Signal::SignedOut(Some(message)));
                }
            },
            Pending::GeneratePlanet => match result {
                Ok(Response::PlanetGenerated(planet)) => {
                    self.push_log(
                        format!("Discovered {} planet {}!", planet.rarity.name(), planet.name),
                        true,
                    );
                    self.store.set_planet(Some(planet));
                }
                Ok(other) => log::warn!("planet generation: {}", unexpected(&other)),
                Err(e) => log::warn!("planet generation failed: {e}"),
            },
            Pending::LoadWallet => {
                match result {
                    Ok(Response::Wallet(snapshot)) => {
                        let stamp = self.sync.resync_stamp();
                        if let Some(wallet) = self.sync.reconcile(stamp, false, snapshot, now) {
                            self.store.set_wallet(wallet.with_delta(&self.clicker.unbatched()));
                        }
                    }
                    Ok(other) => log::error!("wallet load: {}", unexpected(&other)),
                    Err(e) => {
                        log::error!("wallet load failed: {e}");
                        self.push_log(format!("Failed to load wallet: {e}"), true);
                    }
                }
                self.store.set_loading(false);
            }
            Pending::LoadPlanet => match result {
                Ok(Response::Planet(Some(planet))) => self.store.set_planet(Some(planet)),
                Ok(Response::Planet(None)) => log::info!("no planet yet"),
                Ok(other) => log::warn!("planet load: {}", unexpected(&other)),
                Err(e) => log::warn!("planet load failed: {e}"),
            },
            Pending::LoadSession => match result {
                Ok(Response::Session(session)) => {
                    if self.autoclicker.adopt(&mut self.store, session, now) {
                        self.start_autoclicker_timers();
                        self.push_log("Autoclicker resumed", false);
                    }
                }
                Ok(other) => log::warn!("session load: {}", unexpected(&other)),
                Err(e) => log::warn!("session load failed: {e}"),
            },
            Pending::Resync { stamp } => match result {
                Ok(Response::Wallet(snapshot)) => {
                    let outside = self.is_pending(Pending::changes_wallet);
                    match self.sync.reconcile(stamp, outside, snapshot, now) {
                        Some(wallet) => self.store.set_wallet(wallet.with_delta(&self.clicker.unbatched())),
                        None => log::debug!("discarding stale wallet snapshot"),
                    }
                }
                Ok(other) => log::warn!("resync: {}", unexpected(&other)),
                Err(e) => log::warn!("resync failed: {e}"),
            },
            Pending::SyncWrite => match result {
                Ok(Response::WalletUpdated { version }) => self.sync.on_write_ok(version, now),
                Err(RemoteError::Rejected(reason)) => {
                    log::error!("wallet write rejected, dropping it: {reason}");
                    self.sync.on_write_rejected();
                }
                Ok(other) => {
                    log::warn!("wallet write: {}", unexpected(&other));
                    self.sync.on_write_failed();
                }
                Err(e) => {
                    log::warn!("wallet write failed, will retry: {e}");
                    self.sync.on_write_failed();
                }
            },
            Pending::RandomEvent => match result {
                Ok(Response::Event(Some(event))) => {
                    self.push_log(format!("{}: {}", event.event_name, event.event_description), true);
                    self.store.set_active_event(Some(event));
                }
                Ok(Response::Event(None)) => {}
                Ok(other) => log::warn!("random event: {}", unexpected(&other)),
                Err(e) => log::warn!("random event failed: {e}"),
            },
            Pending::Activate => match result {
                Ok(Response::Activated(activation)) => {
                    let name = activation.tier.name();
                    self.autoclicker.on_activated(&mut self.store, activation, now);
                    self.sync.note_confirmed_mutation(0);
                    self.start_autoclicker_timers();
                    self.push_log(format!("{name} activated"), true);
                }
                other => {
                    let err = match other {
                        Ok(r) => unexpected(&r),
                        Err(e) => e,
                    };
                    log::warn!("activation failed: {err}");
                    self.autoclicker.on_activation_failed(&err.to_string());
                }
            },
            Pending::Claim => match result {
                Ok(Response::Claimed { energy_generated }) => {
                    self.autoclicker.on_claimed(&mut self.store, energy_generated);
                    self.sync.note_confirmed_mutation(0);
                    if energy_generated > 0 {
                        self.push_log(format!("Autoclicker generated {energy_generated} Energy"), false);
                    }
                }
                other => {
                    self.autoclicker.claiming = false;
                    match other {
                        Ok(r) => log::warn!("claim: {}", unexpected(&r)),
                        Err(e) => log::warn!("claim failed: {e}"),
                    }
                }
            },
            Pending::Craft => match result {
                Ok(Response::Crafted { fuel }) => {
                    self.craft.on_crafted(&mut self.store, fuel);
                    self.sync.note_confirmed_mutation(0);
                    self.timers
                        .once(Owner::Craft, TimerKind::CraftNoticeClear, NOTICE_CLEAR_MS, now);
                    self.push_log(format!("Crafted {fuel} Fuel"), false);
                }
                other => {
                    let err = match other {
                        Ok(r) => unexpected(&r),
                        Err(e) => e,
                    };
                    log::warn!("craft failed: {err}");
                    self.craft.on_failed(&err.to_string());
                }
            },
            Pending::BoostPayment => match result {
                Ok(Response::WalletUpdated { version }) => {
                    self.boost
                        .on_payment_confirmed(&mut self.store, self.services.storage.as_mut(), now);
                    self.sync.note_confirmed_mutation(version);
                    self.ensure_boost_timer();
                    self.push_log("2x Boost activated", true);
                }
                other => {
                    let err = match other {
                        Ok(r) => unexpected(&r),
                        Err(e) => e,
                    };
                    log::warn!("boost payment failed: {err}");
                    self.boost.on_payment_failed(&err.to_string());
                }
            },
        }
    }

    // ── user actions ──────────────────────────────────────────

    fn click_energy(&mut self) -> bool {
        let boosted = self.boost.is_active(self.services.storage.as_mut(), self.now_ms);
        let Some(outcome) = self.clicker.click(&mut self.store, boosted, &mut self.services.rng) else {
            return false;
        };
        if let Some(batch) = outcome.batch {
            self.sync.push(batch);
        }
        if outcome.trigger_event && !self.is_pending(|p| *p == Pending::RandomEvent) {
            if let Some(user_id) = self.store.user_id.clone() {
                self.send(Owner::Clicker, Pending::RandomEvent, Request::TriggerRandomEvent { user_id });
            }
        }
        if outcome.challenge_opened {
            self.push_log("Verification required: slide to continue", true);
        }
        true
    }

    fn activate_tier(&mut self, index: usize) -> bool {
        let Some(tier) = Tier::from_index(index) else {
            return false;
        };
        match self
            .autoclicker
            .begin_activation(&self.store, tier, payment_for(tier), self.now_ms)
        {
            Ok(request) => {
                self.send(Owner::Autoclicker, Pending::Activate, request);
            }
            Err(e) => self.autoclicker.notice = Some(Notice::error(e.to_string())),
        }
        true
    }

    fn boost_with_fuel(&mut self) -> bool {
        match self.boost.begin_fuel_payment(&self.store, self.now_ms) {
            Ok(request) => {
                self.send(Owner::Boost, Pending::BoostPayment, request);
            }
            Err(e) => self.boost.notice = Some(Notice::error(e.to_string())),
        }
        true
    }

    fn boost_with_ad(&mut self) -> bool {
        match self.boost.start_ad(self.now_ms) {
            Ok(()) => self.ensure_boost_timer(),
            Err(e) => self.boost.notice = Some(Notice::error(e.to_string())),
        }
        true
    }

    fn submit_craft(&mut self) -> bool {
        match self.craft.begin(&self.store) {
            Ok(request) => {
                self.send(Owner::Craft, Pending::Craft, request);
            }
            Err(e) => self.craft.notice = Some(Notice::error(e.to_string())),
        }
        true
    }

    fn release_slider(&mut self) {
        let Some(challenge) = self.clicker.challenge.as_mut() else {
            return;
        };
        if challenge.failed {
            return;
        }
        match challenge.release() {
            ChallengeResult::Passed => {
                self.clicker.close_challenge();
                self.push_log("Verification passed", false);
            }
            ChallengeResult::Retry { attempts_left } => {
                self.push_log(format!("Verification failed, {attempts_left} attempts left"), false);
            }
            ChallengeResult::Failed => {
                self.push_log("Verification failed. Reloading...", true);
                self.timers
                    .once(Owner::Clicker, TimerKind::ForceReload, RELOAD_DELAY_MS, self.now_ms);
            }
        }
    }

    /// The slider modal captures all input while open.
    fn handle_challenge_input(&mut self, event: &InputEvent) -> bool {
        let Some(challenge) = self.clicker.challenge.as_mut() else {
            return false;
        };
        match event {
            InputEvent::Click(actions::SLIDER_HANDLE) => challenge.grab(),
            InputEvent::Drag { fraction } => challenge.drag_to(*fraction),
            InputEvent::Release => {
                if challenge.dragging {
                    self.release_slider();
                }
            }
            InputEvent::Key(KEY_LEFT) | InputEvent::Key('h') => challenge.nudge(-SLIDER_STEP),
            InputEvent::Key(KEY_RIGHT) | InputEvent::Key('l') => challenge.nudge(SLIDER_STEP),
            InputEvent::Key(KEY_ENTER) | InputEvent::Key(' ') => self.release_slider(),
            _ => {}
        }
        true
    }

    fn handle_key(&mut self, key: char) -> bool {
        match key {
            ' ' | 'c' => self.click_energy(),
            'q' => self.activate_tier(0),
            'w' => self.activate_tier(1),
            'e' => self.activate_tier(2),
            'r' => self.activate_tier(3),
            'b' => self.boost_with_fuel(),
            'v' => self.boost_with_ad(),
            '+' | '=' => {
                self.craft.increment();
                true
            }
            '-' => {
                self.craft.decrement();
                true
            }
            'm' => {
                self.craft.set_max(&self.store);
                true
            }
            'f' | KEY_ENTER => self.submit_craft(),
            KEY_BACKSPACE => {
                self.craft.backspace();
                true
            }
            d if d.is_ascii_digit() => {
                self.craft.type_digit(d.to_digit(10).unwrap_or(0));
                true
            }
            'x' => {
                self.store.set_active_event(None);
                true
            }
            KEY_TAB => {
                self.tab = match self.tab {
                    Tab::Clicker => Tab::Autoclicker,
                    Tab::Autoclicker => Tab::Craft,
                    Tab::Craft => Tab::Clicker,
                };
                true
            }
            KEY_ESC => {
                self.sign_out();
                true
            }
            _ => false,
        }
    }

    fn handle_click(&mut self, id: u16) -> bool {
        use actions::*;
        match id {
            CLICK_ENERGY => self.click_energy(),
            DISMISS_EVENT => {
                self.store.set_active_event(None);
                true
            }
            TAB_CLICKER => {
                self.tab = Tab::Clicker;
                true
            }
            TAB_AUTOCLICKER => {
                self.tab = Tab::Autoclicker;
                true
            }
            TAB_CRAFT => {
                self.tab = Tab::Craft;
                true
            }
            id if (ACTIVATE_TIER_BASE..ACTIVATE_TIER_BASE + 4).contains(&id) => {
                self.activate_tier((id - ACTIVATE_TIER_BASE) as usize)
            }
            BOOST_WITH_FUEL => self.boost_with_fuel(),
            BOOST_WATCH_AD => self.boost_with_ad(),
            CRAFT_DECREMENT => {
                self.craft.decrement();
                true
            }
            CRAFT_INCREMENT => {
                self.craft.increment();
                true
            }
            CRAFT_MAX => {
                self.craft.set_max(&self.store);
                true
            }
            CRAFT_SUBMIT => self.submit_craft(),
            SIGN_OUT => {
                self.sign_out();
                true
            }
            _ => false,
        }
    }

    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        if self.clicker.challenge.is_some() {
            return self.handle_challenge_input(event);
        }
        // The ad plays in a modal; only leaving the session gets through.
        if self.boost.ad_remaining_secs(self.now_ms).is_some() {
            return match event {
                InputEvent::Key(KEY_ESC) | InputEvent::Click(actions::SIGN_OUT) => {
                    self.sign_out();
                    true
                }
                _ => true,
            };
        }
        match event {
            InputEvent::Key(c) => self.handle_key(*c),
            InputEvent::Click(id) => self.handle_click(*id),
            InputEvent::Drag { .. } | InputEvent::Release => false,
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect, click_state: &Rc<RefCell<ClickState>>) {
        render::render(self, f, area, click_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::simulated::SimulatedRemote;
    use crate::remote::Completion;
    use crate::storage::MemoryStorage;
    use boost::{BoostFlag, BOOST_STORAGE_KEY};
    use rand::SeedableRng;
    use state::Wallet;

    const NOW: u64 = 1_700_000_000_000;

    /// Shares the simulated store with the test so it can be inspected.
    struct Shared(Rc<RefCell<SimulatedRemote>>);

    impl RemoteStore for Shared {
        fn send(&mut self, request: Request, now_ms: EpochMs) -> Ticket {
            self.0.borrow_mut().send(request, now_ms)
        }

        fn poll(&mut self, now_ms: EpochMs) -> Vec<Completion> {
            self.0.borrow_mut().poll(now_ms)
        }
    }

    fn tuning() -> Tuning {
        Tuning {
            random_event_chance: 0.0,
            ..Tuning::default()
        }
    }

    /// A registered user without a planet, so clicks pay exactly 1.
    fn remote_with(wallet: Wallet) -> Rc<RefCell<SimulatedRemote>> {
        let mut sim = SimulatedRemote::new(0, 7);
        let Ok(Response::Profile(p)) = sim.db.register("pilot") else {
            panic!("register failed");
        };
        sim.db.wallets.get_mut(&p.id).unwrap().wallet = wallet;
        Rc::new(RefCell::new(sim))
    }

    fn services(remote: &Rc<RefCell<SimulatedRemote>>) -> Services {
        Services {
            remote: Box::new(Shared(Rc::clone(remote))),
            storage: Box::new(MemoryStorage::new()),
            rng: StdRng::seed_from_u64(11),
            online: || true,
        }
    }

    /// Tick until requests sent from completions have come back too.
    fn settle(game: &mut EmpireGame, now: u64) {
        for _ in 0..4 {
            game.tick(now);
        }
    }

    fn signed_in(wallet: Wallet) -> (EmpireGame, Rc<RefCell<SimulatedRemote>>) {
        let remote = remote_with(wallet);
        let mut game = EmpireGame::sign_in(services(&remote), tuning(), "pilot", false, NOW);
        settle(&mut game, NOW);
        assert!(!game.store.is_loading);
        (game, remote)
    }

    fn server_wallet(remote: &Rc<RefCell<SimulatedRemote>>, game: &EmpireGame) -> Wallet {
        let user = game.store.user_id.clone().unwrap();
        remote.borrow().wallet_of(&user).unwrap()
    }

    #[test]
    fn sign_in_loads_wallet() {
        let (game, _) = signed_in(Wallet { energy: 42, ..Default::default() });
        assert_eq!(game.store.username.as_deref(), Some("pilot"));
        assert_eq!(game.store.wallet.energy, 42);
        assert!(game.store.planet.is_none());
        assert!(game.timers().has_kind(TimerKind::WalletResync));
        assert!(game.timers().has_kind(TimerKind::SyncDrain));
    }

    #[test]
    fn unknown_user_signs_out_with_message() {
        let remote = remote_with(Wallet::default());
        let mut game = EmpireGame::sign_in(services(&remote), tuning(), "ghost", false, NOW);
        settle(&mut game, NOW);
        assert!(matches!(game.take_signal(), Some(Signal::SignedOut(Some(_)))));
    }

    #[test]
    fn register_generates_planet() {
        let remote = Rc::new(RefCell::new(SimulatedRemote::new(0, 3)));
        let mut game = EmpireGame::sign_in(services(&remote), tuning(), "newbie", true, NOW);
        settle(&mut game, NOW);
        assert!(game.store.user_id.is_some());
        assert!(game.store.planet.is_some());
        assert!(!game.store.is_loading);
    }

    #[test]
    fn clicks_are_batched_and_synced() {
        let (mut game, remote) = signed_in(Wallet::default());
        for _ in 0..5 {
            game.handle_input(&InputEvent::Key(' '));
        }
        let local = game.store.wallet;
        assert_eq!(local.energy, 5);
        assert_eq!(game.sync.len(), 1);
        settle(&mut game, NOW + 1_000);
        assert!(game.sync.is_empty());
        let server = server_wallet(&remote, &game);
        assert_eq!(server.energy, 5);
        assert_eq!(server.rare_resources, local.rare_resources);
    }

    #[test]
    fn offline_writes_stay_queued_and_retry() {
        let (mut game, remote) = signed_in(Wallet::default());
        remote.borrow_mut().set_offline(true);
        for _ in 0..10 {
            game.handle_input(&InputEvent::Click(actions::CLICK_ENERGY));
        }
        settle(&mut game, NOW + 1_000);
        settle(&mut game, NOW + 2_000);
        assert_eq!(game.sync.len(), 2);
        assert_eq!(game.store.wallet.energy, 10);

        remote.borrow_mut().set_offline(false);
        settle(&mut game, NOW + 3_000);
        settle(&mut game, NOW + 4_000);
        assert!(game.sync.is_empty());
        assert_eq!(server_wallet(&remote, &game).energy, 10);
    }

    /// Answers the first wallet write the way PostgREST reports a raised
    /// procedure error, without touching the server wallet.
    struct RefuseFirstWrite {
        remote: Rc<RefCell<SimulatedRemote>>,
        refused: Option<Ticket>,
        done: bool,
    }

    impl RemoteStore for RefuseFirstWrite {
        fn send(&mut self, request: Request, now_ms: EpochMs) -> Ticket {
            match request {
                Request::ApplyWalletDelta { user_id, .. } if !self.done => {
                    self.done = true;
                    let ticket = self.remote.borrow_mut().send(Request::FetchWallet { user_id }, now_ms);
                    self.refused = Some(ticket);
                    ticket
                }
                other => self.remote.borrow_mut().send(other, now_ms),
            }
        }

        fn poll(&mut self, now_ms: EpochMs) -> Vec<Completion> {
            let mut out = self.remote.borrow_mut().poll(now_ms);
            for completion in &mut out {
                if Some(completion.ticket) == self.refused {
                    completion.result = Err(RemoteError::from_status(
                        400,
                        r#"{"code":"P0001","message":"Balance would go negative"}"#,
                    ));
                }
            }
            out
        }
    }

    #[test]
    fn refused_write_does_not_block_later_batches() {
        let remote = remote_with(Wallet::default());
        let services = Services {
            remote: Box::new(RefuseFirstWrite {
                remote: Rc::clone(&remote),
                refused: None,
                done: false,
            }),
            storage: Box::new(MemoryStorage::new()),
            rng: StdRng::seed_from_u64(11),
            online: || true,
        };
        let mut game = EmpireGame::sign_in(services, tuning(), "pilot", false, NOW);
        settle(&mut game, NOW);

        for _ in 0..5 {
            game.handle_input(&InputEvent::Key(' '));
        }
        settle(&mut game, NOW + 1_000);
        assert!(game.sync.is_empty());
        assert_eq!(server_wallet(&remote, &game).energy, 0);

        for _ in 0..5 {
            game.handle_input(&InputEvent::Key(' '));
        }
        settle(&mut game, NOW + 2_000);
        assert!(game.sync.is_empty());
        assert_eq!(server_wallet(&remote, &game).energy, 5);
    }

    #[test]
    fn resync_reconciles_with_server() {
        let (mut game, remote) = signed_in(Wallet::default());
        let user = game.store.user_id.clone().unwrap();
        remote.borrow_mut().db.wallets.get_mut(&user).unwrap().wallet.yes_tokens = 77;
        settle(&mut game, NOW + 30_000);
        assert_eq!(game.store.wallet.yes_tokens, 77);
    }

    /// Runs crafts at once but holds their answers until released, so a
    /// later wallet read can come back first.
    struct HeldCrafts {
        remote: Rc<RefCell<SimulatedRemote>>,
        crafts: Vec<Ticket>,
        held: Vec<Completion>,
        release: Rc<std::cell::Cell<bool>>,
    }

    impl RemoteStore for HeldCrafts {
        fn send(&mut self, request: Request, now_ms: EpochMs) -> Ticket {
            let is_craft = matches!(request, Request::CraftFuel { .. });
            let ticket = self.remote.borrow_mut().send(request, now_ms);
            if is_craft {
                self.crafts.push(ticket);
            }
            ticket
        }

        fn poll(&mut self, now_ms: EpochMs) -> Vec<Completion> {
            let mut out = Vec::new();
            for completion in self.remote.borrow_mut().poll(now_ms) {
                if self.crafts.contains(&completion.ticket) {
                    self.held.push(completion);
                } else {
                    out.push(completion);
                }
            }
            if self.release.get() {
                out.append(&mut self.held);
            }
            out
        }
    }

    #[test]
    fn resync_answer_overtaking_craft_is_not_applied_twice() {
        let remote = remote_with(Wallet { energy: 1_000, rare_resources: 50, ..Default::default() });
        let release = Rc::new(std::cell::Cell::new(false));
        let services = Services {
            remote: Box::new(HeldCrafts {
                remote: Rc::clone(&remote),
                crafts: Vec::new(),
                held: Vec::new(),
                release: Rc::clone(&release),
            }),
            storage: Box::new(MemoryStorage::new()),
            rng: StdRng::seed_from_u64(11),
            online: || true,
        };
        let mut game = EmpireGame::sign_in(services, tuning(), "pilot", false, NOW);
        settle(&mut game, NOW);

        game.tick(NOW + 29_999);
        game.craft.set_max(&game.store);
        assert_eq!(game.craft.amount, 5);
        game.handle_input(&InputEvent::Click(actions::CRAFT_SUBMIT));
        // The resync fires and its answer arrives while the craft's is held.
        settle(&mut game, NOW + 30_000);
        assert!(game.craft.is_crafting());
        assert_eq!(game.store.wallet.energy, 1_000);

        release.set(true);
        settle(&mut game, NOW + 30_001);
        let w = game.store.wallet;
        assert_eq!((w.energy, w.rare_resources, w.fuel), (500, 0, 5));
        assert_eq!(server_wallet(&remote, &game), w);

        // With nothing in flight the next resync is applied again.
        remote
            .borrow_mut()
            .db
            .wallets
            .get_mut(game.store.user_id.as_deref().unwrap())
            .unwrap()
            .wallet
            .yes_tokens = 3;
        settle(&mut game, NOW + 60_000);
        assert_eq!(game.store.wallet.yes_tokens, 3);
    }

    #[test]
    fn craft_five_end_to_end() {
        let (mut game, remote) = signed_in(Wallet { energy: 1_000, rare_resources: 50, ..Default::default() });
        game.handle_input(&InputEvent::Key('5'));
        assert_eq!(game.craft.amount, 15);
        game.handle_input(&InputEvent::Key(KEY_BACKSPACE));
        game.handle_input(&InputEvent::Click(actions::CRAFT_INCREMENT));
        game.handle_input(&InputEvent::Click(actions::CRAFT_INCREMENT));
        game.handle_input(&InputEvent::Click(actions::CRAFT_INCREMENT));
        game.handle_input(&InputEvent::Click(actions::CRAFT_INCREMENT));
        assert_eq!(game.craft.amount, 5);
        game.handle_input(&InputEvent::Click(actions::CRAFT_SUBMIT));
        settle(&mut game, NOW + 10);

        let w = game.store.wallet;
        assert_eq!((w.energy, w.rare_resources, w.fuel), (500, 0, 5));
        assert_eq!(server_wallet(&remote, &game), w);
        assert_eq!(game.craft.amount, 1);
        assert!(game.craft.notice.is_some());
        settle(&mut game, NOW + 10 + 3_000);
        assert!(game.craft.notice.is_none());
    }

    #[test]
    fn unaffordable_craft_never_reaches_remote() {
        let (mut game, remote) = signed_in(Wallet { energy: 99, rare_resources: 50, ..Default::default() });
        let before = game.store.wallet;
        game.handle_input(&InputEvent::Key('f'));
        settle(&mut game, NOW + 10);
        assert_eq!(remote.borrow().sent_count("craft_fuel"), 0);
        assert_eq!(game.store.wallet, before);
        assert!(game.craft.notice.as_ref().is_some_and(|n| n.is_error));
    }

    #[test]
    fn bronze_activation_and_claims() {
        let (mut game, remote) = signed_in(Wallet { energy: 500, ..Default::default() });
        game.handle_input(&InputEvent::Key('q'));
        settle(&mut game, NOW);
        assert_eq!(game.store.wallet.energy, 0);
        assert!(game.store.autoclicker.is_some());

        settle(&mut game, NOW + 30_000);
        assert_eq!(game.store.wallet.energy, 60);
        assert_eq!(server_wallet(&remote, &game).energy, 60);
    }

    #[test]
    fn second_activation_is_rejected_locally() {
        let (mut game, remote) = signed_in(Wallet { energy: 5_000, ..Default::default() });
        game.handle_input(&InputEvent::Click(actions::ACTIVATE_TIER_BASE));
        settle(&mut game, NOW);
        game.handle_input(&InputEvent::Click(actions::ACTIVATE_TIER_BASE + 1));
        settle(&mut game, NOW);
        assert_eq!(remote.borrow().sent_count("activate_autoclicker"), 1);
        assert_eq!(game.store.wallet.energy, 4_500);
        assert!(game.autoclicker.notice.as_ref().is_some_and(|n| n.is_error));
    }

    #[test]
    fn autoclicker_teardown_at_expiry() {
        let (mut game, _) = signed_in(Wallet { energy: 500, ..Default::default() });
        game.handle_input(&InputEvent::Key('q'));
        settle(&mut game, NOW);
        let end = NOW + 30 * 60_000;
        game.tick(end);
        assert!(game.store.autoclicker.is_none());
        assert!(!game.timers().has_kind(TimerKind::AutoclickerClaim));
        assert!(!game.timers().has_kind(TimerKind::AutoclickerCountdown));
    }

    #[test]
    fn boost_via_fuel_doubles_until_expiry() {
        let (mut game, remote) = signed_in(Wallet { fuel: 5, ..Default::default() });
        game.handle_input(&InputEvent::Key('b'));
        settle(&mut game, NOW);
        assert_eq!(game.store.wallet.fuel, 0);
        assert_eq!(server_wallet(&remote, &game).fuel, 0);
        let raw = game.services.storage.get(BOOST_STORAGE_KEY).unwrap();
        let flag: BoostFlag = serde_json::from_str(&raw).unwrap();
        assert_eq!(flag.expires_at, NOW + 300_000);

        game.tick(NOW + 299_000);
        let before = game.store.wallet.energy;
        game.handle_input(&InputEvent::Key('c'));
        assert_eq!(game.store.wallet.energy - before, 2);

        game.tick(NOW + 301_000);
        let before = game.store.wallet.energy;
        game.handle_input(&InputEvent::Key('c'));
        assert_eq!(game.store.wallet.energy - before, 1);
        assert!(game.services.storage.get(BOOST_STORAGE_KEY).is_none());
    }

    #[test]
    fn boost_without_fuel_makes_no_call() {
        let (mut game, remote) = signed_in(Wallet { fuel: 4, ..Default::default() });
        let writes = remote.borrow().sent_count("apply_wallet_delta");
        game.handle_input(&InputEvent::Click(actions::BOOST_WITH_FUEL));
        assert_eq!(remote.borrow().sent_count("apply_wallet_delta"), writes);
        assert!(game.boost.notice.as_ref().is_some_and(|n| n.is_error));
    }

    #[test]
    fn ad_boost_after_gate() {
        let (mut game, _) = signed_in(Wallet::default());
        game.handle_input(&InputEvent::Key('v'));
        // Clicks are swallowed by the ad modal.
        game.handle_input(&InputEvent::Key('c'));
        assert_eq!(game.store.wallet.energy, 0);
        game.tick(NOW + 5_000);
        assert!(game.boost.flag().is_some());
        game.handle_input(&InputEvent::Key('c'));
        assert_eq!(game.store.wallet.energy, 2);
    }

    #[test]
    fn failed_challenge_forces_reload() {
        let (mut game, _) = signed_in(Wallet::default());
        game.clicker.challenge = Some(captcha::SliderChallenge::new());
        for _ in 0..3 {
            game.handle_input(&InputEvent::Click(actions::SLIDER_HANDLE));
            game.handle_input(&InputEvent::Drag { fraction: 0.5 });
            game.handle_input(&InputEvent::Release);
        }
        game.tick(NOW + 1_000);
        assert_eq!(game.take_signal(), None);
        game.tick(NOW + 2_000);
        assert_eq!(game.take_signal(), Some(Signal::Reload));
    }

    #[test]
    fn passed_challenge_resumes_clicking() {
        let (mut game, _) = signed_in(Wallet::default());
        game.clicker.challenge = Some(captcha::SliderChallenge::new());
        game.handle_input(&InputEvent::Key('c'));
        assert_eq!(game.store.wallet.energy, 0);
        game.handle_input(&InputEvent::Click(actions::SLIDER_HANDLE));
        game.handle_input(&InputEvent::Drag { fraction: 0.9 });
        game.handle_input(&InputEvent::Release);
        assert!(game.clicker.challenge.is_none());
        game.handle_input(&InputEvent::Key('c'));
        assert_eq!(game.store.wallet.energy, 1);
    }

    #[test]
    fn sign_out_tears_everything_down_and_flushes() {
        let (mut game, remote) = signed_in(Wallet { energy: 500, ..Default::default() });
        game.handle_input(&InputEvent::Key('q'));
        settle(&mut game, NOW);
        game.handle_input(&InputEvent::Key('c'));
        game.handle_input(&InputEvent::Key('c'));
        game.handle_input(&InputEvent::Key(KEY_ESC));
        assert_eq!(game.take_signal(), Some(Signal::SignedOut(None)));
        assert_eq!(game.timers().len(), 0);
        assert_eq!(game.in_flight(), 0);

        // Late completions after teardown touch nothing.
        let wallet = game.store.wallet;
        settle(&mut game, NOW + 60_000);
        assert_eq!(game.store.wallet, wallet);
        let user = game.store.user_id.clone().unwrap();
        assert_eq!(remote.borrow().wallet_of(&user).unwrap().energy, 2);
    }

    #[test]
    fn random_event_is_stored_and_expires() {
        let remote = remote_with(Wallet::default());
        let tuning = Tuning {
            random_event_chance: 1.0,
            ..Tuning::default()
        };
        let mut game = EmpireGame::sign_in(services(&remote), tuning, "pilot", false, NOW);
        settle(&mut game, NOW);
        let mut now = NOW;
        while game.store.active_event.is_none() && now < NOW + 200 {
            game.handle_input(&InputEvent::Key('c'));
            game.clicker.challenge = None;
            now += 1;
            settle(&mut game, now);
        }
        let event = game.store.active_event.clone().expect("an event within 200 clicks");
        settle(&mut game, event.expires_at + 1_000);
        assert!(game.store.active_event.is_none());
    }
}
