//! Semantic action IDs for Energy Empire click targets.

// ── Clicker ─────────────────────────────────────────────────
pub const CLICK_ENERGY: u16 = 0;
pub const DISMISS_EVENT: u16 = 1;

// ── Narrow-layout tabs ──────────────────────────────────────
pub const TAB_CLICKER: u16 = 10;
pub const TAB_AUTOCLICKER: u16 = 11;
pub const TAB_CRAFT: u16 = 12;

// ── Autoclicker (base + tier index 0..3) ────────────────────
pub const ACTIVATE_TIER_BASE: u16 = 20;

// ── Boost ───────────────────────────────────────────────────
pub const BOOST_WITH_FUEL: u16 = 30;
pub const BOOST_WATCH_AD: u16 = 31;

// ── Craft ───────────────────────────────────────────────────
pub const CRAFT_DECREMENT: u16 = 40;
pub const CRAFT_INCREMENT: u16 = 41;
pub const CRAFT_MAX: u16 = 42;
pub const CRAFT_SUBMIT: u16 = 43;

// ── Human check ─────────────────────────────────────────────
pub const SLIDER_HANDLE: u16 = 50;

// ── Session ─────────────────────────────────────────────────
pub const SIGN_OUT: u16 = 60;

// ── Sign-in screen ──────────────────────────────────────────
pub const SIGN_IN_SUBMIT: u16 = 70;
pub const SIGN_IN_TOGGLE_MODE: u16 = 71;
