//! Energy Empire game math and formatting. Pure functions, fully testable.

use super::state::Wallet;

/// Energy per click before any bonus.
pub const BASE_ENERGY_PER_CLICK: f64 = 1.0;
/// Rare drop chance before the planet bonus, in percent.
pub const BASE_RARE_CHANCE_PERCENT: f64 = 5.0;

/// Craft recipe: 100 Energy + 10 Rare = 1 Fuel.
pub const CRAFT_ENERGY_PER_FUEL: u64 = 100;
pub const CRAFT_RARE_PER_FUEL: u64 = 10;

/// Boost: 2x click energy for 5 minutes, bought with 5 Fuel or an ad.
pub const BOOST_FUEL_COST: u64 = 5;
pub const BOOST_DURATION_MS: u64 = 5 * 60 * 1000;
pub const BOOST_AD_DURATION_MS: u64 = 5_000;

/// Human check: clicks before the challenge can appear, ramp length, and
/// the per-click probability ceiling.
pub const CHALLENGE_GRACE_CLICKS: u64 = 200;
pub const CHALLENGE_RAMP_CLICKS: u64 = 200;
pub const CHALLENGE_MAX_CHANCE: f64 = 0.01;

/// Energy for one click: `floor(base × (1 + bonus/100))`, doubled while boosted.
pub fn energy_per_click(energy_bonus_percent: f64, boosted: bool) -> u64 {
    let bonus = energy_bonus_percent.max(0.0);
    let base = (BASE_ENERGY_PER_CLICK * (1.0 + bonus / 100.0)).floor() as u64;
    if boosted {
        base * 2
    } else {
        base
    }
}

/// Rare drop probability in percent.
pub fn rare_chance_percent(planet_rare_bonus_percent: f64) -> f64 {
    BASE_RARE_CHANCE_PERCENT + planet_rare_bonus_percent
}

/// Rare drop probability as a Bernoulli parameter in `[0, 1]`.
pub fn rare_drop_probability(planet_rare_bonus_percent: f64) -> f64 {
    (rare_chance_percent(planet_rare_bonus_percent) / 100.0).clamp(0.0, 1.0)
}

/// Per-click probability of opening the human check after `clicks_since_check` clicks.
pub fn challenge_chance(clicks_since_check: u64) -> f64 {
    if clicks_since_check <= CHALLENGE_GRACE_CLICKS {
        return 0.0;
    }
    let over = (clicks_since_check - CHALLENGE_GRACE_CLICKS) as f64;
    (over / CHALLENGE_RAMP_CLICKS as f64 * CHALLENGE_MAX_CHANCE).min(CHALLENGE_MAX_CHANCE)
}

/// Energy and rare required to craft `amount` Fuel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CraftCost {
    pub energy: u64,
    pub rare_resources: u64,
}

pub fn craft_cost(amount: u64) -> CraftCost {
    CraftCost {
        energy: amount.saturating_mul(CRAFT_ENERGY_PER_FUEL),
        rare_resources: amount.saturating_mul(CRAFT_RARE_PER_FUEL),
    }
}

pub fn can_craft(wallet: &Wallet, amount: u64) -> bool {
    if amount == 0 {
        return false;
    }
    let cost = craft_cost(amount);
    wallet.energy >= cost.energy && wallet.rare_resources >= cost.rare_resources
}

pub fn max_craftable(wallet: &Wallet) -> u64 {
    (wallet.energy / CRAFT_ENERGY_PER_FUEL).min(wallet.rare_resources / CRAFT_RARE_PER_FUEL)
}

/// Whole seconds left until `expires_at`, never negative.
pub fn remaining_secs(expires_at: u64, now_ms: u64) -> u64 {
    expires_at.saturating_sub(now_ms) / 1000
}

/// Compact wallet number: `1.25M`, `3.4K`, `999`.
pub fn format_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Integer with thousands separators: `12,345`.
pub fn format_grouped(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// USD estimate shown under the YES balance.
pub fn yes_usd(yes_tokens: u64) -> String {
    format!("${:.2}", yes_tokens as f64 * 0.0001)
}

/// `1h 2m 3s`, `4m 5s`, `6s`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// `m:ss` countdown used by the boost bar.
pub fn format_clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Elapsed time since the last sync, bucketed into seconds/minutes/hours.
pub fn format_since(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s ago", seconds)
    } else if seconds < 3600 {
        format!("{}m ago", seconds / 60)
    } else {
        format!("{}h ago", seconds / 3600)
    }
}
