//! Energy Empire rendering (read-only from game state).

use std::cell::RefCell;
use std::rc::Rc;

use ratzilla::ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratzilla::ratatui::style::{Color, Modifier, Style};
use ratzilla::ratatui::text::{Line, Span};
use ratzilla::ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratzilla::ratatui::Frame;

use crate::input::{is_narrow_layout, ClickState};
use crate::widgets::{ClickableList, TabBar};

use super::actions::*;
use super::autoclicker::cost_label;
use super::logic::{
    craft_cost, energy_per_click, format_clock, format_duration, format_grouped, format_number,
    max_craftable, rare_chance_percent, remaining_secs, yes_usd, CRAFT_ENERGY_PER_FUEL,
    CRAFT_RARE_PER_FUEL,
};
use super::state::{Notice, Rarity, Tier};
use super::sync::SyncStatus;
use super::{EmpireGame, Tab};

const TIER_KEYS: [char; 4] = ['Q', 'W', 'E', 'R'];

pub fn render(game: &EmpireGame, f: &mut Frame, area: Rect, click_state: &Rc<RefCell<ClickState>>) {
    if game.store.is_loading {
        render_loading(f, area);
        return;
    }

    let is_narrow = is_narrow_layout(area.width);
    let borders = if is_narrow {
        Borders::TOP | Borders::BOTTOM
    } else {
        Borders::ALL
    };
    let banner_height = if game.store.active_event.is_some() { 4 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // Header
            Constraint::Length(5),             // Wallet
            Constraint::Length(banner_height), // Event banner
            Constraint::Min(12),               // Panels
            Constraint::Length(6),             // Log
        ])
        .split(area);

    render_header(game, f, chunks[0], borders, click_state);
    render_wallet(game, f, chunks[1], borders, is_narrow);
    if banner_height > 0 {
        render_event_banner(game, f, chunks[2], borders, click_state);
    }
    if is_narrow {
        render_narrow_panels(game, f, chunks[3], borders, click_state);
    } else {
        render_wide_panels(game, f, chunks[3], click_state);
    }
    render_log(game, f, chunks[4], borders);

    if game.clicker.challenge.is_some() {
        render_challenge(game, f, area, click_state);
    } else if let Some(secs) = game.boost.ad_remaining_secs(game.now_ms) {
        render_ad(f, area, secs);
    }
}

fn render_loading(f: &mut Frame, area: Rect) {
    let widget = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            "Loading your empire...",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));
    f.render_widget(widget, area);
}

// ── Header / wallet ─────────────────────────────────────────────────────

fn status_color(status: SyncStatus) -> Color {
    match status {
        SyncStatus::Online => Color::Green,
        SyncStatus::Syncing => Color::Yellow,
        SyncStatus::Offline => Color::Red,
    }
}

fn render_header(
    game: &EmpireGame,
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let status = game.indicator.status(&game.sync);
    let mut spans = vec![
        Span::styled(
            format!(" {} ", game.store.username.as_deref().unwrap_or("?")),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("● {}", status.label()), Style::default().fg(status_color(status))),
    ];
    if let Some(since) = game.indicator.since_label(&game.sync, game.now_ms) {
        spans.push(Span::styled(
            format!("  Last sync: {since}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if !game.sync.is_empty() {
        spans.push(Span::styled(
            format!("  ({} pending)", game.sync.len()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    spans.push(Span::styled("   [Esc] Sign out", Style::default().fg(Color::DarkGray)));

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Yellow))
        .title(Span::styled(
            " ⚡ Energy Empire ",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));

    let mut cl = ClickableList::new();
    cl.push_clickable(Line::from(spans), SIGN_OUT);
    cl.register_bordered(area, borders, false, &mut click_state.borrow_mut());
    f.render_widget(Paragraph::new(cl.into_lines()).block(block), area);
}

fn rarity_color(rarity: Rarity) -> Color {
    match rarity {
        Rarity::Common => Color::Gray,
        Rarity::Uncommon => Color::Green,
        Rarity::Rare => Color::Blue,
        Rarity::Epic => Color::Magenta,
        Rarity::Legendary => Color::Yellow,
    }
}

fn render_wallet(game: &EmpireGame, f: &mut Frame, area: Rect, borders: Borders, is_narrow: bool) {
    let w = &game.store.wallet;
    let label = Style::default().fg(Color::Gray);
    let value = |color: Color| Style::default().fg(color).add_modifier(Modifier::BOLD);

    let resources = Line::from(vec![
        Span::styled(" Energy ", label),
        Span::styled(format_number(w.energy), value(Color::Yellow)),
        Span::styled("  Rare ", label),
        Span::styled(format_number(w.rare_resources), value(Color::Magenta)),
        Span::styled("  Fuel ", label),
        Span::styled(format_grouped(w.fuel), value(Color::Red)),
    ]);
    let tokens = Line::from(vec![
        Span::styled(" YES ", label),
        Span::styled(format_grouped(w.yes_tokens), value(Color::Green)),
        Span::styled(format!(" (≈{})", yes_usd(w.yes_tokens)), Style::default().fg(Color::DarkGray)),
        Span::styled("  Mini YES ", label),
        Span::styled(format_grouped(w.mini_yes), value(Color::Cyan)),
    ]);
    let planet = match &game.store.planet {
        Some(p) => {
            let mut spans = vec![
                Span::styled(" Planet ", label),
                Span::styled(p.name.clone(), Style::default().fg(Color::White)),
                Span::styled(format!(" [{}]", p.rarity.name()), Style::default().fg(rarity_color(p.rarity))),
            ];
            if !is_narrow {
                spans.push(Span::styled(
                    format!(
                        "  +{}% energy  +{}% rare",
                        p.bonus_energy_production, p.bonus_rare_drop_rate
                    ),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Line::from(spans)
        }
        None => Line::from(Span::styled(" No planet discovered", Style::default().fg(Color::DarkGray))),
    };

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Wallet ");
    f.render_widget(Paragraph::new(vec![resources, tokens, planet]).block(block), area);
}

fn render_event_banner(
    game: &EmpireGame,
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let Some(event) = &game.store.active_event else {
        return;
    };
    let left = remaining_secs(event.expires_at, game.now_ms);
    let mut cl = ClickableList::new();
    cl.push(Line::from(vec![
        Span::styled(
            format!(" ★ {} ", event.event_name),
            Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {}s left", left), Style::default().fg(Color::DarkGray)),
    ]));
    cl.push_clickable(
        Line::from(vec![
            Span::styled(format!(" {} ", event.event_description), Style::default().fg(Color::White)),
            Span::styled(" [X] Dismiss", Style::default().fg(Color::DarkGray)),
        ]),
        DISMISS_EVENT,
    );

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Yellow));
    cl.register_bordered(area, borders, false, &mut click_state.borrow_mut());
    f.render_widget(Paragraph::new(cl.into_lines()).block(block), area);
}

// ── Panels ──────────────────────────────────────────────────────────────

fn render_wide_panels(game: &EmpireGame, f: &mut Frame, area: Rect, click_state: &Rc<RefCell<ClickState>>) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(36),
            Constraint::Percentage(30),
        ])
        .split(area);
    render_clicker(game, f, cols[0], Borders::ALL, click_state);
    render_autoclicker(game, f, cols[1], Borders::ALL, click_state);
    render_craft(game, f, cols[2], Borders::ALL, click_state);
}

fn render_narrow_panels(
    game: &EmpireGame,
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(8)])
        .split(area);

    let tab_style = |tab: Tab, color: Color| {
        if game.tab == tab {
            Style::default().fg(Color::Black).bg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(color)
        }
    };
    TabBar::new("│")
        .tab("Click", tab_style(Tab::Clicker, Color::Yellow), TAB_CLICKER)
        .tab("Auto", tab_style(Tab::Autoclicker, Color::Cyan), TAB_AUTOCLICKER)
        .tab("Craft", tab_style(Tab::Craft, Color::Red), TAB_CRAFT)
        .render(f, chunks[0], &mut click_state.borrow_mut());

    match game.tab {
        Tab::Clicker => render_clicker(game, f, chunks[1], borders, click_state),
        Tab::Autoclicker => render_autoclicker(game, f, chunks[1], borders, click_state),
        Tab::Craft => render_craft(game, f, chunks[1], borders, click_state),
    }
}

fn notice_line(notice: &Notice) -> Line<'static> {
    let color = if notice.is_error { Color::Red } else { Color::Green };
    Line::from(Span::styled(format!(" {}", notice.text), Style::default().fg(color)))
}

/// Register targets and draw a panel built from a [`ClickableList`].
fn finish_panel(
    cl: ClickableList,
    block: Block,
    borders: Borders,
    f: &mut Frame,
    area: Rect,
    click_state: &Rc<RefCell<ClickState>>,
) {
    cl.register_bordered(area, borders, true, &mut click_state.borrow_mut());
    f.render_widget(
        Paragraph::new(cl.into_lines()).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_clicker(
    game: &EmpireGame,
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let boost_left = game
        .boost
        .flag()
        .filter(|flag| flag.is_valid(game.now_ms))
        .map(|flag| remaining_secs(flag.expires_at, game.now_ms));
    let per_click = energy_per_click(game.store.energy_bonus_percent(), boost_left.is_some());

    let mut cl = ClickableList::new();
    cl.push(Line::from(""));
    cl.push_clickable(
        Line::from(Span::styled(
            format!(" [C] ⚡ Generate +{} Energy ", per_click),
            Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        CLICK_ENERGY,
    );
    let gain = match game.clicker.last_gain {
        Some((energy, true)) => format!("   +{} Energy  +1 Rare!", energy),
        Some((energy, false)) => format!("   +{} Energy", energy),
        None => String::new(),
    };
    cl.push(Line::from(Span::styled(gain, Style::default().fg(Color::Yellow))));
    cl.push(Line::from(Span::styled(
        format!(
            " Clicks: {}  Rare chance: {:.1}%",
            format_grouped(game.clicker.total_clicks),
            rare_chance_percent(game.store.rare_bonus_percent())
        ),
        Style::default().fg(Color::DarkGray),
    )));
    cl.push(Line::from(""));

    match boost_left {
        Some(secs) => cl.push(Line::from(vec![
            Span::styled(" 2x BOOST ", Style::default().fg(Color::Black).bg(Color::Magenta)),
            Span::styled(format!(" {} left", format_clock(secs)), Style::default().fg(Color::Magenta)),
        ])),
        None if game.boost.is_paying() => cl.push(Line::from(Span::styled(
            " Paying for boost...",
            Style::default().fg(Color::DarkGray),
        ))),
        None => {
            let fuel_style = if game.store.wallet.fuel >= 5 {
                Style::default().fg(Color::Magenta)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            cl.push_clickable(Line::from(Span::styled(" [B] 2x Boost for 5 Fuel", fuel_style)), BOOST_WITH_FUEL);
            cl.push_clickable(
                Line::from(Span::styled(" [V] Watch an ad for 2x Boost", Style::default().fg(Color::Magenta))),
                BOOST_WATCH_AD,
            );
        }
    }
    if let Some(notice) = &game.boost.notice {
        cl.push(notice_line(notice));
    }

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Clicker ");
    finish_panel(cl, block, borders, f, area, click_state);
}

fn render_autoclicker(
    game: &EmpireGame,
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let mut cl = ClickableList::new();
    match &game.store.autoclicker {
        Some(session) => {
            cl.push(Line::from(vec![
                Span::styled(" ● ", Style::default().fg(Color::Green)),
                Span::styled(session.tier.name(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            ]));
            cl.push(Line::from(Span::styled(
                format!(
                    "   {}/s · {} left",
                    session.energy_per_second,
                    format_duration(game.autoclicker.remaining_secs)
                ),
                Style::default().fg(Color::Gray),
            )));
        }
        None => cl.push(Line::from(Span::styled(
            " No autoclicker running",
            Style::default().fg(Color::DarkGray),
        ))),
    }
    cl.push(Line::from(""));

    let busy = game.store.autoclicker.is_some() || game.autoclicker.is_pending();
    for (i, tier) in Tier::all().iter().enumerate() {
        let style = if busy {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::White)
        };
        cl.push_clickable(
            Line::from(vec![
                Span::styled(format!(" [{}] ", TIER_KEYS[i]), Style::default().fg(Color::Cyan)),
                Span::styled(tier.name(), style),
            ]),
            ACTIVATE_TIER_BASE + i as u16,
        );
        cl.push_clickable(
            Line::from(Span::styled(
                format!(
                    "     {}/s · {} · {}",
                    tier.energy_per_second(),
                    format_duration(tier.duration_minutes() * 60),
                    cost_label(*tier)
                ),
                Style::default().fg(Color::DarkGray),
            )),
            ACTIVATE_TIER_BASE + i as u16,
        );
    }
    if game.autoclicker.is_pending() {
        cl.push(Line::from(Span::styled(" Activating...", Style::default().fg(Color::DarkGray))));
    }
    if let Some(notice) = &game.autoclicker.notice {
        cl.push(notice_line(notice));
    }

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Autoclicker ");
    finish_panel(cl, block, borders, f, area, click_state);
}

fn render_craft(
    game: &EmpireGame,
    f: &mut Frame,
    area: Rect,
    borders: Borders,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let amount = game.craft.amount;
    let cost = craft_cost(amount);
    let max = max_craftable(&game.store.wallet);

    let mut cl = ClickableList::new();
    cl.push(Line::from(Span::styled(
        format!(" {} Energy + {} Rare = 1 Fuel", CRAFT_ENERGY_PER_FUEL, CRAFT_RARE_PER_FUEL),
        Style::default().fg(Color::Gray),
    )));
    cl.push(Line::from(""));
    cl.push(Line::from(vec![
        Span::styled(" Amount: ", Style::default().fg(Color::Gray)),
        Span::styled(amount.to_string(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::styled(
            format!("  ({} Energy, {} Rare)", format_number(cost.energy), format_number(cost.rare_resources)),
            Style::default().fg(Color::DarkGray),
        ),
    ]));
    cl.push_clickable(Line::from(Span::styled(" [-] Less", Style::default().fg(Color::Red))), CRAFT_DECREMENT);
    cl.push_clickable(Line::from(Span::styled(" [+] More", Style::default().fg(Color::Red))), CRAFT_INCREMENT);
    cl.push_clickable(
        Line::from(Span::styled(format!(" [M] Max ({})", max), Style::default().fg(Color::Red))),
        CRAFT_MAX,
    );
    let submit = if game.craft.is_crafting() {
        Span::styled(" Crafting...", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(
            format!(" [F] Craft {} Fuel ", amount),
            Style::default().fg(Color::Black).bg(Color::Red).add_modifier(Modifier::BOLD),
        )
    };
    cl.push_clickable(Line::from(submit), CRAFT_SUBMIT);
    if let Some(notice) = &game.craft.notice {
        cl.push(notice_line(notice));
    }

    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Red))
        .title(" Craft Fuel ");
    finish_panel(cl, block, borders, f, area, click_state);
}

fn render_log(game: &EmpireGame, f: &mut Frame, area: Rect, borders: Borders) {
    let lines: Vec<Line> = game
        .log
        .iter()
        .map(|entry| {
            let style = if entry.is_important {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Line::from(Span::styled(format!(" {}", entry.text), style))
        })
        .collect();
    let block = Block::default()
        .borders(borders)
        .border_style(Style::default().fg(Color::Blue))
        .title(" Log ");
    let inner = block.inner(area);

    // Keep the newest entry on screen, counting wrapped rows.
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    let total = paragraph.line_count(inner.width.max(1)) as u16;
    let scroll = total.saturating_sub(inner.height);
    f.render_widget(paragraph.scroll((scroll, 0)).block(block), area);
}

// ── Modals ──────────────────────────────────────────────────────────────

fn centered(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect::new(area.x + (area.width - w) / 2, area.y + (area.height - h) / 2, w, h)
}

fn render_challenge(game: &EmpireGame, f: &mut Frame, area: Rect, click_state: &Rc<RefCell<ClickState>>) {
    let Some(challenge) = &game.clicker.challenge else {
        return;
    };
    let modal = centered(44, 9, area);
    f.render_widget(Clear, modal);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Human check ");
    let inner = block.inner(modal);

    let track_width = inner.width.saturating_sub(2).max(2);
    let handle = ((challenge.position * f64::from(track_width - 1)).round() as u16).min(track_width - 1);
    let track: String = (0..track_width)
        .map(|i| if i == handle { '█' } else if i < handle { '━' } else { '─' })
        .collect();

    let (status, status_style) = if challenge.failed {
        ("Verification failed. Reloading...".to_string(), Style::default().fg(Color::Red))
    } else {
        (
            format!("Attempts left: {}", challenge.attempts_left),
            Style::default().fg(Color::DarkGray),
        )
    };
    let lines = vec![
        Line::from(Span::styled(
            " Slide the handle all the way right",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(format!(" {}", track), Style::default().fg(Color::Yellow))),
        Line::from(""),
        Line::from(Span::styled(format!(" {}", status), status_style)),
        Line::from(Span::styled(
            " Drag, or ←/→ then Enter",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    f.render_widget(Paragraph::new(lines).block(block), modal);

    let track_rect = Rect::new(inner.x + 1, inner.y + 2, track_width, 1);
    let mut cs = click_state.borrow_mut();
    // The modal swallows taps on everything behind it.
    cs.targets.clear();
    cs.drag_track = Some(track_rect);
    cs.add_click_target(track_rect, SLIDER_HANDLE);
}

fn render_ad(f: &mut Frame, area: Rect, secs: u64) {
    let modal = centered(40, 7, area);
    f.render_widget(Clear, modal);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Your ad is playing",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("2x Boost unlocks in {}s", secs),
            Style::default().fg(Color::Magenta),
        )),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Sponsored ");
    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center).block(block),
        modal,
    );
}

// ── Sign-in ─────────────────────────────────────────────────────────────

pub fn render_sign_in(
    username: &str,
    register_mode: bool,
    message: Option<&str>,
    f: &mut Frame,
    area: Rect,
    click_state: &Rc<RefCell<ClickState>>,
) {
    let modal = centered(48, 13, area);
    let (title, submit, toggle) = if register_mode {
        (" Create account ", " [Enter] Create account ", " [Tab] I already have an account")
    } else {
        (" Sign in ", " [Enter] Sign in ", " [Tab] Create a new account")
    };

    let mut cl = ClickableList::new();
    cl.push(Line::from(Span::styled(
        " ⚡ ENERGY EMPIRE ⚡",
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )));
    cl.push(Line::from(Span::styled(
        " Click. Craft. Conquer the galaxy.",
        Style::default().fg(Color::DarkGray),
    )));
    cl.push(Line::from(""));
    cl.push(Line::from(vec![
        Span::styled(" Username: ", Style::default().fg(Color::Gray)),
        Span::styled(format!("{}▏", username), Style::default().fg(Color::White)),
    ]));
    cl.push(Line::from(""));
    cl.push_clickable(
        Line::from(Span::styled(
            submit,
            Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        SIGN_IN_SUBMIT,
    );
    cl.push_clickable(
        Line::from(Span::styled(toggle, Style::default().fg(Color::Cyan))),
        SIGN_IN_TOGGLE_MODE,
    );
    if let Some(message) = message {
        cl.push(Line::from(""));
        cl.push(Line::from(Span::styled(format!(" {}", message), Style::default().fg(Color::Red))));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);
    finish_panel(cl, block, Borders::ALL, f, modal, click_state);
}
