//! Clickable UI components that render and register their own targets.
//!
//! - [`TabBar`]: one-row tab strip for the narrow dashboard.
//! - [`ClickableList`]: panel lines with per-line actions.

use ratzilla::ratatui::layout::Rect;
use ratzilla::ratatui::style::{Color, Style};
use ratzilla::ratatui::text::{Line, Span};
use ratzilla::ratatui::widgets::{Borders, Paragraph};
use ratzilla::ratatui::Frame;

use crate::input::ClickState;

// ── TabBar ─────────────────────────────────────────────────────

/// Tabs on a single row, separated by `separator`. Targets follow the
/// rendered label widths, so wide glyphs and changing labels stay clickable.
///
/// ```ignore
/// TabBar::new("│")
///     .tab("Click", style, TAB_CLICKER)
///     .tab("Craft", style, TAB_CRAFT)
///     .render(f, area, &mut cs);
/// ```
pub struct TabBar<'a> {
    tabs: Vec<(String, Style, u16)>,
    separator: &'a str,
}

impl<'a> TabBar<'a> {
    pub fn new(separator: &'a str) -> Self {
        Self {
            tabs: Vec::new(),
            separator,
        }
    }

    /// Add a tab with its label, style, and action ID.
    pub fn tab(mut self, label: impl Into<String>, style: Style, action_id: u16) -> Self {
        self.tabs.push((label.into(), style, action_id));
        self
    }

    /// Render the tab bar and register click targets.
    pub fn render(self, f: &mut Frame, area: Rect, cs: &mut ClickState) {
        let mut spans: Vec<Span> = Vec::new();
        let sep_width = Line::from(self.separator).width() as u16;
        let mut tab_widths: Vec<(u16, u16)> = Vec::new();

        for (i, (label, style, action_id)) in self.tabs.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(
                    self.separator,
                    Style::default().fg(Color::DarkGray),
                ));
            }
            let padded = format!(" {} ", label);
            tab_widths.push((Line::from(padded.as_str()).width() as u16, *action_id));
            spans.push(Span::styled(padded, *style));
        }

        f.render_widget(Paragraph::new(Line::from(spans)), area);
        cs.register_tab_targets(&tab_widths, sep_width, area.x, area.y, area.width, area.height.max(1));
    }
}

// ── ClickableList ──────────────────────────────────────────────

/// Panel lines paired with click actions. Any `[X]` key hint shown in a
/// panel goes through [`push_clickable`](ClickableList::push_clickable) so
/// taps work wherever keys do.
///
/// ```ignore
/// let mut cl = ClickableList::new();
/// cl.push(Line::from(" Amount: 5"));
/// cl.push_clickable(Line::from(" [F] Craft 5 Fuel"), CRAFT_SUBMIT);
/// cl.register_bordered(area, Borders::ALL, true, &mut cs);
/// f.render_widget(Paragraph::new(cl.into_lines()).block(block), area);
/// ```
pub struct ClickableList<'a> {
    lines: Vec<Line<'a>>,
    /// `(line index, action id)`.
    actions: Vec<(u16, u16)>,
}

impl<'a> ClickableList<'a> {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Add a non-clickable line.
    pub fn push(&mut self, line: Line<'a>) {
        self.lines.push(line);
    }

    /// The action follows the line if lines are inserted before it.
    pub fn push_clickable(&mut self, line: Line<'a>, action_id: u16) {
        let idx = self.lines.len() as u16;
        self.actions.push((idx, action_id));
        self.lines.push(line);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn into_lines(self) -> Vec<Line<'a>> {
        self.lines
    }

    /// Register targets for a panel drawn in `area` with `borders`. With
    /// `wrapped`, long lines are assumed to wrap at the inner width.
    pub fn register_bordered(&self, area: Rect, borders: Borders, wrapped: bool, cs: &mut ClickState) {
        let top = u16::from(borders.contains(Borders::TOP));
        let bottom = u16::from(borders.contains(Borders::BOTTOM));
        let sides = u16::from(borders.contains(Borders::LEFT)) + u16::from(borders.contains(Borders::RIGHT));
        let inner_width = if wrapped {
            area.width.saturating_sub(sides).max(1)
        } else {
            0
        };
        self.register_targets(area, cs, top, bottom, 0, inner_width);
    }

    /// Register targets below `top_offset` and above `bottom_offset`, after
    /// skipping `scroll` visual rows. `inner_width == 0` means one row per
    /// line; otherwise lines wrap at that width.
    pub fn register_targets(
        &self,
        area: Rect,
        cs: &mut ClickState,
        top_offset: u16,
        bottom_offset: u16,
        scroll: u16,
        inner_width: u16,
    ) {
        let content_y = area.y + top_offset;
        let content_end = area.y + area.height.saturating_sub(bottom_offset);

        if inner_width == 0 {
            for &(line_idx, action_id) in &self.actions {
                if line_idx < scroll {
                    continue;
                }
                let row = content_y + (line_idx - scroll);
                if row >= content_end {
                    continue;
                }
                cs.add_row_target(area, row, action_id);
            }
            return;
        }

        let w = inner_width as usize;
        let mut visual_starts: Vec<u16> = Vec::with_capacity(self.lines.len());
        let mut visual_heights: Vec<u16> = Vec::with_capacity(self.lines.len());
        let mut cumulative: u16 = 0;
        for line in &self.lines {
            visual_starts.push(cumulative);
            let lw = line.width();
            let h = if lw <= w { 1 } else { lw.div_ceil(w) as u16 };
            visual_heights.push(h);
            cumulative += h;
        }

        for &(line_idx, action_id) in &self.actions {
            let li = line_idx as usize;
            if li >= self.lines.len() {
                continue;
            }
            let vstart = visual_starts[li];
            let vheight = visual_heights[li];

            // Every visual row of a wrapped line is clickable.
            for r in 0..vheight {
                let vr = vstart + r;
                if vr < scroll {
                    continue;
                }
                let screen_row = content_y + (vr - scroll);
                if screen_row >= content_end {
                    break;
                }
                cs.add_row_target(area, screen_row, action_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_targets_follow_label_widths() {
        // " Click " and " Auto " are 7 and 6 columns wide, "│" is 1.
        let mut cs = ClickState::new();
        cs.register_tab_targets(&[(7, 10), (6, 11)], 1, 0, 0, 40, 1);
        assert_eq!(cs.hit_test(0, 0), Some(10));
        assert_eq!(cs.hit_test(8, 0), Some(11));
        assert_eq!(cs.hit_test(39, 0), Some(11));
    }

    #[test]
    fn clickable_rows_skip_plain_lines() {
        let mut cl = ClickableList::new();
        cl.push(Line::from(" Amount: 1"));
        cl.push_clickable(Line::from(" [-] Less"), 40);
        cl.push_clickable(Line::from(" [+] More"), 41);
        cl.push(Line::from(" Crafting..."));
        assert_eq!(cl.len(), 4);

        let area = Rect::new(0, 5, 80, 10);
        let mut cs = ClickState::new();
        cl.register_targets(area, &mut cs, 1, 1, 0, 0);
        assert_eq!(cs.targets.len(), 2);
        assert_eq!(cs.hit_test(10, 6), None);
        assert_eq!(cs.hit_test(10, 7), Some(40));
        assert_eq!(cs.hit_test(10, 8), Some(41));
        assert_eq!(cs.hit_test(10, 9), None);
    }

    #[test]
    fn scrolled_out_lines_have_no_target() {
        let mut cl = ClickableList::new();
        for i in 0..4 {
            cl.push_clickable(Line::from(format!("tier {}", i)), 20 + i);
        }
        let area = Rect::new(0, 10, 80, 5);
        let mut cs = ClickState::new();
        cl.register_targets(area, &mut cs, 0, 1, 2, 0);
        assert_eq!(cs.targets.len(), 2);
        assert_eq!(cs.hit_test(10, 10), Some(22));
        assert_eq!(cs.hit_test(10, 11), Some(23));
    }

    #[test]
    fn bottom_border_clips_targets() {
        let mut cl = ClickableList::new();
        for i in 0..20 {
            cl.push_clickable(Line::from(format!("row {}", i)), 50 + i as u16);
        }
        let area = Rect::new(0, 0, 80, 5);
        let mut cs = ClickState::new();
        cl.register_bordered(area, Borders::ALL, false, &mut cs);
        assert_eq!(cs.targets.len(), 3);
        assert_eq!(cs.hit_test(10, 3), Some(52));
        assert_eq!(cs.hit_test(10, 4), None);
    }

    #[test]
    fn wrapped_line_is_clickable_on_every_row() {
        let mut cl = ClickableList::new();
        cl.push(Line::from("12345678901234567890"));
        cl.push_clickable(Line::from("123456789012345678901234567890"), 42);
        cl.push_clickable(Line::from("next"), 43);

        // 12 wide with side borders leaves 10 columns.
        let area = Rect::new(0, 0, 12, 12);
        let mut cs = ClickState::new();
        cl.register_bordered(area, Borders::ALL, true, &mut cs);
        assert_eq!(cs.hit_test(5, 2), None);
        assert_eq!(cs.hit_test(5, 3), Some(42));
        assert_eq!(cs.hit_test(5, 5), Some(42));
        assert_eq!(cs.hit_test(5, 6), Some(43));
    }

    #[test]
    fn top_and_bottom_only_borders() {
        let mut cl = ClickableList::new();
        cl.push_clickable(Line::from("[C] Generate"), 0);
        let area = Rect::new(0, 0, 30, 4);
        let mut cs = ClickState::new();
        cl.register_bordered(area, Borders::TOP | Borders::BOTTOM, true, &mut cs);
        assert_eq!(cs.hit_test(0, 1), Some(0));
    }
}
