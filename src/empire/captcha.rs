//! Slider human check shown after long click streaks.

/// Release position needed to pass.
pub const PASS_THRESHOLD: f64 = 0.85;
pub const MAX_ATTEMPTS: u8 = 3;
/// Delay before the forced reload after the last failed attempt.
pub const RELOAD_DELAY_MS: u64 = 2_000;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChallengeResult {
    Passed,
    Retry { attempts_left: u8 },
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SliderChallenge {
    /// Handle position in `[0, 1]`.
    pub position: f64,
    pub dragging: bool,
    pub attempts_left: u8,
    pub failed: bool,
}

impl SliderChallenge {
    pub fn new() -> Self {
        Self {
            position: 0.0,
            dragging: false,
            attempts_left: MAX_ATTEMPTS,
            failed: false,
        }
    }

    pub fn grab(&mut self) {
        if !self.failed {
            self.dragging = true;
        }
    }

    pub fn drag_to(&mut self, fraction: f64) {
        if self.dragging && fraction.is_finite() {
            self.position = fraction.clamp(0.0, 1.0);
        }
    }

    /// Keyboard control: move the handle without a pointer grab.
    pub fn nudge(&mut self, step: f64) {
        if !self.failed {
            self.position = (self.position + step).clamp(0.0, 1.0);
        }
    }

    /// Let go of the handle. Below the threshold costs an attempt and snaps
    /// the handle back.
    pub fn release(&mut self) -> ChallengeResult {
        self.dragging = false;
        if self.failed {
            return ChallengeResult::Failed;
        }
        if self.position >= PASS_THRESHOLD {
            return ChallengeResult::Passed;
        }
        self.position = 0.0;
        self.attempts_left = self.attempts_left.saturating_sub(1);
        if self.attempts_left == 0 {
            self.failed = true;
            ChallengeResult::Failed
        } else {
            ChallengeResult::Retry {
                attempts_left: self.attempts_left,
            }
        }
    }
}
