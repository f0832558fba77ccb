//! Cooperative timer wheel driven by the render loop.
//!
//! `draw_web()` calls at ~60fps with a wall-clock timestamp. `Timers::due`
//! turns that into discrete timer firings, which keeps every interval in the
//! game deterministic and testable without a real clock. Each timer has an
//! owner; tearing the owner down cancels all of its timers, so no callback
//! fires after its view or session is gone.

/// Who a timer (or an in-flight request) belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Owner {
    Dashboard,
    Sync,
    Clicker,
    Autoclicker,
    Boost,
    Craft,
}

/// What a timer does when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Full wallet re-fetch.
    WalletResync,
    /// Send the head of the sync queue.
    SyncDrain,
    /// Refresh online status, event expiry and other per-second state.
    StatusTick,
    AutoclickerClaim,
    AutoclickerCountdown,
    BoostCountdown,
    CraftNoticeClear,
    /// Failed human check: reload after a short delay.
    ForceReload,
}

/// Cancellation token returned by every schedule call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Clone, Debug)]
struct Timer {
    handle: TimerHandle,
    owner: Owner,
    kind: TimerKind,
    due_ms: u64,
    period_ms: Option<u64>,
}

#[derive(Debug, Default)]
pub struct Timers {
    next_id: u64,
    timers: Vec<Timer>,
    /// One-shots handed out by the last `due` call and not yet cancelled.
    fired_once: Vec<(TimerHandle, Owner)>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, owner: Owner, kind: TimerKind, due_ms: u64, period_ms: Option<u64>) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.timers.push(Timer {
            handle,
            owner,
            kind,
            due_ms,
            period_ms,
        });
        handle
    }

    /// Fire `kind` every `period_ms`, first at `now_ms + period_ms`.
    pub fn every(&mut self, owner: Owner, kind: TimerKind, period_ms: u64, now_ms: u64) -> TimerHandle {
        let period = period_ms.max(1);
        self.push(owner, kind, now_ms + period, Some(period))
    }

    /// Fire `kind` once, `delay_ms` from now.
    pub fn once(&mut self, owner: Owner, kind: TimerKind, delay_ms: u64, now_ms: u64) -> TimerHandle {
        self.push(owner, kind, now_ms + delay_ms, None)
    }

    /// Returns true if the timer was still scheduled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        self.fired_once.retain(|(h, _)| *h != handle);
        self.timers.len() != before
    }

    /// Cancel every timer of `owner`; returns how many were removed.
    pub fn cancel_owner(&mut self, owner: Owner) -> usize {
        let before = self.timers.len();
        self.timers.retain(|t| t.owner != owner);
        self.fired_once.retain(|(_, o)| *o != owner);
        before - self.timers.len()
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
        self.fired_once.clear();
    }

    /// Whether a handle from the last `due` batch may still run. Handlers
    /// call this before firing so a timer cancelled earlier in the same
    /// batch stays silent.
    pub fn is_live(&self, handle: TimerHandle) -> bool {
        self.is_scheduled(handle) || self.fired_once.iter().any(|(h, _)| *h == handle)
    }

    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|t| t.handle == handle)
    }

    pub fn has_kind(&self, kind: TimerKind) -> bool {
        self.timers.iter().any(|t| t.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Collect the timers due at `now_ms`, ordered by due time.
    ///
    /// Each timer fires at most once per call. A periodic timer that fell
    /// more than one period behind (tab in background) is rescheduled from
    /// `now_ms` instead of replaying every missed period.
    pub fn due(&mut self, now_ms: u64) -> Vec<(TimerHandle, TimerKind)> {
        let mut fired: Vec<(u64, TimerHandle, TimerKind)> = Vec::new();
        self.fired_once.clear();
        for t in &mut self.timers {
            if t.due_ms > now_ms {
                continue;
            }
            fired.push((t.due_ms, t.handle, t.kind));
            match t.period_ms {
                Some(period) => {
                    let next = t.due_ms + period;
                    t.due_ms = if next <= now_ms { now_ms + period } else { next };
                }
                None => self.fired_once.push((t.handle, t.owner)),
            }
        }
        // One-shots that just fired are the only ones left with due <= now.
        self.timers.retain(|t| t.period_ms.is_some() || t.due_ms > now_ms);
        fired.sort_by_key(|(due, handle, _)| (*due, handle.0));
        fired.into_iter().map(|(_, h, k)| (h, k)).collect()
    }
}
