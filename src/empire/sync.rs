//! Batched wallet writes and snapshot reconciliation.
//!
//! Click gains are applied to the store immediately and queued here as
//! deltas. A drain timer sends the head delta; only one write is in flight
//! at a time and a failed write stays at the head for the next tick. Wallet
//! snapshots from the periodic re-fetch are reconciled last-write-wins:
//! stale or racing snapshots are dropped, otherwise the local wallet becomes
//! the server balance plus everything still queued.

use std::collections::VecDeque;

use super::logic::format_since;
use super::state::{EpochMs, VersionedWallet, Wallet, WalletDelta};

#[derive(Debug)]
pub struct SyncQueue {
    pending: VecDeque<WalletDelta>,
    capacity: usize,
    writing: bool,
    /// Highest server version seen; 0 until a versioned backend answers.
    last_version: u64,
    /// Bumped whenever a confirmed server mutation lands locally. A snapshot
    /// requested before the bump may predate that mutation.
    mutations: u64,
    last_synced_at: Option<EpochMs>,
}

impl SyncQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            capacity: capacity.max(1),
            writing: false,
            last_version: 0,
            mutations: 0,
            last_synced_at: None,
        }
    }

    /// Queue a delta. When full, it is merged into the newest entry unless
    /// that entry is the one in flight.
    pub fn push(&mut self, delta: WalletDelta) {
        if delta.is_zero() {
            return;
        }
        let only_head_in_flight = self.writing && self.pending.len() == 1;
        if self.pending.len() >= self.capacity && !only_head_in_flight {
            if let Some(last) = self.pending.back_mut() {
                last.merge(&delta);
                return;
            }
        }
        self.pending.push_back(delta);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_writing(&self) -> bool {
        self.writing
    }

    pub fn last_synced_at(&self) -> Option<EpochMs> {
        self.last_synced_at
    }

    /// Sum of everything not yet acknowledged, including the in-flight head.
    pub fn pending_total(&self) -> WalletDelta {
        let mut total = WalletDelta::default();
        for delta in &self.pending {
            total.merge(delta);
        }
        total
    }

    /// Head delta to send, if no write is in flight.
    pub fn next_write(&mut self) -> Option<WalletDelta> {
        if self.writing {
            return None;
        }
        let head = *self.pending.front()?;
        self.writing = true;
        Some(head)
    }

    pub fn on_write_ok(&mut self, version: u64, now_ms: EpochMs) {
        if self.writing {
            self.pending.pop_front();
        }
        self.writing = false;
        self.observe_version(version);
        self.mutations += 1;
        self.last_synced_at = Some(now_ms);
    }

    /// The head stays queued and is retried on the next drain.
    pub fn on_write_failed(&mut self) {
        self.writing = false;
    }

    /// The server refused the head outright; retrying cannot succeed.
    pub fn on_write_rejected(&mut self) {
        if self.writing {
            self.pending.pop_front();
        }
        self.writing = false;
    }

    /// Queued deltas that have not been sent yet.
    pub fn unsent_total(&self) -> WalletDelta {
        let skip = usize::from(self.writing);
        let mut total = WalletDelta::default();
        for delta in self.pending.iter().skip(skip) {
            total.merge(delta);
        }
        total
    }

    /// Record a server mutation confirmed outside the queue (craft, boost
    /// payment, activation, claim).
    pub fn note_confirmed_mutation(&mut self, version: u64) {
        self.observe_version(version);
        self.mutations += 1;
    }

    fn observe_version(&mut self, version: u64) {
        self.last_version = self.last_version.max(version);
    }

    /// Stamp to attach to a wallet re-fetch.
    pub fn resync_stamp(&self) -> u64 {
        self.mutations
    }

    /// Reconcile a fetched snapshot. Returns the wallet to store, or `None`
    /// when the snapshot must be discarded.
    ///
    /// `outside_in_flight` is set while a craft, activation, claim or boost
    /// payment awaits its answer. The server may already have applied it, and
    /// its completion will apply it locally again.
    pub fn reconcile(
        &mut self,
        stamp: u64,
        outside_in_flight: bool,
        snapshot: VersionedWallet,
        now_ms: EpochMs,
    ) -> Option<Wallet> {
        if self.writing || outside_in_flight || stamp != self.mutations {
            return None;
        }
        if snapshot.version != 0 && snapshot.version < self.last_version {
            return None;
        }
        self.observe_version(snapshot.version);
        self.last_synced_at = Some(now_ms);
        Some(snapshot.wallet.with_delta(&self.pending_total()))
    }

    /// Forget the in-flight write on teardown; its completion is ignored.
    pub fn abandon_write(&mut self) {
        self.writing = false;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    Online,
    Syncing,
    Offline,
}

impl SyncStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Online => "Online",
            SyncStatus::Syncing => "Syncing...",
            SyncStatus::Offline => "Offline",
        }
    }
}

#[derive(Debug)]
pub struct SyncIndicator {
    online: bool,
}

impl SyncIndicator {
    pub fn new() -> Self {
        Self { online: true }
    }

    pub fn set_online(&mut self, online: bool) -> bool {
        let changed = self.online != online;
        self.online = online;
        changed
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn status(&self, queue: &SyncQueue) -> SyncStatus {
        if !self.online {
            SyncStatus::Offline
        } else if queue.is_writing() {
            SyncStatus::Syncing
        } else {
            SyncStatus::Online
        }
    }

    /// `Last sync: 12s ago`, or `None` before the first sync.
    pub fn since_label(&self, queue: &SyncQueue, now_ms: EpochMs) -> Option<String> {
        let at = queue.last_synced_at()?;
        Some(format_since(now_ms.saturating_sub(at) / 1000))
    }
}
