//! Per-namespace sync state machine.
//!
//! # States
//! - Unsynced: nothing installed yet, readers get their defaults
//! - Synced: the current snapshot reflects the last successful sync (or the disk fallback)
//! - Stale: the last fetch failed, the previous snapshot is still served
//!
//! # State Transitions
//! ```text
//! Unsynced → Synced: fallback loaded or fetch succeeds
//! Synced → Stale: fetch fails
//! Stale → Synced: fetch succeeds
//! Unsynced → Unsynced: fetch fails with nothing installed
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use crate::cache::snapshot::{now_millis, SnapshotSource};

/// Sync state of a namespace.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unsynced = 0,
    Synced = 1,
    Stale = 2,
}

impl From<u8> for SyncState {
    fn from(val: u8) -> Self {
        match val {
            1 => SyncState::Synced,
            2 => SyncState::Stale,
            _ => SyncState::Unsynced,
        }
    }
}

/// Point-in-time view of a namespace's health.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceStatus {
    pub namespace: String,
    pub state: SyncState,
    /// Origin of the served snapshot, if any.
    pub source: Option<SnapshotSource>,
    pub revision: Option<String>,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    /// Last successful remote sync (milliseconds since epoch).
    pub last_success_ms: Option<u64>,
    /// False once consecutive failures reach the configured threshold.
    pub healthy: bool,
}

/// Lock-free counters backing [`NamespaceStatus`].
#[derive(Debug)]
pub struct NamespaceHealth {
    state: AtomicU8,
    consecutive_failures: AtomicU32,
    total_failures: AtomicU64,
    last_success_ms: AtomicU64,
    /// Next fetch ticket. Ticket 0 is reserved for fallback data.
    next_ticket: AtomicU64,
}

impl Default for NamespaceHealth {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(SyncState::Unsynced as u8),
            consecutive_failures: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
            last_success_ms: AtomicU64::new(0),
            next_ticket: AtomicU64::new(1),
        }
    }
}

impl NamespaceHealth {
    pub fn state(&self) -> SyncState {
        SyncState::from(self.state.load(Ordering::Acquire))
    }

    /// Draw the ticket for a fetch about to be issued.
    pub fn next_ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    pub fn last_success_ms(&self) -> Option<u64> {
        match self.last_success_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    pub fn is_healthy(&self, failure_threshold: u32) -> bool {
        self.consecutive_failures() < failure_threshold
    }

    /// A fallback snapshot was installed.
    pub fn mark_fallback_loaded(&self) {
        let _ = self.state.compare_exchange(
            SyncState::Unsynced as u8,
            SyncState::Synced as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Report a successful fetch.
    pub fn mark_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.last_success_ms.store(now_millis(), Ordering::Relaxed);
        self.state.store(SyncState::Synced as u8, Ordering::Release);
    }

    /// Report a failed fetch. Returns the new consecutive failure count.
    pub fn mark_failure(&self, has_snapshot: bool) -> u32 {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        if has_snapshot {
            self.state.store(SyncState::Stale as u8, Ordering::Release);
        }
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }
}
