// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Rollback detection for authentic blobs.
//!
//! The runtime counter lives only in boundary memory. It starts at zero on
//! every activation and moves in lock-step with the transaction count, so
//! within one activation any authentic blob whose saved counter is not
//! strictly greater than the current counter is a stale copy.
//!
//! ## Known Gap
//!
//! The first load after a fresh activation is accepted whatever its saved
//! counter is. Combined with the constant seal key this means the host can
//! roll the account back to any earlier blob across a restart. This matches
//! the deployed behaviour and is covered by tests; do not close it here.

/// Verdict on an authentic blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayVerdict {
    Accept,
    Replay,
}

/// Volatile monotonic counter plus the startup-load window.
#[derive(Debug, Default)]
pub struct ReplayDetector {
    counter: u64,
    armed: bool,
}

impl ReplayDetector {
    /// Fresh detector: counter zero, startup window open.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Whether the startup load window has closed.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Close the startup window without a load (host had nothing stored).
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Reserve the next counter value for a mutation. `None` on overflow.
    pub fn next(&self) -> Option<u64> {
        self.counter.checked_add(1)
    }

    /// Commit a value obtained from [`Self::next`].
    pub fn advance_to(&mut self, value: u64) {
        debug_assert!(value >= self.counter);
        self.counter = value;
    }

    /// Classify a load attempt. Closes the startup window either way.
    pub fn check(&mut self, saved: u64) -> ReplayVerdict {
        let verdict = classify(self.armed, self.counter, saved);
        self.armed = true;
        verdict
    }

    /// Adopt the saved counter of an accepted blob.
    pub fn adopt(&mut self, saved: u64) {
        self.counter = saved;
    }
}

/// `saved <= current` is a replay once the startup window has closed.
pub fn classify(armed: bool, current: u64, saved: u64) -> ReplayVerdict {
    if armed && saved <= current {
        ReplayVerdict::Replay
    } else {
        ReplayVerdict::Accept
    }
}
