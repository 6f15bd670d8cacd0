//! Per-key fixed-window counter.

use std::time::Duration;

/// Counter state for one action/client pair.
///
/// Timestamps are offsets on the limiter's [`Clock`](super::Clock). The
/// counter is not synchronized itself; the registry lock covers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterEntry {
    /// When the current window started
    window_start: Duration,
    /// Operations still permitted in the current window
    remaining: u32,
    /// When this entry was last persisted
    last_write: Duration,
}

impl CounterEntry {
    /// Create a counter with a full budget whose window starts at `now`.
    pub fn new(limit: u32, now: Duration) -> Self {
        Self {
            window_start: now,
            remaining: limit,
            last_write: now,
        }
    }

    /// Start a fresh window if the current one has elapsed.
    ///
    /// Returns `true` if the window was reset.
    pub fn maybe_reset_window(&mut self, limit: u32, window: Duration, now: Duration) -> bool {
        if now.saturating_sub(self.window_start) >= window {
            self.remaining = limit;
            self.window_start = now;
            true
        } else {
            false
        }
    }

    /// Consume one operation from the budget.
    ///
    /// Returns `false` without touching the counter when the budget is spent.
    pub fn try_acquire(&mut self, now: Duration) -> bool {
        if self.remaining == 0 {
            return false;
        }

        self.remaining -= 1;
        self.last_write = now;
        true
    }

    /// Whether the entry has gone unwritten for a whole window.
    pub fn is_expired(&self, window: Duration, now: Duration) -> bool {
        now.saturating_sub(self.last_write) >= window
    }

    /// Get the duration until the current window resets.
    pub fn duration_until_reset(&self, window: Duration, now: Duration) -> Duration {
        window.saturating_sub(now.saturating_sub(self.window_start))
    }

    /// Get the remaining quota.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Get the start of the current window.
    pub fn window_start(&self) -> Duration {
        self.window_start
    }
}
