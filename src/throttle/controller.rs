//! Fixed-window rate limiter shared by all threads
//!
//! The window start and the counter are packed into one `AtomicU64` and updated with a
//! compare-and-swap loop, so an admission decision is a single atomic read-modify-write
//! and two threads can never both take the last slot of a window.

use super::clock::{Clock, SystemClock};
use super::Throttler;
use crate::trigger::{ErrorTrigger, TimeoutTrigger};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const DEFAULT_WINDOW_LENGTH_MS: u64 = 1000;
pub const DEFAULT_MAX_PER_WINDOW: u32 = 5;

// Low bits: triggers seen in the window. High bits: window start, relative to `epoch_ms`.
const COUNT_BITS: u32 = 24;
const COUNT_MASK: u64 = (1 << COUNT_BITS) - 1;
const START_MASK: u64 = u64::MAX >> COUNT_BITS;

/// Largest per-window limit the packed counter can enforce; larger limits are capped to it
pub const MAX_COUNTABLE_PER_WINDOW: u32 = (COUNT_MASK - 1) as u32;

fn pack(window_start: u64, count: u64) -> u64 {
    ((window_start & START_MASK) << COUNT_BITS) | (count & COUNT_MASK)
}

fn unpack(state: u64) -> (u64, u64) {
    (state >> COUNT_BITS, state & COUNT_MASK)
}

/// Admits at most `max_per_window` triggers per `window_length_ms`.
///
/// A zero window length or a zero limit disables throttling. Limits above
/// [`MAX_COUNTABLE_PER_WINDOW`] are capped to it. Errors and timeouts share one budget.
pub struct ThrottleController {
    window_length_ms: u64,
    max_per_window: u32,
    clock: Arc<dyn Clock>,
    epoch_ms: u64,
    state: AtomicU64,
}

impl ThrottleController {
    pub fn new(window_length_ms: u64, max_per_window: u32) -> Self {
        Self::with_clock(window_length_ms, max_per_window, Arc::new(SystemClock))
    }

    /// Controller reading time from `clock`; the first window starts now.
    pub fn with_clock(window_length_ms: u64, max_per_window: u32, clock: Arc<dyn Clock>) -> Self {
        let epoch_ms = clock.now_millis();
        Self {
            window_length_ms,
            max_per_window: max_per_window.min(MAX_COUNTABLE_PER_WINDOW),
            clock,
            epoch_ms,
            state: AtomicU64::new(pack(0, 0)),
        }
    }

    pub fn window_length_ms(&self) -> u64 {
        self.window_length_ms
    }

    pub fn max_per_window(&self) -> u32 {
        self.max_per_window
    }

    pub fn is_disabled(&self) -> bool {
        self.window_length_ms < 1 || self.max_per_window < 1
    }

    /// Count one trigger against the current window and decide whether it may be handled
    pub fn admit(&self) -> bool {
        if self.is_disabled() {
            return true;
        }

        let max = u64::from(self.max_per_window);
        // The counter stops one past the limit; anything beyond is rejected all the same.
        let ceiling = max + 1;
        let now = self.clock.now_millis().saturating_sub(self.epoch_ms) & START_MASK;

        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let (window_start, count) = unpack(current);
            let (next_start, next_count) =
                if now.saturating_sub(window_start) >= self.window_length_ms {
                    (now, 1)
                } else {
                    (window_start, (count + 1).min(ceiling))
                };

            match self.state.compare_exchange_weak(
                current,
                pack(next_start, next_count),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next_count <= max,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for ThrottleController {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_LENGTH_MS, DEFAULT_MAX_PER_WINDOW)
    }
}

impl Throttler for ThrottleController {
    fn admit_error(&self, _trigger: &ErrorTrigger) -> bool {
        self.admit()
    }

    fn admit_timeout(&self, _trigger: &TimeoutTrigger) -> bool {
        self.admit()
    }
}
