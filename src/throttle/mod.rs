//! Throttling of error and timeout triggers
//!
//! The tracer asks a [`Throttler`] before it builds a report. Implementations are shared
//! by every monitored thread and must be safe to call concurrently.

mod clock;
mod controller;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    ThrottleController, DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW_LENGTH_MS, MAX_COUNTABLE_PER_WINDOW,
};

use crate::trigger::{ErrorTrigger, TimeoutTrigger};

/// Decides whether a trigger is handled at all
pub trait Throttler: Send + Sync {
    /// `true` if the tracer should report the error
    fn admit_error(&self, trigger: &ErrorTrigger) -> bool;

    /// `true` if the tracer should report the timeout
    fn admit_timeout(&self, trigger: &TimeoutTrigger) -> bool;
}

/// Throttler that admits every trigger
#[derive(Debug, Clone, Copy, Default)]
pub struct UnrestrictedThrottler;

impl Throttler for UnrestrictedThrottler {
    fn admit_error(&self, _trigger: &ErrorTrigger) -> bool {
        true
    }

    fn admit_timeout(&self, _trigger: &TimeoutTrigger) -> bool {
        true
    }
}
