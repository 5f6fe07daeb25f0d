//! Scoped instrumentation helpers
//!
//! Hand-instrumented code rarely wants to pair `entering` and `exiting` by hand. A
//! [`ScopeGuard`] opens a frame when created and closes it when dropped, so early returns
//! and `?` keep the frame stack balanced. [`traced`] goes one step further and reports the
//! error returned by a closure before its frame is closed.

use crate::error::Result;
use crate::scope::WatchedRef;
use crate::tracer::Tracer;
use crate::trigger::ErrorRef;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// An open frame of a [`Tracer`], closed on drop
pub struct ScopeGuard<'a> {
    tracer: &'a dyn Tracer,
    source: Option<WatchedRef>,
    method: String,
    started: Instant,
    timeout_threshold_ms: Option<u64>,
}

impl<'a> ScopeGuard<'a> {
    /// Report `entering` and return the guard that will report `exiting`.
    ///
    /// If the tracer rejects the call no frame was opened and no guard is returned.
    pub fn enter(
        tracer: &'a dyn Tracer,
        source: Option<WatchedRef>,
        method: impl Into<String>,
        params: &[(&str, WatchedRef)],
    ) -> Result<Self> {
        let method = method.into();
        tracer.entering(source.clone(), &method, params)?;
        Ok(Self {
            tracer,
            source,
            method,
            started: Instant::now(),
            timeout_threshold_ms: None,
        })
    }

    /// Report a timeout when the frame is closed later than `threshold_ms` after it opened
    pub fn with_timeout_threshold(mut self, threshold_ms: u64) -> Self {
        self.timeout_threshold_ms = Some(threshold_ms);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Record a new value for a variable of this frame
    pub fn track(&self, variable: &str, value: WatchedRef) -> Result<()> {
        self.tracer
            .value_change(self.source.as_ref(), &self.method, variable, value)
    }

    /// Report an error passing through this frame
    pub fn report_error(&self, error: &ErrorRef) -> Result<()> {
        self.tracer.on_error(self.source.as_ref(), &self.method, error)
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if let Some(threshold) = self.timeout_threshold_ms {
            let elapsed = self.elapsed_ms();
            if elapsed > threshold {
                // Reported before exiting so the snapshot still contains this frame.
                if let Err(e) = self
                    .tracer
                    .timeout(self.source.as_ref(), &self.method, threshold, elapsed)
                {
                    warn!(method = %self.method, "Failed to report timeout: {}", e);
                }
            }
        }

        if let Err(e) = self.tracer.exiting(self.source.as_ref(), &self.method) {
            warn!(method = %self.method, "Failed to close frame: {}", e);
        }
    }
}

/// Run `body` inside a frame of `method` and report the error it returns.
///
/// Returning the same [`ErrorRef`] from nested `traced` calls reports it once, from the
/// innermost frame. Failing to open the frame is returned as an error without running
/// `body`; failing to deliver a report is logged and the body's error is returned as is.
pub fn traced<T, F>(
    tracer: &dyn Tracer,
    source: Option<WatchedRef>,
    method: &str,
    params: &[(&str, WatchedRef)],
    body: F,
) -> std::result::Result<T, ErrorRef>
where
    F: FnOnce(&ScopeGuard<'_>) -> std::result::Result<T, ErrorRef>,
{
    let guard = ScopeGuard::enter(tracer, source, method, params)
        .map_err(|e| Arc::new(e) as ErrorRef)?;

    let result = body(&guard);
    if let Err(error) = &result {
        if let Err(e) = guard.report_error(error) {
            warn!(method, "Failed to report error: {}", e);
        }
    }
    result
}
