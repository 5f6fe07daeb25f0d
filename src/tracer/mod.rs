//! Tracer entry points for instrumented code
//!
//! Instrumented call sites report to a [`Tracer`]: frame entry and exit, writes to watched
//! variables, errors passing through a frame and calls that exceeded their time budget.
//!
//! # Components
//!
//! - **Tracer**: the instrumentation contract
//! - **SnaperrTracer**: builds snapshot reports for errors and timeouts
//! - **NullTracer**: null object for when monitoring is disabled
//!
//! # Usage Example
//!
//! ```rust
//! use snaperr::prelude::*;
//! use std::sync::Arc;
//!
//! let tracer = SnaperrTracer::new(
//!     Arc::new(StackBasedReferenceTracker::new()),
//!     Arc::new(StringSerializer::new()),
//!     Arc::new(NoopTriggerHandler),
//!     Arc::new(ThrottleController::default()),
//! );
//!
//! tracer.entering(Some(watch("Calculator")), "divide", &[("a", watch(1)), ("b", watch(0))])?;
//! let error: ErrorRef = Arc::new(std::io::Error::new(std::io::ErrorKind::Other, "division by zero"));
//! tracer.on_error(None, "divide", &error)?;
//! tracer.exiting(None, "divide")?;
//! # Ok::<(), snaperr::SnaperrError>(())
//! ```

pub mod null_tracer;
pub mod snaperr_tracer;

pub use null_tracer::NullTracer;
pub use snaperr_tracer::SnaperrTracer;

use crate::error::Result;
use crate::scope::WatchedRef;
use crate::trigger::ErrorRef;

/// Callbacks issued by instrumented code, always on the thread being monitored
pub trait Tracer: Send + Sync {
    /// A method was entered; `params` are its arguments as name/value pairs
    fn entering(
        &self,
        source: Option<WatchedRef>,
        method: &str,
        params: &[(&str, WatchedRef)],
    ) -> Result<()>;

    /// The method entered last is being left
    fn exiting(&self, source: Option<&WatchedRef>, method: &str) -> Result<()>;

    /// A watched variable of the current method was assigned
    fn value_change(
        &self,
        source: Option<&WatchedRef>,
        method: &str,
        variable: &str,
        value: WatchedRef,
    ) -> Result<()>;

    /// The method is returning a value. Nothing is captured by default.
    fn returning(
        &self,
        _source: Option<&WatchedRef>,
        _method: &str,
        _return_value: &WatchedRef,
    ) -> Result<()> {
        Ok(())
    }

    /// An error is passing through the method
    fn on_error(&self, source: Option<&WatchedRef>, method: &str, error: &ErrorRef) -> Result<()>;

    /// The method took `timeout_ms` against a limit of `timeout_threshold_ms`
    fn timeout(
        &self,
        source: Option<&WatchedRef>,
        method: &str,
        timeout_threshold_ms: u64,
        timeout_ms: u64,
    ) -> Result<()>;
}
