//! Snapshot-on-error tracing
//!
//! `snaperr` keeps a light record of the call frames and watched variables of each
//! monitored thread. When an error or a timeout reaches an instrumented frame, the
//! frames are rendered into a report and handed to a sink, so the state that led to the
//! failure can be inspected without a debugger.

pub mod config;
pub mod error;
pub mod handler;
pub mod instrument;
pub mod panic_hook;
pub mod provider;
pub mod scope;
pub mod serializer;
pub mod throttle;
pub mod tracer;
pub mod tracker;
pub mod trigger;

pub use error::{Result, SnaperrError};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::{OutputFormat, SinkKind, SnaperrConfig};
    pub use crate::error::{Result, SnaperrError};
    pub use crate::handler::{LogWriter, NoopTriggerHandler, StdoutWriter, TriggerHandler};
    pub use crate::instrument::{traced, ScopeGuard};
    pub use crate::panic_hook::install_panic_hook;
    pub use crate::provider::SnaperrProvider;
    pub use crate::scope::{watch, watch_shared, WatchedRef};
    pub use crate::serializer::{JsonSerializer, StringSerializer, TriggerSerializer};
    pub use crate::throttle::{ThrottleController, Throttler};
    pub use crate::tracer::{NullTracer, SnaperrTracer, Tracer};
    pub use crate::tracker::{ReferenceTracker, StackBasedReferenceTracker};
    pub use crate::trigger::{ErrorRef, ErrorTrigger, TimeoutTrigger};
}
