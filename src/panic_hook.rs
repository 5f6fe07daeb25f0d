//! Reporting panics through the tracer
//!
//! A panic hook runs on the panicking thread before unwinding starts, so the frames of the
//! failing call are still on that thread's stack and end up in the snapshot.

use crate::trigger::ErrorRef;
use crate::tracer::Tracer;
use std::any::Any;
use std::fmt;
use std::panic;
use std::sync::Arc;
use tracing::{info, warn};

/// A panic, turned into an error so it can be reported like one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
    /// Panic message, or a placeholder for non-string payloads
    pub message: String,
    /// Source location if available (file:line:col)
    pub location: Option<String>,
}

impl PanicError {
    pub fn new(message: impl Into<String>, location: Option<String>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }

    /// Extract the message of a panic payload
    pub fn payload_message(payload: &(dyn Any + Send)) -> String {
        if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        }
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "panicked at {}: {}", location, self.message),
            None => write!(f, "panicked: {}", self.message),
        }
    }
}

impl std::error::Error for PanicError {}

/// Install a process-wide panic hook that reports every panic to `tracer`.
///
/// The previously installed hook still runs afterwards, so the default panic output is
/// kept. Frames of the panicking thread are reported but not popped: unwinding skips the
/// instrumented `exiting` calls, so a thread that catches the panic and keeps running
/// carries the stale frames until it exits.
pub fn install_panic_hook(tracer: Arc<dyn Tracer>) {
    let previous = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));
        let error: ErrorRef = Arc::new(PanicError::new(
            PanicError::payload_message(info.payload()),
            location,
        ));

        if let Err(e) = tracer.on_error(None, "panic", &error) {
            warn!("Failed to report panic: {}", e);
        }

        previous(info);
    }));

    info!("Snaperr panic hook installed");
}
