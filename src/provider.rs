//! Default tracer assembly
//!
//! [`SnaperrProvider`] wires the stock components together from a [`SnaperrConfig`]:
//! the thread-local reference tracker, the configured serializer and sink, and a fixed
//! window throttle. Instrumented code that does not build its own tracer uses
//! [`SnaperrProvider::global`].

use crate::config::{OutputFormat, SinkKind, SnaperrConfig};
use crate::handler::{LogWriter, NoopTriggerHandler, StdoutWriter, TriggerHandler};
use crate::serializer::{JsonSerializer, StringSerializer, TriggerSerializer};
use crate::throttle::{ThrottleController, Throttler, UnrestrictedThrottler};
use crate::tracer::SnaperrTracer;
use crate::tracker::StackBasedReferenceTracker;
use std::sync::{Arc, OnceLock};
use tracing::info;

static GLOBAL_TRACER: OnceLock<Arc<SnaperrTracer>> = OnceLock::new();

/// Builds [`SnaperrTracer`]s from configuration
#[derive(Debug, Clone, Default)]
pub struct SnaperrProvider {
    config: SnaperrConfig,
}

impl SnaperrProvider {
    pub fn new(config: SnaperrConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SnaperrConfig {
        &self.config
    }

    /// Process-wide tracer, built from the environment on first use
    pub fn global() -> Arc<SnaperrTracer> {
        Arc::clone(GLOBAL_TRACER.get_or_init(|| Arc::new(SnaperrProvider::default().build())))
    }

    pub fn build(&self) -> SnaperrTracer {
        info!(
            format = %self.config.format,
            sink = %self.config.sink,
            throttle_window_ms = self.config.throttle_window_ms,
            throttle_max_per_window = self.config.throttle_max_per_window,
            "Loading snaperr..."
        );

        SnaperrTracer::new(
            Arc::new(StackBasedReferenceTracker::new()),
            self.serializer(),
            self.handler(),
            self.throttler(),
        )
    }

    fn serializer(&self) -> Arc<dyn TriggerSerializer> {
        match self.config.format {
            OutputFormat::Text => Arc::new(StringSerializer::new()),
            OutputFormat::Json => Arc::new(JsonSerializer::new()),
        }
    }

    fn handler(&self) -> Arc<dyn TriggerHandler> {
        match self.config.sink {
            SinkKind::Stdout => Arc::new(StdoutWriter),
            SinkKind::Log => Arc::new(LogWriter),
            SinkKind::None => Arc::new(NoopTriggerHandler),
        }
    }

    fn throttler(&self) -> Arc<dyn Throttler> {
        if self.config.is_throttling_disabled() {
            Arc::new(UnrestrictedThrottler)
        } else {
            Arc::new(ThrottleController::new(
                self.config.throttle_window_ms,
                self.config.throttle_max_per_window,
            ))
        }
    }
}
