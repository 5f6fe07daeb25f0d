//! Null tracer implementation following the Null Object Pattern
//!
//! Instrumented code can always hold a [`Tracer`]; when monitoring is switched off it is
//! handed a [`NullTracer`] instead of checking an `Option` at every call site.

use super::Tracer;
use crate::error::Result;
use crate::scope::WatchedRef;
use crate::trigger::ErrorRef;

/// A tracer that accepts every callback and records nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracer;

impl NullTracer {
    pub fn new() -> Self {
        Self
    }

    /// Always returns false for null tracer
    pub fn is_enabled(&self) -> bool {
        false
    }
}

impl Tracer for NullTracer {
    fn entering(
        &self,
        _source: Option<WatchedRef>,
        _method: &str,
        _params: &[(&str, WatchedRef)],
    ) -> Result<()> {
        Ok(())
    }

    fn exiting(&self, _source: Option<&WatchedRef>, _method: &str) -> Result<()> {
        Ok(())
    }

    fn value_change(
        &self,
        _source: Option<&WatchedRef>,
        _method: &str,
        _variable: &str,
        _value: WatchedRef,
    ) -> Result<()> {
        Ok(())
    }

    fn on_error(&self, _source: Option<&WatchedRef>, _method: &str, _error: &ErrorRef) -> Result<()> {
        Ok(())
    }

    fn timeout(
        &self,
        _source: Option<&WatchedRef>,
        _method: &str,
        _timeout_threshold_ms: u64,
        _timeout_ms: u64,
    ) -> Result<()> {
        Ok(())
    }
}
