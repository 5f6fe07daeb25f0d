//! Tracer that turns errors and timeouts into state snapshots
//!
//! Each monitored thread is either idle or processing a trigger. While processing, every
//! hook call on that thread is ignored, so serializers and handlers may run instrumented
//! code without disturbing the frames being reported or starting a nested report.
//!
//! An error is reported once even if it passes through several instrumented frames: the
//! last reported error is remembered per thread and a hook call carrying the very same
//! error object is dropped. A different error object, even one wrapping the first, is a
//! new failure and is reported again.

use super::Tracer;
use crate::error::{Result, SnaperrError};
use crate::handler::TriggerHandler;
use crate::scope::WatchedRef;
use crate::serializer::TriggerSerializer;
use crate::throttle::Throttler;
use crate::tracker::ReferenceTracker;
use crate::trigger::{ErrorRef, ErrorTrigger, TimeoutTrigger};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-thread trigger processing state
#[derive(Debug, Default)]
struct ErrorState {
    /// A report is being built on this thread
    processing_in_progress: bool,
    /// Last error reported on this thread, used to recognise it while it propagates
    processed_error_trigger: Option<ErrorTrigger>,
}

static NEXT_TRACER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ERROR_STATES: RefCell<HashMap<u64, ErrorState>> = RefCell::new(HashMap::new());
}

/// Clears the processing flag when the report is done, however it ends
struct ProcessingGuard {
    tracer_id: u64,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        let _ = ERROR_STATES.try_with(|states| {
            if let Ok(mut states) = states.try_borrow_mut() {
                if let Some(state) = states.get_mut(&self.tracer_id) {
                    state.processing_in_progress = false;
                }
            }
        });
    }
}

/// Snapshot-on-error tracer
///
/// Frame bookkeeping goes to the [`ReferenceTracker`]; an admitted trigger is turned into
/// text by the [`TriggerSerializer`] and delivered by the [`TriggerHandler`], synchronously
/// on the thread that raised it.
///
/// Dropping a tracer only releases the dropping thread's processing state. Any other thread
/// that used it keeps its entry, including the last reported [`ErrorTrigger`] with its error
/// and tracker handle, until that thread exits.
pub struct SnaperrTracer {
    id: u64,
    reference_tracker: Arc<dyn ReferenceTracker>,
    serializer: Arc<dyn TriggerSerializer>,
    handler: Arc<dyn TriggerHandler>,
    throttler: Arc<dyn Throttler>,
}

impl SnaperrTracer {
    pub fn new(
        reference_tracker: Arc<dyn ReferenceTracker>,
        serializer: Arc<dyn TriggerSerializer>,
        handler: Arc<dyn TriggerHandler>,
        throttler: Arc<dyn Throttler>,
    ) -> Self {
        Self {
            id: NEXT_TRACER_ID.fetch_add(1, Ordering::Relaxed),
            reference_tracker,
            serializer,
            handler,
            throttler,
        }
    }

    pub fn reference_tracker(&self) -> &Arc<dyn ReferenceTracker> {
        &self.reference_tracker
    }

    /// Whether the calling thread is currently building a report
    pub fn is_processing(&self) -> bool {
        self.with_state(|state| state.processing_in_progress)
    }

    /// [`Tracer::entering`] for weavers that pass parameters as one flat
    /// `name, value, name, value, ...` list.
    ///
    /// Names must be `&'static str` or `String` values. An odd-length list is rejected
    /// instead of silently dropping the unpaired name.
    pub fn entering_flat(
        &self,
        source: Option<WatchedRef>,
        method: &str,
        params: &[WatchedRef],
    ) -> Result<()> {
        if self.has_pending_processing() {
            return Ok(());
        }

        if params.len() % 2 != 0 {
            return Err(SnaperrError::InvalidArgument(format!(
                "parameter list of '{}' has odd length {}",
                method,
                params.len()
            )));
        }

        let mut pairs = Vec::with_capacity(params.len() / 2);
        for (index, pair) in params.chunks_exact(2).enumerate() {
            let name = parameter_name(&pair[0]).ok_or_else(|| {
                SnaperrError::InvalidArgument(format!(
                    "parameter name at position {} of '{}' is not a string",
                    index * 2,
                    method
                ))
            })?;
            pairs.push((name, Arc::clone(&pair[1])));
        }

        self.entering(source, method, &pairs)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ErrorState) -> R) -> R {
        ERROR_STATES.with(|states| {
            let mut states = states.borrow_mut();
            f(states.entry(self.id).or_default())
        })
    }

    fn has_pending_processing(&self) -> bool {
        self.with_state(|state| state.processing_in_progress)
    }

    fn is_propagating_error(&self, error: &ErrorRef) -> bool {
        self.with_state(|state| {
            state
                .processed_error_trigger
                .as_ref()
                .is_some_and(|processed| processed.is_same_error(error))
        })
    }

    fn start_trigger_processing(&self, error_trigger: Option<ErrorTrigger>) -> ProcessingGuard {
        // The replaced trigger is dropped outside of the state borrow.
        let previous = self.with_state(|state| {
            state.processing_in_progress = true;
            std::mem::replace(&mut state.processed_error_trigger, error_trigger)
        });
        drop(previous);
        ProcessingGuard { tracer_id: self.id }
    }
}

fn parameter_name(value: &WatchedRef) -> Option<&str> {
    let any = (**value).as_any();
    if let Some(name) = any.downcast_ref::<&'static str>() {
        return Some(name);
    }
    any.downcast_ref::<String>().map(String::as_str)
}

impl Tracer for SnaperrTracer {
    fn entering(
        &self,
        source: Option<WatchedRef>,
        method: &str,
        params: &[(&str, WatchedRef)],
    ) -> Result<()> {
        if self.has_pending_processing() {
            return Ok(());
        }

        if let Some((position, _)) = params.iter().enumerate().find(|(_, (name, _))| name.is_empty()) {
            return Err(SnaperrError::InvalidArgument(format!(
                "parameter {} of '{}' has an empty name",
                position, method
            )));
        }

        self.reference_tracker.push_scope(source, method)?;
        for (name, value) in params {
            self.reference_tracker.track(name, Arc::clone(value))?;
        }
        Ok(())
    }

    fn exiting(&self, _source: Option<&WatchedRef>, _method: &str) -> Result<()> {
        if self.has_pending_processing() {
            return Ok(());
        }

        self.reference_tracker.pop_scope()
    }

    fn value_change(
        &self,
        _source: Option<&WatchedRef>,
        _method: &str,
        variable: &str,
        value: WatchedRef,
    ) -> Result<()> {
        if self.has_pending_processing() {
            return Ok(());
        }

        self.reference_tracker.track(variable, value)
    }

    fn on_error(&self, _source: Option<&WatchedRef>, method: &str, error: &ErrorRef) -> Result<()> {
        if self.has_pending_processing() {
            debug!(method, "Ignoring error raised while a report is being built");
            return Ok(());
        }
        if self.is_propagating_error(error) {
            debug!(method, "Error already reported on this thread, skipping");
            return Ok(());
        }

        // Reporting blocks the failing thread, so its own frames cannot change meanwhile.
        // Values reachable from other threads may still move under the serializer.
        let trigger = ErrorTrigger::new(Arc::clone(&self.reference_tracker), Arc::clone(error));

        if !self.throttler.admit_error(&trigger) {
            debug!(method, trigger_id = %trigger.id(), "Error trigger throttled");
            return Ok(());
        }

        let _processing = self.start_trigger_processing(Some(trigger.clone()));
        let serialized = self.serializer.serialize_error(&trigger).inspect_err(|e| {
            warn!(method, "Failed to serialize error trigger: {}", e);
        })?;
        self.handler.on_error(&serialized).inspect_err(|e| {
            warn!(method, "Failed to deliver error report: {}", e);
        })?;
        Ok(())
    }

    fn timeout(
        &self,
        _source: Option<&WatchedRef>,
        method: &str,
        timeout_threshold_ms: u64,
        timeout_ms: u64,
    ) -> Result<()> {
        if self.has_pending_processing() {
            debug!(method, "Ignoring timeout raised while a report is being built");
            return Ok(());
        }

        // Timeouts are opt-in per call site, so no propagation check is made for them.
        let trigger = TimeoutTrigger::new(
            Arc::clone(&self.reference_tracker),
            timeout_threshold_ms,
            timeout_ms,
        );

        if !self.throttler.admit_timeout(&trigger) {
            debug!(method, trigger_id = %trigger.id(), "Timeout trigger throttled");
            return Ok(());
        }

        let _processing = self.start_trigger_processing(None);
        let serialized = self.serializer.serialize_timeout(&trigger).inspect_err(|e| {
            warn!(method, "Failed to serialize timeout trigger: {}", e);
        })?;
        self.handler.on_timeout(&serialized).inspect_err(|e| {
            warn!(method, "Failed to deliver timeout report: {}", e);
        })?;
        Ok(())
    }
}

impl Drop for SnaperrTracer {
    fn drop(&mut self) {
        let removed = ERROR_STATES
            .try_with(|states| {
                states
                    .try_borrow_mut()
                    .ok()
                    .and_then(|mut states| states.remove(&self.id))
            })
            .ok()
            .flatten();
        drop(removed);
    }
}
