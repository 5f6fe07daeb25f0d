//! Triggers: immutable captures of a reportable event
//!
//! A trigger does not copy the call stack when it is created. It keeps a handle to the
//! reference tracker and reads the frames when a serializer asks for them, which always
//! happens synchronously on the thread the event was raised on.

use crate::scope::TrackedScope;
use crate::tracker::{ReferenceTracker, ScopeIter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Shared handle to an error raised by the monitored application.
///
/// The allocation behind the `Arc` is the error's identity: passing the same handle to
/// several nested error hooks is how propagation through frames is recognised.
pub type ErrorRef = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// `true` if both handles point at the same error allocation
pub fn same_error(a: &ErrorRef, b: &ErrorRef) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Error,
    Timeout,
}

/// An error reached an instrumented frame
#[derive(Clone)]
pub struct ErrorTrigger {
    id: Uuid,
    occurred_at: DateTime<Utc>,
    reference_tracker: Arc<dyn ReferenceTracker>,
    error: ErrorRef,
}

impl ErrorTrigger {
    pub fn new(reference_tracker: Arc<dyn ReferenceTracker>, error: ErrorRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            reference_tracker,
            error,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn kind(&self) -> TriggerKind {
        TriggerKind::Error
    }

    pub fn error(&self) -> &ErrorRef {
        &self.error
    }

    /// Whether `error` is the very error object this trigger was raised for
    pub fn is_same_error(&self, error: &ErrorRef) -> bool {
        same_error(&self.error, error)
    }

    pub fn current_scope(&self) -> Option<TrackedScope> {
        self.reference_tracker.current_scope()
    }

    pub fn scopes(&self) -> ScopeIter {
        self.reference_tracker.scopes()
    }
}

impl fmt::Debug for ErrorTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorTrigger")
            .field("id", &self.id)
            .field("occurred_at", &self.occurred_at)
            .field("error", &self.error)
            .finish()
    }
}

/// An instrumented call took longer than its threshold
#[derive(Clone)]
pub struct TimeoutTrigger {
    id: Uuid,
    occurred_at: DateTime<Utc>,
    reference_tracker: Arc<dyn ReferenceTracker>,
    timeout_threshold_ms: u64,
    timeout_ms: u64,
}

impl TimeoutTrigger {
    pub fn new(
        reference_tracker: Arc<dyn ReferenceTracker>,
        timeout_threshold_ms: u64,
        timeout_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            reference_tracker,
            timeout_threshold_ms,
            timeout_ms,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn kind(&self) -> TriggerKind {
        TriggerKind::Timeout
    }

    /// Configured limit in milliseconds
    pub fn timeout_threshold_ms(&self) -> u64 {
        self.timeout_threshold_ms
    }

    /// Observed duration in milliseconds
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn current_scope(&self) -> Option<TrackedScope> {
        self.reference_tracker.current_scope()
    }

    pub fn scopes(&self) -> ScopeIter {
        self.reference_tracker.scopes()
    }
}

impl fmt::Debug for TimeoutTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutTrigger")
            .field("id", &self.id)
            .field("occurred_at", &self.occurred_at)
            .field("timeout_threshold_ms", &self.timeout_threshold_ms)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
