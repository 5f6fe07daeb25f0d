//! Watched values and immutable views of call frames
//!
//! Instrumented code hands the tracer arbitrary values. They are stored as
//! [`WatchedRef`]s: shared, type-erased references that can be rendered for a
//! report and downcast again by reporters that know the concrete type.

use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Anything that can be watched by the tracer.
///
/// Blanket-implemented for every `Any + Debug + Send + Sync` type, so callers never
/// implement it by hand.
pub trait Watchable: Any + fmt::Debug + Send + Sync {
    /// Borrow the value as [`Any`] for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared reference into a shared [`Any`] for owned downcasting
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T> Watchable for T
where
    T: Any + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Shared reference to a watched value
pub type WatchedRef = Arc<dyn Watchable>;

/// Wrap a value so it can be handed to the tracer.
pub fn watch<T: Watchable>(value: T) -> WatchedRef {
    Arc::new(value)
}

/// Watch an already shared value without wrapping it a second time.
///
/// Use this for values that are mutated after being reported (e.g. `Arc<Mutex<T>>`):
/// a snapshot taken later shows the referent's state at snapshot time.
pub fn watch_shared<T: Watchable>(value: Arc<T>) -> WatchedRef {
    value
}

/// Render a watched value for text reports.
///
/// Strings are written as-is, everything else through its `Debug` representation.
pub fn render(value: &dyn Watchable) -> String {
    let any = value.as_any();
    if let Some(s) = any.downcast_ref::<String>() {
        return s.clone();
    }
    if let Some(s) = any.downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    format!("{:?}", value)
}

/// Render an optional owner, `null` when the frame has none
pub fn render_source(source: Option<&WatchedRef>) -> String {
    match source {
        Some(source) => render(source.as_ref()),
        None => "null".to_string(),
    }
}

/// The most recent value reported for one variable of a frame.
///
/// A cell is created the first time a name is tracked in a frame; subsequent writes
/// replace the payload in place, so anyone holding the cell sees the latest value.
pub struct TrackedValue {
    name: String,
    value: RwLock<WatchedRef>,
}

impl TrackedValue {
    pub fn new(name: impl Into<String>, value: WatchedRef) -> Self {
        Self {
            name: name.into(),
            value: RwLock::new(value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current payload of the cell
    pub fn value(&self) -> WatchedRef {
        Arc::clone(&self.value.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Overwrite the payload, keeping the cell itself
    pub fn set_value(&self, value: WatchedRef) {
        drop(self.replace_value(value));
    }

    /// Overwrite the payload and hand back the previous one
    pub fn replace_value(&self, value: WatchedRef) -> WatchedRef {
        let mut slot = self.value.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, value)
    }

    /// Downcast the current payload to a shared `T`
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Watchable::into_any_arc(self.value()).downcast::<T>().ok()
    }

    /// Clone the current payload out as a `T`
    pub fn value_as<T: Any + Clone>(&self) -> Option<T> {
        let value = self.value();
        (*value).as_any().downcast_ref::<T>().cloned()
    }

    /// Payload rendered for text reports
    pub fn rendered(&self) -> String {
        render(self.value().as_ref())
    }
}

impl fmt::Debug for TrackedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedValue")
            .field("name", &self.name)
            .field("value", &self.value())
            .finish()
    }
}

/// Immutable view of one call frame.
///
/// Produced by [`ReferenceTracker::current_scope`](crate::tracker::ReferenceTracker::current_scope)
/// and [`ReferenceTracker::scopes`](crate::tracker::ReferenceTracker::scopes). The variable map
/// is a copy: variables tracked after the view was taken never show up in it, while the
/// cells it holds still reflect later writes to already known names.
#[derive(Debug, Clone)]
pub struct TrackedScope {
    source: Option<WatchedRef>,
    method_name: String,
    references: IndexMap<String, Arc<TrackedValue>>,
}

impl TrackedScope {
    pub fn new(
        source: Option<WatchedRef>,
        method_name: impl Into<String>,
        references: IndexMap<String, Arc<TrackedValue>>,
    ) -> Self {
        Self {
            source,
            method_name: method_name.into(),
            references,
        }
    }

    /// Object owning the invocation, `None` for free functions
    pub fn source(&self) -> Option<&WatchedRef> {
        self.source.as_ref()
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Tracked variables in insertion order
    pub fn references(&self) -> &IndexMap<String, Arc<TrackedValue>> {
        &self.references
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TrackedValue>> {
        self.references.get(name)
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}
