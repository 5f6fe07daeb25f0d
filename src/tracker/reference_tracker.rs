//! Reference tracker contract and its thread-local implementation

use super::call_stack::CallStack;
use super::ScopeIter;
use crate::error::{Result, SnaperrError};
use crate::scope::{TrackedScope, WatchedRef};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Records the call frames and watched variables of the calling thread.
///
/// Every method operates on the state of the thread that calls it; two threads sharing
/// one tracker never see each other's frames.
pub trait ReferenceTracker: Send + Sync {
    /// Record a write to `variable_name` in the current frame.
    ///
    /// The first write creates the variable's cell, later writes replace the cell's payload.
    fn track(&self, variable_name: &str, value: WatchedRef) -> Result<()>;

    /// Open a new frame for an invocation of `method_name` on `source`
    fn push_scope(&self, source: Option<WatchedRef>, method_name: &str) -> Result<()>;

    /// Close the innermost frame
    fn pop_scope(&self) -> Result<()>;

    fn is_empty(&self) -> bool;

    /// Detached view of the innermost frame, `None` when no frame is open
    fn current_scope(&self) -> Option<TrackedScope>;

    /// Views of all open frames, innermost first
    fn scopes(&self) -> ScopeIter;
}

static NEXT_TRACKER_ID: AtomicU64 = AtomicU64::new(1);

// Keyed by tracker id so that independent tracker instances keep separate stacks.
thread_local! {
    static CALL_STACKS: RefCell<HashMap<u64, CallStack>> = RefCell::new(HashMap::new());
}

/// [`ReferenceTracker`] backed by one arena stack per thread.
///
/// The stack of a thread is created on its first use and lives until the thread exits
/// or the tracker is dropped on that thread. Stacks never migrate between threads.
///
/// Dropping a tracker only releases the dropping thread's stack. A long-lived thread (for
/// example a pool worker) that used a short-lived tracker keeps that tracker's stack, and
/// the values in it, until the thread itself exits.
#[derive(Debug)]
pub struct StackBasedReferenceTracker {
    id: u64,
}

impl StackBasedReferenceTracker {
    pub fn new() -> Self {
        Self {
            id: NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn with_stack<R>(&self, f: impl FnOnce(&mut CallStack) -> R) -> R {
        CALL_STACKS.with(|stacks| {
            let mut stacks = stacks.borrow_mut();
            f(stacks.entry(self.id).or_default())
        })
    }

    /// Number of open frames on the calling thread
    pub fn depth(&self) -> usize {
        self.with_stack(|stack| stack.len())
    }
}

impl Default for StackBasedReferenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceTracker for StackBasedReferenceTracker {
    fn track(&self, variable_name: &str, value: WatchedRef) -> Result<()> {
        if variable_name.is_empty() {
            return Err(SnaperrError::InvalidArgument(
                "variable name must not be empty".to_string(),
            ));
        }

        // The replaced payload is dropped after the stack borrow is released.
        let replaced = self.with_stack(|stack| match stack.peek_mut() {
            Some(frame) => Ok(frame.track(variable_name, value)),
            None => Err(SnaperrError::NoActiveScope(format!(
                "cannot track '{}' before a scope was pushed",
                variable_name
            ))),
        })?;
        drop(replaced);
        Ok(())
    }

    fn push_scope(&self, source: Option<WatchedRef>, method_name: &str) -> Result<()> {
        self.with_stack(|stack| stack.push(source, method_name))
    }

    fn pop_scope(&self) -> Result<()> {
        let cleared = self.with_stack(|stack| stack.pop())?;
        drop(cleared);
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.with_stack(|stack| stack.is_empty())
    }

    fn current_scope(&self) -> Option<TrackedScope> {
        self.with_stack(|stack| stack.peek().map(|frame| frame.snapshot()))
    }

    fn scopes(&self) -> ScopeIter {
        self.with_stack(|stack| stack.snapshot_iter())
    }
}

impl Drop for StackBasedReferenceTracker {
    fn drop(&mut self) {
        // Only the dropping thread's stack can be reached; other threads release theirs on exit.
        let removed = CALL_STACKS
            .try_with(|stacks| {
                stacks
                    .try_borrow_mut()
                    .ok()
                    .and_then(|mut stacks| stacks.remove(&self.id))
            })
            .ok()
            .flatten();
        drop(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{render_source, watch, watch_shared};
    use std::sync::{mpsc, Arc, Barrier, Mutex};
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct MutableValue {
        text: String,
        number: i32,
    }

    #[test]
    fn test_new_tracker_is_empty() {
        let tracker = StackBasedReferenceTracker::new();
        assert!(tracker.is_empty());
        assert!(tracker.current_scope().is_none());
        assert_eq!(tracker.scopes().len(), 0);
    }

    #[test]
    fn test_track_requires_scope() {
        let tracker = StackBasedReferenceTracker::new();
        let result = tracker.track("x", watch(1));
        assert!(matches!(result, Err(SnaperrError::NoActiveScope(_))));
    }

    #[test]
    fn test_track_rejects_empty_name() {
        let tracker = StackBasedReferenceTracker::new();
        tracker.push_scope(None, "m").unwrap();
        let result = tracker.track("", watch(1));
        assert!(matches!(result, Err(SnaperrError::InvalidArgument(_))));
        assert!(tracker.current_scope().unwrap().is_empty());
    }

    #[test]
    fn test_pop_scope_on_empty_fails() {
        let tracker = StackBasedReferenceTracker::new();
        assert!(matches!(tracker.pop_scope(), Err(SnaperrError::ScopeUnderflow)));
    }

    #[test]
    fn test_same_name_twice_keeps_one_entry() {
        let tracker = StackBasedReferenceTracker::new();
        tracker.push_scope(None, "m").unwrap();
        tracker.track("y", watch(1)).unwrap();
        tracker.track("y", watch(2)).unwrap();

        let scope = tracker.current_scope().unwrap();
        assert_eq!(scope.len(), 1);
        assert_eq!(scope.get("y").unwrap().value_as::<i32>(), Some(2));
    }

    #[test]
    fn test_current_scope_fields() {
        let tracker = StackBasedReferenceTracker::new();
        tracker.push_scope(Some(watch("Calculator")), "add").unwrap();
        tracker.track("a", watch(1)).unwrap();
        tracker.track("b", watch(2)).unwrap();

        let scope = tracker.current_scope().unwrap();
        assert_eq!(render_source(scope.source()), "Calculator");
        assert_eq!(scope.method_name(), "add");
        let names: Vec<&str> = scope.references().keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_current_scope_detached_from_new_variables() {
        let tracker = StackBasedReferenceTracker::new();
        tracker.push_scope(None, "m").unwrap();
        tracker.track("x", watch(1)).unwrap();

        let scope = tracker.current_scope().unwrap();
        tracker.track("late", watch(99)).unwrap();
        tracker.pop_scope().unwrap();

        assert_eq!(scope.method_name(), "m");
        assert_eq!(scope.len(), 1);
        assert!(scope.get("late").is_none());
    }

    #[test]
    fn test_mutated_reference_visible_in_later_snapshot() {
        let tracker = StackBasedReferenceTracker::new();
        let value = Arc::new(Mutex::new(MutableValue {
            text: "initial".to_string(),
            number: 1,
        }));

        tracker.push_scope(None, "m").unwrap();
        tracker.track("mvc", watch_shared(Arc::clone(&value))).unwrap();
        {
            let mut guard = value.lock().unwrap();
            guard.text = "this is a String".to_string();
            guard.number = 314;
        }

        let scope = tracker.current_scope().unwrap();
        let captured = scope.get("mvc").unwrap().downcast::<Mutex<MutableValue>>().unwrap();
        assert!(Arc::ptr_eq(&captured, &value));
        assert_eq!(captured.lock().unwrap().number, 314);
        assert_eq!(captured.lock().unwrap().text, "this is a String");
    }

    #[test]
    fn test_reference_change_replaces_payload() {
        let tracker = StackBasedReferenceTracker::new();
        tracker.push_scope(None, "m").unwrap();
        tracker
            .track("mvc", watch(MutableValue { text: "first".to_string(), number: 1 }))
            .unwrap();
        tracker
            .track("mvc", watch(MutableValue { text: "second".to_string(), number: 2 }))
            .unwrap();

        let scope = tracker.current_scope().unwrap();
        assert_eq!(scope.len(), 1);
        assert_eq!(
            scope.get("mvc").unwrap().value_as::<MutableValue>(),
            Some(MutableValue { text: "second".to_string(), number: 2 })
        );
    }

    #[test]
    fn test_scopes_innermost_first() {
        let tracker = StackBasedReferenceTracker::new();
        tracker.push_scope(None, "method1").unwrap();
        tracker.track("x", watch(12)).unwrap();
        tracker.push_scope(None, "method2").unwrap();
        tracker.track("y", watch(114)).unwrap();
        tracker.push_scope(None, "method3").unwrap();

        let names: Vec<String> = tracker.scopes().map(|s| s.method_name().to_string()).collect();
        assert_eq!(names, vec!["method3", "method2", "method1"]);
        assert_eq!(tracker.depth(), 3);
    }

    #[test]
    fn test_trackers_are_independent() {
        let first = StackBasedReferenceTracker::new();
        let second = StackBasedReferenceTracker::new();

        first.push_scope(None, "first").unwrap();
        assert!(second.is_empty());

        second.push_scope(None, "second").unwrap();
        assert_eq!(first.current_scope().unwrap().method_name(), "first");
        assert_eq!(second.current_scope().unwrap().method_name(), "second");
    }

    #[test]
    fn test_threads_do_not_share_frames() {
        let tracker = Arc::new(StackBasedReferenceTracker::new());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["thread1", "thread2"]
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let tracker = Arc::clone(&tracker);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    tracker.push_scope(None, name).unwrap();
                    tracker.track(name, watch(i)).unwrap();
                    barrier.wait();

                    let scopes: Vec<TrackedScope> = tracker.scopes().collect();
                    assert_eq!(scopes.len(), 1);
                    assert_eq!(scopes[0].method_name(), name);
                    assert_eq!(scopes[0].len(), 1);
                    assert_eq!(scopes[0].get(name).unwrap().value_as::<usize>(), Some(i));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_drop_releases_only_the_dropping_thread_stack() {
        let tracker = Arc::new(StackBasedReferenceTracker::new());
        let id = tracker.id;
        tracker.push_scope(None, "main").unwrap();

        let (pushed_tx, pushed_rx) = mpsc::channel();
        let (dropped_tx, dropped_rx) = mpsc::channel::<()>();
        let worker_tracker = Arc::clone(&tracker);
        let worker = thread::spawn(move || {
            worker_tracker.push_scope(None, "job").unwrap();
            drop(worker_tracker);
            pushed_tx.send(()).unwrap();
            dropped_rx.recv().unwrap();
            // The tracker is gone, but this thread keeps its stack until it exits.
            CALL_STACKS.with(|stacks| stacks.borrow().contains_key(&id))
        });

        pushed_rx.recv().unwrap();
        drop(tracker);
        assert!(CALL_STACKS.with(|stacks| !stacks.borrow().contains_key(&id)));

        dropped_tx.send(()).unwrap();
        assert!(worker.join().unwrap());
    }
}
