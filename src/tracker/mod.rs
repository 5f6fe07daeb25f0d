//! Per-thread tracking of call frames and watched variables
//!
//! - **ReferenceTracker**: the contract the tracer mutates and triggers read from
//! - **StackBasedReferenceTracker**: thread-local implementation over an arena stack
//! - **ScopeIter**: innermost-first, detached sequence of frame views

mod call_stack;
pub mod reference_tracker;

pub use reference_tracker::{ReferenceTracker, StackBasedReferenceTracker};

use crate::scope::TrackedScope;

/// Innermost-first sequence of frame views.
///
/// The frames are copied when the iterator is created, so pushes and pops that happen
/// afterwards are not reflected in it.
#[derive(Debug, Clone)]
pub struct ScopeIter {
    inner: std::vec::IntoIter<TrackedScope>,
}

impl ScopeIter {
    /// `scopes` must already be ordered innermost-first
    pub fn new(scopes: Vec<TrackedScope>) -> Self {
        Self {
            inner: scopes.into_iter(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Iterator for ScopeIter {
    type Item = TrackedScope;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ScopeIter {}
