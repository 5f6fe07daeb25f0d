//! Arena-backed stack of call frames
//!
//! Frames are never deallocated on pop. The backing vector only grows, and a slot
//! above the logical length holds a cleared frame that the next push overwrites.

use super::ScopeIter;
use crate::error::{Result, SnaperrError};
use crate::scope::{TrackedScope, TrackedValue, WatchedRef};
use indexmap::IndexMap;
use std::sync::Arc;

pub(crate) const INITIAL_CAPACITY: usize = 64;

/// Variables recorded in one frame
pub(crate) type References = IndexMap<String, Arc<TrackedValue>>;

/// One slot of the arena
#[derive(Debug, Default)]
pub(crate) struct Frame {
    source: Option<WatchedRef>,
    method_name: Option<String>,
    references: References,
}

impl Frame {
    fn fill(&mut self, source: Option<WatchedRef>, method_name: &str) {
        self.source = source;
        self.method_name = Some(method_name.to_string());
        self.references = IndexMap::new();
    }

    /// Reset the slot, handing back what it held so the caller decides where it is dropped
    fn clear(&mut self) -> (Option<WatchedRef>, References) {
        self.method_name = None;
        (self.source.take(), std::mem::take(&mut self.references))
    }

    pub(crate) fn method_name(&self) -> Option<&str> {
        self.method_name.as_deref()
    }

    pub(crate) fn references(&self) -> &References {
        &self.references
    }

    /// Record a write; returns the replaced payload when the name was already tracked
    pub(crate) fn track(&mut self, variable_name: &str, value: WatchedRef) -> Option<WatchedRef> {
        match self.references.get(variable_name) {
            Some(cell) => Some(cell.replace_value(value)),
            None => {
                let cell = Arc::new(TrackedValue::new(variable_name, value));
                self.references.insert(variable_name.to_string(), cell);
                None
            }
        }
    }

    pub(crate) fn snapshot(&self) -> TrackedScope {
        TrackedScope::new(
            self.source.clone(),
            self.method_name.clone().unwrap_or_default(),
            self.references.clone(),
        )
    }
}

/// Per-thread stack of frames.
///
/// `len` is the logical height; `frames.len()` is the arena size and is always `>= len`.
#[derive(Debug)]
pub(crate) struct CallStack {
    frames: Vec<Frame>,
    len: usize,
}

impl CallStack {
    pub(crate) fn new() -> Self {
        Self {
            frames: Vec::with_capacity(INITIAL_CAPACITY),
            len: 0,
        }
    }

    pub(crate) fn push(&mut self, source: Option<WatchedRef>, method_name: &str) -> Result<()> {
        if self.len < self.frames.len() {
            self.frames[self.len].fill(source, method_name);
        } else if self.len == self.frames.len() {
            let mut frame = Frame::default();
            frame.fill(source, method_name);
            self.frames.push(frame);
        } else {
            return Err(SnaperrError::InternalState(format!(
                "stack height {} exceeds arena size {}",
                self.len,
                self.frames.len()
            )));
        }
        self.len += 1;
        Ok(())
    }

    /// Clear the top frame and lower the height. The arena keeps the slot.
    pub(crate) fn pop(&mut self) -> Result<(Option<WatchedRef>, References)> {
        if self.len == 0 {
            return Err(SnaperrError::ScopeUnderflow);
        }
        self.len -= 1;
        Ok(self.frames[self.len].clear())
    }

    /// Top frame. Do not hold on to it across a `pop`; the slot is reused.
    pub(crate) fn peek(&self) -> Option<&Frame> {
        self.len.checked_sub(1).map(|top| &self.frames[top])
    }

    pub(crate) fn peek_mut(&mut self) -> Option<&mut Frame> {
        match self.len.checked_sub(1) {
            Some(top) => Some(&mut self.frames[top]),
            None => None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn arena_len(&self) -> usize {
        self.frames.len()
    }

    /// Innermost-first copy of the live frames
    pub(crate) fn snapshot_iter(&self) -> ScopeIter {
        let scopes: Vec<TrackedScope> = self.frames[..self.len]
            .iter()
            .rev()
            .map(Frame::snapshot)
            .collect();
        ScopeIter::new(scopes)
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}
