//! Human-readable snapshot format
//!
//! ```text
//! Snaperr - state snapshot of error 'disk full': [
//! 	Store.save {
//! 		path=/tmp/out
//! 		retries=3
//! 	}
//! 	null.main {
//! 	}
//! ]
//! ```

use super::TriggerSerializer;
use crate::error::Result;
use crate::scope::{render_source, TrackedScope};
use crate::tracker::ScopeIter;
use crate::trigger::{ErrorTrigger, TimeoutTrigger};
use std::fmt::Write;

const INITIAL_CAPACITY: usize = 256;

/// Serializes triggers into the indented text format shown above
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl StringSerializer {
    pub fn new() -> Self {
        Self
    }

    fn write_scopes(out: &mut String, scopes: ScopeIter) {
        for scope in scopes {
            Self::write_scope(out, &scope);
            out.push('\n');
        }
        out.push(']');
    }

    fn write_scope(out: &mut String, scope: &TrackedScope) {
        let _ = writeln!(
            out,
            "\t{}.{} {{",
            render_source(scope.source()),
            scope.method_name()
        );
        for (name, value) in scope.references() {
            let _ = writeln!(out, "\t\t{}={}", name, value.rendered());
        }
        out.push_str("\t}");
    }
}

impl TriggerSerializer for StringSerializer {
    fn serialize_error(&self, trigger: &ErrorTrigger) -> Result<String> {
        let mut out = String::with_capacity(INITIAL_CAPACITY);
        let _ = writeln!(
            out,
            "Snaperr - state snapshot of error '{}': [",
            trigger.error()
        );
        Self::write_scopes(&mut out, trigger.scopes());
        Ok(out)
    }

    fn serialize_timeout(&self, trigger: &TimeoutTrigger) -> Result<String> {
        let mut out = String::with_capacity(INITIAL_CAPACITY);
        let _ = writeln!(
            out,
            "Snaperr - state snapshot of timeout (threshold {}ms, actual {}ms): [",
            trigger.timeout_threshold_ms(),
            trigger.timeout_ms()
        );
        Self::write_scopes(&mut out, trigger.scopes());
        Ok(out)
    }
}
