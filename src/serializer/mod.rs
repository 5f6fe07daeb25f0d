//! Turning triggers into report text
//!
//! Serializers run on the reporting thread while the tracer is in its processing state,
//! so they may call instrumented code without producing nested reports.

pub mod json_serializer;
pub mod string_serializer;

pub use json_serializer::{JsonSerializer, ScopeDocument, SnapshotDocument};
pub use string_serializer::StringSerializer;

use crate::error::Result;
use crate::trigger::{ErrorTrigger, TimeoutTrigger};

/// Converts triggers to the format handed to a [`TriggerHandler`](crate::handler::TriggerHandler)
pub trait TriggerSerializer: Send + Sync {
    fn serialize_error(&self, trigger: &ErrorTrigger) -> Result<String>;

    fn serialize_timeout(&self, trigger: &TimeoutTrigger) -> Result<String>;
}
