//! JSON snapshot format for machine consumers

use super::TriggerSerializer;
use crate::error::Result;
use crate::scope::{render_source, TrackedScope};
use crate::tracker::ScopeIter;
use crate::trigger::{ErrorTrigger, TimeoutTrigger, TriggerKind};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One report, as written by [`JsonSerializer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub kind: TriggerKind,
    pub trigger_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timeout_threshold_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timeout_ms: Option<u64>,
    /// Innermost frame first
    pub scopes: Vec<ScopeDocument>,
}

/// One frame of a [`SnapshotDocument`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeDocument {
    pub owner: Option<String>,
    pub method: String,
    /// Rendered values in the order the variables were first tracked
    pub variables: IndexMap<String, String>,
}

impl From<&TrackedScope> for ScopeDocument {
    fn from(scope: &TrackedScope) -> Self {
        Self {
            owner: scope.source().map(|source| render_source(Some(source))),
            method: scope.method_name().to_string(),
            variables: scope
                .references()
                .iter()
                .map(|(name, value)| (name.clone(), value.rendered()))
                .collect(),
        }
    }
}

fn scope_documents(scopes: ScopeIter) -> Vec<ScopeDocument> {
    scopes.map(|scope| ScopeDocument::from(&scope)).collect()
}

/// Serializes triggers as [`SnapshotDocument`] JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Indented output
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    fn to_json(&self, document: &SnapshotDocument) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(document)?
        } else {
            serde_json::to_string(document)?
        };
        Ok(json)
    }
}

impl TriggerSerializer for JsonSerializer {
    fn serialize_error(&self, trigger: &ErrorTrigger) -> Result<String> {
        let document = SnapshotDocument {
            kind: trigger.kind(),
            trigger_id: trigger.id(),
            occurred_at: trigger.occurred_at(),
            error: Some(trigger.error().to_string()),
            timeout_threshold_ms: None,
            timeout_ms: None,
            scopes: scope_documents(trigger.scopes()),
        };
        self.to_json(&document)
    }

    fn serialize_timeout(&self, trigger: &TimeoutTrigger) -> Result<String> {
        let document = SnapshotDocument {
            kind: trigger.kind(),
            trigger_id: trigger.id(),
            occurred_at: trigger.occurred_at(),
            error: None,
            timeout_threshold_ms: Some(trigger.timeout_threshold_ms()),
            timeout_ms: Some(trigger.timeout_ms()),
            scopes: scope_documents(trigger.scopes()),
        };
        self.to_json(&document)
    }
}
