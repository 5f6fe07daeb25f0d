//! Error types and result aliases for the snaperr library.
//!
//! This module defines the core error type [`SnaperrError`] and the [`Result`] type alias
//! used throughout the library. Only *usage* and *reporting-path* failures show up here:
//! the errors of the monitored application are never wrapped in this type, they are
//! routed through the tracer as triggers instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnaperrError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No active scope: {0}")]
    NoActiveScope(String),

    #[error("Scope underflow: exiting called without a matching entering")]
    ScopeUnderflow,

    #[error("Internal state error: {0}")]
    InternalState(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Reporter error: {0}")]
    Reporter(String),
}

pub type Result<T> = std::result::Result<T, SnaperrError>;
