//! Error taxonomy for the workflow engine.
//!
//! Mirrors the kinds in the specification's error-handling design, not a
//! one-to-one mapping of legacy error strings: callers match on variants,
//! not on message text.

use thiserror::Error;

/// All ways a workflow execution can fail before reaching a terminal status.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Provider disabled, missing credentials, or a required config field was empty.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A referenced variable, node, or path could not be resolved, or input failed to parse.
    #[error("input error: {0}")]
    Input(String),

    /// A jump target, block pairing, or `blockId` was missing or unresolvable.
    #[error("control flow error: {0}")]
    ControlFlow(String),

    /// A handler failed for a reason not covered by the other variants, or parallel
    /// retry budget was exhausted.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Execution was cancelled while a handler was in flight.
    #[error("execution cancelled")]
    Cancelled,

    /// The workflow's wall-clock budget was exceeded.
    #[error("execution timed out")]
    Timeout,
}

impl EngineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn control_flow(msg: impl Into<String>) -> Self {
        Self::ControlFlow(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// `true` for the variant that the executor maps to status `cancelled`
    /// rather than `failed`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}
