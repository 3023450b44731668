//! Typed event emission to an optional observer callback.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ExecutionStarted,
    ExecutionPaused,
    ExecutionResumed,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionCancelled,
    ExecutionTimeout,
    NodeStarted,
    NodeStreaming,
    NodeCompleted,
    NodeFailed,
    NodeSkipped,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub node_id: Option<String>,
    pub node_name: Option<String>,
    pub node_type: Option<String>,
    pub content: Option<String>,
    pub error: Option<String>,
    pub resolved_config: Option<HashMap<String, String>>,
    /// Milliseconds since the execution's `startTime`.
    pub timestamp_ms: u64,
}

impl Default for EventKind {
    fn default() -> Self {
        EventKind::ExecutionStarted
    }
}

impl Event {
    pub fn new(kind: EventKind, timestamp_ms: u64) -> Self {
        Self {
            kind,
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn for_node(mut self, node_id: impl Into<String>, node_name: impl Into<String>, node_type: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self.node_name = Some(node_name.into());
        self.node_type = Some(node_type.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_resolved_config(mut self, config: HashMap<String, String>) -> Self {
        self.resolved_config = Some(config);
        self
    }
}

/// An observer callback invoked synchronously by the executor as events
/// occur. Boxed and `Send + Sync` so it can be shared across the `Executor`
/// and any concurrently-dispatched parallel tasks.
pub type EventSink = Arc<dyn Fn(Event) + Send + Sync>;

pub fn noop_sink() -> EventSink {
    Arc::new(|_event| {})
}
