//! [`NodeHandler`]: the contract every node type implements, and the
//! context the executor hands it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::block_map::BlockMap;
use crate::config::GlobalConfig;
use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::event::EventSink;
use crate::model::{Node, Workflow};
use crate::setting_injector::{Setting, SettingPromptTemplate};
use crate::transport::ChatTransport;

/// Observed by handlers (chiefly `ai_chat`) to stop mid-stream work promptly.
#[derive(Clone)]
pub struct CancelFlag(tokio::sync::watch::Receiver<bool>);

impl CancelFlag {
    pub fn new(receiver: tokio::sync::watch::Receiver<bool>) -> Self {
        Self(receiver)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    pub fn as_watch(&self) -> tokio::sync::watch::Receiver<bool> {
        self.0.clone()
    }
}

/// Dispatches a single node through the ordinary node-execution path:
/// handler lookup, run, and the same `node_started`/`node_completed`
/// bookkeeping the main executor loop performs. Used by `parallel_start` to
/// run each task-set member without re-entering the whole block.
pub type DispatchFn =
    Arc<dyn Fn(Node) -> BoxFuture<'static, Result<HandlerOutcome, EngineError>> + Send + Sync>;

/// Everything a handler needs to read/write the execution and, for control-
/// flow node types, to influence where the executor goes next.
pub struct HandlerContext<'a> {
    pub ctx: &'a ExecutionContext,
    pub node: &'a Node,
    pub node_index: usize,
    pub workflow: &'a Workflow,
    pub nodes: &'a [Node],
    pub block_map: &'a BlockMap,
    pub global_config: &'a GlobalConfig,
    pub transport: &'a dyn ChatTransport,
    pub settings: &'a [Setting],
    pub setting_prompt_templates: &'a [SettingPromptTemplate],
    pub events: &'a EventSink,
    pub cancel: &'a CancelFlag,
    pub dispatch: &'a DispatchFn,
}

/// The result of one handler invocation. The resolved-config map is purely
/// for observability (attached to the `node_completed` event); it never
/// feeds back into execution.
#[derive(Debug, Clone, Default)]
pub struct HandlerOutcome {
    pub output: String,
    pub resolved_config: HashMap<String, String>,
    /// Jump to this node ID instead of PC + 1.
    pub jump_target: Option<String>,
    /// Transition execution to `completed` immediately.
    pub should_end: bool,
    /// Legacy monolithic `loop`: record the current PC as the implicit loop
    /// start (see spec §4.3.12 step 7).
    pub legacy_loop_set_start: bool,
    /// Legacy monolithic `loop`: clear the implicit loop start (loop exited).
    pub legacy_loop_clear: bool,
}

impl HandlerOutcome {
    pub fn output(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_resolved(mut self, resolved: HashMap<String, String>) -> Self {
        self.resolved_config = resolved;
        self
    }

    pub fn with_jump(mut self, target: impl Into<String>) -> Self {
        self.jump_target = Some(target.into());
        self
    }

    pub fn with_end(mut self) -> Self {
        self.should_end = true;
        self
    }
}

#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError>;
}

/// type_name -> handler. Populated by `loom_handlers::register_all`.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_name: impl Into<String>, handler: Arc<dyn NodeHandler>) {
        self.handlers.insert(type_name.into(), handler);
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn NodeHandler>> {
        self.handlers.get(type_name)
    }
}
