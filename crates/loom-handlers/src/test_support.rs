//! Test-only scaffolding shared across handler unit tests: a no-op
//! transport/dispatch pair and a builder for a fully-populated
//! `HandlerContext` so each handler's tests only need to supply a node and
//! an `ExecutionContext`.
#![cfg(test)]

use async_trait::async_trait;
use loom_core::model::{Node, Workflow};
use loom_core::{
    BlockMap, CancelFlag, ChatChunk, ChatParams, ChatTransport, DispatchFn, EngineError,
    ExecutionContext, GlobalConfig, HandlerContext, HandlerOutcome, Setting, SettingPromptTemplate,
};

pub struct DenyTransport;

#[async_trait]
impl ChatTransport for DenyTransport {
    async fn stream_chat(
        &self,
        _params: ChatParams,
        _abort: loom_core::AbortSignal,
    ) -> Result<tokio::sync::mpsc::Receiver<ChatChunk>, EngineError> {
        unreachable!("DenyTransport never streams")
    }

    fn provider_available(&self, _provider: &str) -> bool {
        false
    }
}

pub fn noop_dispatch() -> DispatchFn {
    std::sync::Arc::new(|_node| Box::pin(async { Ok(HandlerOutcome::default()) }))
}

/// Fixed fixtures a `HandlerContext` borrows from; owned by the test so the
/// context's lifetime has somewhere to borrow from.
pub struct Fixtures {
    pub workflow: Workflow,
    pub nodes: Vec<Node>,
    pub block_map: BlockMap,
    pub global_config: GlobalConfig,
    pub settings: Vec<Setting>,
    pub setting_prompt_templates: Vec<SettingPromptTemplate>,
    pub events: loom_core::EventSink,
    pub cancel: CancelFlag,
    pub dispatch: DispatchFn,
    pub transport: Box<dyn ChatTransport>,
    pub target_index: usize,
}

impl Fixtures {
    pub fn new(node: Node) -> Self {
        Self::new_multi(vec![node], 0)
    }

    /// Like [`Fixtures::new`] but for a full node list (needed for the
    /// block-form handlers, whose `BlockMap` must span more than one node).
    /// `target_index` selects which node `hc()` hands to the handler.
    pub fn new_multi(nodes: Vec<Node>, target_index: usize) -> Self {
        let block_map = BlockMap::build(&nodes).unwrap();
        let (_tx, cancel_rx) = tokio::sync::watch::channel(false);
        Self {
            workflow: Workflow::new("wf", 100, 60),
            nodes,
            block_map,
            global_config: GlobalConfig::default(),
            settings: vec![],
            setting_prompt_templates: vec![],
            events: loom_core::event::noop_sink(),
            cancel: CancelFlag::new(cancel_rx),
            dispatch: noop_dispatch(),
            transport: Box::new(DenyTransport),
            target_index,
        }
    }

    pub fn with_transport(mut self, transport: Box<dyn ChatTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn hc<'a>(&'a self, ctx: &'a ExecutionContext) -> HandlerContext<'a> {
        HandlerContext {
            ctx,
            node: &self.nodes[self.target_index],
            node_index: self.target_index,
            workflow: &self.workflow,
            nodes: &self.nodes,
            block_map: &self.block_map,
            global_config: &self.global_config,
            transport: self.transport.as_ref(),
            settings: &self.settings,
            setting_prompt_templates: &self.setting_prompt_templates,
            events: &self.events,
            cancel: &self.cancel,
            dispatch: &self.dispatch,
        }
    }
}
