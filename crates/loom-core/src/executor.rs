//! The program-counter driven main loop: dispatches handlers, honors
//! jump/end/loop control signals, emits events, and manages
//! pause/cancel/timeout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tokio::sync::{watch, Notify};

use crate::block_map::BlockMap;
use crate::config::GlobalConfig;
use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::event::{Event, EventKind, EventSink};
use crate::handler::{CancelFlag, DispatchFn, HandlerContext, HandlerOutcome, HandlerRegistry};
use crate::model::{Node, Workflow};
use crate::setting_injector::{Setting, SettingPromptTemplate};
use crate::transport::ChatTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub node_states: Vec<(String, crate::context::NodeState)>,
    pub elapsed_seconds: f64,
}

/// Constructor input, mirroring the specification's external interface:
/// `{workflow, nodes, globalConfig, initialInput?, settings?, settingPrompts?, onEvent?}`.
pub struct ExecutorBuilder {
    workflow: Workflow,
    nodes: Vec<Node>,
    global_config: GlobalConfig,
    initial_input: String,
    settings: Vec<Setting>,
    setting_prompt_templates: Vec<SettingPromptTemplate>,
    events: Option<EventSink>,
    registry: Arc<HandlerRegistry>,
    transport: Arc<dyn ChatTransport>,
}

impl ExecutorBuilder {
    pub fn new(
        workflow: Workflow,
        nodes: Vec<Node>,
        global_config: GlobalConfig,
        registry: Arc<HandlerRegistry>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            workflow,
            nodes,
            global_config,
            initial_input: String::new(),
            settings: Vec::new(),
            setting_prompt_templates: Vec::new(),
            events: None,
            registry,
            transport,
        }
    }

    pub fn initial_input(mut self, input: impl Into<String>) -> Self {
        self.initial_input = input.into();
        self
    }

    pub fn settings(mut self, settings: Vec<Setting>) -> Self {
        self.settings = settings;
        self
    }

    pub fn setting_prompt_templates(mut self, templates: Vec<SettingPromptTemplate>) -> Self {
        self.setting_prompt_templates = templates;
        self
    }

    pub fn on_event(mut self, sink: EventSink) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn build(self) -> Result<Executor, EngineError> {
        let block_map = BlockMap::build(&self.nodes)?;
        let node_index_by_id = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        let ctx = ExecutionContext::new(
            self.initial_input,
            self.workflow.loop_max_count,
            self.workflow.timeout_seconds,
        );
        let (cancel_tx, cancel_rx) = watch::channel(false);

        Ok(Executor {
            workflow: self.workflow,
            nodes: self.nodes,
            node_index_by_id,
            block_map,
            ctx,
            registry: self.registry,
            transport: self.transport,
            global_config: self.global_config,
            settings: self.settings,
            setting_prompt_templates: self.setting_prompt_templates,
            events: self.events.unwrap_or_else(crate::event::noop_sink),
            status: Mutex::new(ExecutionStatus::Idle),
            cancel_tx,
            cancel_rx,
            pause_notify: Notify::new(),
            paused: AtomicBool::new(false),
            pc: AtomicUsize::new(0),
            legacy_loop_start: Mutex::new(None),
            final_error: Mutex::new(None),
            dispatch_cell: OnceCell::new(),
        })
    }
}

pub struct Executor {
    workflow: Workflow,
    nodes: Vec<Node>,
    node_index_by_id: HashMap<String, usize>,
    block_map: BlockMap,
    ctx: ExecutionContext,
    registry: Arc<HandlerRegistry>,
    transport: Arc<dyn ChatTransport>,
    global_config: GlobalConfig,
    settings: Vec<Setting>,
    setting_prompt_templates: Vec<SettingPromptTemplate>,
    events: EventSink,
    status: Mutex<ExecutionStatus>,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
    pause_notify: Notify,
    paused: AtomicBool,
    pc: AtomicUsize,
    /// Legacy monolithic `loop`'s implicit loop start: (node id, node index).
    legacy_loop_start: Mutex<Option<(String, usize)>>,
    final_error: Mutex<Option<String>>,
    dispatch_cell: OnceCell<DispatchFn>,
}

impl Executor {
    fn emit(&self, event: Event) {
        (self.events)(event);
    }

    fn emit_execution(&self, kind: EventKind) {
        self.emit(Event::new(kind, self.ctx.elapsed_ms()));
    }

    fn set_status(&self, status: ExecutionStatus) {
        *self.status.lock().expect("status lock poisoned") = status;
    }

    pub fn status(&self) -> ExecutionStatus {
        *self.status.lock().expect("status lock poisoned")
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn current_node_index(&self) -> usize {
        self.pc.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        if self.status() == ExecutionStatus::Running {
            self.paused.store(true, Ordering::SeqCst);
            self.set_status(ExecutionStatus::Paused);
            tracing::info!(workflow_id = %self.workflow.id, "execution paused");
            self.emit_execution(EventKind::ExecutionPaused);
        }
    }

    pub fn resume(&self) {
        if self.status() == ExecutionStatus::Paused {
            self.paused.store(false, Ordering::SeqCst);
            self.set_status(ExecutionStatus::Running);
            tracing::info!(workflow_id = %self.workflow.id, "execution resumed");
            self.emit_execution(EventKind::ExecutionResumed);
            self.pause_notify.notify_waiters();
        }
    }

    /// Sets the cancel flag. If paused, also resumes so the loop can
    /// observe the cancellation.
    pub fn cancel(&self) {
        tracing::info!(workflow_id = %self.workflow.id, "cancel requested");
        let _ = self.cancel_tx.send(true);
        if self.paused.load(Ordering::SeqCst) {
            self.paused.store(false, Ordering::SeqCst);
            self.pause_notify.notify_waiters();
        }
    }

    /// Legal only while `status == paused`.
    pub fn modify_node_output(&self, node_id: &str, new_output: String) -> Result<(), EngineError> {
        if self.status() != ExecutionStatus::Paused {
            return Err(EngineError::runtime(
                "modify_node_output is only legal while execution is paused",
            ));
        }
        self.ctx.modify_node_output(node_id, new_output);
        Ok(())
    }

    fn build_dispatch_fn(self: &Arc<Self>) -> DispatchFn {
        let this = Arc::clone(self);
        Arc::new(move |node: Node| {
            let this = Arc::clone(&this);
            Box::pin(async move {
                let index = this.node_index_by_id.get(&node.id).copied().unwrap_or(usize::MAX);
                this.run_single_node(index, &node).await
            })
        })
    }

    /// Runs exactly one node through handler lookup and dispatch, performing
    /// the same `node_started`/terminal-event bookkeeping the main loop
    /// does. Used both by the main loop and, recursively, by
    /// `parallel_start` for its task-set members.
    async fn run_single_node(&self, node_index: usize, node: &Node) -> Result<HandlerOutcome, EngineError> {
        tracing::debug!(node_id = %node.id, node_type = node.type_name(), node_index, "dispatching node");
        self.ctx.mark_running(&node.id, None);
        self.emit(
            Event::new(EventKind::NodeStarted, self.ctx.elapsed_ms()).for_node(
                &node.id,
                &node.name,
                node.type_name(),
            ),
        );

        let handler = self.registry.get(node.type_name()).ok_or_else(|| {
            EngineError::control_flow(format!("no handler registered for node type {}", node.type_name()))
        })?;

        let cancel_flag = CancelFlag::new(self.cancel_rx.clone());
        let dispatch = self
            .dispatch_cell
            .get()
            .expect("dispatch fn initialized before the run loop starts")
            .clone();

        let hc = HandlerContext {
            ctx: &self.ctx,
            node,
            node_index,
            workflow: &self.workflow,
            nodes: &self.nodes,
            block_map: &self.block_map,
            global_config: &self.global_config,
            transport: self.transport.as_ref(),
            settings: &self.settings,
            setting_prompt_templates: &self.setting_prompt_templates,
            events: &self.events,
            cancel: &cancel_flag,
            dispatch: &dispatch,
        };

        match handler.handle(hc).await {
            Ok(outcome) => {
                self.ctx.complete_node(&node.id, outcome.output.clone());
                let mut resolved = HashMap::new();
                resolved.extend(outcome.resolved_config.clone());
                self.emit(
                    Event::new(EventKind::NodeCompleted, self.ctx.elapsed_ms())
                        .for_node(&node.id, &node.name, node.type_name())
                        .with_content(outcome.output.clone())
                        .with_resolved_config(resolved),
                );
                Ok(outcome)
            }
            Err(err) => {
                if err.is_cancelled() {
                    // Not marked failed: the executor maps this to status
                    // `cancelled`, not `failed`, when the cancel flag is set.
                    tracing::info!(node_id = %node.id, "node dispatch observed cancellation");
                    return Err(err);
                }
                tracing::warn!(node_id = %node.id, error = %err, "node dispatch failed");
                self.ctx.mark_failed(&node.id, err.to_string());
                self.emit(
                    Event::new(EventKind::NodeFailed, self.ctx.elapsed_ms())
                        .for_node(&node.id, &node.name, node.type_name())
                        .with_error(err.to_string()),
                );
                Err(err)
            }
        }
    }

    fn finalize(&self) -> ExecutionResult {
        let node_states = self
            .ctx
            .node_states
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        ExecutionResult {
            status: self.status(),
            output: Some(self.ctx.last_output()),
            error: self.final_error.lock().expect("final_error lock poisoned").clone(),
            node_states,
            elapsed_seconds: self.ctx.elapsed().as_secs_f64(),
        }
    }

    /// Runs the workflow to completion. Only legal once per instance: a
    /// completed/failed/cancelled/timed-out executor returns an error on
    /// re-entry rather than silently restarting.
    pub async fn execute(self: Arc<Self>) -> Result<ExecutionResult, EngineError> {
        {
            let mut status = self.status.lock().expect("status lock poisoned");
            if *status != ExecutionStatus::Idle {
                return Err(EngineError::runtime(
                    "execute() called on an executor that has already run",
                ));
            }
            *status = ExecutionStatus::Running;
        }
        let _ = self.dispatch_cell.set(self.build_dispatch_fn());
        self.ctx.register_nodes(self.nodes.iter().map(|n| n.id.clone()));
        self.emit_execution(EventKind::ExecutionStarted);

        loop {
            if *self.cancel_rx.borrow() {
                self.set_status(ExecutionStatus::Cancelled);
                self.emit_execution(EventKind::ExecutionCancelled);
                break;
            }
            if self.ctx.is_timed_out() {
                self.set_status(ExecutionStatus::Timeout);
                self.emit_execution(EventKind::ExecutionTimeout);
                break;
            }
            if self.paused.load(Ordering::SeqCst) {
                self.pause_notify.notified().await;
                continue;
            }

            let pc = self.pc.load(Ordering::SeqCst);
            if pc >= self.nodes.len() {
                self.set_status(ExecutionStatus::Completed);
                self.emit_execution(EventKind::ExecutionCompleted);
                break;
            }

            let node = self.nodes[pc].clone();
            match self.run_single_node(pc, &node).await {
                Ok(outcome) => {
                    if outcome.legacy_loop_set_start {
                        *self.legacy_loop_start.lock().expect("lock poisoned") = Some((node.id.clone(), pc));
                    }
                    if outcome.legacy_loop_clear {
                        *self.legacy_loop_start.lock().expect("lock poisoned") = None;
                    }

                    if outcome.should_end {
                        self.set_status(ExecutionStatus::Completed);
                        self.emit_execution(EventKind::ExecutionCompleted);
                        break;
                    }

                    if let Some(target) = outcome.jump_target {
                        match self.node_index_by_id.get(&target) {
                            Some(&idx) => self.pc.store(idx, Ordering::SeqCst),
                            None => {
                                let message = format!("unknown jump target: {target}");
                                self.ctx.mark_failed(&node.id, message.clone());
                                *self.final_error.lock().expect("lock poisoned") = Some(message.clone());
                                self.set_status(ExecutionStatus::Failed);
                                self.emit(
                                    Event::new(EventKind::NodeFailed, self.ctx.elapsed_ms())
                                        .for_node(&node.id, &node.name, node.type_name())
                                        .with_error(message.clone()),
                                );
                                self.emit_execution(EventKind::ExecutionFailed);
                                break;
                            }
                        }
                    } else {
                        let mut next = pc + 1;
                        if next >= self.nodes.len()
                            && let Some((_, start_index)) = *self.legacy_loop_start.lock().expect("lock poisoned")
                        {
                            next = start_index;
                        }
                        self.pc.store(next, Ordering::SeqCst);
                    }
                }
                Err(err) => {
                    if err.is_cancelled() && *self.cancel_rx.borrow() {
                        self.set_status(ExecutionStatus::Cancelled);
                        self.emit_execution(EventKind::ExecutionCancelled);
                    } else {
                        *self.final_error.lock().expect("lock poisoned") = Some(err.to_string());
                        self.set_status(ExecutionStatus::Failed);
                        self.emit_execution(EventKind::ExecutionFailed);
                    }
                    break;
                }
            }
        }

        Ok(self.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::NodeHandler;
    use crate::model::{NodeConfig, OutputConfig, StartConfig};
    use async_trait::async_trait;

    struct EchoHandler;

    #[async_trait]
    impl NodeHandler for EchoHandler {
        async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
            Ok(HandlerOutcome::output(hc.ctx.last_output()))
        }
    }

    struct StartHandler;

    #[async_trait]
    impl NodeHandler for StartHandler {
        async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
            hc.ctx
                .variables
                .insert(crate::context::USER_QUESTION_KEY.to_string(), hc.ctx.initial_input.clone());
            Ok(HandlerOutcome::output(hc.ctx.initial_input.clone()))
        }
    }

    struct NoopTransport;

    #[async_trait]
    impl ChatTransport for NoopTransport {
        async fn stream_chat(
            &self,
            _params: crate::transport::ChatParams,
            _abort: crate::transport::AbortSignal,
        ) -> Result<tokio::sync::mpsc::Receiver<crate::transport::ChatChunk>, EngineError> {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }

        fn provider_available(&self, _provider: &str) -> bool {
            false
        }
    }

    fn empty_workflow() -> Workflow {
        Workflow::new("wf", 100, 60)
    }

    #[tokio::test]
    async fn empty_node_list_completes_with_empty_output() {
        let mut registry = HandlerRegistry::new();
        registry.register("start", Arc::new(StartHandler));
        let executor = ExecutorBuilder::new(
            empty_workflow(),
            vec![],
            GlobalConfig::default(),
            Arc::new(registry),
            Arc::new(NoopTransport),
        )
        .build()
        .unwrap();
        let result = Arc::new(executor).execute().await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.output, Some(String::new()));
    }

    #[tokio::test]
    async fn linear_pipeline_runs_start_then_output() {
        let nodes = vec![
            Node::new("start", "Start", 0, NodeConfig::Start(StartConfig::default())),
            Node::new("out", "Output", 1, NodeConfig::Output(OutputConfig::default())),
        ];
        let mut registry = HandlerRegistry::new();
        registry.register("start", Arc::new(StartHandler));
        registry.register("output", Arc::new(EchoHandler));
        let executor = ExecutorBuilder::new(
            empty_workflow(),
            nodes,
            GlobalConfig::default(),
            Arc::new(registry),
            Arc::new(NoopTransport),
        )
        .initial_input("world")
        .build()
        .unwrap();
        let result = Arc::new(executor).execute().await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.output, Some("world".to_string()));
    }

    #[tokio::test]
    async fn unknown_jump_target_fails_execution() {
        struct BadJumpHandler;
        #[async_trait]
        impl NodeHandler for BadJumpHandler {
            async fn handle(&self, _hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
                Ok(HandlerOutcome::output("x").with_jump("nope"))
            }
        }
        let nodes = vec![Node::new(
            "n1",
            "n1",
            0,
            NodeConfig::Output(OutputConfig::default()),
        )];
        let mut registry = HandlerRegistry::new();
        registry.register("output", Arc::new(BadJumpHandler));
        let executor = ExecutorBuilder::new(
            empty_workflow(),
            nodes,
            GlobalConfig::default(),
            Arc::new(registry),
            Arc::new(NoopTransport),
        )
        .build()
        .unwrap();
        let result = Arc::new(executor).execute().await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert!(result.error.unwrap().contains("unknown jump target"));
    }
}
