//! The block-form `parallel_start`/`parallel_end` pair (spec §4.3.10): runs
//! the task set between the two sentinels concurrently, in batches of
//! `concurrency`, retrying each task with exponential backoff before
//! escalating a failure. Grounded on `orchestrator-core::runtime::graph`'s
//! batched-join shape, with retry borrowed from [`loom_core::retry`] per the
//! backoff Open Question resolved in `SPEC_FULL.md`.

use async_trait::async_trait;
use loom_core::model::{NodeConfig, ParallelOutputMode};
use loom_core::{EngineError, HandlerContext, HandlerOutcome, NodeHandler, RetryPolicy};

fn block_id(hc: &HandlerContext<'_>) -> Result<String, EngineError> {
    hc.node
        .block_id
        .clone()
        .ok_or_else(|| EngineError::control_flow(format!("node {} has no blockId", hc.node.id)))
}

fn results_key(block_id: &str) -> String {
    format!("_parallel_{block_id}_results")
}

fn input_key(block_id: &str) -> String {
    format!("_parallel_{block_id}_input")
}

pub struct ParallelStartHandler;

#[async_trait]
impl NodeHandler for ParallelStartHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        let config = match &hc.node.config {
            NodeConfig::ParallelStart(c) => c,
            _ => return Err(EngineError::runtime("parallel_start handler received a non-parallel_start node")),
        };

        let block_id = block_id(&hc)?;
        let bounds = hc
            .block_map
            .bounds(&block_id)
            .ok_or_else(|| EngineError::control_flow(format!("unmatched parallel_start block: {block_id}")))?;

        hc.ctx.variables.insert(input_key(&block_id), hc.ctx.last_output());

        let task_nodes = &hc.nodes[bounds.start_index + 1..bounds.end_index];
        let policy = RetryPolicy::exponential(config.retry_count, 200, 2.0).with_max_backoff_ms(5_000);

        let mut outputs: Vec<String> = Vec::with_capacity(task_nodes.len());
        let chunk_size = config.concurrency.max(1);
        for chunk in task_nodes.chunks(chunk_size) {
            if hc.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let handles = chunk.iter().map(|node| {
                let dispatch = hc.dispatch.clone();
                let cancel = hc.cancel.clone();
                let node = node.clone();
                tokio::spawn(async move { run_with_retry(&dispatch, node, policy, &cancel).await })
            });
            let results = futures::future::join_all(handles).await;
            for joined in results {
                let result = joined.map_err(|e| EngineError::runtime(format!("parallel task panicked: {e}")))?;
                outputs.push(result?);
            }
        }

        let rendered = match config.output_mode {
            ParallelOutputMode::Array => {
                serde_json::to_string(&outputs).map_err(|e| EngineError::runtime(format!("failed to serialize parallel results: {e}")))?
            }
            ParallelOutputMode::Concat => outputs.join(&config.output_separator),
        };
        hc.ctx.variables.insert(results_key(&block_id), rendered.clone());

        let end_node_id = hc.nodes[bounds.end_index].id.clone();
        Ok(HandlerOutcome::output(rendered).with_jump(end_node_id))
    }
}

async fn run_with_retry(
    dispatch: &loom_core::DispatchFn,
    node: loom_core::Node,
    policy: RetryPolicy,
    cancel: &loom_core::CancelFlag,
) -> Result<String, EngineError> {
    let mut attempts = 0;
    loop {
        match dispatch(node.clone()).await {
            Ok(outcome) => return Ok(outcome.output),
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            Err(err) => {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                if !policy.can_retry(attempts) {
                    return Err(EngineError::runtime(format!(
                        "parallel task {} failed after {} attempt(s): {err}",
                        node.id,
                        attempts + 1
                    )));
                }
                tokio::time::sleep(policy.backoff_duration(attempts)).await;
                attempts += 1;
            }
        }
    }
}

pub struct ParallelEndHandler;

#[async_trait]
impl NodeHandler for ParallelEndHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        if !matches!(hc.node.config, NodeConfig::ParallelEnd) {
            return Err(EngineError::runtime("parallel_end handler received a non-parallel_end node"));
        }
        let block_id = block_id(&hc)?;
        let output = hc
            .ctx
            .variables
            .get(&results_key(&block_id))
            .map(|v| v.value().clone())
            .unwrap_or_default();
        Ok(HandlerOutcome::output(output))
    }
}
