//! The block-form `loop_start`/`loop_end` pair (spec §4.3.9): `blockId` is
//! the counter key, and the matching `loop_end` hands control back to
//! `loop_start` via `jumpTarget` for re-evaluation rather than relying on
//! the legacy node list's implicit end-of-list wraparound.

use async_trait::async_trait;
use loom_core::model::{LoopConditionType, NodeConfig};
use loom_core::{EngineError, HandlerContext, HandlerOutcome, NodeHandler};

use crate::resolve_variable_ref;

fn block_id(hc: &HandlerContext<'_>) -> Result<String, EngineError> {
    hc.node
        .block_id
        .clone()
        .ok_or_else(|| EngineError::control_flow(format!("node {} has no blockId", hc.node.id)))
}

pub struct LoopStartHandler;

#[async_trait]
impl NodeHandler for LoopStartHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        let config = match &hc.node.config {
            NodeConfig::LoopStart(c) => c,
            _ => return Err(EngineError::runtime("loop_start handler received a non-loop_start node")),
        };

        let block_id = block_id(&hc)?;
        let bounds = hc
            .block_map
            .bounds(&block_id)
            .ok_or_else(|| EngineError::control_flow(format!("unmatched loop_start block: {block_id}")))?;

        let counter = hc.ctx.loop_counters.get(&block_id).map(|v| *v).unwrap_or(0);
        let cap = config.max_iterations.min(hc.workflow.loop_max_count);

        let jump_past_end = |hc: &HandlerContext<'_>| -> HandlerOutcome {
            let next_index = bounds.end_index + 1;
            let mut outcome = HandlerOutcome::output("loop ended");
            if next_index < hc.nodes.len() {
                outcome.jump_target = Some(hc.nodes[next_index].id.clone());
            } else {
                outcome.should_end = true;
            }
            outcome
        };

        if counter >= cap {
            hc.ctx.loop_counters.insert(block_id, 0);
            return Ok(jump_past_end(&hc));
        }

        let should_continue = if counter == 0 {
            true
        } else {
            match config.condition_type {
                LoopConditionType::Count => true,
                LoopConditionType::Condition => {
                    let kind = config.condition.as_ref().ok_or_else(|| {
                        EngineError::control_flow(format!("loop_start {} has no embedded condition configured", hc.node.id))
                    })?;
                    let input = resolve_variable_ref(hc.ctx, &config.condition_input_variable);
                    crate::condition_eval::evaluate(kind, &input, hc.transport, hc.cancel).await?
                }
            }
        };

        if should_continue {
            hc.ctx.loop_counters.insert(block_id, counter + 1);
            Ok(HandlerOutcome::output(format!("iteration {} begins", counter + 1)))
        } else {
            hc.ctx.loop_counters.insert(block_id, 0);
            Ok(jump_past_end(&hc))
        }
    }
}

pub struct LoopEndHandler;

#[async_trait]
impl NodeHandler for LoopEndHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        if !matches!(hc.node.config, NodeConfig::LoopEnd) {
            return Err(EngineError::runtime("loop_end handler received a non-loop_end node"));
        }
        let block_id = block_id(&hc)?;
        let bounds = hc
            .block_map
            .bounds(&block_id)
            .ok_or_else(|| EngineError::control_flow(format!("unmatched loop_end block: {block_id}")))?;
        let start_id = hc.nodes[bounds.start_index].id.clone();
        Ok(HandlerOutcome::output(hc.ctx.last_output()).with_jump(start_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixtures;
    use loom_core::model::{LoopConfig, Node};
    use loom_core::ExecutionContext;

    fn count_loop(max: u32) -> LoopConfig {
        LoopConfig {
            condition_type: LoopConditionType::Count,
            max_iterations: max,
            condition: None,
            condition_input_variable: String::new(),
        }
    }

    #[tokio::test]
    async fn loop_end_jumps_back_to_loop_start() {
        let nodes = vec![
            Node::new("ls", "LoopStart", 0, NodeConfig::LoopStart(count_loop(3))).with_block_id("L"),
            Node::new("body", "Body", 1, NodeConfig::Output(Default::default())).with_block_id("L"),
            Node::new("le", "LoopEnd", 2, NodeConfig::LoopEnd).with_block_id("L"),
        ];
        let fixtures = Fixtures::new_multi(nodes, 2);
        let ctx = ExecutionContext::new("", 10, 30);
        let outcome = LoopEndHandler.handle(fixtures.hc(&ctx)).await.unwrap();
        assert_eq!(outcome.jump_target.as_deref(), Some("ls"));
    }

    #[tokio::test]
    async fn loop_start_exits_past_loop_end_when_cap_reached() {
        let nodes = vec![
            Node::new("ls", "LoopStart", 0, NodeConfig::LoopStart(count_loop(1))).with_block_id("L"),
            Node::new("body", "Body", 1, NodeConfig::Output(Default::default())).with_block_id("L"),
            Node::new("le", "LoopEnd", 2, NodeConfig::LoopEnd).with_block_id("L"),
            Node::new("after", "After", 3, NodeConfig::Output(Default::default())),
        ];
        let fixtures = Fixtures::new_multi(nodes, 0);
        let ctx = ExecutionContext::new("", 10, 30);
        ctx.loop_counters.insert("L".to_string(), 1);
        let outcome = LoopStartHandler.handle(fixtures.hc(&ctx)).await.unwrap();
        assert_eq!(outcome.jump_target.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn loop_start_with_zero_max_iterations_never_runs_body() {
        let nodes = vec![
            Node::new("ls", "LoopStart", 0, NodeConfig::LoopStart(count_loop(0))).with_block_id("L"),
            Node::new("le", "LoopEnd", 1, NodeConfig::LoopEnd).with_block_id("L"),
        ];
        let fixtures = Fixtures::new_multi(nodes, 0);
        let ctx = ExecutionContext::new("", 10, 30);
        let outcome = LoopStartHandler.handle(fixtures.hc(&ctx)).await.unwrap();
        assert!(outcome.should_end);
    }
}
