//! The block-form `condition_if`/`condition_else`/`condition_end` triple
//! (spec §4.3.11): `condition_if` jumps to the else branch (or past the
//! block if there is none) on a false result; `condition_else` is only
//! reached by falling through the then-branch's body, so it jumps past
//! itself to skip the else-branch body whenever the stored result was true.

use async_trait::async_trait;
use loom_core::model::NodeConfig;
use loom_core::{EngineError, HandlerContext, HandlerOutcome, NodeHandler};

use crate::resolve_variable_ref;

fn block_id(hc: &HandlerContext<'_>) -> Result<String, EngineError> {
    hc.node
        .block_id
        .clone()
        .ok_or_else(|| EngineError::control_flow(format!("node {} has no blockId", hc.node.id)))
}

fn result_key(block_id: &str) -> String {
    format!("_condition_{block_id}_result")
}

pub struct ConditionIfHandler;

#[async_trait]
impl NodeHandler for ConditionIfHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        let config = match &hc.node.config {
            NodeConfig::ConditionIf(c) => c,
            _ => return Err(EngineError::runtime("condition_if handler received a non-condition_if node")),
        };

        let block_id = block_id(&hc)?;
        let bounds = hc
            .block_map
            .bounds(&block_id)
            .ok_or_else(|| EngineError::control_flow(format!("unmatched condition_if block: {block_id}")))?;

        let input = resolve_variable_ref(hc.ctx, &config.input_variable);
        let result = crate::condition_eval::evaluate(&config.kind, &input, hc.transport, hc.cancel).await?;
        hc.ctx.variables.insert(result_key(&block_id), result.to_string());

        let mut outcome = HandlerOutcome::output(result.to_string());
        if !result {
            let target_index = bounds.else_index.unwrap_or(bounds.end_index);
            outcome.jump_target = Some(hc.nodes[target_index].id.clone());
        }
        Ok(outcome)
    }
}

pub struct ConditionElseHandler;

#[async_trait]
impl NodeHandler for ConditionElseHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        if !matches!(hc.node.config, NodeConfig::ConditionElse) {
            return Err(EngineError::runtime("condition_else handler received a non-condition_else node"));
        }
        let block_id = block_id(&hc)?;
        let bounds = hc
            .block_map
            .bounds(&block_id)
            .ok_or_else(|| EngineError::control_flow(format!("unmatched condition_else block: {block_id}")))?;

        let result = hc
            .ctx
            .variables
            .get(&result_key(&block_id))
            .map(|v| v.value() == "true")
            .unwrap_or(false);

        let mut outcome = HandlerOutcome::output(hc.ctx.last_output());
        if result {
            outcome.jump_target = Some(hc.nodes[bounds.end_index].id.clone());
        }
        Ok(outcome)
    }
}

pub struct ConditionEndHandler;

#[async_trait]
impl NodeHandler for ConditionEndHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        if !matches!(hc.node.config, NodeConfig::ConditionEnd) {
            return Err(EngineError::runtime("condition_end handler received a non-condition_end node"));
        }
        Ok(HandlerOutcome::output(hc.ctx.last_output()))
    }
}
