//! The legacy monolithic `condition` node: evaluates one keyword/length/
//! regex/ai_judge test and acts on the result (`next`/`end`/`jump`), per
//! spec §4.3.7. Superseded in new authoring by `condition_if`/`condition_else`
//! /`condition_end`, but handlers MUST keep reading both shapes.

use std::collections::HashMap;

use async_trait::async_trait;
use loom_core::model::{ConditionAction, NodeConfig};
use loom_core::{EngineError, HandlerContext, HandlerOutcome, NodeHandler};

use crate::resolve_variable_ref;

pub struct ConditionHandler;

#[async_trait]
impl NodeHandler for ConditionHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        let config = match &hc.node.config {
            NodeConfig::Condition(c) => c,
            _ => return Err(EngineError::runtime("condition handler received a non-condition node")),
        };

        let input = resolve_variable_ref(hc.ctx, &config.input_variable);
        let result = crate::condition_eval::evaluate(&config.kind, &input, hc.transport, hc.cancel).await?;

        hc.ctx
            .variables
            .insert(format!("_condition_{}", hc.node.id), result.to_string());

        let (action, jump_target) = if result {
            (&config.true_action, &config.true_jump_target)
        } else {
            (&config.false_action, &config.false_jump_target)
        };

        let mut outcome = HandlerOutcome::output(result.to_string());
        let mut resolved = HashMap::new();
        resolved.insert("input_variable".to_string(), config.input_variable.clone());
        resolved.insert("result".to_string(), result.to_string());
        outcome.resolved_config = resolved;

        match action {
            ConditionAction::Next => {}
            ConditionAction::End => outcome.should_end = true,
            ConditionAction::Jump => {
                let target = jump_target.clone().ok_or_else(|| {
                    EngineError::control_flow(format!("condition {} has no jump target configured", hc.node.id))
                })?;
                outcome.jump_target = Some(target);
            }
        }

        Ok(outcome)
    }
}
