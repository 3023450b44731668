//! The legacy monolithic `loop` node (spec §4.3.8): models an implicit loop
//! body as "everything after me, wrapping to end-of-list back to me" via the
//! executor's `legacy_loop_start`/`legacy_loop_clear` signals, rather than a
//! paired `loop_start`/`loop_end` block. Superseded in new authoring by the
//! block form in `loop_block`, but still dispatched when a workflow contains
//! a `loop`-typed node.

use async_trait::async_trait;
use loom_core::model::{LoopConditionType, NodeConfig};
use loom_core::{EngineError, HandlerContext, HandlerOutcome, NodeHandler};

use crate::resolve_variable_ref;

pub struct LoopLegacyHandler;

#[async_trait]
impl NodeHandler for LoopLegacyHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        let config = match &hc.node.config {
            NodeConfig::Loop(c) => c,
            _ => return Err(EngineError::runtime("loop handler received a non-loop node")),
        };

        let counter = hc.ctx.loop_counters.get(&hc.node.id).map(|v| *v).unwrap_or(0);
        let cap = config.max_iterations.min(hc.workflow.loop_max_count);

        // Safety ceiling, checked before anything else so `max_iterations = 0`
        // means the body never runs (§8 boundary behavior).
        if counter >= cap {
            hc.ctx.loop_counters.insert(hc.node.id.clone(), 0);
            return Ok(HandlerOutcome {
                output: "loop ended".to_string(),
                legacy_loop_clear: true,
                ..Default::default()
            });
        }

        let should_continue = if counter == 0 {
            true
        } else {
            match config.condition_type {
                LoopConditionType::Count => true, // cap check above already excludes counter >= cap
                LoopConditionType::Condition => {
                    let kind = config.condition.as_ref().ok_or_else(|| {
                        EngineError::control_flow(format!("loop {} has no embedded condition configured", hc.node.id))
                    })?;
                    let input = resolve_variable_ref(hc.ctx, &config.condition_input_variable);
                    crate::condition_eval::evaluate(kind, &input, hc.transport, hc.cancel).await?
                }
            }
        };

        if should_continue {
            hc.ctx.loop_counters.insert(hc.node.id.clone(), counter + 1);
            Ok(HandlerOutcome {
                output: format!("iteration {} begins", counter + 1),
                legacy_loop_set_start: true,
                ..Default::default()
            })
        } else {
            hc.ctx.loop_counters.insert(hc.node.id.clone(), 0);
            Ok(HandlerOutcome {
                output: "loop ended".to_string(),
                legacy_loop_clear: true,
                ..Default::default()
            })
        }
    }
}
