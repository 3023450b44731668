use std::collections::HashMap;

use async_trait::async_trait;
use loom_core::context::USER_QUESTION_KEY;
use loom_core::model::{NodeConfig, StartConfig};
use loom_core::{EngineError, HandlerContext, HandlerOutcome, NodeHandler};

use crate::interpolate_in;

pub struct StartHandler;

#[async_trait]
impl NodeHandler for StartHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        let config = match &hc.node.config {
            NodeConfig::Start(c) => c,
            _ => return Err(EngineError::runtime("start handler received a non-start node")),
        };

        let value = if !hc.ctx.initial_input.is_empty() {
            hc.ctx.initial_input.clone()
        } else {
            config.default_value.clone().unwrap_or_default()
        };
        hc.ctx.variables.insert(USER_QUESTION_KEY.to_string(), value.clone());

        let mut resolved = HashMap::new();
        resolved.insert("用户问题".to_string(), value.clone());

        for custom in &config.custom_variables {
            // Existing values from a restored snapshot are not overwritten.
            if hc.ctx.variables.contains_key(&custom.name) {
                continue;
            }
            let resolved_default = interpolate_in(hc.ctx, &custom.default_value);
            hc.ctx.variables.insert(custom.name.clone(), resolved_default.clone());
            resolved.insert(custom.name.clone(), resolved_default);
        }

        Ok(HandlerOutcome::output(value).with_resolved(resolved))
    }
}
