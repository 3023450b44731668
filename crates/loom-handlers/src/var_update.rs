use std::collections::HashMap;

use async_trait::async_trait;
use loom_core::model::NodeConfig;
use loom_core::{EngineError, HandlerContext, HandlerOutcome, NodeHandler};

use crate::interpolate_in;

/// Requires the target variable to already exist (set by `start` or a prior
/// `var_update`); this is not a variable-declaration node.
pub struct VarUpdateHandler;

#[async_trait]
impl NodeHandler for VarUpdateHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        let config = match &hc.node.config {
            NodeConfig::VarUpdate(c) => c,
            _ => return Err(EngineError::runtime("var_update handler received a non-var_update node")),
        };

        if !hc.ctx.variables.contains_key(&config.variable_name) {
            return Err(EngineError::input(format!(
                "undefined variable: {}",
                config.variable_name
            )));
        }

        let value = interpolate_in(hc.ctx, &config.value_template);
        hc.ctx.variables.insert(config.variable_name.clone(), value.clone());

        let mut resolved = HashMap::new();
        resolved.insert(config.variable_name.clone(), value.clone());

        Ok(HandlerOutcome::output(value).with_resolved(resolved))
    }
}
