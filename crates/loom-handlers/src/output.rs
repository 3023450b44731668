use async_trait::async_trait;
use loom_core::model::NodeConfig;
use loom_core::{EngineError, HandlerContext, HandlerOutcome, NodeHandler};

/// `format` is UI metadata only; the handler always returns `lastOutput` verbatim.
pub struct OutputHandler;

#[async_trait]
impl NodeHandler for OutputHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        match &hc.node.config {
            NodeConfig::Output(_) => {}
            _ => return Err(EngineError::runtime("output handler received a non-output node")),
        }
        Ok(HandlerOutcome::output(hc.ctx.last_output()))
    }
}
