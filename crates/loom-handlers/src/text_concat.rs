use async_trait::async_trait;
use loom_core::model::{NodeConfig, SourceMode};
use loom_core::{EngineError, HandlerContext, HandlerOutcome, NodeHandler};

use crate::interpolate_in;

pub struct TextConcatHandler;

#[async_trait]
impl NodeHandler for TextConcatHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        let config = match &hc.node.config {
            NodeConfig::TextConcat(c) => c,
            _ => return Err(EngineError::runtime("text_concat handler received a non-text_concat node")),
        };

        let pieces: Vec<String> = config
            .sources
            .iter()
            .map(|source| match source.mode {
                SourceMode::Variable => hc
                    .ctx
                    .node_outputs
                    .get(&source.variable)
                    .map(|v| v.value().clone())
                    .or_else(|| hc.ctx.variables.get(&source.variable).map(|v| v.value().clone()))
                    .unwrap_or_default(),
                SourceMode::Manual => interpolate_in(hc.ctx, &source.manual),
            })
            .collect();

        Ok(HandlerOutcome::output(pieces.join(&config.separator)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixtures;
    use loom_core::model::{Node, TextConcatConfig, TextConcatSource};
    use loom_core::ExecutionContext;

    #[tokio::test]
    async fn joins_variable_and_manual_sources() {
        let ctx = ExecutionContext::new("world", 10, 30);
        ctx.variables.insert(loom_core::context::USER_QUESTION_KEY.to_string(), "world".into());
        let config = TextConcatConfig {
            sources: vec![TextConcatSource {
                mode: SourceMode::Manual,
                variable: String::new(),
                manual: "Hello, {{用户问题}}!".into(),
            }],
            separator: "\n".into(),
        };
        let node = Node::new("c", "Concat", 1, NodeConfig::TextConcat(config));
        let fixtures = Fixtures::new(node);
        let outcome = TextConcatHandler.handle(fixtures.hc(&ctx)).await.unwrap();
        assert_eq!(outcome.output, "Hello, world!");
    }

    #[tokio::test]
    async fn variable_source_prefers_node_output_over_variable() {
        let ctx = ExecutionContext::new("", 10, 30);
        ctx.variables.insert("v".into(), "from variable".into());
        ctx.node_outputs.insert("v".into(), "from node output".into());
        let config = TextConcatConfig {
            sources: vec![TextConcatSource {
                mode: SourceMode::Variable,
                variable: "v".into(),
                manual: String::new(),
            }],
            separator: "\n".into(),
        };
        let node = Node::new("c", "Concat", 0, NodeConfig::TextConcat(config));
        let fixtures = Fixtures::new(node);
        let outcome = TextConcatHandler.handle(fixtures.hc(&ctx)).await.unwrap();
        assert_eq!(outcome.output, "from node output");
    }
}
