//! S1 — linear text pipeline: `start` seeds `用户问题` from the initial
//! input, `text_concat` interpolates it into a manual template, `output`
//! passes the result through unchanged.

use std::sync::Arc;

use loom_core::model::{Node, NodeConfig, OutputConfig, SourceMode, StartConfig, TextConcatConfig, TextConcatSource, Workflow};
use loom_core::{EngineError, ExecutionResult, ExecutorBuilder, GlobalConfig};

pub async fn run_linear_text_pipeline(initial_input: impl Into<String>) -> Result<ExecutionResult, EngineError> {
    let workflow = Workflow::new("s1-linear-text-pipeline", 10, 30);
    let nodes = vec![
        Node::new("start", "Start", 0, NodeConfig::Start(StartConfig::default())),
        Node::new(
            "concat",
            "Greeting",
            1,
            NodeConfig::TextConcat(TextConcatConfig {
                sources: vec![TextConcatSource {
                    mode: SourceMode::Manual,
                    variable: String::new(),
                    manual: "Hello, {{用户问题}}!".to_string(),
                }],
                separator: "\n".to_string(),
            }),
        ),
        Node::new("output", "Output", 2, NodeConfig::Output(OutputConfig::default())),
    ];

    let executor = ExecutorBuilder::new(workflow, nodes, GlobalConfig::default(), super::handler_registry(), super::scripted_transport())
        .initial_input(initial_input)
        .build()?;
    Arc::new(executor).execute().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::ExecutionStatus;

    #[tokio::test]
    async fn greets_the_initial_input() {
        let result = run_linear_text_pipeline("world").await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.output.as_deref(), Some("Hello, world!"));
    }
}
