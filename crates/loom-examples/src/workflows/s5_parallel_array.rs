//! S5 — parallel array: three `text_concat` tasks run inside a
//! `parallel_start`/`parallel_end` block with `concurrency: 2`; `array`
//! output mode preserves task-set order regardless of scheduling order.

use std::sync::Arc;

use loom_core::model::{
    Node, NodeConfig, OutputConfig, ParallelOutputMode, ParallelStartConfig, SourceMode, StartConfig, TextConcatConfig, TextConcatSource,
    Workflow,
};
use loom_core::{EngineError, ExecutionResult, ExecutorBuilder, GlobalConfig};

fn manual_concat(id: &str, name: &str, order_index: u32, literal: &str) -> Node {
    Node::new(
        id,
        name,
        order_index,
        NodeConfig::TextConcat(TextConcatConfig {
            sources: vec![TextConcatSource {
                mode: SourceMode::Manual,
                variable: String::new(),
                manual: literal.to_string(),
            }],
            separator: "\n".to_string(),
        }),
    )
    .with_block_id("P")
}

pub async fn run_parallel_array() -> Result<ExecutionResult, EngineError> {
    let workflow = Workflow::new("s5-parallel-array", 10, 30);
    let nodes = vec![
        Node::new("start", "Start", 0, NodeConfig::Start(StartConfig::default())),
        Node::new(
            "parallel_start",
            "ParallelStart",
            1,
            NodeConfig::ParallelStart(ParallelStartConfig {
                concurrency: 2,
                output_mode: ParallelOutputMode::Array,
                output_separator: "\n".to_string(),
                retry_count: 0,
            }),
        )
        .with_block_id("P"),
        manual_concat("task_a", "TaskA", 2, "A"),
        manual_concat("task_b", "TaskB", 3, "B"),
        manual_concat("task_c", "TaskC", 4, "C"),
        Node::new("parallel_end", "ParallelEnd", 5, NodeConfig::ParallelEnd).with_block_id("P"),
        Node::new("output", "Output", 6, NodeConfig::Output(OutputConfig::default())),
    ];

    let executor = ExecutorBuilder::new(workflow, nodes, GlobalConfig::default(), super::handler_registry(), super::scripted_transport())
        .initial_input("seed")
        .build()?;
    Arc::new(executor).execute().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::ExecutionStatus;

    #[tokio::test]
    async fn array_mode_preserves_task_set_order() {
        let result = run_parallel_array().await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
        let parsed: Vec<String> = serde_json::from_str(result.output.as_deref().unwrap()).unwrap();
        assert_eq!(parsed, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    }
}
