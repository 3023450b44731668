//! S2 — regex extract: pulls the numeric order id out of the seeded
//! `用户问题` variable via a single capture group.

use std::sync::Arc;

use loom_core::model::{ExtractMode, InputMode, Node, NodeConfig, OutputConfig, StartConfig, TextExtractConfig, Workflow};
use loom_core::{EngineError, ExecutionResult, ExecutorBuilder, GlobalConfig};

pub async fn run_regex_extract(initial_input: impl Into<String>) -> Result<ExecutionResult, EngineError> {
    let workflow = Workflow::new("s2-regex-extract", 10, 30);
    let nodes = vec![
        Node::new("start", "Start", 0, NodeConfig::Start(StartConfig::default())),
        Node::new(
            "extract",
            "OrderId",
            1,
            NodeConfig::TextExtract(TextExtractConfig {
                input_mode: InputMode::Variable,
                input_variable: "用户问题".to_string(),
                extract_mode: ExtractMode::Regex,
                regex_pattern: "订单号：(\\d+)".to_string(),
                start_marker: String::new(),
                end_marker: String::new(),
                json_path: String::new(),
            }),
        ),
        Node::new("output", "Output", 2, NodeConfig::Output(OutputConfig::default())),
    ];

    let executor = ExecutorBuilder::new(workflow, nodes, GlobalConfig::default(), super::handler_registry(), super::scripted_transport())
        .initial_input(initial_input)
        .build()?;
    Arc::new(executor).execute().await
}
