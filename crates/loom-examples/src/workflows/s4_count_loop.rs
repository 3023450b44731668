//! S4 — count loop: `loop_start`/`loop_end` wrap a single `text_concat`
//! body for exactly three iterations, then fall through to `output`.
//! `loop_start` fires one `node_completed` event per iteration plus one
//! more for the exit, so a three-iteration loop produces four.

use std::sync::{Arc, Mutex};

use loom_core::event::EventKind;
use loom_core::model::{
    LoopConditionType, LoopConfig, Node, NodeConfig, OutputConfig, SourceMode, StartConfig, TextConcatConfig, TextConcatSource, Workflow,
};
use loom_core::{EngineError, Event, ExecutionResult, ExecutorBuilder, GlobalConfig};

pub async fn run_count_loop() -> Result<(ExecutionResult, Vec<Event>), EngineError> {
    let workflow = Workflow::new("s4-count-loop", 10, 30);
    let nodes = vec![
        Node::new(
            "loop_start",
            "LoopStart",
            0,
            NodeConfig::LoopStart(LoopConfig {
                condition_type: LoopConditionType::Count,
                max_iterations: 3,
                condition: None,
                condition_input_variable: String::new(),
            }),
        )
        .with_block_id("L"),
        Node::new(
            "body",
            "Body",
            1,
            NodeConfig::TextConcat(TextConcatConfig {
                sources: vec![TextConcatSource {
                    mode: SourceMode::Manual,
                    variable: String::new(),
                    manual: "x".to_string(),
                }],
                separator: "\n".to_string(),
            }),
        )
        .with_block_id("L"),
        Node::new("loop_end", "LoopEnd", 2, NodeConfig::LoopEnd).with_block_id("L"),
        Node::new("output", "Output", 3, NodeConfig::Output(OutputConfig::default())),
    ];

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let executor = ExecutorBuilder::new(workflow, nodes, GlobalConfig::default(), super::handler_registry(), super::scripted_transport())
        .on_event(Arc::new(move |event: Event| sink_events.lock().expect("events lock poisoned").push(event)))
        .build()?;
    let result = Arc::new(executor).execute().await?;
    let captured = events.lock().expect("events lock poisoned").clone();
    Ok((result, captured))
}
