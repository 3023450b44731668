//! S3 — condition end-branch: a keyword match on `用户问题` ends execution
//! before the `text_concat` node downstream ever runs.

use std::sync::Arc;

use loom_core::model::{
    ConditionAction, ConditionConfig, ConditionKind, KeywordMode, Node, NodeConfig, OutputConfig, SourceMode, StartConfig, TextConcatConfig,
    TextConcatSource, Workflow,
};
use loom_core::{EngineError, ExecutionResult, ExecutorBuilder, GlobalConfig};

pub async fn run_condition_end_branch(initial_input: impl Into<String>) -> Result<ExecutionResult, EngineError> {
    let workflow = Workflow::new("s3-condition-end-branch", 10, 30);
    let nodes = vec![
        Node::new("start", "Start", 0, NodeConfig::Start(StartConfig::default())),
        Node::new(
            "stop_check",
            "StopCheck",
            1,
            NodeConfig::Condition(ConditionConfig {
                input_variable: "用户问题".to_string(),
                kind: ConditionKind::Keyword {
                    keywords: vec!["停".to_string()],
                    mode: KeywordMode::Any,
                },
                true_action: ConditionAction::End,
                false_action: ConditionAction::Next,
                true_jump_target: None,
                false_jump_target: None,
            }),
        ),
        Node::new(
            "concat",
            "Followup",
            2,
            NodeConfig::TextConcat(TextConcatConfig {
                sources: vec![TextConcatSource {
                    mode: SourceMode::Manual,
                    variable: String::new(),
                    manual: "后续".to_string(),
                }],
                separator: "\n".to_string(),
            }),
        ),
        Node::new("output", "Output", 3, NodeConfig::Output(OutputConfig::default())),
    ];

    let executor = ExecutorBuilder::new(workflow, nodes, GlobalConfig::default(), super::handler_registry(), super::scripted_transport())
        .initial_input(initial_input)
        .build()?;
    Arc::new(executor).execute().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::context::NodeStatus;
    use loom_core::ExecutionStatus;

    #[tokio::test]
    async fn stop_keyword_ends_before_the_followup_node() {
        let result = run_condition_end_branch("请停").await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
        let concat_state = result.node_states.iter().find(|(id, _)| id == "concat").map(|(_, s)| s.status);
        assert_ne!(concat_state, Some(Some(NodeStatus::Completed)));
    }
}
