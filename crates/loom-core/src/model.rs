//! The workflow data model: [`Workflow`], [`Node`], and the per-type [`NodeConfig`].

use serde::{Deserialize, Serialize};

/// Immutable workflow-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    /// Absolute safety ceiling enforced on every loop counter regardless of a
    /// node's own `max_iterations`.
    pub loop_max_count: u32,
    /// Wall-clock bound, in seconds, for the whole execution.
    pub timeout_seconds: u64,
}

impl Workflow {
    pub fn new(id: impl Into<String>, loop_max_count: u32, timeout_seconds: u64) -> Self {
        Self {
            id: id.into(),
            loop_max_count,
            timeout_seconds,
        }
    }
}

/// A single entry in a workflow's flat, pre-ordered node list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub order_index: u32,
    pub config: NodeConfig,
    /// Links a block-opening node to its closing node (and the nodes between).
    #[serde(default)]
    pub block_id: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>, order_index: u32, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            order_index,
            config,
            block_id: None,
        }
    }

    pub fn with_block_id(mut self, block_id: impl Into<String>) -> Self {
        self.block_id = Some(block_id.into());
        self
    }

    /// The closed set of node-type tags, mirrored from `NodeConfig`'s discriminant.
    pub fn type_name(&self) -> &'static str {
        self.config.type_name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomVariable {
    pub name: String,
    pub default_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StartConfig {
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub custom_variables: Vec<CustomVariable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AiChatConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub enable_history: bool,
    #[serde(default)]
    pub history_count: usize,
    #[serde(default)]
    pub setting_ids: Vec<String>,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VarUpdateConfig {
    pub variable_name: String,
    pub value_template: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    Manual,
    Variable,
}

impl Default for InputMode {
    fn default() -> Self {
        InputMode::Variable
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    Regex,
    StartEnd,
    JsonPath,
    MdToText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextExtractConfig {
    #[serde(default)]
    pub input_mode: InputMode,
    pub input_variable: String,
    pub extract_mode: ExtractMode,
    #[serde(default)]
    pub regex_pattern: String,
    #[serde(default)]
    pub start_marker: String,
    #[serde(default)]
    pub end_marker: String,
    #[serde(default)]
    pub json_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    Variable,
    #[serde(alias = "custom")]
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextConcatSource {
    /// Accepts both the current `mode` field and the legacy `type` field on
    /// read (see spec Design Notes on the dual legacy schema); canonicalizes
    /// to `mode` on construction.
    #[serde(alias = "type")]
    pub mode: SourceMode,
    /// The variable/node-output name to read (mode `variable`).
    #[serde(default)]
    pub variable: String,
    /// The literal template to interpolate (mode `manual`, alias `custom`).
    #[serde(default, alias = "custom")]
    pub manual: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TextConcatConfig {
    pub sources: Vec<TextConcatSource>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "\n".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMode {
    Any,
    All,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthOperator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionKind {
    Keyword {
        keywords: Vec<String>,
        mode: KeywordMode,
    },
    Length {
        operator: LengthOperator,
        length_value: usize,
    },
    Regex {
        pattern: String,
    },
    AiJudge {
        ai_prompt: String,
        provider: String,
        model: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionAction {
    Next,
    End,
    Jump,
}

impl Default for ConditionAction {
    fn default() -> Self {
        ConditionAction::Next
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub input_variable: String,
    pub kind: ConditionKind,
    #[serde(default)]
    pub true_action: ConditionAction,
    #[serde(default)]
    pub false_action: ConditionAction,
    #[serde(default)]
    pub true_jump_target: Option<String>,
    #[serde(default)]
    pub false_jump_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopConditionType {
    Count,
    Condition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default)]
    pub condition_type: LoopConditionType,
    #[serde(default)]
    pub max_iterations: u32,
    /// Only used when `condition_type == Condition`.
    #[serde(default)]
    pub condition: Option<ConditionKind>,
    #[serde(default)]
    pub condition_input_variable: String,
}

impl Default for LoopConditionType {
    fn default() -> Self {
        LoopConditionType::Count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelOutputMode {
    Array,
    Concat,
}

impl Default for ParallelOutputMode {
    fn default() -> Self {
        ParallelOutputMode::Array
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelStartConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub output_mode: ParallelOutputMode,
    #[serde(default = "default_separator")]
    pub output_separator: String,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

fn default_concurrency() -> usize {
    3
}

fn default_retry_count() -> u32 {
    3
}

impl Default for ParallelStartConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            output_mode: ParallelOutputMode::default(),
            output_separator: default_separator(),
            retry_count: default_retry_count(),
        }
    }
}

/// Per-node-type configuration. Sentinel/boundary node types that carry no
/// fields of their own (`loop_end`, `condition_else`, `condition_end`,
/// `parallel_end`) are still modeled as unit variants so the node list stays
/// a single homogeneous type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    Start(StartConfig),
    Output(OutputConfig),
    AiChat(AiChatConfig),
    VarUpdate(VarUpdateConfig),
    TextExtract(TextExtractConfig),
    TextConcat(TextConcatConfig),
    /// Legacy monolithic condition node.
    Condition(ConditionConfig),
    /// Legacy monolithic loop node.
    Loop(LoopConfig),
    LoopStart(LoopConfig),
    LoopEnd,
    ParallelStart(ParallelStartConfig),
    ParallelEnd,
    ConditionIf(ConditionConfig),
    ConditionElse,
    ConditionEnd,
}

impl NodeConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeConfig::Start(_) => "start",
            NodeConfig::Output(_) => "output",
            NodeConfig::AiChat(_) => "ai_chat",
            NodeConfig::VarUpdate(_) => "var_update",
            NodeConfig::TextExtract(_) => "text_extract",
            NodeConfig::TextConcat(_) => "text_concat",
            NodeConfig::Condition(_) => "condition",
            NodeConfig::Loop(_) => "loop",
            NodeConfig::LoopStart(_) => "loop_start",
            NodeConfig::LoopEnd => "loop_end",
            NodeConfig::ParallelStart(_) => "parallel_start",
            NodeConfig::ParallelEnd => "parallel_end",
            NodeConfig::ConditionIf(_) => "condition_if",
            NodeConfig::ConditionElse => "condition_else",
            NodeConfig::ConditionEnd => "condition_end",
        }
    }
}
