//! Node-type handlers for the loom workflow engine: one module per node
//! type, plus a `register_all` that wires every handler into a
//! `HandlerRegistry` by its `type_name`.

pub mod ai_chat;
pub mod condition;
pub mod condition_block;
pub mod condition_eval;
pub mod loop_block;
pub mod loop_legacy;
pub mod markdown;
pub mod output;
pub mod parallel_block;
pub mod start;
#[cfg(test)]
mod test_support;
pub mod text_concat;
pub mod text_extract;
pub mod var_update;

use loom_core::{ExecutionContext, HandlerRegistry};

/// Thin wrapper around [`loom_core::interpolate::interpolate`] so handlers
/// can call a short local name without repeating the module path.
pub(crate) fn interpolate_in(ctx: &ExecutionContext, template: &str) -> String {
    loom_core::interpolate::interpolate(ctx, template)
}

/// Resolves a bare variable reference the way `text_concat`/`text_extract`
/// read their `variable` sources: node output first, then the variable
/// table, defaulting to empty rather than failing (the legacy `condition`
/// and `loop` nodes and the block-form `condition_if`/`loop_start` all
/// "resolve input by variable reference" this same way).
pub(crate) fn resolve_variable_ref(ctx: &ExecutionContext, name: &str) -> String {
    ctx.node_outputs
        .get(name)
        .map(|v| v.value().clone())
        .or_else(|| ctx.variables.get(name).map(|v| v.value().clone()))
        .unwrap_or_default()
}

/// Registers every handler this crate provides under its node `type_name`.
pub fn register_all(registry: &mut HandlerRegistry) {
    use std::sync::Arc;
    registry.register("start", Arc::new(start::StartHandler));
    registry.register("output", Arc::new(output::OutputHandler));
    registry.register("ai_chat", Arc::new(ai_chat::AiChatHandler));
    registry.register("var_update", Arc::new(var_update::VarUpdateHandler));
    registry.register("text_extract", Arc::new(text_extract::TextExtractHandler));
    registry.register("text_concat", Arc::new(text_concat::TextConcatHandler));
    registry.register("condition", Arc::new(condition::ConditionHandler));
    registry.register("loop", Arc::new(loop_legacy::LoopLegacyHandler));
    registry.register("loop_start", Arc::new(loop_block::LoopStartHandler));
    registry.register("loop_end", Arc::new(loop_block::LoopEndHandler));
    registry.register("parallel_start", Arc::new(parallel_block::ParallelStartHandler));
    registry.register("parallel_end", Arc::new(parallel_block::ParallelEndHandler));
    registry.register("condition_if", Arc::new(condition_block::ConditionIfHandler));
    registry.register("condition_else", Arc::new(condition_block::ConditionElseHandler));
    registry.register("condition_end", Arc::new(condition_block::ConditionEndHandler));
}
