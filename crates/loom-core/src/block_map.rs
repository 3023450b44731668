//! Precomputes opener→closer (and, for conditionals, →else) index pairs for
//! every `blockId` in a node list, per the Design Notes' suggestion: this
//! avoids repeated linear scans inside `loop_start`, `parallel_start`, and
//! `condition_if`. Observable semantics are unchanged from scanning on
//! every dispatch.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::model::{Node, NodeConfig};

#[derive(Debug, Clone, Copy)]
pub struct BlockBounds {
    pub start_index: usize,
    pub end_index: usize,
    pub else_index: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    by_block_id: HashMap<String, BlockBounds>,
}

fn is_opener(config: &NodeConfig) -> bool {
    matches!(
        config,
        NodeConfig::LoopStart(_) | NodeConfig::ParallelStart(_) | NodeConfig::ConditionIf(_)
    )
}

fn is_closer(config: &NodeConfig) -> bool {
    matches!(
        config,
        NodeConfig::LoopEnd | NodeConfig::ParallelEnd | NodeConfig::ConditionEnd
    )
}

impl BlockMap {
    /// Validates pairing (every opener has a matching closer with the same
    /// `blockId`, no interleaving) and builds the index.
    pub fn build(nodes: &[Node]) -> Result<Self, EngineError> {
        let mut by_block_id = HashMap::new();
        // Stack of (block_id, opener_index) to detect interleaving.
        let mut stack: Vec<(String, usize)> = Vec::new();
        let mut else_by_block_id: HashMap<String, usize> = HashMap::new();

        for (index, node) in nodes.iter().enumerate() {
            if is_opener(&node.config) {
                let block_id = node.block_id.clone().ok_or_else(|| {
                    EngineError::control_flow(format!("node {} opens a block with no blockId", node.id))
                })?;
                stack.push((block_id, index));
            } else if matches!(node.config, NodeConfig::ConditionElse) {
                let block_id = node.block_id.clone().ok_or_else(|| {
                    EngineError::control_flow(format!("node {} is a condition_else with no blockId", node.id))
                })?;
                if stack.last().map(|(id, _)| id) != Some(&block_id) {
                    return Err(EngineError::control_flow(format!(
                        "condition_else for block {block_id} does not match the innermost open block"
                    )));
                }
                else_by_block_id.insert(block_id, index);
            } else if is_closer(&node.config) {
                let block_id = node.block_id.clone().ok_or_else(|| {
                    EngineError::control_flow(format!("node {} closes a block with no blockId", node.id))
                })?;
                let (opened_id, opener_index) = stack.pop().ok_or_else(|| {
                    EngineError::control_flow(format!("unmatched closer for block {block_id}"))
                })?;
                if opened_id != block_id {
                    return Err(EngineError::control_flow(format!(
                        "interleaved blocks: opener {opened_id} closed by block {block_id}"
                    )));
                }
                by_block_id.insert(
                    block_id.clone(),
                    BlockBounds {
                        start_index: opener_index,
                        end_index: index,
                        else_index: else_by_block_id.remove(&block_id),
                    },
                );
            }
        }

        if let Some((block_id, _)) = stack.pop() {
            return Err(EngineError::control_flow(format!(
                "unmatched opener for block {block_id}"
            )));
        }

        Ok(Self { by_block_id })
    }

    pub fn bounds(&self, block_id: &str) -> Option<&BlockBounds> {
        self.by_block_id.get(block_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoopConfig, ParallelStartConfig};

    fn loop_start(id: &str, block: &str) -> Node {
        Node::new(id, id, 0, NodeConfig::LoopStart(LoopConfig::default())).with_block_id(block)
    }
    fn loop_end(id: &str, block: &str) -> Node {
        Node::new(id, id, 0, NodeConfig::LoopEnd).with_block_id(block)
    }

    #[test]
    fn builds_bounds_for_simple_loop_block() {
        let nodes = vec![loop_start("a", "L"), loop_end("b", "L")];
        let map = BlockMap::build(&nodes).unwrap();
        let bounds = map.bounds("L").unwrap();
        assert_eq!(bounds.start_index, 0);
        assert_eq!(bounds.end_index, 1);
    }

    #[test]
    fn rejects_unmatched_opener() {
        let nodes = vec![loop_start("a", "L")];
        assert!(BlockMap::build(&nodes).is_err());
    }

    #[test]
    fn rejects_interleaved_blocks() {
        let nodes = vec![
            loop_start("a", "L1"),
            Node::new("p", "p", 0, NodeConfig::ParallelStart(ParallelStartConfig::default()))
                .with_block_id("P1"),
            loop_end("b", "L1"),
            Node::new("q", "q", 0, NodeConfig::ParallelEnd).with_block_id("P1"),
        ];
        assert!(BlockMap::build(&nodes).is_err());
    }
}
