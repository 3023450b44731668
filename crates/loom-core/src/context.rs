//! [`ExecutionContext`]: the mutable state threaded through a single execution.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// The reserved variable key holding the initial user input.
pub const USER_QUESTION_KEY: &str = "用户问题";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeState {
    pub status: Option<NodeStatus>,
    /// Milliseconds since the execution's `startTime`, for serializability.
    pub started_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
    pub input: Option<String>,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl NodeState {
    fn pending() -> Self {
        Self {
            status: Some(NodeStatus::Pending),
            ..Default::default()
        }
    }
}

/// A JSON-serializable capture of the mutable context, excluding conversation
/// histories and node states by design (see spec Design Notes: restart does
/// not resume mid-conversation).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub variables: std::collections::HashMap<String, String>,
    pub previous_output: String,
    pub node_outputs: std::collections::HashMap<String, String>,
    pub initial_input: String,
    pub node_states: std::collections::HashMap<String, NodeState>,
    pub loop_counters: std::collections::HashMap<String, u32>,
    pub elapsed_seconds: f64,
}

/// The full mutable state of one execution.
///
/// Node-ID-keyed tables are backed by [`DashMap`] so that sibling tasks
/// inside a `parallel_start` block, each confined to its own node-ID
/// keyspace, can write concurrently without an execution-wide lock.
pub struct ExecutionContext {
    pub variables: DashMap<String, String>,
    pub node_outputs: DashMap<String, String>,
    pub conversation_history: DashMap<String, Vec<ChatMessage>>,
    pub node_states: DashMap<String, NodeState>,
    pub loop_counters: DashMap<String, u32>,
    last_output: RwLock<String>,
    last_finished_at_ms: AtomicI64,
    pub initial_input: String,
    pub start_time: Instant,
    pub max_loop_count: u32,
    pub timeout_seconds: u64,
}

impl ExecutionContext {
    pub fn new(initial_input: impl Into<String>, max_loop_count: u32, timeout_seconds: u64) -> Self {
        Self {
            variables: DashMap::new(),
            node_outputs: DashMap::new(),
            conversation_history: DashMap::new(),
            node_states: DashMap::new(),
            loop_counters: DashMap::new(),
            last_output: RwLock::new(String::new()),
            last_finished_at_ms: AtomicI64::new(-1),
            initial_input: initial_input.into(),
            start_time: Instant::now(),
            max_loop_count,
            timeout_seconds,
        }
    }

    pub fn register_nodes(&self, node_ids: impl IntoIterator<Item = String>) {
        for id in node_ids {
            self.node_states.entry(id).or_insert_with(NodeState::pending);
        }
    }

    pub fn last_output(&self) -> String {
        self.last_output.read().expect("last_output lock poisoned").clone()
    }

    pub fn set_last_output(&self, value: String) {
        *self.last_output.write().expect("last_output lock poisoned") = value;
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    pub fn is_timed_out(&self) -> bool {
        self.timeout_seconds > 0 && self.elapsed().as_secs() >= self.timeout_seconds
    }

    /// Records the completion of a node: updates `node_outputs`, the node's
    /// `nodeStates` entry, and (since this call always carries the latest
    /// `finishedAt`) `lastOutput`.
    pub fn complete_node(&self, node_id: &str, output: String) {
        let now_ms = self.elapsed_ms() as i64;
        self.node_outputs.insert(node_id.to_string(), output.clone());
        self.node_states
            .entry(node_id.to_string())
            .and_modify(|s| {
                s.status = Some(NodeStatus::Completed);
                s.finished_at_ms = Some(now_ms as u64);
                s.output = Some(output.clone());
            })
            .or_insert_with(|| NodeState {
                status: Some(NodeStatus::Completed),
                finished_at_ms: Some(now_ms as u64),
                output: Some(output.clone()),
                ..Default::default()
            });
        self.last_finished_at_ms.store(now_ms, Ordering::SeqCst);
        self.set_last_output(output);
    }

    pub fn mark_running(&self, node_id: &str, input: Option<String>) {
        let now_ms = self.elapsed_ms();
        self.node_states
            .entry(node_id.to_string())
            .and_modify(|s| {
                s.status = Some(NodeStatus::Running);
                s.started_at_ms = Some(now_ms);
                s.input = input.clone();
            })
            .or_insert_with(|| NodeState {
                status: Some(NodeStatus::Running),
                started_at_ms: Some(now_ms),
                input,
                ..Default::default()
            });
    }

    pub fn mark_failed(&self, node_id: &str, error: String) {
        let now_ms = self.elapsed_ms();
        self.node_states
            .entry(node_id.to_string())
            .and_modify(|s| {
                s.status = Some(NodeStatus::Failed);
                s.finished_at_ms = Some(now_ms);
                s.error = Some(error.clone());
            })
            .or_insert_with(|| NodeState {
                status: Some(NodeStatus::Failed),
                finished_at_ms: Some(now_ms),
                error: Some(error),
                ..Default::default()
            });
    }

    pub fn mark_skipped(&self, node_id: &str) {
        self.node_states
            .entry(node_id.to_string())
            .and_modify(|s| s.status = Some(NodeStatus::Skipped))
            .or_insert_with(|| NodeState {
                status: Some(NodeStatus::Skipped),
                ..Default::default()
            });
    }

    /// Updates a previously completed node's output in place (legal only
    /// while execution is paused; enforced by the executor, not here).
    pub fn modify_node_output(&self, node_id: &str, new_output: String) {
        self.node_outputs.insert(node_id.to_string(), new_output.clone());
        let mut was_last = false;
        if let Some(mut state) = self.node_states.get_mut(node_id) {
            state.output = Some(new_output.clone());
            if let Some(finished_at) = state.finished_at_ms
                && finished_at as i64 == self.last_finished_at_ms.load(Ordering::SeqCst)
            {
                was_last = true;
            }
        }
        if was_last {
            self.set_last_output(new_output);
        }
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            variables: self
                .variables
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            previous_output: self.last_output(),
            node_outputs: self
                .node_outputs
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            initial_input: self.initial_input.clone(),
            node_states: self
                .node_states
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            loop_counters: self
                .loop_counters
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            elapsed_seconds: self.elapsed().as_secs_f64(),
        }
    }

    /// Rehydrates a context from a snapshot. Conversation histories are
    /// never restored, by design: restart does not resume mid-conversation.
    pub fn restore(snapshot: ContextSnapshot, max_loop_count: u32, timeout_seconds: u64) -> Self {
        let ctx = Self::new(snapshot.initial_input, max_loop_count, timeout_seconds);
        for (k, v) in snapshot.variables {
            ctx.variables.insert(k, v);
        }
        for (k, v) in snapshot.node_outputs {
            ctx.node_outputs.insert(k, v);
        }
        for (k, v) in snapshot.node_states {
            ctx.node_states.insert(k, v);
        }
        for (k, v) in snapshot.loop_counters {
            ctx.loop_counters.insert(k, v);
        }
        ctx.set_last_output(snapshot.previous_output);
        ctx
    }
}

pub type SharedContext = Arc<ExecutionContext>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_node_updates_last_output() {
        let ctx = ExecutionContext::new("hello", 100, 60);
        ctx.complete_node("n1", "out1".into());
        assert_eq!(ctx.last_output(), "out1");
        assert_eq!(ctx.node_outputs.get("n1").unwrap().value(), "out1");
    }

    #[test]
    fn snapshot_round_trip_preserves_variables_and_outputs() {
        let ctx = ExecutionContext::new("world", 10, 30);
        ctx.variables.insert(USER_QUESTION_KEY.to_string(), "world".into());
        ctx.complete_node("n1", "out1".into());
        ctx.loop_counters.insert("L".into(), 2);

        let snap = ctx.snapshot();
        let restored = ExecutionContext::restore(snap.clone(), 10, 30);
        let restored_snap = restored.snapshot();

        assert_eq!(snap.variables, restored_snap.variables);
        assert_eq!(snap.node_outputs, restored_snap.node_outputs);
        assert_eq!(snap.initial_input, restored_snap.initial_input);
        assert_eq!(snap.loop_counters, restored_snap.loop_counters);
        assert!(restored.conversation_history.is_empty());
    }

    #[test]
    fn modify_node_output_updates_last_output_only_if_most_recent() {
        let ctx = ExecutionContext::new("", 10, 30);
        ctx.complete_node("n1", "a".into());
        ctx.complete_node("n2", "b".into());
        ctx.modify_node_output("n1", "a2".into());
        assert_eq!(ctx.last_output(), "b");
        ctx.modify_node_output("n2", "b2".into());
        assert_eq!(ctx.last_output(), "b2");
    }
}
