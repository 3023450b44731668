//! Runnable demonstrations, one per file, each built directly on
//! `loom_core`/`loom_handlers`/`loom_transport`. Named after the
//! specification's worked scenarios so a reader can match each example back
//! to the behavior it demonstrates.

pub mod s1_linear_text_pipeline;
pub mod s2_regex_extract;
pub mod s3_condition_end_branch;
pub mod s4_count_loop;
pub mod s5_parallel_array;
pub mod s6_cancel_during_stream;

use std::sync::Arc;

use loom_core::{ChatTransport, HandlerRegistry};

/// Every example wires the same handler set; only the node list and
/// transport scripting differ.
pub(crate) fn handler_registry() -> Arc<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    loom_handlers::register_all(&mut registry);
    Arc::new(registry)
}

pub(crate) fn scripted_transport() -> Arc<dyn ChatTransport> {
    Arc::new(loom_transport::ScriptedTransport::new())
}
