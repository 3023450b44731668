//! An in-memory, scripted [`ChatTransport`](loom_core::ChatTransport)
//! implementation: the engine's out-of-scope AI provider boundary, stood in
//! for tests and demos. Modeled on the streaming/cancellation contract of a
//! real streaming chat client (run id, abort signal, `mpsc` chunk channel,
//! chunks arriving as deltas with a terminal `done` flag) without making any
//! network call itself.

mod scripted;

pub use scripted::{ScriptedResponse, ScriptedTransport};
