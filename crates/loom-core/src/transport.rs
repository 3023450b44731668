//! The `streamChat` collaborator boundary. The engine only depends on the
//! [`ChatTransport`] trait; concrete providers (and the scripted test
//! double used by `loom-examples`) live in `loom-transport`.

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::context::ChatMessage;
use crate::error::EngineError;

#[derive(Debug, Clone, Default)]
pub struct ChatParams {
    pub provider: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f64>,
    pub reasoning_effort: Option<String>,
}

/// One incremental fragment from a streaming chat completion. `content` is
/// the delta, not the cumulative buffer; `done` is set exactly once, on the
/// final chunk.
#[derive(Debug, Clone, Default)]
pub struct ChatChunk {
    pub content: String,
    pub done: bool,
}

/// Observed by the transport so a long-running provider call can stop doing
/// upstream work as soon as the engine cancels, rather than only being
/// abandoned locally.
#[derive(Clone)]
pub struct AbortSignal(watch::Receiver<bool>);

impl AbortSignal {
    pub fn new(receiver: watch::Receiver<bool>) -> Self {
        Self(receiver)
    }

    pub fn is_aborted(&self) -> bool {
        *self.0.borrow()
    }

    pub async fn aborted(&mut self) {
        let _ = self.0.wait_for(|v| *v).await;
    }
}

/// The async streaming chat collaborator. Implementations stream chunks
/// over the returned channel; dropping the receiver or observing `abort`
/// should stop further upstream work promptly.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn stream_chat(
        &self,
        params: ChatParams,
        abort: AbortSignal,
    ) -> Result<mpsc::Receiver<ChatChunk>, EngineError>;

    /// Whether `provider` is enabled and has credentials configured. The
    /// `ai_chat` handler calls this before invoking `stream_chat`.
    fn provider_available(&self, provider: &str) -> bool;
}
