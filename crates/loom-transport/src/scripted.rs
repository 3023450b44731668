use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use loom_core::{AbortSignal, ChatChunk, ChatParams, ChatTransport, EngineError};
use tokio::sync::mpsc;

/// One scripted reply: a sequence of content deltas (the last one sets
/// `done`) and a per-chunk delay, for exercising streaming and cancellation
/// without a real provider.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub chunks: Vec<String>,
    pub delay: Duration,
}

impl ScriptedResponse {
    pub fn new(chunks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

fn provider_model_key(provider: &str, model: &str) -> String {
    format!("{provider}:{model}")
}

/// A `ChatTransport` that replays pre-scripted responses instead of calling
/// a remote model. Responses are queued per `provider:model` key (FIFO);
/// when no response is queued, a one-chunk echo of the last user message is
/// returned so unscripted calls still produce deterministic output.
pub struct ScriptedTransport {
    available: HashMap<String, bool>,
    queued: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            available: HashMap::new(),
            queued: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>, available: bool) -> Self {
        self.available.insert(provider.into(), available);
        self
    }

    pub fn queue_response(&self, provider: &str, model: &str, response: ScriptedResponse) {
        self.queued
            .lock()
            .expect("queued lock poisoned")
            .entry(provider_model_key(provider, model))
            .or_default()
            .push_back(response);
    }

    fn next_response(&self, provider: &str, model: &str, fallback_echo: String) -> ScriptedResponse {
        let mut queued = self.queued.lock().expect("queued lock poisoned");
        queued
            .get_mut(&provider_model_key(provider, model))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| ScriptedResponse::new([fallback_echo]))
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn stream_chat(
        &self,
        params: ChatParams,
        mut abort: AbortSignal,
    ) -> Result<mpsc::Receiver<ChatChunk>, EngineError> {
        if !self.provider_available(&params.provider) {
            return Err(EngineError::configuration(format!(
                "provider not available: {}",
                params.provider
            )));
        }

        let fallback_echo = params
            .messages
            .last()
            .map(|m| format!("(scripted reply) {}", m.content))
            .unwrap_or_default();
        let response = self.next_response(&params.provider, &params.model, fallback_echo);
        tracing::debug!(
            provider = %params.provider,
            model = %params.model,
            chunk_count = response.chunks.len(),
            "streaming scripted chat response"
        );
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let total = response.chunks.len();
            for (index, chunk) in response.chunks.into_iter().enumerate() {
                if abort.is_aborted() {
                    return;
                }
                if !response.delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(response.delay) => {}
                        _ = abort.aborted() => return,
                    }
                }
                if abort.is_aborted() {
                    return;
                }
                let done = index + 1 == total;
                if tx.send(ChatChunk { content: chunk, done }).await.is_err() {
                    return;
                }
            }
            if total == 0 {
                let _ = tx.send(ChatChunk { content: String::new(), done: true }).await;
            }
        });

        Ok(rx)
    }

    fn provider_available(&self, provider: &str) -> bool {
        self.available.get(provider).copied().unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::ChatMessage;
    use tokio::sync::watch;

    fn no_abort() -> AbortSignal {
        let (_tx, rx) = watch::channel(false);
        AbortSignal::new(rx)
    }

    #[tokio::test]
    async fn unavailable_provider_fails_fast() {
        let transport = ScriptedTransport::new().with_provider("openai", false);
        let err = transport
            .stream_chat(
                ChatParams {
                    provider: "openai".into(),
                    model: "gpt".into(),
                    messages: vec![ChatMessage::user("hi")],
                    ..Default::default()
                },
                no_abort(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn queued_response_streams_in_order() {
        let transport = ScriptedTransport::new();
        transport.queue_response("openai", "gpt", ScriptedResponse::new(["He", "llo"]));
        let mut rx = transport
            .stream_chat(
                ChatParams {
                    provider: "openai".into(),
                    model: "gpt".into(),
                    messages: vec![ChatMessage::user("hi")],
                    ..Default::default()
                },
                no_abort(),
            )
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.content, "He");
        assert!(!first.done);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.content, "llo");
        assert!(second.done);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancellation_stops_further_chunks() {
        let transport = ScriptedTransport::new();
        transport.queue_response(
            "openai",
            "gpt",
            ScriptedResponse::new((0..10).map(|i| i.to_string())).with_delay(Duration::from_millis(10)),
        );
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut rx = transport
            .stream_chat(
                ChatParams {
                    provider: "openai".into(),
                    model: "gpt".into(),
                    messages: vec![ChatMessage::user("hi")],
                    ..Default::default()
                },
                AbortSignal::new(cancel_rx),
            )
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.content, "0");
        let _ = cancel_tx.send(true);

        let mut received_after_cancel = 0;
        while rx.recv().await.is_some() {
            received_after_cancel += 1;
        }
        assert!(received_after_cancel < 9);
    }
}
