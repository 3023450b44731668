//! The `ai_chat` node: the only handler that crosses the `ChatTransport`
//! boundary. Grounded on `orchestrator-ai-harness::run::{RunBuilder,
//! RunStream, AbortHandle}` for the stream/cancel shape, streaming partial
//! output via `node_streaming` events exactly as the teacher's harness
//! forwards `StreamEvent::Delta` to its caller.

use std::collections::HashMap;

use async_trait::async_trait;
use loom_core::context::ChatMessage;
use loom_core::event::{Event, EventKind};
use loom_core::model::NodeConfig;
use loom_core::transport::{AbortSignal, ChatParams};
use loom_core::{EngineError, HandlerContext, HandlerOutcome, NodeHandler};

use crate::interpolate_in;

pub struct AiChatHandler;

fn fmt_opt<T: std::fmt::Display>(v: &Option<T>) -> String {
    v.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

#[async_trait]
impl NodeHandler for AiChatHandler {
    async fn handle(&self, hc: HandlerContext<'_>) -> Result<HandlerOutcome, EngineError> {
        let config = match &hc.node.config {
            NodeConfig::AiChat(c) => c,
            _ => return Err(EngineError::runtime("ai_chat handler received a non-ai_chat node")),
        };

        if !hc.global_config.provider_available(&config.provider) {
            return Err(EngineError::configuration(format!(
                "provider unavailable: {}",
                config.provider
            )));
        }

        let system_prompt = interpolate_in(hc.ctx, &config.system_prompt);
        let user_prompt = interpolate_in(hc.ctx, &config.user_prompt);

        let injected = loom_core::setting_injector::inject(&config.setting_ids, hc.settings, hc.setting_prompt_templates);
        let system_prompt = if injected.is_empty() {
            system_prompt
        } else if system_prompt.is_empty() {
            injected
        } else {
            format!("{injected}\n\n{system_prompt}")
        };

        if system_prompt.is_empty() && user_prompt.is_empty() {
            return Err(EngineError::configuration("ai_chat: both system_prompt and user_prompt are empty"));
        }

        let mut messages = Vec::new();
        if config.enable_history {
            if let Some(history) = hc.ctx.conversation_history.get(&hc.node.id) {
                let start = history.len().saturating_sub(config.history_count);
                messages.extend(history[start..].iter().cloned());
            }
        }
        if !system_prompt.is_empty() {
            messages.push(ChatMessage::system(system_prompt.clone()));
        }
        if !user_prompt.is_empty() {
            messages.push(ChatMessage::user(user_prompt.clone()));
        }

        let params = ChatParams {
            provider: config.provider.clone(),
            model: config.model.clone(),
            messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
            reasoning_effort: config.reasoning_effort.clone(),
        };

        let abort = AbortSignal::new(hc.cancel.as_watch());
        let mut rx = hc.transport.stream_chat(params, abort).await?;

        let mut buffer = String::new();
        while let Some(chunk) = rx.recv().await {
            if hc.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            buffer.push_str(&chunk.content);
            (hc.events)(
                Event::new(EventKind::NodeStreaming, hc.ctx.elapsed_ms())
                    .for_node(&hc.node.id, &hc.node.name, hc.node.type_name())
                    .with_content(buffer.clone()),
            );
            if chunk.done {
                break;
            }
        }
        if hc.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        if config.enable_history {
            let mut history = hc.ctx.conversation_history.entry(hc.node.id.clone()).or_default();
            history.push(ChatMessage::user(user_prompt.clone()));
            history.push(ChatMessage::assistant(buffer.clone()));
        }

        let mut resolved = HashMap::new();
        resolved.insert("provider".to_string(), config.provider.clone());
        resolved.insert("model".to_string(), config.model.clone());
        resolved.insert("system_prompt".to_string(), system_prompt);
        resolved.insert("user_prompt".to_string(), user_prompt);
        resolved.insert("temperature".to_string(), fmt_opt(&config.temperature));
        resolved.insert("max_tokens".to_string(), fmt_opt(&config.max_tokens));
        resolved.insert("top_p".to_string(), fmt_opt(&config.top_p));

        Ok(HandlerOutcome::output(buffer).with_resolved(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixtures;
    use loom_core::model::{AiChatConfig, Node};
    use loom_core::{ChatChunk, ChatTransport, ExecutionContext, GlobalConfig, ProviderCredentials};

    struct EchoTransport;

    #[async_trait]
    impl ChatTransport for EchoTransport {
        async fn stream_chat(
            &self,
            params: ChatParams,
            _abort: AbortSignal,
        ) -> Result<tokio::sync::mpsc::Receiver<ChatChunk>, EngineError> {
            let (tx, rx) = tokio::sync::mpsc::channel(8);
            let reply = params
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            tokio::spawn(async move {
                let _ = tx.send(ChatChunk { content: reply, done: true }).await;
            });
            Ok(rx)
        }

        fn provider_available(&self, _provider: &str) -> bool {
            true
        }
    }

    fn available_global_config() -> GlobalConfig {
        let mut cfg = GlobalConfig::default();
        cfg.providers.insert(
            "openai".to_string(),
            ProviderCredentials {
                enabled: true,
                has_credentials: true,
            },
        );
        cfg
    }

    fn chat_config() -> AiChatConfig {
        AiChatConfig {
            provider: "openai".into(),
            model: "gpt".into(),
            system_prompt: String::new(),
            user_prompt: "{{用户问题}}".into(),
            enable_history: false,
            history_count: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fails_fast_when_provider_unavailable() {
        let ctx = ExecutionContext::new("hi", 10, 30);
        let node = Node::new("a", "Ai", 0, NodeConfig::AiChat(chat_config()));
        let mut fixtures = Fixtures::new(node).with_transport(Box::new(EchoTransport));
        fixtures.global_config = GlobalConfig::default();
        let err = AiChatHandler.handle(fixtures.hc(&ctx)).await.unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn empty_prompts_fail() {
        let ctx = ExecutionContext::new("", 10, 30);
        let mut cfg = chat_config();
        cfg.user_prompt = String::new();
        let node = Node::new("a", "Ai", 0, NodeConfig::AiChat(cfg));
        let mut fixtures = Fixtures::new(node).with_transport(Box::new(EchoTransport));
        fixtures.global_config = available_global_config();
        let err = AiChatHandler.handle(fixtures.hc(&ctx)).await.unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[tokio::test]
    async fn streams_and_records_history() {
        let ctx = ExecutionContext::new("hello", 10, 30);
        ctx.variables.insert(loom_core::context::USER_QUESTION_KEY.to_string(), "hello".into());
        let mut cfg = chat_config();
        cfg.enable_history = true;
        cfg.history_count = 10;
        let node = Node::new("a", "Ai", 0, NodeConfig::AiChat(cfg));
        let mut fixtures = Fixtures::new(node).with_transport(Box::new(EchoTransport));
        fixtures.global_config = available_global_config();
        let outcome = AiChatHandler.handle(fixtures.hc(&ctx)).await.unwrap();
        assert_eq!(outcome.output, "hello");
        assert_eq!(ctx.conversation_history.get("a").unwrap().len(), 2);
    }
}
