//! S6 — cancel during stream: a single `ai_chat` node streams ten
//! 10&nbsp;ms-delayed chunks; `cancel()` fires 30&nbsp;ms in, so only a
//! handful arrive before the stream is torn down mid-flight.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use loom_core::event::EventKind;
use loom_core::model::{AiChatConfig, Node, NodeConfig, Workflow};
use loom_core::{EngineError, Event, ExecutionResult, ExecutorBuilder, GlobalConfig, ProviderCredentials};
use loom_transport::{ScriptedResponse, ScriptedTransport};

pub async fn run_cancel_during_stream() -> Result<(ExecutionResult, Vec<Event>), EngineError> {
    let workflow = Workflow::new("s6-cancel-during-stream", 10, 30);
    let nodes = vec![Node::new(
        "chat",
        "Chat",
        0,
        NodeConfig::AiChat(AiChatConfig {
            provider: "openai".to_string(),
            model: "gpt".to_string(),
            system_prompt: String::new(),
            user_prompt: "hello".to_string(),
            enable_history: false,
            history_count: 0,
            ..Default::default()
        }),
    )];

    let mut global_config = GlobalConfig::default();
    global_config.providers.insert(
        "openai".to_string(),
        ProviderCredentials {
            enabled: true,
            has_credentials: true,
        },
    );

    let transport = ScriptedTransport::new();
    transport.queue_response(
        "openai",
        "gpt",
        ScriptedResponse::new((0..10).map(|i| i.to_string())).with_delay(Duration::from_millis(10)),
    );

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let executor = Arc::new(
        ExecutorBuilder::new(workflow, nodes, global_config, super::handler_registry(), Arc::new(transport))
            .on_event(Arc::new(move |event: Event| sink_events.lock().expect("events lock poisoned").push(event)))
            .build()?,
    );

    let canceller = Arc::clone(&executor);
    let cancel_task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel();
    });

    let result = executor.execute().await?;
    let _ = cancel_task.await;
    let captured = events.lock().expect("events lock poisoned").clone();
    Ok((result, captured))
}
